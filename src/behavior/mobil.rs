//! Lane change decisions with MOBIL (minimizing overall braking induced by lane changes).

use super::{DriveState, DrivingPolicy, Scene};
use crate::road::LaneIndex;
use crate::vehicle::Vehicle;
use crate::{VehicleId, VehicleSet};
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// The parameters of the lane change model.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneChangeParams {
    /// The weight given to the acceleration gained or lost by other vehicles, in `[0, 1]`.
    pub politeness: f64,
    /// The minimum acceleration gain which justifies a lane change, in m/s<sup>2</sup>.
    pub min_acc_gain: f64,
    /// The hardest braking a lane change may impose on the new follower, in m/s<sup>2</sup>.
    pub max_braking_imposed: f64,
    /// The minimum time between two lane change evaluations, in s.
    pub delay: f64,
}

impl Default for LaneChangeParams {
    fn default() -> Self {
        Self {
            politeness: 0.0,
            min_acc_gain: 0.2,
            max_braking_imposed: 5.0,
            delay: 0.1,
        }
    }
}

/// The controlled vehicles currently changing lanes, keyed by the lane they are moving into.
#[derive(Clone, Debug, Default)]
pub struct LaneChangeIndex {
    lanes: HashMap<LaneIndex, SmallVec<[VehicleId; 4]>>,
}

impl LaneChangeIndex {
    /// Indexes the vehicles in a set.
    pub fn new(vehicles: &VehicleSet) -> Self {
        let mut lanes: HashMap<_, SmallVec<_>> = HashMap::new();
        for (id, vehicle) in vehicles {
            if vehicle.is_controlled() && vehicle.is_changing_lane() {
                lanes.entry(vehicle.target_lane_index()).or_default().push(id);
            }
        }
        Self { lanes }
    }

    /// The vehicles moving into the given lane.
    pub fn changing_into(&self, lane: LaneIndex) -> &[VehicleId] {
        self.lanes.get(&lane).map_or(&[], |ids| ids.as_slice())
    }
}

/// Decides whether a vehicle should move into a neighbouring lane.
///
/// The change is rejected if it would force the new follower to brake harder than allowed.
/// When the route requires a specific lane, the change is accepted if it moves towards that lane
/// without unsafe braking for the vehicle itself. Otherwise the change must yield enough of an
/// acceleration gain, weighing the gains of the followers by the politeness factor.
///
/// # Parameters
/// * `policy` - The policy of the vehicle considering the change
/// * `scene` - The current scene
/// * `ego` - The vehicle considering the change
/// * `state` - The vehicle's behavioural state for this step
/// * `lane_index` - The candidate lane
pub fn mobil<P: DrivingPolicy + ?Sized>(
    policy: &P,
    scene: &Scene,
    ego: &Vehicle,
    state: &DriveState,
    lane_index: LaneIndex,
) -> bool {
    let params = policy.lane_change();
    let network = scene.network();

    // Is the manoeuvre unsafe for the new following vehicle?
    let (new_preceding, new_following) = scene.neighbour_vehicles(ego, lane_index);
    let new_following_a = policy.acceleration(network, new_following, new_preceding);
    let new_following_pred_a = policy.acceleration(network, new_following, Some(ego));
    if new_following_pred_a < -params.max_braking_imposed {
        return false;
    }

    let (old_preceding, old_following) = scene.neighbour_vehicles(ego, state.lane_index);
    let self_pred_a = policy.ego_acceleration(network, ego, state, new_preceding);

    match state.route(ego).first().and_then(|step| step.lane) {
        Some(route_id) => {
            // Only move towards the lane the route requires
            let target = state.target_lane_index.id as i64;
            if (lane_index.id as i64 - target).signum() != (route_id as i64 - target).signum() {
                return false;
            }
            if self_pred_a < -params.max_braking_imposed {
                return false;
            }
        }
        None => {
            let self_a = policy.ego_acceleration(network, ego, state, old_preceding);
            let old_following_a = policy.acceleration(network, old_following, Some(ego));
            let old_following_pred_a = policy.acceleration(network, old_following, old_preceding);
            let incentive = self_pred_a - self_a
                + params.politeness
                    * (new_following_pred_a - new_following_a + old_following_pred_a
                        - old_following_a);
            if incentive < params.min_acc_gain {
                return false;
            }
        }
    }

    true
}

/// Decides when to start or abort a lane change, updating `state` accordingly.
///
/// While a change is in progress within a road segment, it is aborted if another vehicle
/// moving into the same lane is ahead and closer than the desired gap. Otherwise, once the lane
/// change timer exceeds the policy's delay, the timer is reset and each reachable side lane is
/// evaluated in turn; the first one accepted becomes the target lane.
pub fn change_lane_policy<P: DrivingPolicy + ?Sized>(
    policy: &P,
    scene: &Scene,
    ego: &Vehicle,
    state: &mut DriveState,
) {
    let network = scene.network();

    if state.is_changing_lane() {
        if state.lane_index.same_segment(&state.target_lane_index) {
            let conflict = scene
                .changing_into(state.target_lane_index)
                .filter(|other| other.id() != ego.id())
                .any(|other| {
                    let d = ego.lane_distance_to(other, network);
                    0.0 < d && d < policy.desired_gap(ego, other, true)
                });
            if conflict {
                debug!(
                    "Vehicle {:?} aborts its lane change into {:?}",
                    ego.id(),
                    state.target_lane_index
                );
                state.target_lane_index = state.lane_index;
            }
        }
        return;
    }

    if state.timer <= policy.lane_change().delay {
        return;
    }
    state.timer = 0.0;

    for lane_index in network.side_lanes(state.lane_index) {
        let reachable = network
            .lane(lane_index)
            .map_or(false, |lane| lane.is_reachable_from(ego.position()));
        if !reachable || ego.speed().abs() < 1.0 {
            continue;
        }
        if policy.evaluate_lane_change(scene, ego, state, lane_index) {
            debug!(
                "Vehicle {:?} changes lane from {:?} to {:?}",
                ego.id(),
                state.lane_index,
                lane_index
            );
            state.target_lane_index = lane_index;
            break;
        }
    }
}
