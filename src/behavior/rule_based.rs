//! A speed controller driven by simple gap and speed rules.

use super::{DriveState, DrivingPolicy, IdmParams, LaneChangeParams, Scene};
use crate::road::{LaneIndex, RoadNetwork};
use crate::util::Interval;
use crate::vehicle::control::speed_control;
use crate::vehicle::Vehicle;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The parameters of the speed rules.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleParams {
    /// The change in target speed applied by each rule, in m/s.
    pub step: f64,
    /// The target speed when closing in on a stationary obstacle, in m/s.
    pub emergency_speed: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            step: 0.3,
            emergency_speed: 10.0,
        }
    }
}

/// Adjusts the target speed by rules each step and tracks it with a proportional controller.
///
/// Other vehicles are still assumed to follow the intelligent driver model when evaluating
/// lane changes.
#[derive(Clone, Debug)]
pub struct RuleBasedPolicy {
    /// The model other vehicles are assumed to follow, and the range of target speeds.
    pub idm: IdmParams,
    /// The parameters of the lane change model.
    pub lane_change: LaneChangeParams,
    /// The speed rules.
    pub rules: RuleParams,
}

impl RuleBasedPolicy {
    /// Creates a policy with the given rules.
    pub fn new(rules: RuleParams, lane_change: LaneChangeParams) -> Self {
        Self {
            idm: IdmParams {
                target_speeds: Interval::new(10.0, 30.0),
                ..Default::default()
            },
            lane_change,
            rules,
        }
    }

    /// Applies the rules to a target speed, given the vehicle ahead.
    ///
    /// Without a vehicle ahead, the target speed goes up. When too close to a slower vehicle it
    /// goes down to at most that vehicle's speed, or to the emergency speed if the vehicle is
    /// stopped. When comfortably behind a vehicle at least as fast, it goes up.
    ///
    /// The same rules serve the current lane, the target lane of a lane change and the lane
    /// change lookahead. A stopped vehicle ahead in any of them sets the emergency speed, rather
    /// than only lowering the target speed by one step.
    pub fn next_target_speed(
        &self,
        network: &RoadNetwork,
        ego: &Vehicle,
        target_speed: f64,
        front: Option<&Vehicle>,
    ) -> f64 {
        let step = self.rules.step;
        let target_speed = match front {
            None => target_speed + step,
            Some(front) => {
                let d = ego.lane_distance_to(front, network);
                let d_star = self.desired_gap(ego, front, true);
                if d <= d_star && ego.speed() > front.speed() {
                    if front.speed() != 0.0 {
                        f64::min(target_speed - step, front.speed())
                    } else {
                        self.rules.emergency_speed
                    }
                } else if d > d_star && ego.speed() <= front.speed() {
                    target_speed + step
                } else {
                    target_speed
                }
            }
        };
        self.idm.target_speeds.clamp(target_speed)
    }

    /// Updates the target speed against the vehicle ahead in a lane, and returns the
    /// acceleration tracking it.
    fn follow(&self, scene: &Scene, ego: &Vehicle, state: &mut DriveState, lane: LaneIndex) -> f64 {
        let (front, _) = scene.neighbour_vehicles(ego, lane);
        state.target_speed = self.next_target_speed(scene.network(), ego, state.target_speed, front);
        speed_control(ego.speed(), state.target_speed)
    }
}

impl Default for RuleBasedPolicy {
    fn default() -> Self {
        Self::new(RuleParams::default(), LaneChangeParams::default())
    }
}

impl DrivingPolicy for RuleBasedPolicy {
    fn idm(&self) -> &IdmParams {
        &self.idm
    }

    fn lane_change(&self) -> &LaneChangeParams {
        &self.lane_change
    }

    fn acceleration(&self, network: &RoadNetwork, ego: Option<&Vehicle>, front: Option<&Vehicle>) -> f64 {
        super::idm::acceleration(&self.idm, network, ego, front)
    }

    fn ego_acceleration(
        &self,
        network: &RoadNetwork,
        ego: &Vehicle,
        state: &DriveState,
        front: Option<&Vehicle>,
    ) -> f64 {
        let target_speed = self.next_target_speed(network, ego, state.target_speed, front);
        speed_control(ego.speed(), target_speed)
    }

    fn compute_longitudinal(&self, scene: &Scene, ego: &Vehicle, state: &mut DriveState) -> f64 {
        let (lane, target_lane) = (state.lane_index, state.target_lane_index);
        let mut acc = self.follow(scene, ego, state, lane);
        if lane != target_lane {
            let target_acc = self.follow(scene, ego, state, target_lane);
            acc = f64::min(acc, target_acc);
        }
        acc
    }
}
