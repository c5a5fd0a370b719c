//! Driving behaviour: car following, lane changing and the decision each vehicle makes per step.

use crate::road::{LaneIndex, RoadNetwork, RouteStep};
use crate::vehicle::control::{steering_control, MAX_STEERING_ANGLE};
use crate::vehicle::dynamics::Action;
use crate::vehicle::Vehicle;
use crate::util::Interval;
use crate::VehicleSet;
use log::trace;
use rand::RngCore;

pub use data::{Dataset, FeatureLog, FeatureModel, FeatureSink, SharedSink};
pub use idm::{IdmParams, IdmPolicy};
pub use linear::{LinearParams, LinearPolicy};
pub use mobil::{change_lane_policy, mobil, LaneChangeIndex, LaneChangeParams};
pub use rule_based::{RuleBasedPolicy, RuleParams};

pub mod data;
pub mod idm;
mod linear;
mod mobil;
mod rule_based;

/// A snapshot of the road and every vehicle on it, from which vehicles make their decisions.
pub struct Scene<'a> {
    network: &'a RoadNetwork,
    vehicles: &'a VehicleSet,
    lane_changes: LaneChangeIndex,
}

impl<'a> Scene<'a> {
    /// Creates a snapshot of the given road and vehicles.
    pub fn new(network: &'a RoadNetwork, vehicles: &'a VehicleSet) -> Self {
        Self {
            network,
            vehicles,
            lane_changes: LaneChangeIndex::new(vehicles),
        }
    }

    /// The road network.
    pub fn network(&self) -> &'a RoadNetwork {
        self.network
    }

    /// Finds the vehicles immediately ahead of and behind a vehicle within a lane.
    ///
    /// A vehicle counts as being in the lane if it lies within a metre of its edges.
    /// Vehicles level with `vehicle` count as being ahead.
    pub fn neighbour_vehicles(
        &self,
        vehicle: &Vehicle,
        lane_index: LaneIndex,
    ) -> (Option<&'a Vehicle>, Option<&'a Vehicle>) {
        let lane = match self.network.lane(lane_index) {
            Some(lane) => lane,
            None => return (None, None),
        };
        let (s, _) = lane.local_coordinates(vehicle.position());

        let mut front: Option<(f64, &Vehicle)> = None;
        let mut rear: Option<(f64, &Vehicle)> = None;
        for other in self.vehicles.values() {
            if other.id() == vehicle.id() || !lane.on_lane(other.position(), 1.0) {
                continue;
            }
            let (s_other, _) = lane.local_coordinates(other.position());
            if s <= s_other && front.map_or(true, |(s_front, _)| s_other <= s_front) {
                front = Some((s_other, other));
            }
            if s_other < s && rear.map_or(true, |(s_rear, _)| s_other > s_rear) {
                rear = Some((s_other, other));
            }
        }
        (front.map(|(_, v)| v), rear.map(|(_, v)| v))
    }

    /// The controlled vehicles in the process of moving into a lane.
    pub fn changing_into(&self, lane_index: LaneIndex) -> impl Iterator<Item = &'a Vehicle> + '_ {
        let vehicles = self.vehicles;
        self.lane_changes
            .changing_into(lane_index)
            .iter()
            .filter_map(move |id| vehicles.get(*id))
    }
}

/// The behavioural state of a vehicle, as it evolves during a decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveState {
    /// The lane the vehicle occupies.
    pub lane_index: LaneIndex,
    /// The lane the vehicle is committed to reach.
    pub target_lane_index: LaneIndex,
    /// The desired cruising speed in m/s.
    pub target_speed: f64,
    /// The time since the last lane change evaluation in s.
    pub timer: f64,
    /// Whether the first step of the vehicle's route has been completed.
    pub route_consumed: bool,
}

impl DriveState {
    /// The current state of a vehicle.
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            lane_index: vehicle.lane_index(),
            target_lane_index: vehicle.target_lane_index(),
            target_speed: vehicle.target_speed(),
            timer: vehicle.timer(),
            route_consumed: false,
        }
    }

    /// Whether the vehicle is part way through a lane change.
    pub fn is_changing_lane(&self) -> bool {
        self.lane_index != self.target_lane_index
    }

    /// The vehicle's remaining route.
    pub fn route<'v>(&self, vehicle: &'v Vehicle) -> &'v [RouteStep] {
        let route = vehicle.route();
        if self.route_consumed && !route.is_empty() {
            &route[1..]
        } else {
            route
        }
    }
}

/// The outcome of a vehicle's decision for one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    /// The vehicle's new behavioural state.
    pub state: DriveState,
    /// The command to apply until the next decision.
    pub action: Action,
}

/// A driving policy: how a vehicle accelerates, steers and decides to change lanes.
///
/// Only [DrivingPolicy::idm], [DrivingPolicy::lane_change] and [DrivingPolicy::acceleration]
/// are required; the other methods default to the intelligent driver model and MOBIL.
pub trait DrivingPolicy {
    /// The parameters of the car following model.
    fn idm(&self) -> &IdmParams;

    /// The parameters of the lane change model.
    fn lane_change(&self) -> &LaneChangeParams;

    /// The range target speeds are clamped into.
    fn target_speeds(&self) -> Interval<f64> {
        self.idm().target_speeds
    }

    /// The acceleration of any vehicle following `front`, as predicted by this policy.
    fn acceleration(&self, network: &RoadNetwork, ego: Option<&Vehicle>, front: Option<&Vehicle>) -> f64;

    /// The desired distance between `ego` and the vehicle in front of it.
    fn desired_gap(&self, ego: &Vehicle, front: &Vehicle, projected: bool) -> f64 {
        idm::desired_gap(self.idm(), ego, front, projected)
    }

    /// The acceleration the vehicle driven by this policy would pick behind `front`.
    fn ego_acceleration(
        &self,
        network: &RoadNetwork,
        ego: &Vehicle,
        _state: &DriveState,
        front: Option<&Vehicle>,
    ) -> f64 {
        self.acceleration(network, Some(ego), front)
    }

    /// The unclamped acceleration command, considering the current and the target lane.
    fn compute_longitudinal(&self, scene: &Scene, ego: &Vehicle, state: &mut DriveState) -> f64 {
        let network = scene.network();
        let (front, _) = scene.neighbour_vehicles(ego, state.lane_index);
        let mut acc = self.acceleration(network, Some(ego), front);
        if state.is_changing_lane() {
            let (front, _) = scene.neighbour_vehicles(ego, state.target_lane_index);
            acc = f64::min(acc, self.acceleration(network, Some(ego), front));
        }
        if self.idm().recover_from_stop {
            acc = recover_from_stop(self.idm(), scene, ego, state, acc);
        }
        acc
    }

    /// The unclamped steering command following the given lane.
    fn compute_lateral(&self, scene: &Scene, ego: &Vehicle, lane_index: LaneIndex) -> f64 {
        steering_control(scene.network(), ego, lane_index)
    }

    /// Whether to move into the given neighbouring lane.
    fn evaluate_lane_change(
        &self,
        scene: &Scene,
        ego: &Vehicle,
        state: &DriveState,
        lane_index: LaneIndex,
    ) -> bool {
        mobil(self, scene, ego, state, lane_index)
    }

    /// Records data about the upcoming decision.
    fn record(&self, _scene: &Scene, _ego: &Vehicle, _state: &DriveState) {}

    /// Samples new parameters from the policy's ranges.
    fn randomize(&mut self, _rng: &mut dyn RngCore) {}
}

/// The driving policy of a controlled vehicle.
#[derive(Clone, Debug)]
pub enum Policy {
    /// The intelligent driver model.
    Idm(IdmPolicy),
    /// Controllers linear in their parameters.
    Linear(LinearPolicy),
    /// Rule-driven target speeds.
    RuleBased(RuleBasedPolicy),
}

impl Policy {
    /// The intelligent driver model with MOBIL lane changes.
    pub fn idm() -> Self {
        Self::Idm(IdmPolicy::default())
    }

    /// Linear controllers with their nominal parameters.
    pub fn linear() -> Self {
        Self::Linear(LinearPolicy::default())
    }

    /// Linear controllers tuned for eager merging.
    pub fn aggressive() -> Self {
        Self::Linear(LinearPolicy::aggressive())
    }

    /// Linear controllers tuned for keeping a distance.
    pub fn defensive() -> Self {
        Self::Linear(LinearPolicy::defensive())
    }

    /// Speed rules with MOBIL lane changes.
    pub fn rule_based() -> Self {
        Self::RuleBased(RuleBasedPolicy::default())
    }

    /// Gets the policy as a trait object.
    pub fn driver(&self) -> &dyn DrivingPolicy {
        match self {
            Self::Idm(policy) => policy,
            Self::Linear(policy) => policy,
            Self::RuleBased(policy) => policy,
        }
    }

    /// Gets the policy as a mutable trait object.
    pub fn driver_mut(&mut self) -> &mut dyn DrivingPolicy {
        match self {
            Self::Idm(policy) => policy,
            Self::Linear(policy) => policy,
            Self::RuleBased(policy) => policy,
        }
    }

    /// Samples new parameters from the policy's ranges.
    pub fn randomize(&mut self, rng: &mut dyn RngCore) {
        self.driver_mut().randomize(rng);
    }
}

/// Decides a vehicle's command for the next step.
///
/// Returns `None` for passive and crashed vehicles.
pub fn act(scene: &Scene, vehicle: &Vehicle) -> Option<Decision> {
    if vehicle.crashed() {
        return None;
    }
    let driver = vehicle.policy()?.driver();
    let mut state = DriveState::of(vehicle);

    driver.record(scene, vehicle, &state);
    follow_road(scene.network(), vehicle, &mut state);
    if vehicle.lane_change_enabled() {
        change_lane_policy(driver, scene, vehicle, &mut state);
    }

    let steering = driver
        .compute_lateral(scene, vehicle, state.target_lane_index)
        .clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE);
    let acc_max = driver.idm().acc_max;
    let acceleration = driver
        .compute_longitudinal(scene, vehicle, &mut state)
        .clamp(-acc_max, acc_max);

    let action = Action {
        steering,
        acceleration,
    };
    trace!("Vehicle {:?} decided {:?} with {:?}", vehicle.id(), action, state);
    Some(Decision { state, action })
}

/// Moves the target lane on to the next road once the vehicle reaches the end of its lane.
pub fn follow_road(network: &RoadNetwork, vehicle: &Vehicle, state: &mut DriveState) {
    let after_end = network
        .lane(state.target_lane_index)
        .map_or(false, |lane| lane.after_end(vehicle.position()));
    if after_end {
        let next = network.next_lane(state.target_lane_index, state.route(vehicle), vehicle.position());
        state.target_lane_index = next.index;
        state.route_consumed |= next.route_consumed;
    }
}

/// Suggests reversing when the vehicle is stuck part way through a lane change,
/// as long as there is room behind it in both lanes.
pub fn recover_from_stop(
    params: &IdmParams,
    scene: &Scene,
    ego: &Vehicle,
    state: &DriveState,
    acceleration: f64,
) -> f64 {
    const STOPPED_SPEED: f64 = 5.0;
    const SAFE_DISTANCE: f64 = 200.0;

    if !state.is_changing_lane() || ego.speed() >= STOPPED_SPEED {
        return acceleration;
    }
    let network = scene.network();
    let clear = |rear: Option<&Vehicle>| {
        rear.map_or(true, |rear| rear.lane_distance_to(ego, network) > SAFE_DISTANCE)
    };
    let (_, rear) = scene.neighbour_vehicles(ego, state.lane_index);
    let (_, new_rear) = scene.neighbour_vehicles(ego, state.target_lane_index);
    if clear(rear) && clear(new_rear) {
        -params.comfort_acc_max / 2.0
    } else {
        acceleration
    }
}
