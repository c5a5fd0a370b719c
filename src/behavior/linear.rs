//! Controllers which are linear in their parameters, for behaviour randomisation and regression.

use super::data::{FeatureModel, SharedSink};
use super::{DriveState, DrivingPolicy, IdmParams, LaneChangeParams, Scene};
use crate::math::{not_zero, wrap_to_pi};
use crate::road::{LaneIndex, RoadNetwork};
use crate::util::Interval;
use crate::vehicle::control::{KP_HEADING, KP_LATERAL, TAU_PURSUIT};
use crate::vehicle::{Vehicle, LENGTH};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The nominal weights of the acceleration features.
pub const ACCELERATION_PARAMETERS: [f64; 3] = [0.3, 0.3, 2.0];

/// The nominal weights of the steering features.
pub const STEERING_PARAMETERS: [f64; 2] = [KP_HEADING, KP_HEADING * KP_LATERAL];

/// How far the steering weights may stray from their nominal values.
const STEERING_SPREAD: [f64; 2] = [0.07, 1.5];

/// The weights of the linear controllers, and the ranges they are randomised within.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearParams {
    /// The weights of the target speed error, the front speed error and the front distance error.
    pub acceleration: [f64; 3],
    /// The weights of the heading error and the lateral offset.
    pub steering: [f64; 2],
    /// The ranges the acceleration weights are sampled from.
    pub acceleration_range: [Interval<f64>; 3],
    /// The ranges the steering weights are sampled from.
    pub steering_range: [Interval<f64>; 2],
}

impl LinearParams {
    /// Creates parameters around the given nominal weights.
    pub fn new(acceleration: [f64; 3], steering: [f64; 2]) -> Self {
        Self {
            acceleration,
            steering,
            acceleration_range: acceleration.map(|p| Interval::scaled(p, 0.5, 1.5)),
            steering_range: [0, 1].map(|i| Interval::disc(steering[i], STEERING_SPREAD[i])),
        }
    }

    /// Merging parameters: a gain towards the target speed and the front vehicle's speed,
    /// split by `speed_ratio` of `target_speed`, and a weight on the distance to the front.
    fn merging(gain: f64, speed_ratio: f64, target_speed: f64, distance_weight: f64) -> Self {
        Self::new(
            [
                gain / ((1.0 - speed_ratio) * target_speed),
                gain / (speed_ratio * target_speed),
                distance_weight,
            ],
            STEERING_PARAMETERS,
        )
    }
}

impl Default for LinearParams {
    fn default() -> Self {
        Self::new(ACCELERATION_PARAMETERS, STEERING_PARAMETERS)
    }
}

/// A policy whose acceleration and steering are dot products of features with weights.
#[derive(Clone)]
pub struct LinearPolicy {
    /// The model other vehicles are assumed to follow, and the gap this policy keeps.
    pub idm: IdmParams,
    /// The parameters of the lane change model.
    pub lane_change: LaneChangeParams,
    /// The weights of the controllers.
    pub params: LinearParams,
    /// Where features are recorded, if anywhere.
    sink: Option<SharedSink>,
}

impl LinearPolicy {
    /// Creates a policy with the given weights.
    pub fn new(params: LinearParams, lane_change: LaneChangeParams) -> Self {
        Self {
            idm: IdmParams {
                time_wanted: 2.5,
                ..Default::default()
            },
            lane_change,
            params,
            sink: None,
        }
    }

    /// A driver which merges eagerly into small gaps.
    pub fn aggressive() -> Self {
        Self::new(
            LinearParams::merging(0.8, 0.75, 30.0, 0.5),
            LaneChangeParams {
                min_acc_gain: 1.0,
                ..Default::default()
            },
        )
    }

    /// A driver which keeps its distance.
    pub fn defensive() -> Self {
        Self::new(
            LinearParams::merging(1.2, 0.75, 30.0, 2.0),
            LaneChangeParams {
                min_acc_gain: 1.0,
                ..Default::default()
            },
        )
    }

    /// Attaches a sink which receives the features of every decision.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attaches or detaches the feature sink.
    pub fn set_sink(&mut self, sink: Option<SharedSink>) {
        self.sink = sink;
    }

    /// The features of the acceleration controller: the difference to the target speed, the
    /// speed deficit to the front vehicle, and the shortfall of the gap to a safe distance.
    pub fn acceleration_features(
        &self,
        network: &RoadNetwork,
        ego: Option<&Vehicle>,
        front: Option<&Vehicle>,
    ) -> [f64; 3] {
        let ego = match ego {
            Some(ego) => ego,
            None => return [0.0; 3],
        };
        let vt = ego.target_speed() - ego.speed();
        let (dv, dp) = match front {
            Some(front) => {
                let d_safe =
                    self.idm.distance_wanted + f64::max(ego.speed(), 0.0) * self.idm.time_wanted;
                let d = ego.lane_distance_to(front, network);
                (
                    f64::min(front.speed() - ego.speed(), 0.0),
                    f64::min(d - d_safe, 0.0),
                )
            }
            None => (0.0, 0.0),
        };
        [vt, dv, dp]
    }

    /// The features of the steering controller following a lane: the heading error to a point
    /// slightly ahead on the lane, and the lateral offset from the lane, each scaled by speed.
    pub fn steering_features(
        &self,
        network: &RoadNetwork,
        ego: &Vehicle,
        lane_index: LaneIndex,
    ) -> [f64; 2] {
        let lane = &network[lane_index];
        let (long, lat) = lane.local_coordinates(ego.position());
        let future_heading = lane.heading_at(long + ego.speed() * TAU_PURSUIT);
        let speed = not_zero(ego.speed());
        [
            wrap_to_pi(future_heading - ego.heading()) * LENGTH / speed,
            -lat * LENGTH / (speed * speed),
        ]
    }

    /// Records the features of a decision to the sink, if one is attached.
    ///
    /// The longitudinal sample uses the neighbours in the current lane. The lateral sample takes
    /// its features from `lane_index` and its output from `output_lane`.
    pub fn add_features(
        &self,
        scene: &Scene,
        ego: &Vehicle,
        lane_index: LaneIndex,
        output_lane: LaneIndex,
    ) {
        let sink = match &self.sink {
            Some(sink) => sink,
            None => return,
        };
        let network = scene.network();
        let mut sink = sink.borrow_mut();

        let (front, _) = scene.neighbour_vehicles(ego, ego.lane_index());
        let features = self.acceleration_features(network, Some(ego), front);
        let output = dot(&self.params.acceleration, &features);
        sink.record(FeatureModel::Longitudinal, &features, output);

        let features = self.steering_features(network, ego, lane_index);
        let output = dot(
            &self.params.steering,
            &self.steering_features(network, ego, output_lane),
        );
        sink.record(FeatureModel::Lateral, &features, output);
    }
}

impl fmt::Debug for LinearPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearPolicy")
            .field("idm", &self.idm)
            .field("lane_change", &self.lane_change)
            .field("params", &self.params)
            .field("collecting", &self.sink.is_some())
            .finish()
    }
}

impl Default for LinearPolicy {
    fn default() -> Self {
        Self::new(LinearParams::default(), LaneChangeParams::default())
    }
}

impl DrivingPolicy for LinearPolicy {
    fn idm(&self) -> &IdmParams {
        &self.idm
    }

    fn lane_change(&self) -> &LaneChangeParams {
        &self.lane_change
    }

    fn acceleration(&self, network: &RoadNetwork, ego: Option<&Vehicle>, front: Option<&Vehicle>) -> f64 {
        let features = self.acceleration_features(network, ego, front);
        dot(&self.params.acceleration, &features)
    }

    fn compute_lateral(&self, scene: &Scene, ego: &Vehicle, lane_index: LaneIndex) -> f64 {
        let features = self.steering_features(scene.network(), ego, lane_index);
        dot(&self.params.steering, &features)
    }

    fn record(&self, scene: &Scene, ego: &Vehicle, state: &DriveState) {
        self.add_features(scene, ego, state.target_lane_index, state.target_lane_index);
    }

    fn randomize(&mut self, rng: &mut dyn RngCore) {
        let params = &mut self.params;
        for (p, range) in params.acceleration.iter_mut().zip(&params.acceleration_range) {
            *p = Uniform::new_inclusive(range.min, range.max).sample(rng);
        }
        for (p, range) in params.steering.iter_mut().zip(&params.steering_range) {
            *p = Uniform::new_inclusive(range.min, range.max).sample(rng);
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::behavior::data::FeatureLog;
    use crate::behavior::fixture::Highway;
    use crate::behavior::Policy;
    use crate::vehicle::VehicleAttributes;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn acceleration_features() {
        let mut road = Highway::new();
        let attributes = VehicleAttributes {
            speed: 20.0,
            target_speed: Some(25.0),
            ..Default::default()
        };
        let ego = road.spawn_with(&attributes, 1, 100.0, None);
        let front = road.spawn(1, 130.0, 15.0, None);
        let policy = LinearPolicy::default();
        let (ego, front) = (road.get(ego), road.get(front));

        // Safe distance is 10 + 20 * 2.5 = 60
        let features = policy.acceleration_features(&road.network, Some(ego), Some(front));
        assert_eq!(features, [5.0, -5.0, -30.0]);
        assert_approx_eq!(policy.acceleration(&road.network, Some(ego), Some(front)), -60.0);

        let features = policy.acceleration_features(&road.network, Some(ego), None);
        assert_eq!(features, [5.0, 0.0, 0.0]);
        assert_eq!(policy.acceleration_features(&road.network, None, None), [0.0; 3]);
    }

    #[test]
    fn steering_features() {
        let mut road = Highway::new();
        let ego = road.spawn(0, 100.0, 20.0, None);
        let policy = LinearPolicy::default();
        let ego = road.get(ego);

        let features = policy.steering_features(&road.network, ego, road.lanes[0]);
        assert_approx_eq!(features[0], 0.0);
        assert_approx_eq!(features[1], 0.0);

        // The lane to the left is 4 m away
        let features = policy.steering_features(&road.network, ego, road.lanes[1]);
        assert_approx_eq!(features[0], 0.0);
        assert_approx_eq!(features[1], 4.0 * LENGTH / 400.0);
    }

    #[test]
    fn merging_parameters() {
        let aggressive = LinearPolicy::aggressive();
        assert_approx_eq!(aggressive.params.acceleration[0], 0.8 / 7.5);
        assert_approx_eq!(aggressive.params.acceleration[1], 0.8 / 22.5);
        assert_approx_eq!(aggressive.params.acceleration[2], 0.5);
        assert_eq!(aggressive.lane_change.min_acc_gain, 1.0);

        let defensive = LinearPolicy::defensive();
        assert_approx_eq!(defensive.params.acceleration[0], 1.2 / 7.5);
        assert_approx_eq!(defensive.params.acceleration[2], 2.0);
        assert_eq!(defensive.idm.time_wanted, 2.5);
    }

    #[test]
    fn randomized_parameters_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut policy = LinearPolicy::default();
        let nominal = policy.params.clone();
        for _ in 0..50 {
            policy.randomize(&mut rng);
            let params = &policy.params;
            for i in 0..3 {
                assert!(params.acceleration_range[i].contains(params.acceleration[i]));
            }
            for i in 0..2 {
                assert!(params.steering_range[i].contains(params.steering[i]));
            }
        }
        assert!(policy.params.acceleration != nominal.acceleration);
        assert_eq!(policy.params.acceleration_range, nominal.acceleration_range);
        assert_approx_eq!(nominal.steering_range[1].min, KP_HEADING * KP_LATERAL - 1.5);
    }

    #[test]
    fn decisions_are_recorded() {
        let log = FeatureLog::shared();
        let policy = LinearPolicy::default().with_sink(log.clone());
        let mut road = Highway::new();
        let attributes = VehicleAttributes {
            speed: 20.0,
            target_speed: Some(25.0),
            enable_lane_change: false,
            ..Default::default()
        };
        let id = road.spawn_with(&attributes, 1, 100.0, Some(Policy::Linear(policy)));

        let decision = road.decide(id).unwrap();
        assert_approx_eq!(decision.action.acceleration, 0.3 * 5.0);

        let log = log.borrow();
        assert_eq!(log.longitudinal.len(), 1);
        assert_eq!(log.longitudinal.features[0], vec![5.0, 0.0, 0.0]);
        assert_approx_eq!(log.longitudinal.outputs[0], 1.5);
        assert_eq!(log.lateral.len(), 1);
        assert_approx_eq!(log.lateral.outputs[0], 0.0);
    }

    #[test]
    fn lateral_output_from_other_lane() {
        let log = FeatureLog::shared();
        let policy = LinearPolicy::default().with_sink(log.clone());
        let mut road = Highway::new();
        let ego = road.spawn(1, 100.0, 20.0, None);
        let scene = road.scene();
        policy.add_features(&scene, road.get(ego), road.lanes[1], road.lanes[2]);

        let log = log.borrow();
        assert_eq!(log.lateral.features[0], vec![0.0, 0.0]);
        let expected = STEERING_PARAMETERS[1] * 4.0 * LENGTH / 400.0;
        assert_approx_eq!(log.lateral.outputs[0], expected);
    }
}
