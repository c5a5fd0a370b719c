//! The Intelligent Driver Model.

use super::{DrivingPolicy, LaneChangeParams};
use crate::math::not_zero;
use crate::road::RoadNetwork;
use crate::util::Interval;
use crate::vehicle::dynamics::{MAX_SPEED, MIN_SPEED};
use crate::vehicle::{Vehicle, LENGTH};
use cgmath::prelude::*;
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The parameters of the longitudinal model.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdmParams {
    /// The hard limit on the magnitude of the commanded acceleration in m/s<sup>2</sup>.
    pub acc_max: f64,
    /// The desired maximum acceleration in m/s<sup>2</sup>.
    pub comfort_acc_max: f64,
    /// The desired maximum deceleration, a negative number in m/s<sup>2</sup>.
    pub comfort_acc_min: f64,
    /// The desired jam distance to the front vehicle in m.
    pub distance_wanted: f64,
    /// The desired time gap to the front vehicle in s.
    pub time_wanted: f64,
    /// The exponent of the velocity term.
    pub delta: f64,
    /// The range `delta` is sampled from when the behaviour is randomised.
    pub delta_range: Interval<f64>,
    /// The range target speeds are clamped into, in m/s.
    pub target_speeds: Interval<f64>,
    /// Whether to reverse out of a lane change the vehicle got stuck in.
    pub recover_from_stop: bool,
}

impl Default for IdmParams {
    fn default() -> Self {
        Self {
            acc_max: 5.0,
            comfort_acc_max: 3.0,
            comfort_acc_min: -5.0,
            distance_wanted: 5.0 + LENGTH,
            time_wanted: 0.5,
            delta: 4.0,
            delta_range: Interval::new(3.5, 4.5),
            target_speeds: Interval::new(MIN_SPEED, MAX_SPEED),
            recover_from_stop: false,
        }
    }
}

/// Computes the acceleration of a vehicle with the intelligent driver model.
///
/// The acceleration is chosen to reach the vehicle's target speed while keeping a safe distance
/// to the vehicle in front. It is not clamped.
///
/// # Parameters
/// * `params` - The model parameters
/// * `network` - The road network
/// * `ego` - The vehicle whose acceleration is computed, which need not be driven by this model
/// * `front` - The vehicle preceding `ego`, if any
pub fn acceleration(
    params: &IdmParams,
    network: &RoadNetwork,
    ego: Option<&Vehicle>,
    front: Option<&Vehicle>,
) -> f64 {
    let ego = match ego {
        Some(ego) => ego,
        None => return 0.0,
    };

    let mut target_speed = ego.target_speed();
    if let Some(limit) = network.lane(ego.lane_index()).and_then(|lane| lane.speed_limit()) {
        target_speed = target_speed.max(0.0).min(limit);
    }

    let ratio = f64::max(ego.speed(), 0.0) / not_zero(target_speed).abs();
    let mut acc = params.comfort_acc_max * (1.0 - ratio.powf(params.delta));

    if let Some(front) = front {
        let gap = ego.lane_distance_to(front, network);
        let term = desired_gap(params, ego, front, true) / not_zero(gap);
        acc -= params.comfort_acc_max * term * term;
    }
    acc
}

/// Computes the desired distance between a vehicle and the vehicle in front of it.
///
/// # Parameters
/// * `params` - The model parameters
/// * `ego` - The following vehicle
/// * `front` - The vehicle in front
/// * `projected` - Whether to project the relative velocity onto the heading of `ego`,
///   rather than taking the difference in speeds
pub fn desired_gap(params: &IdmParams, ego: &Vehicle, front: &Vehicle, projected: bool) -> f64 {
    let ab = -params.comfort_acc_max * params.comfort_acc_min;
    let dv = if projected {
        (ego.velocity() - front.velocity()).dot(ego.direction())
    } else {
        ego.speed() - front.speed()
    };
    let speed = ego.speed();
    params.distance_wanted + speed * params.time_wanted + speed * dv / (2.0 * ab.sqrt())
}

/// Follows the vehicle ahead with the intelligent driver model, and changes lanes with MOBIL.
#[derive(Clone, Debug, Default)]
pub struct IdmPolicy {
    pub params: IdmParams,
    pub lane_change: LaneChangeParams,
}

impl IdmPolicy {
    /// Creates a policy with the given parameters.
    pub fn new(params: IdmParams, lane_change: LaneChangeParams) -> Self {
        Self {
            params,
            lane_change,
        }
    }
}

impl DrivingPolicy for IdmPolicy {
    fn idm(&self) -> &IdmParams {
        &self.params
    }

    fn lane_change(&self) -> &LaneChangeParams {
        &self.lane_change
    }

    fn acceleration(&self, network: &RoadNetwork, ego: Option<&Vehicle>, front: Option<&Vehicle>) -> f64 {
        acceleration(&self.params, network, ego, front)
    }

    fn randomize(&mut self, rng: &mut dyn RngCore) {
        let range = self.params.delta_range;
        self.params.delta = Uniform::new_inclusive(range.min, range.max).sample(rng);
    }
}
