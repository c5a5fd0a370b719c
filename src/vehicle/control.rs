//! Low-level lane keeping and speed controllers.

use super::Vehicle;
use crate::math::{not_zero, wrap_to_pi};
use crate::road::{LaneIndex, RoadNetwork};
use std::f64::consts::{FRAC_PI_3, FRAC_PI_4};

/// Time constant of the speed controller in s.
pub const TAU_ACC: f64 = 0.6;
/// Time constant of the heading controller in s.
pub const TAU_HEADING: f64 = 0.2;
/// Time constant of the lateral position controller in s.
pub const TAU_LATERAL: f64 = 0.6;
/// Lookahead time used to anticipate the lane heading, in s.
pub const TAU_PURSUIT: f64 = 0.5 * TAU_HEADING;

/// Proportional gain of the speed controller.
pub const KP_A: f64 = 1.0 / TAU_ACC;
/// Proportional gain of the heading controller.
pub const KP_HEADING: f64 = 1.0 / TAU_HEADING;
/// Proportional gain of the lateral position controller.
pub const KP_LATERAL: f64 = 1.0 / TAU_LATERAL;

/// The maximum front wheel angle in rad.
pub const MAX_STEERING_ANGLE: f64 = FRAC_PI_3;

/// Computes a steering command which follows the centre line of the target lane.
///
/// A cascade of proportional controllers: lateral offset to lateral speed, lateral speed to
/// heading, heading to yaw rate, and yaw rate to wheel angle.
pub fn steering_control(network: &RoadNetwork, vehicle: &Vehicle, target: LaneIndex) -> f64 {
    let lane = &network[target];
    let (long, lat) = lane.local_coordinates(vehicle.position());
    let future_heading = lane.heading_at(long + vehicle.speed() * TAU_PURSUIT);
    let speed = not_zero(vehicle.speed());

    // Lateral position control
    let lateral_speed = -KP_LATERAL * lat;
    // Lateral speed to heading
    let heading_cmd = f64::asin((lateral_speed / speed).clamp(-1.0, 1.0));
    let heading_ref = future_heading + heading_cmd.clamp(-FRAC_PI_4, FRAC_PI_4);
    // Heading control
    let heading_rate = KP_HEADING * wrap_to_pi(heading_ref - vehicle.heading());
    // Heading rate to steering angle
    let slip = f64::asin((0.5 * vehicle.length() / speed * heading_rate).clamp(-1.0, 1.0));
    let steering = f64::atan(2.0 * slip.tan());
    steering.clamp(-MAX_STEERING_ANGLE, MAX_STEERING_ANGLE)
}

/// Computes an acceleration which tracks the target speed.
pub fn speed_control(speed: f64, target_speed: f64) -> f64 {
    KP_A * (target_speed - speed)
}
