use crate::math::{heading_vector, Point2d};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The maximum forward speed of a vehicle in m/s.
pub const MAX_SPEED: f64 = 40.0;

/// The maximum reversing speed of a vehicle, a negative number in m/s.
pub const MIN_SPEED: f64 = -40.0;

/// A low-level command applied to a vehicle for the duration of a step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Action {
    /// The front wheel angle in rad.
    pub steering: f64,
    /// The longitudinal acceleration in m/s<sup>2</sup>.
    pub acceleration: f64,
}

/// The kinematic state of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicState {
    pub position: Point2d,
    pub heading: f64,
    pub speed: f64,
}

/// Limits an action so the vehicle's speed stays within range.
/// A crashed vehicle stops steering and brakes to a halt.
pub fn clip_action(action: Action, speed: f64, crashed: bool) -> Action {
    let mut action = action;
    if crashed {
        action.steering = 0.0;
        action.acceleration = -speed;
    }
    if speed > MAX_SPEED {
        action.acceleration = f64::min(action.acceleration, MAX_SPEED - speed);
    } else if speed < MIN_SPEED {
        action.acceleration = f64::max(action.acceleration, MIN_SPEED - speed);
    }
    action
}

/// Integrates the kinematic bicycle model over one time step.
///
/// # Parameters
/// * `state` - The vehicle's state at the start of the step
/// * `action` - The command to apply
/// * `half_len` - Distance from the vehicle's centre to its axles in m
/// * `dt` - The time step in seconds
pub fn bicycle_step(state: KinematicState, action: Action, half_len: f64, dt: f64) -> KinematicState {
    // Slip angle of the centre of gravity
    let beta = (0.5 * action.steering.tan()).atan();
    let velocity = state.speed * heading_vector(state.heading + beta);
    KinematicState {
        position: state.position + velocity * dt,
        heading: state.heading + state.speed * beta.sin() / half_len * dt,
        speed: state.speed + action.acceleration * dt,
    }
}
