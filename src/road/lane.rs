use crate::math::{heading_vector, project_local, rot90, wrap_to_pi, Point2d, Vector2d};
use cgmath::prelude::*;
use std::f64::consts::FRAC_PI_2;

/// The vehicle length assumed by lane membership tests, in m.
const VEHICLE_LENGTH: f64 = 5.0;

/// The default lane width in m.
pub const DEFAULT_WIDTH: f64 = 4.0;

/// The geometry of a single lane of traffic.
///
/// Positions along a lane are expressed in local coordinates: `long` is the distance along
/// the centre line from the start of the lane, `lat` the signed offset to its left.
pub trait Lane {
    /// The world space coordinates of a point given in local coordinates.
    fn position(&self, long: f64, lat: f64) -> Point2d;

    /// Projects a world space point onto the lane's local coordinates, returning `(long, lat)`.
    fn local_coordinates(&self, position: Point2d) -> (f64, f64);

    /// The heading of the centre line at the given longitudinal position, in radians.
    fn heading_at(&self, long: f64) -> f64;

    /// The lane width at the given longitudinal position, in m.
    fn width_at(&self, long: f64) -> f64;

    /// The length of the lane in m.
    fn length(&self) -> f64;

    /// The speed limit in m/s, if the lane enforces one.
    fn speed_limit(&self) -> Option<f64>;

    /// Whether a point lies on the lane, allowing for `margin` metres either side.
    fn on_lane(&self, position: Point2d, margin: f64) -> bool {
        let (long, lat) = self.local_coordinates(position);
        lat.abs() <= 0.5 * self.width_at(long) + margin
            && -VEHICLE_LENGTH <= long
            && long < self.length() + VEHICLE_LENGTH
    }

    /// Whether a vehicle at the given point is close enough to move onto the lane.
    fn is_reachable_from(&self, position: Point2d) -> bool {
        let (long, lat) = self.local_coordinates(position);
        lat.abs() <= 2.0 * self.width_at(long)
            && 0.0 <= long
            && long < self.length() + VEHICLE_LENGTH
    }

    /// Whether a point is past the end of the lane.
    fn after_end(&self, position: Point2d) -> bool {
        let (long, _) = self.local_coordinates(position);
        long > self.length() - 0.5 * VEHICLE_LENGTH
    }

    /// The distance between a point and the lane.
    fn distance(&self, position: Point2d) -> f64 {
        let (long, lat) = self.local_coordinates(position);
        lat.abs() + f64::max(long - self.length(), 0.0) + f64::max(-long, 0.0)
    }

    /// The distance between a point and the lane, penalising misalignment with its heading.
    fn distance_with_heading(&self, position: Point2d, heading: f64, heading_weight: f64) -> f64 {
        let (long, _) = self.local_coordinates(position);
        let angle = wrap_to_pi(heading - self.heading_at(long)).abs();
        self.distance(position) + heading_weight * angle
    }
}

/// A lane following a straight line segment.
#[derive(Clone, Debug)]
pub struct StraightLane {
    start: Point2d,
    length: f64,
    heading: f64,
    dir: Vector2d,
    width: f64,
    speed_limit: Option<f64>,
}

impl StraightLane {
    /// Creates a lane running from `start` to `end`.
    pub fn new(start: Point2d, end: Point2d, width: f64, speed_limit: Option<f64>) -> Self {
        let delta = end - start;
        let length = delta.magnitude();
        Self {
            start,
            length,
            heading: delta.y.atan2(delta.x),
            dir: delta / length,
            width,
            speed_limit,
        }
    }

    /// Creates a lane of default width and no speed limit.
    pub fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self::new(start, end, DEFAULT_WIDTH, None)
    }
}

impl Lane for StraightLane {
    fn position(&self, long: f64, lat: f64) -> Point2d {
        self.start + long * self.dir + lat * rot90(self.dir)
    }

    fn local_coordinates(&self, position: Point2d) -> (f64, f64) {
        let p = project_local(position, self.start, self.dir, rot90(self.dir));
        (p.x, p.y)
    }

    fn heading_at(&self, _long: f64) -> f64 {
        self.heading
    }

    fn width_at(&self, _long: f64) -> f64 {
        self.width
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn speed_limit(&self) -> Option<f64> {
        self.speed_limit
    }
}

/// A lane following a circular arc.
#[derive(Clone, Debug)]
pub struct CircularLane {
    center: Point2d,
    radius: f64,
    start_phase: f64,
    /// `1.0` for clockwise arcs, `-1.0` for anticlockwise arcs.
    direction: f64,
    length: f64,
    width: f64,
    speed_limit: Option<f64>,
}

impl CircularLane {
    /// Creates a lane around `center` sweeping from `start_phase` to `end_phase`, in radians.
    pub fn new(
        center: Point2d,
        radius: f64,
        start_phase: f64,
        end_phase: f64,
        clockwise: bool,
        width: f64,
        speed_limit: Option<f64>,
    ) -> Self {
        let direction = if clockwise { 1.0 } else { -1.0 };
        Self {
            center,
            radius,
            start_phase,
            direction,
            length: radius * (end_phase - start_phase) * direction,
            width,
            speed_limit,
        }
    }

    fn phase_at(&self, long: f64) -> f64 {
        self.direction * long / self.radius + self.start_phase
    }
}

impl Lane for CircularLane {
    fn position(&self, long: f64, lat: f64) -> Point2d {
        let phi = self.phase_at(long);
        self.center + (self.radius - lat * self.direction) * heading_vector(phi)
    }

    fn local_coordinates(&self, position: Point2d) -> (f64, f64) {
        let delta = position - self.center;
        let phi = delta.y.atan2(delta.x);
        let phi = self.start_phase + wrap_to_pi(phi - self.start_phase);
        let r = delta.magnitude();
        let long = self.direction * (phi - self.start_phase) * self.radius;
        let lat = self.direction * (self.radius - r);
        (long, lat)
    }

    fn heading_at(&self, long: f64) -> f64 {
        self.phase_at(long) + FRAC_PI_2 * self.direction
    }

    fn width_at(&self, _long: f64) -> f64 {
        self.width
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn speed_limit(&self) -> Option<f64> {
        self.speed_limit
    }
}
