use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
use std::f64::consts::PI;

/// Magnitudes below this are treated as zero when dividing.
const EPSILON: f64 = 0.01;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees anticlockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The unit vector pointing along the given heading, in radians.
pub fn heading_vector(heading: f64) -> Vector2d {
    Vector2d::new(heading.cos(), heading.sin())
}

/// Wraps an angle into the range `[-π, π)`.
pub fn wrap_to_pi(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Substitutes a small value of the same sign for values too close to zero to divide by.
pub fn not_zero(x: f64) -> f64 {
    if x.abs() > EPSILON {
        x
    } else if x >= 0.0 {
        EPSILON
    } else {
        -EPSILON
    }
}

/// Determines whether two convex polygons intersect, using the separating axis theorem.
pub fn polygons_intersect(a: &[Point2d], b: &[Point2d]) -> bool {
    let edges = |poly: &[Point2d]| {
        (0..poly.len())
            .map(|i| poly[(i + 1) % poly.len()] - poly[i])
            .collect::<Vec<_>>()
    };
    let project = |poly: &[Point2d], axis: Vector2d| {
        Interval::hull(poly.iter().map(|p| p.to_vec().dot(axis)))
    };
    edges(a)
        .into_iter()
        .chain(edges(b))
        .map(rot90)
        .all(|axis| project(a, axis).overlaps(&project(b, axis)))
}
