// src/geometry.rs - Planar joint angles
//
// Only x and y take part: the model's depth estimate is too noisy to use and
// visibility gating is the caller's job.
use nalgebra::Vector2;

use crate::landmarks::Joint;

fn planar(joint: &Joint) -> Option<Vector2<f64>> {
    let point = joint.position().xy();
    (point.x.is_finite() && point.y.is_finite()).then_some(point)
}

fn heading(ray: Vector2<f64>) -> f64 {
    ray.y.atan2(ray.x).to_degrees()
}

/// Angle at `b` between the rays `b -> a` and `b -> c`, in `[0, 180]` degrees.
///
/// Returns `None` when any of the three joints has a non-finite coordinate.
pub fn vertex_angle(a: &Joint, b: &Joint, c: &Joint) -> Option<f64> {
    let (a, b, c) = (planar(a)?, planar(b)?, planar(c)?);

    let mut angle = (heading(c - b) - heading(a - b)).abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    Some(angle)
}

/// Signed angle of the segment `p1 -> p2` against the image horizontal.
///
/// Not normalized: the result keeps its sign and spans `(-180, 180]`. Because
/// image `y` grows downward, a segment pointing down the picture is positive.
pub fn segment_angle_from_horizontal(p1: &Joint, p2: &Joint) -> Option<f64> {
    Some(heading(planar(p2)? - planar(p1)?))
}

/// Rounds to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
