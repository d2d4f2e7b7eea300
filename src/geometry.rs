//! Planar geometry helpers shared by the track and the car.

use std::f64::consts::{PI, TAU};

use nalgebra as na;

use crate::{Point, Vector};

/// Distance from `p` to the segment `a`-`b`.
///
/// The projection parameter is clamped to [0, 1], so a query point whose
/// perpendicular foot falls outside the segment is measured against the
/// nearest endpoint. A zero-length segment degenerates to the distance
/// between `p` and `a`.
pub fn distance_to_segment(p: &Point, a: &Point, b: &Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return na::distance(p, a);
    }
    let t = ((p - a).dot(&ab) / len_sq).max(0.0).min(1.0);
    let foot = a + ab * t;
    na::distance(p, &foot)
}

/// Marches a ray from `origin` along `angle` in `step`-sized increments.
///
/// Returns the distance at which `blocked` first holds, or `max_len` if the
/// whole ray is clear. The caller must keep `step` at or below the collision
/// margin it probes with, otherwise thin obstacles can be stepped over.
pub fn cast_ray(
    origin: &Point,
    angle: f64,
    max_len: f64,
    step: f64,
    blocked: impl Fn(&Point) -> bool,
) -> f64 {
    let dir = Vector::new(angle.cos(), angle.sin());
    let mut dist = 0.0;
    while dist < max_len {
        let probe = origin + dir * dist;
        if blocked(&probe) {
            return dist;
        }
        dist += step;
    }
    max_len
}

/// Folds an angle into (-pi, pi].
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= TAU;
    }
    while angle <= -PI {
        angle += TAU;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn point_on_segment_has_zero_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(distance_to_segment(&Point::new(4.0, 0.0), &a, &b), 0.0);
    }

    #[test]
    fn projection_outside_segment_clamps_to_endpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let p = Point::new(13.0, 4.0);
        assert!((distance_to_segment(&p, &a, &b) - na::distance(&p, &b)).abs() < 1e-12);

        let q = Point::new(-3.0, 4.0);
        assert!((distance_to_segment(&q, &a, &b) - na::distance(&q, &a)).abs() < 1e-12);
    }

    #[test]
    fn zero_length_segment_is_point_distance() {
        let a = Point::new(2.0, 2.0);
        let p = Point::new(5.0, 6.0);
        assert!((distance_to_segment(&p, &a, &a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ray_stops_at_first_blocked_point() {
        let wall_x = 40.0;
        let dist = cast_ray(&Point::origin(), 0.0, 100.0, 1.0, |p| p.x >= wall_x);
        assert!((dist - wall_x).abs() <= 1.0);
    }

    #[test]
    fn clear_ray_returns_max_length() {
        let dist = cast_ray(&Point::origin(), FRAC_PI_2, 100.0, 1.0, |_| false);
        assert_eq!(dist, 100.0);
    }

    #[test]
    fn blocked_origin_reads_zero() {
        let dist = cast_ray(&Point::origin(), 0.0, 100.0, 1.0, |_| true);
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn angles_fold_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(TAU + 0.25) - 0.25).abs() < 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
    }
}
