//! 2D Vector Helpers
//!
//! The engine uses [`glam::DVec2`] (`f64`) for all geometry. This module adds
//! the handful of scalar-cross and rotation helpers a 2D physics pipeline
//! needs on top of what glam provides. All operations are pure; `DVec2` is
//! `Copy`, so hot paths never allocate.

use glam::DVec2;

/// 2D scalar cross product: `a.x * b.y - a.y * b.x`.
///
/// This is the z-component of the 3D cross product when both vectors are
/// embedded in the XY plane.
#[inline]
#[must_use]
pub fn cross(a: DVec2, b: DVec2) -> f64 {
    a.perp_dot(b)
}

/// Scalar cross product of the edges `b - a` and `c - a`.
///
/// Positive when `a`, `b`, `c` wind counter-clockwise.
#[inline]
#[must_use]
pub fn cross3(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

/// Rotate a vector by `angle` radians (counter-clockwise).
#[inline]
#[must_use]
pub fn rotate(v: DVec2, angle: f64) -> DVec2 {
    let (sin, cos) = angle.sin_cos();
    DVec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Rotate `v` by `angle` radians about `point`.
#[inline]
#[must_use]
pub fn rotate_about(v: DVec2, angle: f64, point: DVec2) -> DVec2 {
    point + rotate(v - point, angle)
}

/// Angle of the line from `a` to `b`, in radians.
#[inline]
#[must_use]
pub fn angle(a: DVec2, b: DVec2) -> f64 {
    (b.y - a.y).atan2(b.x - a.x)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_cross() {
        let a = DVec2::new(3.0, 4.0);
        let b = DVec2::new(2.0, 5.0);
        // 3*5 - 4*2 = 7
        assert!((cross(a, b) - 7.0).abs() < EPS);
    }

    #[test]
    fn test_cross3_winding() {
        let a = DVec2::ZERO;
        let b = DVec2::new(1.0, 0.0);
        let c = DVec2::new(0.0, 1.0);
        assert!(cross3(a, b, c) > 0.0, "CCW triple is positive");
        assert!(cross3(a, c, b) < 0.0, "CW triple is negative");
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = rotate(DVec2::X, std::f64::consts::FRAC_PI_2);
        assert!(v.x.abs() < EPS);
        assert!((v.y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_rotate_about_point() {
        let v = rotate_about(
            DVec2::new(2.0, 1.0),
            std::f64::consts::PI,
            DVec2::new(1.0, 1.0),
        );
        assert!((v.x - 0.0).abs() < EPS);
        assert!((v.y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_angle() {
        let a = DVec2::ZERO;
        let b = DVec2::new(0.0, 2.0);
        assert!((angle(a, b) - std::f64::consts::FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_perp_matches_tangent_convention() {
        // The solver builds the contact tangent as the perpendicular of the
        // normal: (-y, x).
        let n = DVec2::new(0.6, 0.8);
        let t = n.perp();
        assert!((t.x + 0.8).abs() < EPS);
        assert!((t.y - 0.6).abs() < EPS);
        assert!(n.dot(t).abs() < EPS);
    }
}
