/// Small math helpers shared across the renderer.
use glam::DVec2;

pub const EPSILON: f64 = 1.0e-5;

/// Largest double below 1.0 at the precision the renderer cares about.
/// Texture coordinates are clamped to this so a sample never reads one
/// texel past the edge.
pub const JUST_BELOW_ONE: f64 = 1.0 - EPSILON;

pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
pub const TWO_PI: f64 = std::f64::consts::TAU;

#[inline]
pub fn almost_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// atan2 variant with a [0, 2pi) range instead of [-pi, pi].
#[inline]
pub fn full_atan2(y: f64, x: f64) -> f64 {
    let angle = y.atan2(x);
    if angle >= 0.0 {
        angle
    } else {
        TWO_PI + angle
    }
}

/// Converts vertical field of view (radians) to camera zoom,
/// where 90 degrees = 1.0 zoom.
#[inline]
pub fn vertical_fov_to_zoom(fov_y: f64) -> f64 {
    1.0 / (fov_y * 0.5).tan()
}

/// Converts vertical field of view to horizontal field of view (radians).
#[inline]
pub fn vertical_fov_to_horizontal_fov(fov_y: f64, aspect: f64) -> f64 {
    debug_assert!(fov_y > 0.0 && aspect > 0.0);
    let half_dim = aspect * (fov_y * 0.5).tan();
    2.0 * half_dim.atan()
}

/// Left-hand perpendicular in the XZ plane (x → z convention).
#[inline]
pub fn left_perp(v: DVec2) -> DVec2 {
    DVec2::new(-v.y, v.x)
}

/// Right-hand perpendicular in the XZ plane.
#[inline]
pub fn right_perp(v: DVec2) -> DVec2 {
    DVec2::new(v.y, -v.x)
}

/// 2-D cross product, returns a scalar.
#[inline]
pub fn cross2(a: DVec2, b: DVec2) -> f64 {
    (a.x * b.y) - (b.x * a.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn full_atan2_covers_all_quadrants() {
        assert_relative_eq!(full_atan2(0.0, 1.0), 0.0);
        assert_relative_eq!(full_atan2(1.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(full_atan2(0.0, -1.0), std::f64::consts::PI);
        assert_relative_eq!(full_atan2(-1.0, 0.0), 3.0 * std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn ninety_degree_fov_is_identity_zoom() {
        assert_relative_eq!(vertical_fov_to_zoom(90.0 * DEG_TO_RAD), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn perps_are_perpendicular_and_opposed() {
        let v = DVec2::new(0.6, 0.8);
        assert_relative_eq!(right_perp(v).dot(v), 0.0);
        assert_relative_eq!(left_perp(v).dot(v), 0.0);
        assert_eq!(left_perp(v), -right_perp(v));
    }
}
