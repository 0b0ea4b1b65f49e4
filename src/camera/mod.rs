/// Ray-casting camera.
/// The caster is tricked into thinking the player always looks straight
/// ahead; vertical look is faked by Y-shearing projected coordinates.
use crate::math;
use glam::{DMat4, DVec2, DVec3, DVec4, IVec3};

/// Near plane only exists to seed the initial ray point; it is not a
/// clipping plane in the usual sense.
pub const NEAR_PLANE: f64 = 0.0001;
pub const FAR_PLANE: f64 = 1000.0;

/// Vertical stretch applied to the projection to mimic a classic
/// 320x200-on-4:3 pixel aspect.
pub const TALL_PIXEL_RATIO: f64 = 1.20;

/// 2-D ray direction in the XZ plane. Not necessarily normalized; the DDA
/// only cares about component ratios.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub dir_x: f64,
    pub dir_z: f64,
}

impl Ray {
    #[inline]
    pub fn new(dir_x: f64, dir_z: f64) -> Self {
        Self { dir_x, dir_z }
    }
}

pub struct RayCamera {
    pub eye: DVec3,
    pub direction: DVec3,
    /// Eye position floored to whole voxels.
    pub eye_voxel_real: DVec3,
    pub eye_voxel: IVec3,
    pub transform: DMat4,
    pub forward_x: f64,
    pub forward_z: f64,
    pub right_x: f64,
    pub right_z: f64,
    pub fov_y: f64,
    pub zoom: f64,
    pub aspect: f64,
    pub forward_zoomed_x: f64,
    pub forward_zoomed_z: f64,
    pub right_aspected_x: f64,
    pub right_aspected_z: f64,
    pub frustum_left_x: f64,
    pub frustum_left_z: f64,
    pub frustum_right_x: f64,
    pub frustum_right_z: f64,
    pub y_angle_radians: f64,
    pub y_shear: f64,
}

impl RayCamera {
    /// `fov_y` is in radians. `projection_modifier` scales the view up
    /// vector (tall-pixel correction).
    pub fn new(
        eye: DVec3,
        direction: DVec3,
        fov_y: f64,
        aspect: f64,
        projection_modifier: f64,
    ) -> Self {
        debug_assert!(fov_y > 0.0, "vertical fov must be positive");
        debug_assert!(aspect > 0.0, "aspect ratio must be positive");
        debug_assert!(
            direction.length_squared() > 0.0,
            "camera direction must be non-zero"
        );

        let eye_voxel_real = eye.floor();
        let eye_voxel = IVec3::new(
            eye_voxel_real.x as i32,
            eye_voxel_real.y as i32,
            eye_voxel_real.z as i32,
        );

        // Flattened camera axes. The Y component of the real direction only
        // feeds the shear below.
        let forward_xz = DVec3::new(direction.x, 0.0, direction.z).normalize();
        let right_xz = forward_xz.cross(DVec3::Y).normalize();

        let transform = {
            let up = DVec3::Y * projection_modifier;
            let view = Self::view_matrix(eye, forward_xz, right_xz, up);
            let projection = DMat4::perspective_rh_gl(fov_y, aspect, NEAR_PLANE, FAR_PLANE);
            projection * view
        };

        let zoom = math::vertical_fov_to_zoom(fov_y);

        let forward_zoomed_x = forward_xz.x * zoom;
        let forward_zoomed_z = forward_xz.z * zoom;
        let right_aspected_x = right_xz.x * aspect;
        let right_aspected_z = right_xz.z * aspect;

        // 2-D frustum edge directions at the left and right screen edges.
        let frustum_left = DVec2::new(
            forward_zoomed_x - right_aspected_x,
            forward_zoomed_z - right_aspected_z,
        )
        .normalize();
        let frustum_right = DVec2::new(
            forward_zoomed_x + right_aspected_x,
            forward_zoomed_z + right_aspected_z,
        )
        .normalize();

        // Angle above the horizon. direction.y == ±1 would put the shear at
        // infinity; the camera controller clamps pitch before that.
        let y_angle_radians = direction
            .y
            .clamp(-math::JUST_BELOW_ONE, math::JUST_BELOW_ONE)
            .asin();

        // Number of screen heights all projected Y coordinates translate by.
        let y_shear = y_angle_radians.tan() * zoom;

        Self {
            eye,
            direction,
            eye_voxel_real,
            eye_voxel,
            transform,
            forward_x: forward_xz.x,
            forward_z: forward_xz.z,
            right_x: right_xz.x,
            right_z: right_xz.z,
            fov_y,
            zoom,
            aspect,
            forward_zoomed_x,
            forward_zoomed_z,
            right_aspected_x,
            right_aspected_z,
            frustum_left_x: frustum_left.x,
            frustum_left_z: frustum_left.y,
            frustum_right_x: frustum_right.x,
            frustum_right_z: frustum_right.y,
            y_angle_radians,
            y_shear,
        }
    }

    fn view_matrix(eye: DVec3, forward: DVec3, right: DVec3, up: DVec3) -> DMat4 {
        let rotation = DMat4::from_cols(
            DVec4::new(right.x, up.x, -forward.x, 0.0),
            DVec4::new(right.y, up.y, -forward.y, 0.0),
            DVec4::new(right.z, up.z, -forward.z, 0.0),
            DVec4::W,
        );
        rotation * DMat4::from_translation(-eye)
    }

    /// Angle of the flattened forward vector, [0, 2pi).
    #[inline]
    pub fn xz_angle_radians(&self) -> f64 {
        math::full_atan2(self.forward_x, self.forward_z)
    }

    /// Voxel Y of the eye when voxels are `ceiling_height` tall.
    #[inline]
    pub fn adjusted_eye_voxel_y(&self, ceiling_height: f64) -> i32 {
        (self.eye.y / ceiling_height) as i32
    }

    /// 2-D ray through screen column center `x_percent` (0.0 at the left
    /// edge, 1.0 at the right).
    #[inline]
    pub fn column_ray(&self, x_percent: f64) -> Ray {
        let right_comp = (2.0 * x_percent) - 1.0;
        let dir = DVec2::new(
            self.forward_zoomed_x + (self.right_aspected_x * right_comp),
            self.forward_zoomed_z + (self.right_aspected_z * right_comp),
        )
        .normalize();
        Ray::new(dir.x, dir.y)
    }

    /// Project a world point to a screen-height fraction, shear included.
    /// 0.0 is the top of the screen, 1.0 the bottom.
    #[inline]
    pub fn get_projected_y(&self, point: DVec3) -> f64 {
        // Only the Y and W rows of the transform matter here.
        let p = self.transform * DVec4::new(point.x, point.y, point.z, 1.0);
        let projected_y = p.y / p.w;

        // Y relative to the center row, offset by the shear. The 0.5 scale
        // maps NDC [-1, 1] onto the screen height.
        (0.50 + self.y_shear) - (projected_y * 0.50)
    }

    /// Project a world point to a screen-width fraction, 0.0 at the left.
    #[inline]
    pub fn get_projected_x(&self, point: DVec3) -> f64 {
        let p = self.transform * DVec4::new(point.x, point.y, point.z, 1.0);
        0.50 + ((p.x / p.w) * 0.50)
    }
}

/// Round a projected coordinate down to its first covered pixel,
/// clamped to the frame.
#[inline]
pub fn get_lower_bounded_pixel(projected: f64, frame_dim: usize) -> i32 {
    ((projected - 0.50).ceil() as i32).clamp(0, frame_dim as i32)
}

/// Round a projected coordinate up to one past its last covered pixel,
/// clamped to the frame.
#[inline]
pub fn get_upper_bounded_pixel(projected: f64, frame_dim: usize) -> i32 {
    ((projected + 0.50).floor() as i32).clamp(0, frame_dim as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn level_camera() -> RayCamera {
        RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(0.0, 0.0, 1.0),
            90.0_f64.to_radians(),
            16.0 / 9.0,
            1.0,
        )
    }

    #[test]
    fn level_camera_has_no_shear() {
        let camera = level_camera();
        assert_relative_eq!(camera.y_shear, 0.0, epsilon = 1e-9);
        assert_relative_eq!(camera.zoom, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn eye_level_point_projects_to_screen_center() {
        let camera = level_camera();
        let ahead = camera.eye + DVec3::new(0.0, 0.0, 5.0);
        assert_relative_eq!(camera.get_projected_y(ahead), 0.5, epsilon = 1e-6);
        assert_relative_eq!(camera.get_projected_x(ahead), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn looking_up_shears_projections_down_screen() {
        let up = RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(0.0, 0.5, 1.0).normalize(),
            90.0_f64.to_radians(),
            16.0 / 9.0,
            1.0,
        );
        assert!(up.y_shear > 0.0, "looking up must produce positive shear");

        let ahead = up.eye + DVec3::new(0.0, 0.0, 5.0);
        assert!(
            up.get_projected_y(ahead) > 0.5,
            "eye-level point should move below screen center when looking up"
        );
    }

    #[test]
    fn column_rays_sweep_left_to_right() {
        let camera = level_camera();
        let left = camera.column_ray(0.0);
        let center = camera.column_ray(0.5);
        let right = camera.column_ray(1.0);

        assert_relative_eq!(center.dir_x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(center.dir_z, 1.0, epsilon = 1e-9);
        // Right of forward (+Z) is -X for this basis.
        assert!(right.dir_x < 0.0 && left.dir_x > 0.0);
    }

    #[test]
    fn pixel_bounds_share_midpoints() {
        // Two spans that meet at the same projected coordinate must not
        // leave an undrawn pixel between them: the exclusive end of the
        // first span can never fall below the start of the second.
        for meet in [37.0, 37.3, 37.5, 37.9] {
            let end = get_upper_bounded_pixel(meet, 100);
            let start = get_lower_bounded_pixel(meet, 100);
            assert!(end >= start, "gap at projected coordinate {}", meet);
            assert!(end - start <= 1, "overlap beyond one pixel at {}", meet);
        }
    }
}
