/// Per-frame shading context: sky colors, sun, fog.
/// Built once per `render` call and shared read-only by all workers.
use crate::math;
use glam::{DMat4, DVec3, DVec4};

/// Number of colors in the vertical sky gradient, horizon first.
pub const SKY_COLOR_COUNT: usize = 5;

/// Max sky-gradient channel value at which stars become visible.
pub const STAR_VISIBILITY_THRESHOLD: f64 = 64.0 / 255.0;

pub struct ShadingInfo {
    /// Sliding window into the sky palette, index 0 at the horizon.
    pub sky_colors: [DVec3; SKY_COLOR_COUNT],
    pub time_rotation: DMat4,
    pub latitude_rotation: DMat4,
    pub sun_direction: DVec3,
    pub sun_color: DVec3,
    pub is_am: bool,
    pub ambient: f64,
    /// Shading floor for distant objects; they never go fully dark.
    pub distant_ambient: f64,
    pub fog_distance: f64,
    pub night_lights_active: bool,
}

impl ShadingInfo {
    pub fn new(
        sky_palette: &[DVec3],
        daytime_percent: f64,
        latitude: f64,
        ambient: f64,
        fog_distance: f64,
        night_lights_active: bool,
    ) -> Self {
        assert!(!sky_palette.is_empty(), "sky palette may not be empty");
        debug_assert!(
            (0.0..=1.0).contains(&daytime_percent),
            "daytime percent {} out of range",
            daytime_percent
        );
        debug_assert!(fog_distance > 0.0, "fog distance must be positive");

        let time_rotation = get_time_of_day_rotation(daytime_percent);
        let latitude_rotation = get_latitude_rotation(latitude);

        // The palette window slides backwards in the AM (the horizon color
        // is latest in the palette) and forwards in the PM.
        let is_am = daytime_percent < 0.50;
        let slide_direction: i32 = if is_am { -1 } else { 1 };

        let palette_count = sky_palette.len() as i32;
        let real_index = (sky_palette.len() as f64) * daytime_percent;
        let percent = real_index - real_index.floor();

        let wrap_index = |index: i32| -> usize { index.rem_euclid(palette_count) as usize };

        let mut sky_colors = [DVec3::ZERO; SKY_COLOR_COUNT];
        for (i, sky_color) in sky_colors.iter_mut().enumerate() {
            let index_diff = slide_direction * i as i32;
            let index = wrap_index(real_index as i32 + index_diff);
            let next_index = wrap_index(index as i32 + slide_direction);
            let color = sky_palette[index];
            let next_color = sky_palette[next_index];
            *sky_color = color.lerp(next_color, if is_am { 1.0 - percent } else { percent });
        }

        // The sun rises in the west (-Z) and sets in the east (+Z), with a
        // small latitude bonus in 0-100 angle units.
        let sun_direction = {
            let sun_latitude = -(latitude + (13.0 / 100.0));
            let sun_rotation = get_latitude_rotation(sun_latitude);
            let dir = sun_rotation * (time_rotation * DVec4::new(0.0, -1.0, 0.0, 0.0));
            DVec3::new(dir.x, dir.y, dir.z).normalize()
        };

        // Darken the sun below the horizon so wall faces aren't lit as much
        // during the night; there are no shadows to do it for us.
        let sun_color = {
            let base = DVec3::new(0.90, 0.875, 0.85);
            if sun_direction.y >= 0.0 {
                base
            } else {
                (base * (1.0 - (5.0 * sun_direction.y.abs()))).clamp(DVec3::ZERO, DVec3::ONE)
            }
        };

        Self {
            sky_colors,
            time_rotation,
            latitude_rotation,
            sun_direction,
            sun_color,
            is_am,
            ambient,
            // At their darkest, distant objects keep ~1/4 intensity.
            distant_ambient: ambient.clamp(0.25, 1.0),
            fog_distance,
            night_lights_active,
        }
    }

    /// Fog is the horizon color.
    #[inline]
    pub fn fog_color(&self) -> DVec3 {
        self.sky_colors[0]
    }
}

/// Rotation of space objects for the time of day: noon means the sun has
/// spun half of 2pi from midnight.
pub fn get_time_of_day_rotation(daytime_percent: f64) -> DMat4 {
    DMat4::from_rotation_x(daytime_percent * math::TWO_PI)
}

/// Rotation of space objects for the latitude of the eye's province,
/// in 0-100 angle units (100 units = pi/8 here).
pub fn get_latitude_rotation(latitude: f64) -> DMat4 {
    DMat4::from_rotation_z(latitude * (std::f64::consts::PI / 8.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_palette() -> Vec<DVec3> {
        // Dark-to-bright ramp standing in for a day cycle palette.
        (0..8)
            .map(|i| DVec3::splat(i as f64 / 7.0))
            .collect()
    }

    #[test]
    fn noon_sun_points_up() {
        let shading = ShadingInfo::new(&test_palette(), 0.50, 0.0, 1.0, 30.0, false);
        assert!(
            shading.sun_direction.y > 0.9,
            "noon sun should be near zenith, got {:?}",
            shading.sun_direction
        );
        assert_relative_eq!(shading.sun_color.x, 0.90);
    }

    #[test]
    fn midnight_sun_is_dark() {
        let shading = ShadingInfo::new(&test_palette(), 0.0, 0.0, 0.25, 30.0, false);
        assert!(shading.sun_direction.y < 0.0, "midnight sun is below horizon");
        assert_eq!(shading.sun_color, DVec3::ZERO, "sun fully dark at midnight");
    }

    #[test]
    fn distant_ambient_never_below_quarter() {
        let shading = ShadingInfo::new(&test_palette(), 0.0, 0.0, 0.05, 30.0, false);
        assert_eq!(shading.distant_ambient, 0.25);

        let shading = ShadingInfo::new(&test_palette(), 0.5, 0.0, 0.8, 30.0, false);
        assert_eq!(shading.distant_ambient, 0.8);
    }

    #[test]
    fn fog_color_is_horizon_color() {
        let shading = ShadingInfo::new(&test_palette(), 0.25, 0.0, 1.0, 30.0, false);
        assert_eq!(shading.fog_color(), shading.sky_colors[0]);
    }
}
