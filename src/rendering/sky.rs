//! Sky rendering: the vertical gradient behind everything, and distant
//! objects (mountain silhouettes, clouds, moons, the sun, stars) projected
//! onto it. Distant objects live at infinity; they write color but never
//! depth, and everything in the world draws over them.

use crate::camera::{get_lower_bounded_pixel, get_upper_bounded_pixel, RayCamera};
use crate::math::{self, JUST_BELOW_ONE};
use crate::rendering::framebuffer::{pack_color, unpack_color, DrawRange, FrameView};
use crate::rendering::shading::{self, ShadingInfo, STAR_VISIBILITY_THRESHOLD};
use crate::rendering::texture::SkyTexture;
use glam::{DVec2, DVec3, DVec4};
use std::sync::atomic::{AtomicBool, Ordering};

/// Angle of the sky gradient above the horizon, in degrees.
pub const SKY_GRADIENT_ANGLE: f64 = 30.0;

/// Max angle of cloud layers above the horizon, in degrees.
pub const DISTANT_CLOUDS_MAX_ANGLE: f64 = 25.0;

/// Texture dimension that equals one identity angle of sky arc.
pub const IDENTITY_DIM: f64 = 320.0;

/// Arc such that an identity-sized object spans 90 degrees.
pub const IDENTITY_ANGLE_RADIANS: f64 = 90.0 * math::DEG_TO_RAD;

/// Moon texel color that means "show the sky gradient instead".
const MOON_UNLIT_COLOR: DVec3 = DVec3::new(170.0 / 255.0, 0.0, 0.0);

/// Gradient depth sampled behind unlit moon texels.
const MOON_GRADIENT_PERCENT: f64 = 0.80;

/// Gradient channel value at which stars reach full brightness.
const STAR_BRIGHTEST_THRESHOLD: f64 = 32.0 / 255.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoonType {
    First,
    Second,
}

pub struct DistantLand {
    pub texture_index: usize,
    pub angle_radians: f64,
}

/// Land silhouette with animation frames (volcanoes). The frames occupy
/// consecutive texture indices starting at `texture_index`.
pub struct DistantAnimatedLand {
    pub texture_index: usize,
    pub frame_count: usize,
    pub angle_radians: f64,
}

pub struct DistantAir {
    pub texture_index: usize,
    pub angle_radians: f64,
    /// 0 at the horizon, 1 at the cloud height limit.
    pub height: f64,
}

pub struct DistantMoon {
    pub texture_index: usize,
    pub moon_type: MoonType,
    /// 0-1 through the moon's orbit cycle.
    pub phase_percent: f64,
}

pub struct DistantStar {
    pub texture_index: usize,
    pub direction: DVec3,
}

/// Catalog of everything in the distant sky, plus textures. Positions are
/// angles only; distant objects have no world-space location.
#[derive(Default)]
pub struct DistantSky {
    pub lands: Vec<DistantLand>,
    pub anim_lands: Vec<DistantAnimatedLand>,
    pub airs: Vec<DistantAir>,
    pub moons: Vec<DistantMoon>,
    pub stars: Vec<DistantStar>,
    pub sun_texture_index: Option<usize>,
    pub textures: Vec<SkyTexture>,
    /// Project left and right edges separately instead of sizing around
    /// the midpoint.
    pub parallax: bool,
    /// 0-1 progress through animated land frame cycles.
    pub anim_percent: f64,
}

impl DistantSky {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A distant object that survived frustum checks for this frame, with its
/// projection resolved to screen coordinates.
pub struct VisDistantObject {
    pub texture_index: usize,
    pub draw_range: DrawRange,
    pub x_proj_start: f64,
    pub x_proj_end: f64,
    pub x_start: i32,
    pub x_end: i32,
    pub emissive: bool,
}

/// Visible distant objects in draw order, with index ranges per object
/// class so each class can use its own pixel shader.
#[derive(Default)]
pub struct VisDistantObjects {
    pub objs: Vec<VisDistantObject>,
    pub lands: (usize, usize),
    pub anim_lands: (usize, usize),
    pub airs: (usize, usize),
    pub moons: (usize, usize),
    pub suns: (usize, usize),
    pub stars: (usize, usize),
}

impl VisDistantObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.objs.clear();
        self.lands = (0, 0);
        self.anim_lands = (0, 0);
        self.airs = (0, 0);
        self.moons = (0, 0);
        self.suns = (0, 0);
        self.stars = (0, 0);
    }
}

/// Vertical screen origin of a projected distant object.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Orientation {
    /// Origin at the top edge. The sun uses this so its top edge sits on
    /// the horizon at 6am and 6pm.
    Top,
    /// Origin at the bottom edge, like land silhouettes.
    Bottom,
}

/// World direction of a moon, from its base position, phase, and a small
/// fixed per-moon latitude bonus.
fn moon_direction(moon: &DistantMoon) -> DVec3 {
    let (base_dir, bonus_latitude) = match moon.moon_type {
        MoonType::First => (DVec3::new(0.0, -57536.0, 0.0).normalize(), -15.0 / 100.0),
        MoonType::Second => (
            DVec3::new(-3000.0, -53536.0, 0.0).normalize(),
            -30.0 / 100.0,
        ),
    };

    let phase_modifier = moon.phase_percent + bonus_latitude;
    let rotation = shading::get_latitude_rotation(phase_modifier);
    let dir = rotation * DVec4::new(base_dir.x, base_dir.y, base_dir.z, 0.0);
    DVec3::new(dir.x, dir.y, dir.z).normalize()
}

/// Rotate an object's sky angles by time of day and latitude. Space
/// objects (moons, stars) wheel overhead; land objects do not.
fn space_corrected_angles(
    shading: &ShadingInfo,
    x_angle_radians: f64,
    y_angle_radians: f64,
) -> (f64, f64) {
    let direction = DVec3::new(
        x_angle_radians.sin(),
        y_angle_radians.tan(),
        x_angle_radians.cos(),
    )
    .normalize();

    let dir = shading.latitude_rotation
        * (shading.time_rotation * DVec4::new(direction.x, direction.y, direction.z, 0.0));
    (dir.x.atan2(dir.z), dir.y.asin())
}

/// Build the frame's visible distant object list. Classic projection sizes
/// the object around its projected midpoint; parallax projection projects
/// the left and right edges separately so objects stretch near the screen
/// edges.
pub fn update_visible_distant_objects(
    sky: &DistantSky,
    shading: &ShadingInfo,
    camera: &RayCamera,
    frame_width: usize,
    frame_height: usize,
    out: &mut VisDistantObjects,
) {
    out.clear();

    let width_real = frame_width as f64;
    let height_real = frame_height as f64;
    let forward = DVec2::new(camera.forward_x, camera.forward_z);

    let try_add_object = |texture_index: usize,
                              x_angle_radians: f64,
                              y_angle_radians: f64,
                              emissive: bool,
                              orientation: Orientation,
                              objs: &mut Vec<VisDistantObject>| {
        let texture = &sky.textures[texture_index];
        let obj_width = texture.width as f64 / IDENTITY_DIM;
        let obj_height = texture.height as f64 / IDENTITY_DIM;
        let obj_half_width = obj_width * 0.50;

        // The vertical extent is the same regardless of parallax. Project
        // the bottom, then add the height in screen space, so objects high
        // in the sky do not squish.
        let draw_range = {
            let obj_dir_bottom = DVec3::new(
                camera.forward_x,
                y_angle_radians.tan(),
                camera.forward_z,
            )
            .normalize();
            let obj_point_bottom = camera.eye + obj_dir_bottom;

            let y_proj_end = camera.get_projected_y(obj_point_bottom);
            let y_proj_start = y_proj_end - (obj_height * camera.zoom);

            let y_proj_bias = if orientation == Orientation::Top {
                y_proj_end - y_proj_start
            } else {
                0.0
            };

            let y_proj_screen_start = (y_proj_start + y_proj_bias) * height_real;
            let y_proj_screen_end = (y_proj_end + y_proj_bias) * height_real;

            let y_start = get_lower_bounded_pixel(y_proj_screen_start, frame_height);
            let y_end = get_upper_bounded_pixel(y_proj_screen_end, frame_height);

            DrawRange::new(y_proj_screen_start, y_proj_screen_end, y_start, y_end)
        };

        if sky.parallax {
            // Angles of the object's vertical edges.
            let x_delta_radians = obj_half_width * IDENTITY_ANGLE_RADIANS;
            let x_angle_left = x_angle_radians + x_delta_radians;
            let x_angle_right = x_angle_radians - x_delta_radians;

            let half_hfov = math::vertical_fov_to_horizontal_fov(camera.fov_y, camera.aspect) * 0.50;
            let camera_angle = camera.xz_angle_radians();
            let camera_angle_left = camera_angle + half_hfov;
            let camera_angle_right = camera_angle - half_hfov;

            // Wrap-around near angle zero: shift whichever range crossed it.
            let (x_angle_left, x_angle_right, camera_angle_left, camera_angle_right) = {
                let camera_is_general = camera_angle_left < math::TWO_PI;
                let object_is_general = x_angle_left < math::TWO_PI;
                if camera_is_general == object_is_general {
                    (x_angle_left, x_angle_right, camera_angle_left, camera_angle_right)
                } else if !camera_is_general {
                    (
                        x_angle_left,
                        x_angle_right,
                        camera_angle_left - math::TWO_PI,
                        camera_angle_right - math::TWO_PI,
                    )
                } else {
                    (
                        x_angle_left - math::TWO_PI,
                        x_angle_right - math::TWO_PI,
                        camera_angle_left,
                        camera_angle_right,
                    )
                }
            };

            let on_screen =
                (x_angle_left >= camera_angle_right) && (x_angle_right <= camera_angle_left);
            if on_screen {
                let obj_dir_left = DVec3::new(x_angle_left.sin(), 0.0, x_angle_left.cos());
                let obj_dir_right = DVec3::new(x_angle_right.sin(), 0.0, x_angle_right.cos());

                let x_proj_start = camera.get_projected_x(camera.eye + obj_dir_left);
                let x_proj_end = camera.get_projected_x(camera.eye + obj_dir_right);

                let x_draw_start = get_lower_bounded_pixel(x_proj_start * width_real, frame_width);
                let x_draw_end = get_upper_bounded_pixel(x_proj_end * width_real, frame_width);

                objs.push(VisDistantObject {
                    texture_index,
                    draw_range,
                    x_proj_start,
                    x_proj_end,
                    x_start: x_draw_start,
                    x_end: x_draw_end,
                    emissive,
                });
            }
        } else {
            // Classic projection around the midpoint.
            let obj_dir = DVec3::new(x_angle_radians.sin(), 0.0, x_angle_radians.cos());
            let x_proj_center = camera.get_projected_x(camera.eye + obj_dir);

            let obj_proj_width =
                (obj_width * camera.zoom) / (camera.aspect * crate::camera::TALL_PIXEL_RATIO);
            let obj_proj_half_width = obj_proj_width * 0.50;

            let x_proj_start = x_proj_center - obj_proj_half_width;
            let x_proj_end = x_proj_center + obj_proj_half_width;

            let obj_dir_2d = DVec2::new(obj_dir.x, obj_dir.z);
            let on_screen =
                (obj_dir_2d.dot(forward) > 0.0) && (x_proj_start <= 1.0) && (x_proj_end >= 0.0);
            if on_screen {
                let x_draw_start = get_lower_bounded_pixel(x_proj_start * width_real, frame_width);
                let x_draw_end = get_upper_bounded_pixel(x_proj_end * width_real, frame_width);

                objs.push(VisDistantObject {
                    texture_index,
                    draw_range,
                    x_proj_start,
                    x_proj_end,
                    x_start: x_draw_start,
                    x_end: x_draw_end,
                    emissive,
                });
            }
        }
    };

    let land_start = out.objs.len();
    for land in &sky.lands {
        try_add_object(
            land.texture_index,
            land.angle_radians,
            0.0,
            false,
            Orientation::Bottom,
            &mut out.objs,
        );
    }
    out.lands = (land_start, out.objs.len());

    let anim_land_start = out.objs.len();
    for anim_land in &sky.anim_lands {
        let frame = ((sky.anim_percent * anim_land.frame_count as f64) as usize)
            .min(anim_land.frame_count.saturating_sub(1));
        try_add_object(
            anim_land.texture_index + frame,
            anim_land.angle_radians,
            0.0,
            true,
            Orientation::Bottom,
            &mut out.objs,
        );
    }
    out.anim_lands = (anim_land_start, out.objs.len());

    let air_start = out.objs.len();
    for air in &sky.airs {
        let y_angle_radians = air.height * (DISTANT_CLOUDS_MAX_ANGLE * math::DEG_TO_RAD);
        try_add_object(
            air.texture_index,
            air.angle_radians,
            y_angle_radians,
            false,
            Orientation::Bottom,
            &mut out.objs,
        );
    }
    out.airs = (air_start, out.objs.len());

    let moon_start = out.objs.len();
    for moon in &sky.moons {
        let direction = moon_direction(moon);
        let x_angle_radians = math::full_atan2(direction.x, direction.z);
        let y_angle_radians = direction.y.asin();
        let (x_angle, y_angle) = space_corrected_angles(shading, x_angle_radians, y_angle_radians);
        try_add_object(
            moon.texture_index,
            x_angle,
            y_angle,
            true,
            Orientation::Top,
            &mut out.objs,
        );
    }
    out.moons = (moon_start, out.objs.len());

    let sun_start = out.objs.len();
    if let Some(sun_texture_index) = sky.sun_texture_index {
        // The sun direction already includes latitude and time of day.
        let sun_direction = shading.sun_direction;
        let sun_x_angle = math::full_atan2(sun_direction.x, sun_direction.z);

        // Straight up or down makes the X angle undefined.
        if sun_x_angle.is_finite() {
            let sun_y_angle = sun_direction.y.asin();
            try_add_object(
                sun_texture_index,
                sun_x_angle,
                sun_y_angle,
                true,
                Orientation::Top,
                &mut out.objs,
            );
        }
    }
    out.suns = (sun_start, out.objs.len());

    let star_start = out.objs.len();
    for star in &sky.stars {
        let x_angle_radians = math::full_atan2(star.direction.x, star.direction.z);
        let y_angle_radians = star.direction.y.asin();
        let (x_angle, y_angle) = space_corrected_angles(shading, x_angle_radians, y_angle_radians);
        try_add_object(
            star.texture_index,
            x_angle,
            y_angle,
            true,
            Orientation::Bottom,
            &mut out.objs,
        );
    }
    out.stars = (star_start, out.objs.len());
}

/// Projected screen-height fractions of the sky gradient's top and bottom
/// reference points.
pub fn get_sky_gradient_projected_y_range(camera: &RayCamera) -> (f64, f64) {
    let forward = DVec3::new(camera.forward_x, 0.0, camera.forward_z).normalize();

    let projected_y_top = {
        // Top of the gradient is a fixed angle above the horizon.
        let up_percent = (SKY_GRADIENT_ANGLE * math::DEG_TO_RAD).tan();
        let gradient_top_dir = (forward + (DVec3::Y * up_percent)).normalize();
        camera.get_projected_y(camera.eye + gradient_top_dir)
    };

    let projected_y_bottom = camera.get_projected_y(camera.eye + forward);

    (projected_y_top, projected_y_bottom)
}

/// 0 at the horizon, just below 1 at the top of the gradient.
#[inline]
pub fn get_sky_gradient_percent(projected_y: f64, projected_y_top: f64, projected_y_bottom: f64) -> f64 {
    JUST_BELOW_ONE
        - ((projected_y - projected_y_top) / (projected_y_bottom - projected_y_top))
            .clamp(0.0, JUST_BELOW_ONE)
}

/// Gradient color at a percent, interpolated between adjacent sky colors.
pub fn get_sky_gradient_row_color(gradient_percent: f64, shading: &ShadingInfo) -> DVec3 {
    let sky_colors = &shading.sky_colors;
    let count = sky_colors.len();
    let real_index = gradient_percent * count as f64;
    let percent = real_index - real_index.floor();
    let index = real_index as usize;
    let next_index = (index + 1).min(count - 1);
    sky_colors[index].lerp(sky_colors[next_index], percent)
}

/// Shared view of the sky gradient row-color cache. Workers own disjoint
/// row ranges during the sky gradient stage, then read it immutably.
pub struct SkyGradientCache {
    len: usize,
    ptr: *mut DVec3,
}

unsafe impl Send for SkyGradientCache {}
unsafe impl Sync for SkyGradientCache {}

impl SkyGradientCache {
    pub fn new(rows: &mut [DVec3]) -> Self {
        Self {
            len: rows.len(),
            ptr: rows.as_mut_ptr(),
        }
    }

    /// # Safety
    /// `y < height`, and no other thread may write the same row during
    /// this pass.
    #[inline]
    pub unsafe fn set(&self, y: usize, color: DVec3) {
        debug_assert!(y < self.len);
        *self.ptr.add(y) = color;
    }

    /// # Safety
    /// See [`SkyGradientCache::set`].
    #[inline]
    pub unsafe fn get(&self, y: usize) -> DVec3 {
        debug_assert!(y < self.len);
        *self.ptr.add(y)
    }
}

/// Fill rows [start_y, end_y) with the sky gradient and infinite depth,
/// caching each row's color for the star pass. Sets the star flag when any
/// row is dark enough.
pub fn draw_sky_gradient(
    start_y: usize,
    end_y: usize,
    gradient_proj_y_top: f64,
    gradient_proj_y_bottom: f64,
    row_cache: &SkyGradientCache,
    should_draw_stars: &AtomicBool,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let mut is_dark_enough = false;

    for y in start_y..end_y {
        let y_percent = (y as f64 + 0.50) / frame.height_real;
        let gradient_percent =
            get_sky_gradient_percent(y_percent, gradient_proj_y_top, gradient_proj_y_bottom);
        let color = get_sky_gradient_row_color(gradient_percent, shading);

        let max_component = color.x.max(color.y).max(color.z);
        is_dark_enough |= max_component <= STAR_VISIBILITY_THRESHOLD;

        let color_value = pack_color(color.x, color.y, color.z);

        // SAFETY: each worker owns its row range during this stage.
        unsafe {
            row_cache.set(y, color);
            for x in 0..frame.width {
                let index = x + (y * frame.width);
                frame.set_color(index, color_value);
                frame.set_depth(index, f64::INFINITY);
            }
        }
    }

    if is_dark_enough {
        should_draw_stars.store(true, Ordering::Relaxed);
    }
}

/// General distant object column: shaded by the distant ambient unless
/// emissive, with partial alpha dimming whatever is already in the frame
/// (cloud edges).
pub fn draw_distant_pixels(
    x: usize,
    range: &DrawRange,
    u: f64,
    v_start: f64,
    v_end: f64,
    texture: &SkyTexture,
    emissive: bool,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let y_start = range.y_start.max(0);
    let y_end = range.y_end.min(frame.height as i32);

    let texture_x = (u * texture.width as f64) as usize;
    let obj_shading = if emissive { 1.0 } else { shading.distant_ambient };

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
        let v = v_start + ((v_end - v_start) * y_percent);
        let texture_y = (v * texture.height as f64) as usize;

        let texel = texture.sample(texture_x, texture_y);
        if texel.a == 0.0 {
            continue;
        }

        // SAFETY: each worker owns its X range during this stage.
        unsafe {
            let color = if texel.a < 1.0 {
                let prev_color = unpack_color(frame.get_color(index));
                let vis_percent = (1.0 - texel.a).clamp(0.0, 1.0);
                prev_color * vis_percent
            } else {
                DVec3::new(texel.r, texel.g, texel.b) * obj_shading
            };
            frame.set_color(index, pack_color(color.x, color.y, color.z));
        }
    }
}

/// Moon column. Texels in the signal color show the gradient behind the
/// moon instead of their own color.
pub fn draw_moon_pixels(
    x: usize,
    range: &DrawRange,
    u: f64,
    v_start: f64,
    v_end: f64,
    texture: &SkyTexture,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let y_start = range.y_start.max(0);
    let y_end = range.y_end.min(frame.height as i32);

    let texture_x = (u * texture.width as f64) as usize;
    let gradient_color = get_sky_gradient_row_color(MOON_GRADIENT_PERCENT, shading);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
        let v = v_start + ((v_end - v_start) * y_percent);
        let texture_y = (v * texture.height as f64) as usize;

        let texel = texture.sample(texture_x, texture_y);
        if texel.a == 0.0 {
            continue;
        }

        let texel_is_lit = (texel.r != MOON_UNLIT_COLOR.x)
            && (texel.g != MOON_UNLIT_COLOR.y)
            && (texel.b != MOON_UNLIT_COLOR.z);
        let color = if texel_is_lit {
            DVec3::new(texel.r, texel.g, texel.b)
        } else {
            gradient_color
        };

        // SAFETY: each worker owns its X range during this stage.
        unsafe {
            frame.set_color(index, pack_color(color.x, color.y, color.z));
        }
    }
}

/// Star column. Stars fade in against their backing gradient row so they
/// do not blink on at dusk; a star over a bright row is skipped entirely.
pub fn draw_star_pixels(
    x: usize,
    range: &DrawRange,
    u: f64,
    v_start: f64,
    v_end: f64,
    texture: &SkyTexture,
    row_cache: &SkyGradientCache,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let y_start = range.y_start.max(0);
    let y_end = range.y_end.min(frame.height as i32);

    let texture_x = (u * texture.width as f64) as usize;

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
        let v = v_start + ((v_end - v_start) * y_percent);
        let texture_y = (v * texture.height as f64) as usize;

        let texel = texture.sample(texture_x, texture_y);
        if texel.a == 0.0 {
            continue;
        }

        // SAFETY: this stage only reads the cache, written a stage earlier.
        let gradient_color = unsafe { row_cache.get(y as usize) };
        let brightest_component = gradient_color.x.max(gradient_color.y).max(gradient_color.z);
        let is_dark_enough = brightest_component <= STAR_VISIBILITY_THRESHOLD;

        if is_dark_enough {
            let gradient_vis_percent = ((brightest_component - STAR_BRIGHTEST_THRESHOLD)
                / (STAR_VISIBILITY_THRESHOLD - STAR_BRIGHTEST_THRESHOLD))
                .clamp(0.0, 1.0);

            let texel_color = DVec3::new(texel.r, texel.g, texel.b);
            let color = texel_color + ((gradient_color - texel_color) * gradient_vis_percent);

            // SAFETY: each worker owns its X range during this stage.
            unsafe {
                frame.set_color(index, pack_color(color.x, color.y, color.z));
            }
        }
    }
}

enum DistantRenderType {
    General,
    Moon,
    Star,
}

/// Draw the visible distant objects whose X spans overlap
/// [start_x, end_x), far-to-near within each class. Stars go first and
/// only when some gradient row was dark enough.
#[allow(clippy::too_many_arguments)]
pub fn draw_distant_sky(
    start_x: usize,
    end_x: usize,
    vis: &VisDistantObjects,
    sky_textures: &[SkyTexture],
    row_cache: &SkyGradientCache,
    should_draw_stars: bool,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let draw_object = |obj: &VisDistantObject, render_type: &DistantRenderType| {
        let texture = &sky_textures[obj.texture_index];
        let x_draw_start = obj.x_start.max(start_x as i32);
        let x_draw_end = obj.x_end.min(end_x as i32);

        for x in x_draw_start..x_draw_end {
            if x < 0 {
                continue;
            }
            let x_percent = (x as f64 + 0.50) / frame.width_real;
            let width_percent = ((x_percent - obj.x_proj_start)
                / (obj.x_proj_end - obj.x_proj_start))
                .clamp(0.0, JUST_BELOW_ONE);
            let u = width_percent;

            match render_type {
                DistantRenderType::General => draw_distant_pixels(
                    x as usize,
                    &obj.draw_range,
                    u,
                    0.0,
                    JUST_BELOW_ONE,
                    texture,
                    obj.emissive,
                    shading,
                    frame,
                ),
                DistantRenderType::Moon => draw_moon_pixels(
                    x as usize,
                    &obj.draw_range,
                    u,
                    0.0,
                    JUST_BELOW_ONE,
                    texture,
                    shading,
                    frame,
                ),
                DistantRenderType::Star => draw_star_pixels(
                    x as usize,
                    &obj.draw_range,
                    u,
                    0.0,
                    JUST_BELOW_ONE,
                    texture,
                    row_cache,
                    frame,
                ),
            }
        }
    };

    // Reverse iterate so objects draw far to near within each class.
    let draw_range = |(start, end): (usize, usize), render_type: DistantRenderType| {
        debug_assert!(end <= vis.objs.len());
        for obj in vis.objs[start..end].iter().rev() {
            draw_object(obj, &render_type);
        }
    };

    if should_draw_stars {
        draw_range(vis.stars, DistantRenderType::Star);
    }
    draw_range(vis.suns, DistantRenderType::General);
    draw_range(vis.moons, DistantRenderType::Moon);
    draw_range(vis.airs, DistantRenderType::General);
    draw_range(vis.anim_lands, DistantRenderType::General);
    draw_range(vis.lands, DistantRenderType::General);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const WIDTH: usize = 32;
    const HEIGHT: usize = 24;

    fn test_camera() -> RayCamera {
        RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        )
    }

    fn night_shading() -> ShadingInfo {
        // Midnight palette entry keeps every row dark.
        let palette = [DVec3::new(0.01, 0.01, 0.02)];
        ShadingInfo::new(&palette, 0.0, 0.0, 0.30, 100.0, false)
    }

    fn day_shading() -> ShadingInfo {
        let palette = [DVec3::new(0.55, 0.70, 0.90)];
        ShadingInfo::new(&palette, 0.50, 0.0, 0.80, 100.0, false)
    }

    #[test]
    fn gradient_percent_is_zero_at_horizon() {
        let (top, bottom) = (0.10, 0.55);
        let at_horizon = get_sky_gradient_percent(bottom, top, bottom);
        let at_top = get_sky_gradient_percent(top, top, bottom);

        assert!(
            at_horizon.abs() < 1.0e-4,
            "horizon gradient percent should be ~0, got {}",
            at_horizon
        );
        assert!(
            (at_top - JUST_BELOW_ONE).abs() < 1.0e-9,
            "top gradient percent should be just below one, got {}",
            at_top
        );
    }

    #[test]
    fn sky_gradient_fills_rows_with_infinite_depth() {
        let camera = test_camera();
        let shading = day_shading();
        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![0.0f64; WIDTH * HEIGHT];
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);

        let mut rows = vec![DVec3::ZERO; HEIGHT];
        let cache = SkyGradientCache::new(&mut rows);
        let should_draw_stars = AtomicBool::new(false);

        let (top, bottom) = get_sky_gradient_projected_y_range(&camera);
        draw_sky_gradient(0, HEIGHT, top, bottom, &cache, &should_draw_stars, &shading, &frame);

        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                assert!(
                    depth[x + y * WIDTH].is_infinite(),
                    "sky depth at ({}, {}) must be infinite",
                    x,
                    y
                );
            }
        }
        assert!(
            !should_draw_stars.load(Ordering::Relaxed),
            "daytime sky must not enable stars"
        );
    }

    #[test]
    fn dark_sky_enables_stars() {
        let camera = test_camera();
        let shading = night_shading();
        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![0.0f64; WIDTH * HEIGHT];
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);

        let mut rows = vec![DVec3::ZERO; HEIGHT];
        let cache = SkyGradientCache::new(&mut rows);
        let should_draw_stars = AtomicBool::new(false);

        let (top, bottom) = get_sky_gradient_projected_y_range(&camera);
        draw_sky_gradient(0, HEIGHT, top, bottom, &cache, &should_draw_stars, &shading, &frame);

        assert!(
            should_draw_stars.load(Ordering::Relaxed),
            "night sky rows are below the star threshold"
        );
    }

    #[test]
    fn visible_object_ranges_partition_the_list() {
        let mut sky = DistantSky::new();
        sky.textures.push(SkyTexture::from_argb(4, 4, &[0xFF808080; 16]));
        // One land straight ahead of the camera (+X), one behind.
        sky.lands.push(DistantLand {
            texture_index: 0,
            angle_radians: std::f64::consts::FRAC_PI_2,
        });
        sky.lands.push(DistantLand {
            texture_index: 0,
            angle_radians: -std::f64::consts::FRAC_PI_2,
        });

        let camera = test_camera();
        let shading = day_shading();
        let mut vis = VisDistantObjects::new();
        update_visible_distant_objects(&sky, &shading, &camera, WIDTH, HEIGHT, &mut vis);

        assert_eq!(
            vis.lands.1 - vis.lands.0,
            1,
            "only the land in front of the camera should be visible"
        );
        assert_eq!(
            vis.stars,
            (vis.objs.len(), vis.objs.len()),
            "no stars were added"
        );
    }

    #[test]
    fn land_behind_camera_is_culled() {
        let mut sky = DistantSky::new();
        sky.textures.push(SkyTexture::from_argb(4, 4, &[0xFF808080; 16]));
        // Camera faces +X; angle -pi/2 points at -X, directly behind.
        sky.lands.push(DistantLand {
            texture_index: 0,
            angle_radians: -std::f64::consts::FRAC_PI_2,
        });

        let camera = test_camera();
        let shading = day_shading();
        let mut vis = VisDistantObjects::new();
        update_visible_distant_objects(&sky, &shading, &camera, WIDTH, HEIGHT, &mut vis);
        assert!(
            vis.objs.is_empty(),
            "object directly behind the camera must be culled"
        );
    }
}
