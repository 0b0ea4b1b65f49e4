//! Per-column voxel rendering: the 2-D DDA grid walk, the vertical stack
//! of shape cases for each hit cell, and the pixel shaders that fill the
//! frame buffers.
//!
//! Based on Lode Vandevenne's DDA raycaster, extended so a column does not
//! stop at its first wall: every cell along the ray contributes a vertical
//! stack of faces, clipped against the column's occlusion window. Depth is
//! recomputed from voxel boundary arithmetic at every step, never
//! accumulated, so it stays exact over long walks.

use crate::camera::{Ray, RayCamera, NEAR_PLANE};
use crate::math::{EPSILON, JUST_BELOW_ONE};
use crate::rendering::framebuffer::{pack_color, DrawRange, FrameView, OcclusionData};
use crate::rendering::intersect::{
    far_wall_u, find_diag1_intersection, find_diag2_intersection, find_door_intersection,
    find_edge_intersection, find_initial_door_intersection, find_initial_edge_intersection,
    get_chasm_far_facing, get_initial_chasm_far_facing, RayHit, DOOR_MIN_VISIBLE,
};
use crate::rendering::lights::{
    column_light_list, get_light_contribution_at_point, VisibleLight, VisibleLightList,
};
use crate::rendering::shading::ShadingInfo;
use crate::rendering::texture::{ChasmTexel, ChasmTexture, ChasmTextureGroups, VoxelTexel, VoxelTexture};
use crate::voxel::{DoorType, Facing2D, VoxelAnimState, VoxelDefinition, VoxelGrid};
use glam::{DVec2, DVec3};

/// Read-only world state shared by every column of a frame.
pub struct VoxelScene<'a> {
    pub grid: &'a VoxelGrid,
    pub anim: &'a VoxelAnimState,
    pub textures: &'a [VoxelTexture],
    pub chasm_textures: &'a ChasmTextureGroups,
    /// 0-1 animation progress through the chasm texture cycle.
    pub chasm_anim_percent: f64,
    pub lights: &'a [VisibleLight],
    /// One light list per XZ voxel column, X-major. May be empty when the
    /// frame has no lights.
    pub light_lists: &'a [VisibleLightList],
    pub ceiling_height: f64,
}

impl<'a> VoxelScene<'a> {
    /// Texture ids come from the level data; an id with no registered
    /// texture is a content bug and fatal by contract.
    fn texture(&self, id: usize) -> &'a VoxelTexture {
        match self.textures.get(id) {
            Some(texture) => texture,
            None => {
                log::error!("no voxel texture registered for id {}", id);
                panic!("no voxel texture registered for id {}", id);
            }
        }
    }

    fn chasm_texture(&self, chasm_type: crate::voxel::ChasmType) -> &'a ChasmTexture {
        match self
            .chasm_textures
            .get_texture(chasm_type, self.chasm_anim_percent)
        {
            Some(texture) => texture,
            None => {
                log::error!("no chasm textures registered for {:?}", chasm_type);
                panic!("no chasm textures registered for {:?}", chasm_type);
            }
        }
    }

    /// Lights relevant to one XZ voxel column.
    #[inline]
    fn light_list(&self, voxel_x: i32, voxel_z: i32) -> &'a VisibleLightList {
        column_light_list(self.light_lists, self.grid.width(), voxel_x, voxel_z)
    }
}

/// Nearest-neighbor voxel texture sample.
#[inline]
fn sample_voxel_texture(texture: &VoxelTexture, u: f64, v: f64) -> &VoxelTexel {
    let texture_x = (u * texture.width as f64) as usize;
    let texture_y = (v * texture.height as f64) as usize;
    texture.sample(texture_x, texture_y)
}

/// Chasm floors and wall cut-outs sample their texture in screen space,
/// so the water and lava appear to slide under the hole.
#[inline]
fn sample_chasm_texture(
    texture: &ChasmTexture,
    screen_x_percent: f64,
    screen_y_percent: f64,
) -> &ChasmTexel {
    let texture_x = (screen_x_percent * texture.width as f64) as usize;
    let texture_y = (screen_y_percent * texture.height as f64) as usize;
    texture.sample(texture_x, texture_y)
}

/// Ambient plus sun shading for a face normal, per channel. The sun's
/// share is capped so ambient + sun never exceeds full brightness.
#[inline]
fn face_shading(shading: &ShadingInfo, normal: DVec3) -> DVec3 {
    let light_normal_dot = shading.sun_direction.dot(normal).max(0.0);
    let sun_component = (shading.sun_color * light_normal_dot)
        .clamp(DVec3::ZERO, DVec3::splat(1.0 - shading.ambient));
    DVec3::splat(shading.ambient) + sun_component
}

fn draw_pixels_shader<const FADING: bool>(
    x: usize,
    range: &DrawRange,
    depth: f64,
    u: f64,
    v_start: f64,
    v_end: f64,
    normal: DVec3,
    texture: &VoxelTexture,
    fade_percent: f64,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let mut y_start = range.y_start;
    let mut y_end = range.y_end;

    let fog_color = shading.fog_color();
    let fog_percent = (depth / shading.fog_distance).min(1.0);
    let face_shading = face_shading(shading, normal);

    // Clip the span against the occlusion window, then shrink the window;
    // every pixel this opaque span covers is now spoken for.
    occlusion.clip_range(&mut y_start, &mut y_end);
    occlusion.update(y_start, y_end);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        // SAFETY: x and y are inside the frame and this column belongs to
        // exactly one worker.
        unsafe {
            if depth <= (frame.get_depth(index) - EPSILON) {
                let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
                let v = v_start + ((v_end - v_start) * y_percent);

                // Alpha is ignored here; cut-out texels come out black.
                let texel = sample_voxel_texture(texture, u, v);

                let boost = texel.emission + light_contribution;
                let mut color_r = texel.r * (face_shading.x + boost).min(1.0);
                let mut color_g = texel.g * (face_shading.y + boost).min(1.0);
                let mut color_b = texel.b * (face_shading.z + boost).min(1.0);

                if FADING {
                    color_r *= fade_percent;
                    color_g *= fade_percent;
                    color_b *= fade_percent;
                }

                color_r += (fog_color.x - color_r) * fog_percent;
                color_g += (fog_color.y - color_g) * fog_percent;
                color_b += (fog_color.z - color_b) * fog_percent;

                frame.set_color(index, pack_color(color_r, color_g, color_b));
                frame.set_depth(index, depth);
            }
        }
    }
}

/// Opaque wall span with one depth for the whole column.
#[allow(clippy::too_many_arguments)]
pub fn draw_pixels(
    x: usize,
    range: &DrawRange,
    depth: f64,
    u: f64,
    v_start: f64,
    v_end: f64,
    normal: DVec3,
    texture: &VoxelTexture,
    fade_percent: f64,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    if fade_percent == 1.0 {
        draw_pixels_shader::<false>(
            x, range, depth, u, v_start, v_end, normal, texture, fade_percent,
            light_contribution, shading, occlusion, frame,
        );
    } else {
        draw_pixels_shader::<true>(
            x, range, depth, u, v_start, v_end, normal, texture, fade_percent,
            light_contribution, shading, occlusion, frame,
        );
    }
}

fn draw_perspective_pixels_shader<const FADING: bool>(
    x: usize,
    range: &DrawRange,
    start_point: DVec2,
    end_point: DVec2,
    depth_start: f64,
    depth_end: f64,
    normal: DVec3,
    texture: &VoxelTexture,
    fade_percent: f64,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let mut y_start = range.y_start;
    let mut y_end = range.y_end;

    let fog_color = shading.fog_color();
    let face_shading = face_shading(shading, normal);

    // Perspective-correct interpolation happens in reciprocal depth space.
    let depth_start_recip = 1.0 / depth_start;
    let depth_end_recip = 1.0 / depth_end;
    let start_point_div = start_point * depth_start_recip;
    let end_point_div = end_point * depth_end_recip;
    let point_div_diff = end_point_div - start_point_div;

    occlusion.clip_range(&mut y_start, &mut y_end);
    occlusion.update(y_start, y_end);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);
        let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
        let depth = 1.0 / (depth_start_recip + ((depth_end_recip - depth_start_recip) * y_percent));

        // SAFETY: x and y are inside the frame and this column belongs to
        // exactly one worker.
        unsafe {
            if depth <= frame.get_depth(index) {
                let fog_percent = (depth / shading.fog_distance).min(1.0);

                let current_point_x = (start_point_div.x + (point_div_diff.x * y_percent)) * depth;
                let current_point_y = (start_point_div.y + (point_div_diff.y * y_percent)) * depth;

                let u = (JUST_BELOW_ONE - (current_point_x - current_point_x.floor()))
                    .clamp(0.0, JUST_BELOW_ONE);
                let v = (JUST_BELOW_ONE - (current_point_y - current_point_y.floor()))
                    .clamp(0.0, JUST_BELOW_ONE);

                let texel = sample_voxel_texture(texture, u, v);

                let boost = texel.emission + light_contribution;
                let mut color_r = texel.r * (face_shading.x + boost).min(1.0);
                let mut color_g = texel.g * (face_shading.y + boost).min(1.0);
                let mut color_b = texel.b * (face_shading.z + boost).min(1.0);

                if FADING {
                    color_r *= fade_percent;
                    color_g *= fade_percent;
                    color_b *= fade_percent;
                }

                color_r += (fog_color.x - color_r) * fog_percent;
                color_g += (fog_color.y - color_g) * fog_percent;
                color_b += (fog_color.z - color_b) * fog_percent;

                frame.set_color(index, pack_color(color_r, color_g, color_b));
                frame.set_depth(index, depth);
            }
        }
    }
}

/// Floor or ceiling span crossing a voxel, with depth interpolated
/// perspective-correct between its two edges.
#[allow(clippy::too_many_arguments)]
pub fn draw_perspective_pixels(
    x: usize,
    range: &DrawRange,
    start_point: DVec2,
    end_point: DVec2,
    depth_start: f64,
    depth_end: f64,
    normal: DVec3,
    texture: &VoxelTexture,
    fade_percent: f64,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    if fade_percent == 1.0 {
        draw_perspective_pixels_shader::<false>(
            x, range, start_point, end_point, depth_start, depth_end, normal, texture,
            fade_percent, light_contribution, shading, occlusion, frame,
        );
    } else {
        draw_perspective_pixels_shader::<true>(
            x, range, start_point, end_point, depth_start, depth_end, normal, texture,
            fade_percent, light_contribution, shading, occlusion, frame,
        );
    }
}

/// Span with cut-out texels: transparent walls, edges, doors, raised
/// platform sides. Clips against the occlusion window but never shrinks
/// it, since holes let later geometry show through.
#[allow(clippy::too_many_arguments)]
pub fn draw_transparent_pixels(
    x: usize,
    range: &DrawRange,
    depth: f64,
    u: f64,
    v_start: f64,
    v_end: f64,
    normal: DVec3,
    texture: &VoxelTexture,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &OcclusionData,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let mut y_start = range.y_start;
    let mut y_end = range.y_end;

    let fog_color = shading.fog_color();
    let fog_percent = (depth / shading.fog_distance).min(1.0);
    let face_shading = face_shading(shading, normal);

    occlusion.clip_range(&mut y_start, &mut y_end);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        // SAFETY: x and y are inside the frame and this column belongs to
        // exactly one worker.
        unsafe {
            if depth <= (frame.get_depth(index) - EPSILON) {
                let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
                let v = v_start + ((v_end - v_start) * y_percent);

                let texel = sample_voxel_texture(texture, u, v);
                if texel.transparent {
                    continue;
                }

                let boost = texel.emission + light_contribution;
                let mut color_r = texel.r * (face_shading.x + boost).min(1.0);
                let mut color_g = texel.g * (face_shading.y + boost).min(1.0);
                let mut color_b = texel.b * (face_shading.z + boost).min(1.0);

                color_r += (fog_color.x - color_r) * fog_percent;
                color_g += (fog_color.y - color_g) * fog_percent;
                color_b += (fog_color.z - color_b) * fog_percent;

                frame.set_color(index, pack_color(color_r, color_g, color_b));
                frame.set_depth(index, depth);
            }
        }
    }
}

/// Chasm wall span. Where the wall texture is cut out the chasm's animated
/// surface shows through, sampled in screen space; emissive chasms (lava)
/// draw their surface at full brightness.
#[allow(clippy::too_many_arguments)]
pub fn draw_chasm_pixels(
    x: usize,
    range: &DrawRange,
    depth: f64,
    u: f64,
    v_start: f64,
    v_end: f64,
    normal: DVec3,
    emissive: bool,
    texture: &VoxelTexture,
    chasm_texture: &ChasmTexture,
    light_contribution: f64,
    shading: &ShadingInfo,
    occlusion: &OcclusionData,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let mut y_start = range.y_start;
    let mut y_end = range.y_end;

    let fog_color = shading.fog_color();
    let fog_percent = (depth / shading.fog_distance).min(1.0);
    let face_shading = face_shading(shading, normal);

    let screen_x_percent = (x as f64 + 0.50) / frame.width_real;

    occlusion.clip_range(&mut y_start, &mut y_end);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);

        // SAFETY: x and y are inside the frame and this column belongs to
        // exactly one worker.
        unsafe {
            if depth <= (frame.get_depth(index) - EPSILON) {
                let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
                let v = v_start + ((v_end - v_start) * y_percent);

                let texel = sample_voxel_texture(texture, u, v);

                let (mut color_r, mut color_g, mut color_b) = if texel.transparent {
                    let screen_y_percent = (y as f64 + 0.50) / frame.height_real;
                    let chasm_texel =
                        sample_chasm_texture(chasm_texture, screen_x_percent, screen_y_percent);
                    if emissive {
                        (chasm_texel.r, chasm_texel.g, chasm_texel.b)
                    } else {
                        (
                            chasm_texel.r * face_shading.x.min(1.0),
                            chasm_texel.g * face_shading.y.min(1.0),
                            chasm_texel.b * face_shading.z.min(1.0),
                        )
                    }
                } else {
                    let boost = texel.emission + light_contribution;
                    (
                        texel.r * (face_shading.x + boost).min(1.0),
                        texel.g * (face_shading.y + boost).min(1.0),
                        texel.b * (face_shading.z + boost).min(1.0),
                    )
                };

                color_r += (fog_color.x - color_r) * fog_percent;
                color_g += (fog_color.y - color_g) * fog_percent;
                color_b += (fog_color.z - color_b) * fog_percent;

                frame.set_color(index, pack_color(color_r, color_g, color_b));
                frame.set_depth(index, depth);
            }
        }
    }
}

/// Chasm surface seen from above. Depth interpolates perspective-correct
/// like a floor, but the texture is sampled in screen space.
#[allow(clippy::too_many_arguments)]
pub fn draw_perspective_chasm_pixels(
    x: usize,
    range: &DrawRange,
    depth_start: f64,
    depth_end: f64,
    emissive: bool,
    chasm_texture: &ChasmTexture,
    shading: &ShadingInfo,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let y_proj_start = range.y_proj_start;
    let y_proj_end = range.y_proj_end;
    let mut y_start = range.y_start;
    let mut y_end = range.y_end;

    let fog_color = shading.fog_color();

    let depth_start_recip = 1.0 / depth_start;
    let depth_end_recip = 1.0 / depth_end;

    let screen_x_percent = (x as f64 + 0.50) / frame.width_real;

    occlusion.clip_range(&mut y_start, &mut y_end);
    occlusion.update(y_start, y_end);

    for y in y_start..y_end {
        let index = x + (y as usize * frame.width);
        let y_percent = ((y as f64 + 0.50) - y_proj_start) / (y_proj_end - y_proj_start);
        let depth = 1.0 / (depth_start_recip + ((depth_end_recip - depth_start_recip) * y_percent));

        // SAFETY: x and y are inside the frame and this column belongs to
        // exactly one worker.
        unsafe {
            if depth <= frame.get_depth(index) {
                let fog_percent = (depth / shading.fog_distance).min(1.0);

                let screen_y_percent = (y as f64 + 0.50) / frame.height_real;
                let texel =
                    sample_chasm_texture(chasm_texture, screen_x_percent, screen_y_percent);

                let (mut color_r, mut color_g, mut color_b) = if emissive {
                    (texel.r, texel.g, texel.b)
                } else {
                    (
                        texel.r * shading.ambient.min(1.0),
                        texel.g * shading.ambient.min(1.0),
                        texel.b * shading.ambient.min(1.0),
                    )
                };

                color_r += (fog_color.x - color_r) * fog_percent;
                color_g += (fog_color.y - color_g) * fog_percent;
                color_b += (fog_color.z - color_b) * fog_percent;

                frame.set_color(index, pack_color(color_r, color_g, color_b));
                frame.set_depth(index, depth);
            }
        }
    }
}

/// Where a voxel sits relative to the eye's own Y level. Faces visible
/// only from above or below depend on this.
#[derive(Copy, Clone, PartialEq, Eq)]
enum RelativeY {
    AtEye,
    Below,
    Above,
}

/// Per-cell geometry shared by every shape case in one voxel column.
struct CellSpan {
    voxel_x: i32,
    voxel_z: i32,
    facing: Facing2D,
    near_point: DVec2,
    far_point: DVec2,
    near_z: f64,
    far_z: f64,
    wall_u: f64,
    wall_normal: DVec3,
    light_contribution: f64,
}

#[inline]
fn facing_offset(facing: Facing2D) -> (i32, i32) {
    match facing {
        Facing2D::PosX => (1, 0),
        Facing2D::NegX => (-1, 0),
        Facing2D::PosZ => (0, 1),
        Facing2D::NegZ => (0, -1),
    }
}

/// A chasm wall exists on a face only when the neighbor on that side is
/// not itself a chasm; adjoining chasms merge into one open pit.
fn chasm_face_is_visible(
    grid: &VoxelGrid,
    voxel_x: i32,
    voxel_y: i32,
    voxel_z: i32,
    facing: Facing2D,
) -> bool {
    let (dx, dz) = facing_offset(facing);
    !matches!(
        grid.get(voxel_x + dx, voxel_y, voxel_z + dz),
        VoxelDefinition::Chasm { .. }
    )
}

fn draw_diagonal(
    x: usize,
    span: &CellSpan,
    voxel_y: i32,
    voxel_y_real: f64,
    voxel_height: f64,
    texture_id: usize,
    right_diagonal: bool,
    fade_percent: f64,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let _ = voxel_y;
    let hit = if right_diagonal {
        find_diag2_intersection(span.voxel_x, span.voxel_z, span.near_point, span.far_point)
    } else {
        find_diag1_intersection(span.voxel_x, span.voxel_z, span.near_point, span.far_point)
    };

    if let Some(hit) = hit {
        let diag_top_point = DVec3::new(hit.point.x, voxel_y_real + voxel_height, hit.point.y);
        let diag_bottom_point = DVec3::new(diag_top_point.x, voxel_y_real, diag_top_point.z);

        let range = DrawRange::from_points(diag_top_point, diag_bottom_point, camera, frame.height);
        draw_pixels(
            x,
            &range,
            span.near_z + hit.inner_z,
            hit.u,
            0.0,
            JUST_BELOW_ONE,
            hit.normal,
            scene.texture(texture_id),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    }
}

fn draw_edge_hit(
    x: usize,
    span: &CellSpan,
    hit: &RayHit,
    voxel_y_real: f64,
    voxel_height: f64,
    texture_id: usize,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let edge_top_point = DVec3::new(hit.point.x, voxel_y_real + voxel_height, hit.point.y);
    let edge_bottom_point = DVec3::new(hit.point.x, voxel_y_real, hit.point.y);

    let range = DrawRange::from_points(edge_top_point, edge_bottom_point, camera, frame.height);
    draw_transparent_pixels(
        x,
        &range,
        span.near_z + hit.inner_z,
        hit.u,
        0.0,
        JUST_BELOW_ONE,
        hit.normal,
        scene.texture(texture_id),
        span.light_contribution,
        shading,
        occlusion,
        frame,
    );
}

/// Door spans share their vertical layout across door types: full height
/// except raising doors, whose bottom edge and V start ride up with the
/// open percent. The hit's inner Z is zero except for swinging doors, so
/// `near_z + inner_z` is the right depth for every type.
fn draw_door_hit(
    x: usize,
    span: &CellSpan,
    hit: &RayHit,
    door_type: DoorType,
    percent_open: f64,
    voxel_y_real: f64,
    voxel_height: f64,
    texture_id: usize,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let (bottom_y, v_start) = if door_type == DoorType::Raising {
        let raised_amount = (voxel_height * (1.0 - DOOR_MIN_VISIBLE)) * percent_open;
        (voxel_y_real + raised_amount, raised_amount / voxel_height)
    } else {
        (voxel_y_real, 0.0)
    };

    let door_top_point = DVec3::new(hit.point.x, voxel_y_real + voxel_height, hit.point.y);
    let door_bottom_point = DVec3::new(door_top_point.x, bottom_y, door_top_point.z);

    let range = DrawRange::from_points(door_top_point, door_bottom_point, camera, frame.height);
    draw_transparent_pixels(
        x,
        &range,
        span.near_z + hit.inner_z,
        hit.u,
        v_start,
        JUST_BELOW_ONE,
        hit.normal,
        scene.texture(texture_id),
        span.light_contribution,
        shading,
        occlusion,
        frame,
    );
}

#[allow(clippy::too_many_arguments)]
fn draw_chasm_face(
    x: usize,
    span: &CellSpan,
    face_point: DVec2,
    face_depth: f64,
    face_u: f64,
    face_normal: DVec3,
    voxel_y_real: f64,
    voxel_height: f64,
    chasm_depth: f64,
    texture_id: usize,
    chasm_type: crate::voxel::ChasmType,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let ceiling_point = DVec3::new(face_point.x, voxel_y_real + voxel_height, face_point.y);
    let floor_point = DVec3::new(face_point.x, ceiling_point.y - chasm_depth, face_point.y);

    let range = DrawRange::from_points(ceiling_point, floor_point, camera, frame.height);
    draw_chasm_pixels(
        x,
        &range,
        face_depth,
        face_u,
        0.0,
        JUST_BELOW_ONE,
        face_normal,
        chasm_type.is_emissive(),
        scene.texture(texture_id),
        scene.chasm_texture(chasm_type),
        span.light_contribution,
        shading,
        occlusion,
        frame,
    );
}

/// The chasm's animated surface between its near and far edges. Drawn far
/// edge first since the surface faces up and the far edge projects higher.
fn draw_chasm_surface(
    x: usize,
    span: &CellSpan,
    voxel_y_real: f64,
    voxel_height: f64,
    chasm_depth: f64,
    chasm_type: crate::voxel::ChasmType,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let surface_y = (voxel_y_real + voxel_height) - chasm_depth;
    let far_surface_point = DVec3::new(span.far_point.x, surface_y, span.far_point.y);
    let near_surface_point = DVec3::new(span.near_point.x, surface_y, span.near_point.y);

    let range = DrawRange::from_points(far_surface_point, near_surface_point, camera, frame.height);
    draw_perspective_chasm_pixels(
        x,
        &range,
        span.far_z,
        span.near_z,
        chasm_type.is_emissive(),
        scene.chasm_texture(chasm_type),
        shading,
        occlusion,
        frame,
    );
}

/// Raised platform seen from inside its own voxel column: the eye shares
/// the column, so ceiling and floor both project from the far edge.
#[allow(clippy::too_many_arguments)]
fn draw_raised_initial(
    x: usize,
    span: &CellSpan,
    voxel_y_real: f64,
    voxel_height: f64,
    textures: &crate::voxel::VoxelTextureIds,
    y_offset: f64,
    y_size: f64,
    v_top: f64,
    v_bottom: f64,
    fade_percent: f64,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let ceiling_y = voxel_y_real + ((y_offset + y_size) * voxel_height);
    let floor_y = voxel_y_real + (y_offset * voxel_height);

    let near_ceiling_point = DVec3::new(span.near_point.x, ceiling_y, span.near_point.y);
    let near_floor_point = DVec3::new(span.near_point.x, floor_y, span.near_point.y);

    if camera.eye.y > near_ceiling_point.y {
        // Above the platform: only its top is visible.
        let far_ceiling_point = DVec3::new(span.far_point.x, ceiling_y, span.far_point.y);
        let range =
            DrawRange::from_points(far_ceiling_point, near_ceiling_point, camera, frame.height);
        draw_perspective_pixels(
            x,
            &range,
            span.far_point,
            span.near_point,
            span.far_z,
            span.near_z,
            DVec3::Y,
            scene.texture(textures.ceiling),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    } else if camera.eye.y < near_floor_point.y {
        // Below the platform: only its underside is visible.
        let far_floor_point = DVec3::new(span.far_point.x, floor_y, span.far_point.y);
        let range = DrawRange::from_points(near_floor_point, far_floor_point, camera, frame.height);
        draw_perspective_pixels(
            x,
            &range,
            span.near_point,
            span.far_point,
            span.near_z,
            span.far_z,
            -DVec3::Y,
            scene.texture(textures.floor),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    } else {
        // Eye level is inside the platform's vertical range.
        let far_ceiling_point = DVec3::new(span.far_point.x, ceiling_y, span.far_point.y);
        let far_floor_point = DVec3::new(span.far_point.x, floor_y, span.far_point.y);

        let (ceiling_range, wall_range, floor_range) = DrawRange::three_part(
            near_ceiling_point,
            far_ceiling_point,
            far_floor_point,
            near_floor_point,
            camera,
            frame.height,
        );

        draw_perspective_pixels(
            x,
            &ceiling_range,
            span.near_point,
            span.far_point,
            span.near_z,
            span.far_z,
            -DVec3::Y,
            scene.texture(textures.ceiling),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );

        draw_transparent_pixels(
            x,
            &wall_range,
            span.far_z,
            span.wall_u,
            v_top,
            v_bottom,
            span.wall_normal,
            scene.texture(textures.side),
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );

        draw_perspective_pixels(
            x,
            &floor_range,
            span.far_point,
            span.near_point,
            span.far_z,
            span.near_z,
            DVec3::Y,
            scene.texture(textures.floor),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    }
}

/// Raised platform in a voxel the ray entered from outside.
#[allow(clippy::too_many_arguments)]
fn draw_raised(
    x: usize,
    span: &CellSpan,
    voxel_y_real: f64,
    voxel_height: f64,
    textures: &crate::voxel::VoxelTextureIds,
    y_offset: f64,
    y_size: f64,
    v_top: f64,
    v_bottom: f64,
    fade_percent: f64,
    camera: &RayCamera,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let ceiling_y = voxel_y_real + ((y_offset + y_size) * voxel_height);
    let floor_y = voxel_y_real + (y_offset * voxel_height);

    let near_ceiling_point = DVec3::new(span.near_point.x, ceiling_y, span.near_point.y);
    let near_floor_point = DVec3::new(span.near_point.x, floor_y, span.near_point.y);

    if camera.eye.y > near_ceiling_point.y {
        // Above the platform: top then front face.
        let far_ceiling_point = DVec3::new(span.far_point.x, ceiling_y, span.far_point.y);
        let (ceiling_range, wall_range) = DrawRange::two_part(
            far_ceiling_point,
            near_ceiling_point,
            near_floor_point,
            camera,
            frame.height,
        );

        draw_perspective_pixels(
            x,
            &ceiling_range,
            span.far_point,
            span.near_point,
            span.far_z,
            span.near_z,
            DVec3::Y,
            scene.texture(textures.ceiling),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );

        draw_transparent_pixels(
            x,
            &wall_range,
            span.near_z,
            span.wall_u,
            v_top,
            v_bottom,
            span.wall_normal,
            scene.texture(textures.side),
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    } else if camera.eye.y < near_floor_point.y {
        // Below the platform: front face then underside.
        let far_floor_point = DVec3::new(span.far_point.x, floor_y, span.far_point.y);
        let (wall_range, floor_range) = DrawRange::two_part(
            near_ceiling_point,
            near_floor_point,
            far_floor_point,
            camera,
            frame.height,
        );

        draw_transparent_pixels(
            x,
            &wall_range,
            span.near_z,
            span.wall_u,
            v_top,
            v_bottom,
            span.wall_normal,
            scene.texture(textures.side),
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );

        draw_perspective_pixels(
            x,
            &floor_range,
            span.near_point,
            span.far_point,
            span.near_z,
            span.far_z,
            -DVec3::Y,
            scene.texture(textures.floor),
            fade_percent,
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    } else {
        // Eye level within the platform: only the front face.
        let range =
            DrawRange::from_points(near_ceiling_point, near_floor_point, camera, frame.height);
        draw_transparent_pixels(
            x,
            &range,
            span.near_z,
            span.wall_u,
            v_top,
            v_bottom,
            span.wall_normal,
            scene.texture(textures.side),
            span.light_contribution,
            shading,
            occlusion,
            frame,
        );
    }
}

/// One voxel of the stack in the eye's own XZ cell. Only far faces can be
/// seen from inside, so walls render their inner ceiling/back/floor and
/// the thin shapes use the far-facing solvers.
#[allow(clippy::too_many_arguments)]
fn draw_initial_voxel(
    x: usize,
    span: &CellSpan,
    voxel_y: i32,
    rel: RelativeY,
    camera: &RayCamera,
    ray: &Ray,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let definition = scene.grid.get(span.voxel_x, voxel_y, span.voxel_z);
    let voxel_height = scene.ceiling_height;
    let voxel_y_real = voxel_y as f64 * voxel_height;

    // Fully faded voxels read as air.
    if scene.anim.is_fully_faded(span.voxel_x, voxel_y, span.voxel_z) {
        return;
    }
    let fade_percent =
        1.0 - scene.anim.fade_percent(span.voxel_x, voxel_y, span.voxel_z);

    match *definition {
        VoxelDefinition::None => {}
        VoxelDefinition::Wall { ref textures } => match rel {
            RelativeY::AtEye => {
                // Inner ceiling, back face, and inner floor.
                let far_ceiling_point =
                    DVec3::new(span.far_point.x, voxel_y_real + voxel_height, span.far_point.y);
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, far_ceiling_point.y, span.near_point.y);
                let far_floor_point =
                    DVec3::new(span.far_point.x, voxel_y_real, span.far_point.y);
                let near_floor_point =
                    DVec3::new(span.near_point.x, far_floor_point.y, span.near_point.y);

                let (ceiling_range, wall_range, floor_range) = DrawRange::three_part(
                    near_ceiling_point,
                    far_ceiling_point,
                    far_floor_point,
                    near_floor_point,
                    camera,
                    frame.height,
                );

                draw_perspective_pixels(
                    x,
                    &ceiling_range,
                    span.near_point,
                    span.far_point,
                    span.near_z,
                    span.far_z,
                    -DVec3::Y,
                    scene.texture(textures.ceiling),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );

                draw_pixels(
                    x,
                    &wall_range,
                    span.far_z,
                    span.wall_u,
                    0.0,
                    JUST_BELOW_ONE,
                    span.wall_normal,
                    scene.texture(textures.side),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );

                draw_perspective_pixels(
                    x,
                    &floor_range,
                    span.far_point,
                    span.near_point,
                    span.far_z,
                    span.near_z,
                    DVec3::Y,
                    scene.texture(textures.floor),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
            RelativeY::Below => {
                // Only the wall's top face is visible from above.
                let far_ceiling_point =
                    DVec3::new(span.far_point.x, voxel_y_real + voxel_height, span.far_point.y);
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, far_ceiling_point.y, span.near_point.y);

                let range = DrawRange::from_points(
                    far_ceiling_point,
                    near_ceiling_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.far_point,
                    span.near_point,
                    span.far_z,
                    span.near_z,
                    DVec3::Y,
                    scene.texture(textures.ceiling),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
            RelativeY::Above => {
                // Only the wall's bottom face is visible from below.
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);
                let far_floor_point =
                    DVec3::new(span.far_point.x, near_floor_point.y, span.far_point.y);

                let range = DrawRange::from_points(
                    near_floor_point,
                    far_floor_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.near_point,
                    span.far_point,
                    span.near_z,
                    span.far_z,
                    -DVec3::Y,
                    scene.texture(textures.floor),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        },
        VoxelDefinition::Floor { texture } => {
            // Floors are only visible from above.
            if rel == RelativeY::Below {
                let far_ceiling_point =
                    DVec3::new(span.far_point.x, voxel_y_real + voxel_height, span.far_point.y);
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, far_ceiling_point.y, span.near_point.y);

                let range = DrawRange::from_points(
                    far_ceiling_point,
                    near_ceiling_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.far_point,
                    span.near_point,
                    span.far_z,
                    span.near_z,
                    DVec3::Y,
                    scene.texture(texture),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Ceiling { texture } => {
            // Ceilings are only visible from below.
            let draw = match rel {
                RelativeY::AtEye => camera.eye.y < voxel_y_real,
                RelativeY::Below => false,
                RelativeY::Above => true,
            };
            if draw {
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);
                let far_floor_point =
                    DVec3::new(span.far_point.x, near_floor_point.y, span.far_point.y);

                let range = DrawRange::from_points(
                    near_floor_point,
                    far_floor_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.near_point,
                    span.far_point,
                    span.near_z,
                    span.far_z,
                    -DVec3::Y,
                    scene.texture(texture),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Raised {
            ref textures,
            y_offset,
            y_size,
            v_top,
            v_bottom,
        } => draw_raised_initial(
            x, span, voxel_y_real, voxel_height, textures, y_offset, y_size, v_top, v_bottom,
            fade_percent, camera, shading, scene, occlusion, frame,
        ),
        VoxelDefinition::Diagonal {
            texture,
            right_diagonal,
        } => draw_diagonal(
            x, span, voxel_y, voxel_y_real, voxel_height, texture, right_diagonal, fade_percent,
            camera, shading, scene, occlusion, frame,
        ),
        VoxelDefinition::TransparentWall { .. } => {
            // Transparent walls have no back faces.
        }
        VoxelDefinition::Edge {
            texture,
            facing,
            flipped,
        } => {
            let hit = find_initial_edge_intersection(
                span.voxel_x,
                span.voxel_z,
                facing,
                flipped,
                span.near_point,
                span.far_point,
                camera,
                ray,
            );
            if let Some(hit) = hit {
                draw_edge_hit(
                    x, span, &hit, voxel_y_real, voxel_height, texture, camera, shading, scene,
                    occlusion, frame,
                );
            }
        }
        VoxelDefinition::Chasm {
            texture,
            chasm_type,
        } => {
            // Chasms are never above the eye's voxel.
            if rel == RelativeY::Above {
                return;
            }

            let eye = DVec2::new(camera.eye.x, camera.eye.z);
            let far_facing = get_initial_chasm_far_facing(span.voxel_x, span.voxel_z, eye, ray);
            let chasm_depth = chasm_type.depth(voxel_height);

            draw_chasm_surface(
                x, span, voxel_y_real, voxel_height, chasm_depth, chasm_type, camera, shading,
                scene, occlusion, frame,
            );

            if chasm_face_is_visible(scene.grid, span.voxel_x, voxel_y, span.voxel_z, far_facing) {
                let far_u = far_wall_u(span.far_point, far_facing);
                draw_chasm_face(
                    x,
                    span,
                    span.far_point,
                    span.far_z,
                    far_u,
                    -far_facing.normal(),
                    voxel_y_real,
                    voxel_height,
                    chasm_depth,
                    texture,
                    chasm_type,
                    camera,
                    shading,
                    scene,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Door { texture, door_type } => {
            let percent_open = scene
                .anim
                .door_open_percent(span.voxel_x, voxel_y, span.voxel_z);
            let hit = find_initial_door_intersection(
                span.voxel_x,
                span.voxel_z,
                door_type,
                percent_open,
                span.near_point,
                span.far_point,
                camera,
                ray,
                scene.grid,
            );
            if let Some(hit) = hit {
                draw_door_hit(
                    x, span, &hit, door_type, percent_open, voxel_y_real, voxel_height, texture,
                    camera, shading, scene, occlusion, frame,
                );
            }
        }
    }
}

/// One voxel of the stack in a cell the ray entered from outside.
#[allow(clippy::too_many_arguments)]
fn draw_voxel(
    x: usize,
    span: &CellSpan,
    voxel_y: i32,
    rel: RelativeY,
    camera: &RayCamera,
    ray: &Ray,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let definition = scene.grid.get(span.voxel_x, voxel_y, span.voxel_z);
    let voxel_height = scene.ceiling_height;
    let voxel_y_real = voxel_y as f64 * voxel_height;

    if scene.anim.is_fully_faded(span.voxel_x, voxel_y, span.voxel_z) {
        return;
    }
    let fade_percent =
        1.0 - scene.anim.fade_percent(span.voxel_x, voxel_y, span.voxel_z);

    match *definition {
        VoxelDefinition::None => {}
        VoxelDefinition::Wall { ref textures } => match rel {
            RelativeY::AtEye => {
                // Front face only.
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, voxel_y_real + voxel_height, span.near_point.y);
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);

                let range = DrawRange::from_points(
                    near_ceiling_point,
                    near_floor_point,
                    camera,
                    frame.height,
                );
                draw_pixels(
                    x,
                    &range,
                    span.near_z,
                    span.wall_u,
                    0.0,
                    JUST_BELOW_ONE,
                    span.wall_normal,
                    scene.texture(textures.side),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
            RelativeY::Below => {
                // Top face, then front face.
                let far_ceiling_point =
                    DVec3::new(span.far_point.x, voxel_y_real + voxel_height, span.far_point.y);
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, far_ceiling_point.y, span.near_point.y);
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);

                let (ceiling_range, wall_range) = DrawRange::two_part(
                    far_ceiling_point,
                    near_ceiling_point,
                    near_floor_point,
                    camera,
                    frame.height,
                );

                draw_perspective_pixels(
                    x,
                    &ceiling_range,
                    span.far_point,
                    span.near_point,
                    span.far_z,
                    span.near_z,
                    DVec3::Y,
                    scene.texture(textures.ceiling),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );

                draw_pixels(
                    x,
                    &wall_range,
                    span.near_z,
                    span.wall_u,
                    0.0,
                    JUST_BELOW_ONE,
                    span.wall_normal,
                    scene.texture(textures.side),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
            RelativeY::Above => {
                // Front face, then bottom face.
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, voxel_y_real + voxel_height, span.near_point.y);
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);
                let far_floor_point =
                    DVec3::new(span.far_point.x, near_floor_point.y, span.far_point.y);

                let (wall_range, floor_range) = DrawRange::two_part(
                    near_ceiling_point,
                    near_floor_point,
                    far_floor_point,
                    camera,
                    frame.height,
                );

                draw_pixels(
                    x,
                    &wall_range,
                    span.near_z,
                    span.wall_u,
                    0.0,
                    JUST_BELOW_ONE,
                    span.wall_normal,
                    scene.texture(textures.side),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );

                draw_perspective_pixels(
                    x,
                    &floor_range,
                    span.near_point,
                    span.far_point,
                    span.near_z,
                    span.far_z,
                    -DVec3::Y,
                    scene.texture(textures.floor),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        },
        VoxelDefinition::Floor { texture } => {
            if rel == RelativeY::Below {
                let far_ceiling_point =
                    DVec3::new(span.far_point.x, voxel_y_real + voxel_height, span.far_point.y);
                let near_ceiling_point =
                    DVec3::new(span.near_point.x, far_ceiling_point.y, span.near_point.y);

                let range = DrawRange::from_points(
                    far_ceiling_point,
                    near_ceiling_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.far_point,
                    span.near_point,
                    span.far_z,
                    span.near_z,
                    DVec3::Y,
                    scene.texture(texture),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Ceiling { texture } => {
            let draw = match rel {
                RelativeY::AtEye => camera.eye.y < voxel_y_real,
                RelativeY::Below => false,
                RelativeY::Above => true,
            };
            if draw {
                let near_floor_point =
                    DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);
                let far_floor_point =
                    DVec3::new(span.far_point.x, near_floor_point.y, span.far_point.y);

                let range = DrawRange::from_points(
                    near_floor_point,
                    far_floor_point,
                    camera,
                    frame.height,
                );
                draw_perspective_pixels(
                    x,
                    &range,
                    span.near_point,
                    span.far_point,
                    span.near_z,
                    span.far_z,
                    -DVec3::Y,
                    scene.texture(texture),
                    fade_percent,
                    span.light_contribution,
                    shading,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Raised {
            ref textures,
            y_offset,
            y_size,
            v_top,
            v_bottom,
        } => draw_raised(
            x, span, voxel_y_real, voxel_height, textures, y_offset, y_size, v_top, v_bottom,
            fade_percent, camera, shading, scene, occlusion, frame,
        ),
        VoxelDefinition::Diagonal {
            texture,
            right_diagonal,
        } => draw_diagonal(
            x, span, voxel_y, voxel_y_real, voxel_height, texture, right_diagonal, fade_percent,
            camera, shading, scene, occlusion, frame,
        ),
        VoxelDefinition::TransparentWall { texture, .. } => {
            let near_ceiling_point =
                DVec3::new(span.near_point.x, voxel_y_real + voxel_height, span.near_point.y);
            let near_floor_point =
                DVec3::new(span.near_point.x, voxel_y_real, span.near_point.y);

            let range =
                DrawRange::from_points(near_ceiling_point, near_floor_point, camera, frame.height);
            draw_transparent_pixels(
                x,
                &range,
                span.near_z,
                span.wall_u,
                0.0,
                JUST_BELOW_ONE,
                span.wall_normal,
                scene.texture(texture),
                span.light_contribution,
                shading,
                occlusion,
                frame,
            );
        }
        VoxelDefinition::Edge {
            texture,
            facing,
            flipped,
        } => {
            let hit = find_edge_intersection(
                span.voxel_x,
                span.voxel_z,
                facing,
                flipped,
                span.facing,
                span.near_point,
                span.far_point,
                span.wall_u,
                camera,
                ray,
            );
            if let Some(hit) = hit {
                draw_edge_hit(
                    x, span, &hit, voxel_y_real, voxel_height, texture, camera, shading, scene,
                    occlusion, frame,
                );
            }
        }
        VoxelDefinition::Chasm {
            texture,
            chasm_type,
        } => {
            if rel == RelativeY::Above {
                return;
            }

            let near_facing = span.facing;
            let far_facing =
                get_chasm_far_facing(span.voxel_x, span.voxel_z, near_facing, camera, ray);
            let chasm_depth = chasm_type.depth(voxel_height);

            if chasm_face_is_visible(scene.grid, span.voxel_x, voxel_y, span.voxel_z, near_facing)
            {
                let near_u = JUST_BELOW_ONE - span.wall_u;
                draw_chasm_face(
                    x,
                    span,
                    span.near_point,
                    span.near_z,
                    near_u,
                    span.wall_normal,
                    voxel_y_real,
                    voxel_height,
                    chasm_depth,
                    texture,
                    chasm_type,
                    camera,
                    shading,
                    scene,
                    occlusion,
                    frame,
                );
            }

            draw_chasm_surface(
                x, span, voxel_y_real, voxel_height, chasm_depth, chasm_type, camera, shading,
                scene, occlusion, frame,
            );

            if chasm_face_is_visible(scene.grid, span.voxel_x, voxel_y, span.voxel_z, far_facing) {
                let far_u = far_wall_u(span.far_point, far_facing);
                draw_chasm_face(
                    x,
                    span,
                    span.far_point,
                    span.far_z,
                    far_u,
                    -far_facing.normal(),
                    voxel_y_real,
                    voxel_height,
                    chasm_depth,
                    texture,
                    chasm_type,
                    camera,
                    shading,
                    scene,
                    occlusion,
                    frame,
                );
            }
        }
        VoxelDefinition::Door { texture, door_type } => {
            let percent_open = scene
                .anim
                .door_open_percent(span.voxel_x, voxel_y, span.voxel_z);
            let hit = find_door_intersection(
                span.voxel_x,
                span.voxel_z,
                door_type,
                percent_open,
                span.facing,
                span.near_point,
                span.far_point,
                span.wall_u,
            );
            if let Some(hit) = hit {
                draw_door_hit(
                    x, span, &hit, door_type, percent_open, voxel_y_real, voxel_height, texture,
                    camera, shading, scene, occlusion, frame,
                );
            }
        }
    }
}

/// Draw the vertical stack of a cell: the eye-level voxel first, then
/// downward to the bottom of the grid, then upward to the top. The order
/// matters for the occlusion window, which closes from the middle out.
#[allow(clippy::too_many_arguments)]
fn draw_voxel_column(
    initial: bool,
    x: usize,
    span: &CellSpan,
    camera: &RayCamera,
    ray: &Ray,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    let adjusted_voxel_y = camera.adjusted_eye_voxel_y(scene.ceiling_height);
    let grid_height = scene.grid.height() as i32;

    let draw = |voxel_y: i32, rel: RelativeY, occlusion: &mut OcclusionData| {
        if initial {
            draw_initial_voxel(x, span, voxel_y, rel, camera, ray, shading, scene, occlusion, frame);
        } else {
            draw_voxel(x, span, voxel_y, rel, camera, ray, shading, scene, occlusion, frame);
        }
    };

    draw(adjusted_voxel_y, RelativeY::AtEye, occlusion);

    for voxel_y in (0..adjusted_voxel_y).rev() {
        draw(voxel_y, RelativeY::Below, occlusion);
    }

    for voxel_y in (adjusted_voxel_y + 1)..grid_height {
        draw(voxel_y, RelativeY::Above, occlusion);
    }
}

/// Cast one screen column's ray through the grid and draw everything it
/// touches, from the eye's own cell out to the fog distance.
pub fn ray_cast_2d(
    x: usize,
    camera: &RayCamera,
    ray: &Ray,
    shading: &ShadingInfo,
    scene: &VoxelScene,
    occlusion: &mut OcclusionData,
    frame: &FrameView,
) {
    // Floating point assumptions, same as any DDA on doubles:
    // value / 0.0 == inf, value / inf == 0.0.
    let dir_x_squared = ray.dir_x * ray.dir_x;
    let dir_z_squared = ray.dir_z * ray.dir_z;

    let delta_dist_x = (1.0 + (dir_z_squared / dir_x_squared)).sqrt();
    let delta_dist_z = (1.0 + (dir_x_squared / dir_z_squared)).sqrt();

    let non_negative_dir_x = ray.dir_x >= 0.0;
    let non_negative_dir_z = ray.dir_z >= 0.0;

    let (step_x, mut side_dist_x) = if non_negative_dir_x {
        (1, (camera.eye_voxel_real.x + 1.0 - camera.eye.x) * delta_dist_x)
    } else {
        (-1, (camera.eye.x - camera.eye_voxel_real.x) * delta_dist_x)
    };

    let (step_z, mut side_dist_z) = if non_negative_dir_z {
        (1, (camera.eye_voxel_real.z + 1.0 - camera.eye.z) * delta_dist_z)
    } else {
        (-1, (camera.eye.z - camera.eye_voxel_real.z) * delta_dist_z)
    };

    let grid = scene.grid;
    let mut voxel_is_valid = grid.contains_xz(camera.eye_voxel.x, camera.eye_voxel.z)
        && (camera.eye_voxel.y >= 0)
        && (camera.eye_voxel.y < grid.height() as i32);

    // First crossing distance and the face the ray leaves the eye cell by.
    let mut z_distance;
    let mut facing;
    if side_dist_x < side_dist_z {
        z_distance = side_dist_x;
        facing = if non_negative_dir_x {
            Facing2D::NegX
        } else {
            Facing2D::PosX
        };
    } else {
        z_distance = side_dist_z;
        facing = if non_negative_dir_z {
            Facing2D::NegZ
        } else {
            Facing2D::PosZ
        };
    }

    if voxel_is_valid {
        let initial_near_point = DVec2::new(
            camera.eye.x + (ray.dir_x * NEAR_PLANE),
            camera.eye.z + (ray.dir_z * NEAR_PLANE),
        );
        let initial_far_point = DVec2::new(
            camera.eye.x + (ray.dir_x * z_distance),
            camera.eye.z + (ray.dir_z * z_distance),
        );

        let span = CellSpan {
            voxel_x: camera.eye_voxel.x,
            voxel_z: camera.eye_voxel.z,
            facing,
            near_point: initial_near_point,
            far_point: initial_far_point,
            near_z: NEAR_PLANE,
            far_z: z_distance,
            wall_u: far_wall_u(initial_far_point, facing),
            wall_normal: -facing.normal(),
            light_contribution: get_light_contribution_at_point(
                initial_near_point,
                scene.lights,
                scene.light_list(camera.eye_voxel.x, camera.eye_voxel.z),
                1.0,
            ),
        };
        draw_voxel_column(true, x, &span, camera, ray, shading, scene, occlusion, frame);
    }

    let mut cell_x = camera.eye_voxel.x;
    let mut cell_z = camera.eye_voxel.z;

    // Step to the next XZ cell and recompute the crossing distance from
    // the voxel boundary; accumulating side distances would drift.
    let mut dda_step = |cell_x: &mut i32,
                        cell_z: &mut i32,
                        facing: &mut Facing2D,
                        voxel_is_valid: &mut bool,
                        z_distance: &mut f64,
                        side_dist_x: &mut f64,
                        side_dist_z: &mut f64| {
        if *side_dist_x < *side_dist_z {
            *side_dist_x += delta_dist_x;
            *cell_x += step_x;
            *facing = if non_negative_dir_x {
                Facing2D::NegX
            } else {
                Facing2D::PosX
            };
            *voxel_is_valid &= (*cell_x >= 0) && (*cell_x < grid.width() as i32);
        } else {
            *side_dist_z += delta_dist_z;
            *cell_z += step_z;
            *facing = if non_negative_dir_z {
                Facing2D::NegZ
            } else {
                Facing2D::PosZ
            };
            *voxel_is_valid &= (*cell_z >= 0) && (*cell_z < grid.depth() as i32);
        }

        let on_x_axis = (*facing == Facing2D::PosX) || (*facing == Facing2D::NegX);
        *z_distance = if on_x_axis {
            (*cell_x as f64 - camera.eye.x + ((1 - step_x) / 2) as f64) / ray.dir_x
        } else {
            (*cell_z as f64 - camera.eye.z + ((1 - step_z) / 2) as f64) / ray.dir_z
        };
    };

    // Leave the initial cell.
    dda_step(
        &mut cell_x,
        &mut cell_z,
        &mut facing,
        &mut voxel_is_valid,
        &mut z_distance,
        &mut side_dist_x,
        &mut side_dist_z,
    );

    // Walk until the grid is exited, the fog swallows everything, or the
    // column's occlusion window closes.
    while voxel_is_valid && (z_distance < shading.fog_distance) && !occlusion.is_closed() {
        let saved_cell_x = cell_x;
        let saved_cell_z = cell_z;
        let saved_facing = facing;
        let wall_distance = z_distance;

        dda_step(
            &mut cell_x,
            &mut cell_z,
            &mut facing,
            &mut voxel_is_valid,
            &mut z_distance,
            &mut side_dist_x,
            &mut side_dist_z,
        );

        let near_point = DVec2::new(
            camera.eye.x + (ray.dir_x * wall_distance),
            camera.eye.z + (ray.dir_z * wall_distance),
        );
        let far_point = DVec2::new(
            camera.eye.x + (ray.dir_x * z_distance),
            camera.eye.z + (ray.dir_z * z_distance),
        );

        let span = CellSpan {
            voxel_x: saved_cell_x,
            voxel_z: saved_cell_z,
            facing: saved_facing,
            near_point,
            far_point,
            near_z: wall_distance,
            far_z: z_distance,
            wall_u: crate::rendering::intersect::near_wall_u(near_point, saved_facing),
            wall_normal: saved_facing.normal(),
            light_contribution: get_light_contribution_at_point(
                near_point,
                scene.lights,
                scene.light_list(saved_cell_x, saved_cell_z),
                1.0,
            ),
        };
        draw_voxel_column(false, x, &span, camera, ray, shading, scene, occlusion, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::RayCamera;
    use crate::rendering::texture::{ChasmTextureGroups, VoxelTexture};
    use crate::voxel::{ChasmType, VoxelAnimState, VoxelGrid, VoxelTextureIds};
    use glam::DVec3;

    const WIDTH: usize = 64;
    const HEIGHT: usize = 48;

    fn solid_texture(argb: u32) -> VoxelTexture {
        VoxelTexture::from_argb(2, 2, &[argb; 4])
    }

    fn test_shading() -> ShadingInfo {
        // Single gray palette entry; full ambient, sun pointing straight
        // down so its clamped contribution is zero by the ambient cap.
        let palette = [DVec3::new(0.5, 0.5, 0.5)];
        ShadingInfo::new(&palette, 0.25, 0.0, 1.0, 100.0, false)
    }

    fn walled_box_grid() -> VoxelGrid {
        // 8x8 floor with a wall ring, eye space in the middle.
        let mut grid = VoxelGrid::new(8, 3, 8);
        let floor = grid.add_definition(VoxelDefinition::Floor { texture: 0 });
        let wall = grid.add_definition(VoxelDefinition::Wall {
            textures: VoxelTextureIds {
                side: 1,
                floor: 1,
                ceiling: 1,
            },
        });
        for x in 0..8 {
            for z in 0..8 {
                grid.set_id(x, 0, z, floor);
                let on_ring = x == 0 || x == 7 || z == 0 || z == 7;
                if on_ring {
                    grid.set_id(x, 1, z, wall);
                    grid.set_id(x, 2, z, wall);
                }
            }
        }
        grid
    }

    fn render_column(
        x: usize,
        grid: &VoxelGrid,
        color: &mut [u32],
        depth: &mut [f64],
    ) -> OcclusionData {
        let camera = RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        );
        let shading = test_shading();
        let anim = VoxelAnimState::new();
        let textures = vec![
            solid_texture(0xFF4080C0),
            solid_texture(0xFFC04040),
        ];
        let chasm_textures = ChasmTextureGroups::new();
        let lights = Vec::new();
        let scene = VoxelScene {
            grid,
            anim: &anim,
            textures: &textures,
            chasm_textures: &chasm_textures,
            chasm_anim_percent: 0.0,
            lights: &lights,
            light_lists: &[],
            ceiling_height: 1.0,
        };

        let frame = FrameView::new(color, depth, WIDTH, HEIGHT);
        let mut occlusion = OcclusionData::new(0, HEIGHT as i32);
        let ray = camera.column_ray((x as f64 + 0.50) / WIDTH as f64);
        ray_cast_2d(x, &camera, &ray, &shading, &scene, &mut occlusion, &frame);
        occlusion
    }

    #[test]
    fn center_column_hits_wall_and_floor() {
        let grid = walled_box_grid();
        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];

        let x = WIDTH / 2;
        render_column(x, &grid, &mut color, &mut depth);

        // Every pixel of the column must be written: wall ahead, floor
        // below, wall above the eye level on the ring.
        let written = (0..HEIGHT)
            .filter(|y| depth[x + y * WIDTH].is_finite())
            .count();
        assert!(
            written > HEIGHT / 2,
            "expected most of the column to be covered, got {} rows",
            written
        );

        // The wall straight ahead is 3 voxels away (eye at x=4.5, ring at
        // x=7), so mid-screen depth must be near 2.5.
        let mid_depth = depth[x + (HEIGHT / 2) * WIDTH];
        assert!(
            (mid_depth - 2.5).abs() < 0.1,
            "wall depth {} not near 2.5",
            mid_depth
        );
    }

    #[test]
    fn untouched_columns_stay_clear() {
        let grid = walled_box_grid();
        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];

        let x = 10;
        render_column(x, &grid, &mut color, &mut depth);

        for other_x in (0..WIDTH).filter(|&ox| ox != x) {
            for y in 0..HEIGHT {
                assert!(
                    depth[other_x + y * WIDTH].is_infinite(),
                    "column {} must not be touched when rendering column {}",
                    other_x,
                    x
                );
            }
        }
    }

    #[test]
    fn opaque_wall_closes_occlusion_behind_it() {
        // Full-height wall directly ahead: after the column, the occlusion
        // window should have shrunk from both ends (floor from below, wall
        // span in the middle).
        let mut grid = VoxelGrid::new(8, 3, 8);
        let wall = grid.add_definition(VoxelDefinition::Wall {
            textures: VoxelTextureIds {
                side: 1,
                floor: 1,
                ceiling: 1,
            },
        });
        for y in 0..3 {
            grid.set_id(6, y, 4, wall);
        }

        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];
        let occlusion = render_column(WIDTH / 2, &grid, &mut color, &mut depth);

        assert!(
            occlusion.is_closed(),
            "full-height wall stack should close the column window, got {:?}",
            occlusion
        );
    }

    #[test]
    fn fully_faded_wall_reads_as_air() {
        let mut grid = VoxelGrid::new(8, 3, 8);
        let wall = grid.add_definition(VoxelDefinition::Wall {
            textures: VoxelTextureIds {
                side: 1,
                floor: 1,
                ceiling: 1,
            },
        });
        grid.set_id(6, 1, 4, wall);

        let camera = RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        );
        let shading = test_shading();
        let mut anim = VoxelAnimState::new();
        anim.set_fade_percent(6, 1, 4, 1.0);
        let textures = vec![solid_texture(0xFF4080C0), solid_texture(0xFFC04040)];
        let chasm_textures = ChasmTextureGroups::new();
        let lights = Vec::new();
        let scene = VoxelScene {
            grid: &grid,
            anim: &anim,
            textures: &textures,
            chasm_textures: &chasm_textures,
            chasm_anim_percent: 0.0,
            lights: &lights,
            light_lists: &[],
            ceiling_height: 1.0,
        };

        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);
        let mut occlusion = OcclusionData::new(0, HEIGHT as i32);
        let x = WIDTH / 2;
        let ray = camera.column_ray((x as f64 + 0.50) / WIDTH as f64);
        ray_cast_2d(x, &camera, &ray, &shading, &scene, &mut occlusion, &frame);

        let mid_depth = depth[x + (HEIGHT / 2) * WIDTH];
        assert!(
            mid_depth.is_infinite(),
            "fully faded wall must not write depth, got {}",
            mid_depth
        );
    }

    #[test]
    fn chasm_surface_needs_registered_texture() {
        // A chasm with registered textures draws its surface below eye
        // level with finite depth.
        let mut grid = VoxelGrid::new(8, 3, 8);
        let chasm = grid.add_definition(VoxelDefinition::Chasm {
            texture: 0,
            chasm_type: ChasmType::Wet,
        });
        grid.set_id(6, 0, 4, chasm);

        let camera = RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        );
        let shading = test_shading();
        let anim = VoxelAnimState::new();
        let textures = vec![solid_texture(0x00000000)];
        let mut chasm_textures = ChasmTextureGroups::new();
        chasm_textures.add(
            ChasmType::Wet,
            crate::rendering::texture::ChasmTexture::from_argb(2, 2, &[0xFF2040A0; 4]),
        );
        let lights = Vec::new();
        let scene = VoxelScene {
            grid: &grid,
            anim: &anim,
            textures: &textures,
            chasm_textures: &chasm_textures,
            chasm_anim_percent: 0.0,
            lights: &lights,
            light_lists: &[],
            ceiling_height: 1.0,
        };

        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);
        let mut occlusion = OcclusionData::new(0, HEIGHT as i32);
        let x = WIDTH / 2;
        let ray = camera.column_ray((x as f64 + 0.50) / WIDTH as f64);
        ray_cast_2d(x, &camera, &ray, &shading, &scene, &mut occlusion, &frame);

        let written = (0..HEIGHT)
            .filter(|y| depth[x + y * WIDTH].is_finite())
            .count();
        assert!(written > 0, "chasm surface should write some pixels");
    }
}
