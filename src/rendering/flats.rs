//! Flat (billboard sprite) rendering. Flats always face the camera in the
//! XZ plane; visibility, screen extents, and painter order are resolved
//! once per frame, then workers draw disjoint X ranges.

use crate::camera::{
    get_lower_bounded_pixel, get_upper_bounded_pixel, RayCamera, FAR_PLANE, NEAR_PLANE,
};
use crate::math::{self, JUST_BELOW_ONE};
use crate::rendering::framebuffer::{pack_color, unpack_color, FrameView};
use crate::rendering::lights::{
    column_light_list, get_light_contribution_at_point, VisibleLight, VisibleLightList,
};
use crate::rendering::shading::ShadingInfo;
use crate::rendering::sky::SkyGradientCache;
use crate::rendering::texture::{FlatTexture, FlatTextureGroup};
use crate::voxel::{VoxelDefinition, VoxelGrid};
use glam::{DVec2, DVec3, DVec4};
use std::collections::HashMap;

/// An entity that renders as a flat. `direction` is `None` for static
/// entities, which use the same texture list regardless of view angle.
pub struct Entity {
    pub position: DVec2,
    /// Key into the flat texture groups.
    pub flat_index: usize,
    pub width: f64,
    pub height: f64,
    /// World-space offset of the flat's base above the ground.
    pub y_offset: f64,
    /// Animation state key into the texture group.
    pub state: i32,
    /// Facing of a dynamic entity in the XZ plane.
    pub direction: Option<DVec2>,
    /// Number of view-angle texture lists for this entity's state.
    pub angle_count: usize,
    /// 0-1 progress through the current animation loop.
    pub anim_percent: f64,
}

/// A flat that survived culling, with its corners and screen extents
/// resolved. `z` is the camera-space depth used for painter sorting only.
pub struct VisibleFlat {
    pub flat_index: usize,
    pub state: i32,
    pub angle_index: i32,
    pub anim_percent: f64,
    pub top_left: DVec3,
    pub top_right: DVec3,
    pub bottom_left: DVec3,
    pub bottom_right: DVec3,
    /// Screen-fraction extents; X can extend past [0, 1] when the flat is
    /// partially off-screen.
    pub start_x: f64,
    pub end_x: f64,
    pub start_y: f64,
    pub end_y: f64,
    pub z: f64,
    pub light_contribution: f64,
}

/// View angle of a dynamic entity relative to the camera, in radians. The
/// difference vector between the entity's facing and the direction toward
/// the eye picks which of its angle lists to show.
fn entity_anim_angle(entity: &Entity, eye: DVec2) -> f64 {
    match entity.direction {
        None => 0.0,
        Some(entity_dir) => {
            let diff_dir = (eye - entity.position).normalize();
            let result_dir = entity_dir - diff_dir;
            let result_angle =
                std::f64::consts::PI + math::full_atan2(result_dir.y, result_dir.x);

            // Bias so the final direction is centered within its angle range.
            let angle_bias = (math::TWO_PI / entity.angle_count as f64) * 0.50;
            (result_angle + angle_bias) % math::TWO_PI
        }
    }
}

/// Cull entities against the camera and fog, project the survivors, and
/// sort them farthest to nearest so transparency layers correctly.
#[allow(clippy::too_many_arguments)]
pub fn update_visible_flats(
    entities: &[Entity],
    camera: &RayCamera,
    ceiling_height: f64,
    fog_distance: f64,
    grid: &VoxelGrid,
    lights: &[VisibleLight],
    light_lists: &[VisibleLightList],
    out: &mut Vec<VisibleFlat>,
) {
    out.clear();

    // Every flat shares the same axes, facing opposite the camera.
    let flat_forward = DVec3::new(-camera.forward_x, 0.0, -camera.forward_z).normalize();
    let flat_up = DVec3::Y;
    let flat_right = flat_forward.cross(flat_up).normalize();

    let eye_2d = DVec2::new(camera.eye.x, camera.eye.z);
    let camera_dir = DVec2::new(camera.forward_x, camera.forward_z);

    for entity in entities {
        let anim_angle = entity_anim_angle(entity, eye_2d);
        let angle_percent = (anim_angle / math::TWO_PI).clamp(0.0, JUST_BELOW_ONE);
        let angle_index = (((entity.angle_count as f64) * angle_percent) as i32)
            .clamp(0, entity.angle_count.saturating_sub(1) as i32);

        let flat_half_width = entity.width * 0.50;

        // Entities on a raised platform stand on top of it.
        let raised_platform_y_offset = {
            let voxel_x = entity.position.x as i32;
            let voxel_z = entity.position.y as i32;
            match grid.get(voxel_x, 1, voxel_z) {
                VoxelDefinition::Raised {
                    y_offset, y_size, ..
                } => (y_offset + y_size) * ceiling_height,
                _ => 0.0,
            }
        };

        // Bottom center of the flat.
        let flat_position = DVec3::new(
            entity.position.x,
            ceiling_height + entity.y_offset + raised_platform_y_offset,
            entity.position.y,
        );
        let flat_position_2d = DVec2::new(flat_position.x, flat_position.z);

        let flat_eye_diff = flat_position_2d - eye_2d;
        let flat_eye_diff_len = flat_eye_diff.length();
        let flat_eye_dir = flat_eye_diff / flat_eye_diff_len;
        let in_front_of_camera = camera_dir.dot(flat_eye_dir) > 0.0;

        // Treat the flat as a cylinder against the fog circle; can't use
        // squared distances here since a^2 - b^2 != (a - b)^2.
        let flat_eye_cylinder_dist = flat_eye_diff_len - flat_half_width;
        let in_fog_distance = flat_eye_cylinder_dist < fog_distance;

        if !in_front_of_camera || !in_fog_distance {
            continue;
        }

        let flat_right_scaled = flat_right * flat_half_width;
        let flat_up_scaled = flat_up * entity.height;

        let bottom_left = flat_position + flat_right_scaled;
        let bottom_right = flat_position - flat_right_scaled;
        let top_left = bottom_left + flat_up_scaled;
        let top_right = bottom_right + flat_up_scaled;

        // Project two opposing corners. Z is only used for sorting.
        let proj_start = {
            let p = camera.transform * DVec4::new(top_left.x, top_left.y, top_left.z, 1.0);
            p / p.w
        };
        let proj_end = {
            let p =
                camera.transform * DVec4::new(bottom_right.x, bottom_right.y, bottom_right.z, 1.0);
            p / p.w
        };

        let start_x = 0.50 + (proj_start.x * 0.50);
        let end_x = 0.50 + (proj_end.x * 0.50);
        let start_y = (0.50 + camera.y_shear) - (proj_start.y * 0.50);
        let end_y = (0.50 + camera.y_shear) - (proj_end.y * 0.50);
        let z = proj_start.z;

        let in_screen_x = (start_x < 1.0) && (end_x > 0.0);
        let in_screen_y = (start_y < 1.0) && (end_y > 0.0);
        let in_planes = (z >= NEAR_PLANE) && (z <= FAR_PLANE);

        if in_screen_x && in_screen_y && in_planes {
            // Flats share the light list of the voxel column they stand in.
            let light_list = column_light_list(
                light_lists,
                grid.width(),
                flat_position.x.floor() as i32,
                flat_position.z.floor() as i32,
            );
            let light_contribution =
                get_light_contribution_at_point(flat_position_2d, lights, light_list, 1.0);

            out.push(VisibleFlat {
                flat_index: entity.flat_index,
                state: entity.state,
                angle_index,
                anim_percent: entity.anim_percent,
                top_left,
                top_right,
                bottom_left,
                bottom_right,
                start_x,
                end_x,
                start_y,
                end_y,
                z,
                light_contribution,
            });
        }
    }

    // Painter sort, farthest first.
    out.sort_unstable_by(|a, b| b.z.total_cmp(&a.z));
}

/// Draw one flat's columns inside [start_x, end_x). Depth is the true XZ
/// distance per column, tested without epsilon so flats layer against
/// walls exactly. Reflective texels show the sky gradient behind the
/// camera's horizon row instead of their own color (puddles).
#[allow(clippy::too_many_arguments)]
pub fn draw_flat(
    start_x: usize,
    end_x: usize,
    flat: &VisibleFlat,
    normal: DVec3,
    eye: DVec2,
    texture: &FlatTexture,
    row_cache: &SkyGradientCache,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let light_normal_dot = shading.sun_direction.dot(normal).max(0.0);
    let sun_component = (shading.sun_color * light_normal_dot)
        .clamp(DVec3::ZERO, DVec3::splat(1.0 - shading.ambient));

    let start_x_percent = (start_x as f64 + 0.50) / frame.width_real;
    let end_x_percent = (end_x as f64 + 0.50) / frame.width_real;

    let starts_in_range = (flat.start_x >= start_x_percent) && (flat.start_x <= end_x_percent);
    let ends_in_range = (flat.end_x >= start_x_percent) && (flat.end_x <= end_x_percent);
    let covers_range = (flat.start_x <= start_x_percent) && (flat.end_x >= end_x_percent);

    if !starts_in_range && !ends_in_range && !covers_range {
        return;
    }

    let clamped_start_x_percent = start_x_percent.clamp(flat.start_x, flat.end_x);
    let clamped_end_x_percent = end_x_percent.clamp(flat.start_x, flat.end_x);

    let start_flat_percent =
        (clamped_start_x_percent - flat.start_x) / (flat.end_x - flat.start_x);
    let end_flat_percent = (clamped_end_x_percent - flat.start_x) / (flat.end_x - flat.start_x);

    // Points interpolated between for per-column depth in the XZ plane.
    let start_top_point = flat.top_left.lerp(flat.top_right, start_flat_percent);
    let end_top_point = flat.top_left.lerp(flat.top_right, end_flat_percent);

    // A flat percent of exactly 1.0 would sample past the texture edge.
    let start_u = start_flat_percent.clamp(0.0, JUST_BELOW_ONE);
    let end_u = end_flat_percent.clamp(0.0, JUST_BELOW_ONE);

    let projected_x_start = clamped_start_x_percent * frame.width_real;
    let projected_x_end = clamped_end_x_percent * frame.width_real;
    let projected_y_start = flat.start_y * frame.height_real;
    let projected_y_end = flat.end_y * frame.height_real;

    let x_pixel_start = get_lower_bounded_pixel(projected_x_start, frame.width);
    let x_pixel_end = get_upper_bounded_pixel(projected_x_end, frame.width);
    let y_pixel_start = get_lower_bounded_pixel(projected_y_start, frame.height);
    let y_pixel_end = get_upper_bounded_pixel(projected_y_end, frame.height);

    let boost = flat.light_contribution;
    let face_shading = DVec3::new(
        shading.ambient + sun_component.x + boost,
        shading.ambient + sun_component.y + boost,
        shading.ambient + sun_component.z + boost,
    );

    let fog_color = shading.fog_color();

    for x in x_pixel_start..x_pixel_end {
        let x_percent =
            ((x as f64 + 0.50) - projected_x_start) / (projected_x_end - projected_x_start);
        let u = start_u + ((end_u - start_u) * x_percent);
        let u_sample = if texture.flipped { JUST_BELOW_ONE - u } else { u };
        let texture_x = (u_sample * texture.width as f64) as usize;

        let top_point = start_top_point.lerp(end_top_point, x_percent);

        // True XZ distance for the depth.
        let depth = (DVec2::new(top_point.x, top_point.z) - eye).length();
        let fog_percent = (depth / shading.fog_distance).min(1.0);

        for y in y_pixel_start..y_pixel_end {
            let index = x as usize + (y as usize * frame.width);

            // SAFETY: each worker owns its X range during this stage.
            unsafe {
                if depth <= frame.get_depth(index) {
                    let y_percent =
                        ((y as f64 + 0.50) - projected_y_start) / (projected_y_end - projected_y_start);
                    let v = JUST_BELOW_ONE * y_percent;
                    let texture_y = (v * texture.height as f64) as usize;

                    let texel = texture.sample(texture_x, texture_y);
                    if texel.a <= 0.0 {
                        continue;
                    }

                    let mut color = if texel.a < 1.0 {
                        // Partial alpha dims whatever is already in the
                        // frame (shadow blobs, ghost edges).
                        let prev_color = unpack_color(frame.get_color(index));
                        let vis_percent = (1.0 - texel.a).clamp(0.0, 1.0);
                        prev_color * vis_percent
                    } else if texture.reflective {
                        row_cache.get(y as usize)
                    } else {
                        DVec3::new(texel.r, texel.g, texel.b)
                            * face_shading.min(DVec3::ONE)
                    };

                    color += (fog_color - color) * fog_percent;

                    frame.set_color(index, pack_color(color.x, color.y, color.z));
                    frame.set_depth(index, depth);
                }
            }
        }
    }
}

/// Draw every visible flat within the worker's X range, in painter order.
#[allow(clippy::too_many_arguments)]
pub fn draw_flats(
    start_x: usize,
    end_x: usize,
    camera: &RayCamera,
    flat_normal: DVec3,
    visible_flats: &[VisibleFlat],
    flat_texture_groups: &HashMap<usize, FlatTextureGroup>,
    row_cache: &SkyGradientCache,
    shading: &ShadingInfo,
    frame: &FrameView,
) {
    let eye = DVec2::new(camera.eye.x, camera.eye.z);

    for flat in visible_flats {
        let Some(group) = flat_texture_groups.get(&flat.flat_index) else {
            log::warn!("no flat texture group for index {}", flat.flat_index);
            continue;
        };

        let Some(texture) =
            group.get_frame_by_percent(flat.state, flat.angle_index, flat.anim_percent)
        else {
            log::warn!(
                "no flat textures for index {} state {} angle {}",
                flat.flat_index,
                flat.state,
                flat.angle_index
            );
            continue;
        };

        draw_flat(
            start_x, end_x, flat, flat_normal, eye, texture, row_cache, shading, frame,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::texture::FlatTexture;

    const WIDTH: usize = 64;
    const HEIGHT: usize = 48;

    fn test_camera() -> RayCamera {
        RayCamera::new(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        )
    }

    fn test_entity(position: DVec2) -> Entity {
        Entity {
            position,
            flat_index: 0,
            width: 0.8,
            height: 1.0,
            y_offset: 0.0,
            state: 0,
            direction: None,
            angle_count: 1,
            anim_percent: 0.0,
        }
    }

    fn update(entities: &[Entity]) -> Vec<VisibleFlat> {
        let camera = test_camera();
        let grid = VoxelGrid::new(16, 3, 16);
        let lights = Vec::new();
        let mut out = Vec::new();
        update_visible_flats(
            entities,
            &camera,
            1.0,
            30.0,
            &grid,
            &lights,
            &[],
            &mut out,
        );
        out
    }

    #[test]
    fn flat_behind_camera_is_culled() {
        let visible = update(&[
            test_entity(DVec2::new(8.5, 4.5)),
            test_entity(DVec2::new(1.5, 4.5)),
        ]);
        assert_eq!(
            visible.len(),
            1,
            "only the flat in front of the camera survives"
        );
    }

    #[test]
    fn flat_past_fog_distance_is_culled() {
        let camera = test_camera();
        let grid = VoxelGrid::new(128, 3, 128);
        let lights = Vec::new();
        let mut out = Vec::new();
        let entities = [test_entity(DVec2::new(100.5, 4.5))];
        update_visible_flats(
            &entities, &camera, 1.0, 10.0, &grid, &lights, &[], &mut out,
        );
        assert!(out.is_empty(), "flat past the fog distance must be culled");
    }

    #[test]
    fn visible_flats_sort_far_to_near() {
        let visible = update(&[
            test_entity(DVec2::new(6.5, 4.5)),
            test_entity(DVec2::new(10.5, 4.5)),
            test_entity(DVec2::new(8.5, 4.5)),
        ]);
        assert_eq!(visible.len(), 3);
        for pair in visible.windows(2) {
            assert!(
                pair[0].z >= pair[1].z,
                "flats must sort farthest to nearest, got z {} before {}",
                pair[0].z,
                pair[1].z
            );
        }
    }

    #[test]
    fn flat_writes_color_and_depth() {
        let camera = test_camera();
        let shading = {
            let palette = [DVec3::new(0.5, 0.6, 0.7)];
            ShadingInfo::new(&palette, 0.25, 0.0, 1.0, 100.0, false)
        };

        let visible = update(&[test_entity(DVec2::new(6.5, 4.5))]);
        assert_eq!(visible.len(), 1);

        let mut groups = HashMap::new();
        let mut group = FlatTextureGroup::new();
        group.set_frames(0, 0, vec![FlatTexture::from_argb(2, 2, &[0xFFC08040; 4], false)]);
        groups.insert(0, group);

        let mut color = vec![0u32; WIDTH * HEIGHT];
        let mut depth = vec![f64::INFINITY; WIDTH * HEIGHT];
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);

        let mut rows = vec![DVec3::ZERO; HEIGHT];
        let cache = SkyGradientCache::new(&mut rows);

        let flat_normal = DVec3::new(-camera.forward_x, 0.0, -camera.forward_z).normalize();
        draw_flats(
            0, WIDTH, &camera, flat_normal, &visible, &groups, &cache, &shading, &frame,
        );

        let written = depth.iter().filter(|d| d.is_finite()).count();
        assert!(
            written > 0,
            "a flat two voxels ahead must cover some pixels"
        );
    }
}
