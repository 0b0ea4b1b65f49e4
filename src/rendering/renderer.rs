//! Top-level software renderer.
//!
//! Owns the depth buffer, occlusion columns, texture registries, light
//! registry and the worker pool, and drives the per-frame stage protocol:
//! clear, submit the frame to the pool, run visibility testing on the main
//! thread while workers draw the sky, hand off distant objects, sort flats
//! while workers draw voxel columns, hand off the flats, wait for the end.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use glam::{DVec2, DVec3};

use crate::camera::{RayCamera, FAR_PLANE, TALL_PIXEL_RATIO};
use crate::perf::PerfStats;
use crate::rendering::flats::{update_visible_flats, Entity, VisibleFlat};
use crate::rendering::framebuffer::{clear_frame, pack_color, FrameView, OcclusionData};
use crate::rendering::lights::{
    update_visible_light_lists, LightId, RenderLight, VisibleLight, VisibleLightList,
};
use crate::rendering::raycast::VoxelScene;
use crate::rendering::shading::ShadingInfo;
use crate::rendering::sky::{
    get_sky_gradient_projected_y_range, update_visible_distant_objects, DistantSky,
    SkyGradientCache, VisDistantObjects,
};
use crate::rendering::texture::{
    ChasmTexture, ChasmTextureGroups, FlatTexture, FlatTextureGroup, VoxelTexture,
};
use crate::rendering::threading::{FrameSetup, OcclusionView, RenderThreads, RenderThreadsMode};
use crate::voxel::{ChasmType, VoxelAnimState, VoxelGrid};

/// Registry slots below this are preallocated with placeholders.
const DEFAULT_VOXEL_TEXTURE_COUNT: usize = 64;

/// Reach of the synthetic light carried at the eye when it is enabled.
const PLAYER_LIGHT_RADIUS: f64 = 5.0;

fn placeholder_voxel_texture() -> VoxelTexture {
    VoxelTexture::from_argb(1, 1, &[0xFF000000])
}

pub struct SoftwareRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f64>,
    occlusion: Vec<OcclusionData>,
    sky_gradient_row_cache: Vec<DVec3>,
    voxel_textures: Vec<VoxelTexture>,
    flat_texture_groups: HashMap<usize, FlatTextureGroup>,
    chasm_textures: ChasmTextureGroups,
    distant_sky: DistantSky,
    sky_palette: Vec<DVec3>,
    lights: HashMap<LightId, RenderLight>,
    visible_lights: Vec<VisibleLight>,
    light_lists: Vec<VisibleLightList>,
    player_light_active: bool,
    vis_distant: VisDistantObjects,
    visible_flats: Vec<VisibleFlat>,
    anim: VoxelAnimState,
    threads: RenderThreads,
    threads_mode: RenderThreadsMode,
    night_lights_active: bool,
    fog_distance: f64,
    chasm_anim_percent: f64,
    stats: PerfStats,
}

impl SoftwareRenderer {
    pub fn new(width: usize, height: usize, threads_mode: RenderThreadsMode) -> Self {
        assert!(width > 0 && height > 0, "frame dimensions must be positive");

        let voxel_textures = (0..DEFAULT_VOXEL_TEXTURE_COUNT)
            .map(|_| placeholder_voxel_texture())
            .collect();

        Self {
            width,
            height,
            depth_buffer: vec![f64::INFINITY; width * height],
            occlusion: vec![OcclusionData::new(0, height as i32); width],
            sky_gradient_row_cache: vec![DVec3::ZERO; height],
            voxel_textures,
            flat_texture_groups: HashMap::new(),
            chasm_textures: ChasmTextureGroups::new(),
            distant_sky: DistantSky::default(),
            // Placeholder gray; real palettes come from `set_sky_palette`.
            sky_palette: vec![DVec3::splat(0.5)],
            lights: HashMap::new(),
            visible_lights: Vec::new(),
            light_lists: Vec::new(),
            player_light_active: false,
            vis_distant: VisDistantObjects::new(),
            visible_flats: Vec::new(),
            anim: VoxelAnimState::new(),
            threads: RenderThreads::new(width, height, threads_mode.thread_count()),
            threads_mode,
            night_lights_active: false,
            fog_distance: FAR_PLANE,
            chasm_anim_percent: 0.0,
            stats: PerfStats::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frame_stats(&self) -> &PerfStats {
        &self.stats
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        assert!(width > 0 && height > 0, "frame dimensions must be positive");
        self.width = width;
        self.height = height;
        self.depth_buffer = vec![f64::INFINITY; width * height];
        self.occlusion = vec![OcclusionData::new(0, height as i32); width];
        self.sky_gradient_row_cache = vec![DVec3::ZERO; height];

        // Restart the pool with partitions for the new dimensions.
        self.threads = RenderThreads::new(width, height, self.threads_mode.thread_count());
    }

    pub fn set_render_threads(&mut self, mode: RenderThreadsMode) {
        self.threads_mode = mode;
        self.threads = RenderThreads::new(self.width, self.height, mode.thread_count());
    }

    pub fn set_fog_distance(&mut self, fog_distance: f64) {
        debug_assert!(fog_distance > 0.0, "fog distance must be positive");
        self.fog_distance = fog_distance;
    }

    /// Register a voxel texture. The registry grows to fit the id; gaps are
    /// filled with opaque black placeholders.
    pub fn set_voxel_texture(&mut self, id: usize, texture: VoxelTexture) {
        if id >= self.voxel_textures.len() {
            self.voxel_textures
                .resize_with(id + 1, placeholder_voxel_texture);
        }
        self.voxel_textures[id] = texture;
        self.voxel_textures[id].set_night_lights_active(self.night_lights_active);
    }

    /// Register the animation frames of a flat for one state/angle pair.
    pub fn set_flat_texture_frames(
        &mut self,
        flat_index: usize,
        state: i32,
        angle: i32,
        textures: Vec<FlatTexture>,
    ) {
        self.flat_texture_groups
            .entry(flat_index)
            .or_default()
            .set_frames(state, angle, textures);
    }

    pub fn add_chasm_texture(&mut self, chasm_type: ChasmType, texture: ChasmTexture) {
        self.chasm_textures.add(chasm_type, texture);
    }

    pub fn set_distant_sky(&mut self, distant_sky: DistantSky) {
        self.distant_sky = distant_sky;
    }

    pub fn clear_distant_sky(&mut self) {
        self.distant_sky = DistantSky::default();
    }

    /// 0-1 progress through animated distant-land frame cycles.
    pub fn set_distant_anim_percent(&mut self, percent: f64) {
        self.distant_sky.anim_percent = percent;
    }

    /// 0-1 progress through the chasm texture cycle.
    pub fn set_chasm_anim_percent(&mut self, percent: f64) {
        self.chasm_anim_percent = percent;
    }

    /// Full day cycle of horizon-to-zenith colors, packed ARGB.
    pub fn set_sky_palette(&mut self, colors: &[u32]) {
        assert!(!colors.is_empty(), "sky palette may not be empty");
        self.sky_palette = colors
            .iter()
            .map(|&color| crate::rendering::framebuffer::unpack_color(color))
            .collect();
    }

    pub fn set_night_lights_active(&mut self, active: bool) {
        self.night_lights_active = active;
        for texture in &mut self.voxel_textures {
            texture.set_night_lights_active(active);
        }
    }

    /// Toggle the light source carried at the eye.
    pub fn set_player_light_active(&mut self, active: bool) {
        self.player_light_active = active;
    }

    pub fn add_light(&mut self, id: LightId, position: DVec3, radius: f64) {
        if self
            .lights
            .insert(id, RenderLight::new(position, radius))
            .is_some()
        {
            log::warn!("light {} re-added; replacing", id);
        }
    }

    pub fn update_light(&mut self, id: LightId, position: Option<DVec3>, radius: Option<f64>) {
        match self.lights.get_mut(&id) {
            Some(light) => {
                if let Some(position) = position {
                    light.position = position;
                }
                if let Some(radius) = radius {
                    light.radius = radius;
                }
            }
            None => log::warn!("update for unknown light {}", id),
        }
    }

    pub fn remove_light(&mut self, id: LightId) {
        if self.lights.remove(&id).is_none() {
            log::warn!("remove for unknown light {}", id);
        }
    }

    pub fn set_door_open_percent(&mut self, x: i32, y: i32, z: i32, percent: f64) {
        self.anim.set_door_open_percent(x, y, z, percent);
    }

    pub fn set_fade_percent(&mut self, x: i32, y: i32, z: i32, percent: f64) {
        self.anim.set_fade_percent(x, y, z, percent);
    }

    pub fn clear_textures(&mut self) {
        self.voxel_textures = (0..DEFAULT_VOXEL_TEXTURE_COUNT)
            .map(|_| placeholder_voxel_texture())
            .collect();
        self.flat_texture_groups.clear();
        self.chasm_textures = ChasmTextureGroups::new();
        self.distant_sky.textures.clear();
        self.distant_sky.sun_texture_index = None;
    }

    /// Gather the lights in fog range and scatter them into per-voxel-column
    /// lists, nearest-first so each column keeps its best contributors under
    /// the list cap.
    fn update_visible_lights(&mut self, eye: DVec3, grid: &VoxelGrid) {
        let eye_xz = DVec2::new(eye.x, eye.z);

        self.visible_lights.clear();
        for light in self.lights.values() {
            let light_xz = DVec2::new(light.position.x, light.position.z);
            let in_range = (light_xz - eye_xz).length() - light.radius < self.fog_distance;
            if in_range {
                self.visible_lights
                    .push(VisibleLight::new(light.position, light.radius));
            }
        }
        if self.player_light_active {
            self.visible_lights
                .push(VisibleLight::new(eye, PLAYER_LIGHT_RADIUS));
        }

        update_visible_light_lists(
            &self.visible_lights,
            grid.width(),
            grid.depth(),
            &mut self.light_lists,
        );
    }

    /// Render one frame into the caller's ARGB buffer.
    pub fn render(
        &mut self,
        eye: DVec3,
        forward: DVec3,
        fov_y: f64,
        ambient: f64,
        daytime_percent: f64,
        latitude: f64,
        parallax_sky: bool,
        ceiling_height: f64,
        grid: &VoxelGrid,
        entities: &[Entity],
        output: &mut [u32],
    ) {
        assert_eq!(
            output.len(),
            self.width * self.height,
            "output buffer size mismatch"
        );

        let frame_start = Instant::now();

        let aspect = self.width as f64 / self.height as f64;
        let camera = RayCamera::new(eye, forward, fov_y, aspect, TALL_PIXEL_RATIO);

        self.distant_sky.parallax = parallax_sky;
        let shading = ShadingInfo::new(
            &self.sky_palette,
            daytime_percent,
            latitude,
            ambient,
            self.fog_distance,
            self.night_lights_active,
        );

        // Start from fog color and infinite depth so pixels no stage covers
        // still read as distance haze.
        let clear_start = Instant::now();
        let fog = shading.fog_color();
        clear_frame(output, &mut self.depth_buffer, pack_color(fog.x, fog.y, fog.z));
        for occlusion in &mut self.occlusion {
            *occlusion = OcclusionData::new(0, self.height as i32);
        }
        self.stats.clear_us = clear_start.elapsed().as_secs_f64() * 1e6;

        self.update_visible_lights(eye, grid);

        let frame = FrameView::new(output, &mut self.depth_buffer, self.width, self.height);
        let occlusion_view = OcclusionView::new(&mut self.occlusion);
        let row_cache = SkyGradientCache::new(&mut self.sky_gradient_row_cache);
        let should_draw_stars = AtomicBool::new(false);
        let (gradient_proj_y_top, gradient_proj_y_bottom) =
            get_sky_gradient_projected_y_range(&camera);

        let scene = VoxelScene {
            grid,
            anim: &self.anim,
            textures: &self.voxel_textures,
            chasm_textures: &self.chasm_textures,
            chasm_anim_percent: self.chasm_anim_percent,
            lights: &self.visible_lights,
            light_lists: &self.light_lists,
            ceiling_height,
        };

        // Wake the pool; workers start on the sky gradient rows.
        self.threads.begin_frame(&FrameSetup {
            camera: &camera,
            shading: &shading,
            frame: &frame,
            gradient_proj_y_top,
            gradient_proj_y_bottom,
            row_cache: &row_cache,
            should_draw_stars: &should_draw_stars,
            sky_textures: &self.distant_sky.textures,
            scene: &scene,
            occlusion: occlusion_view,
        });

        // Distant object visibility overlaps the sky gradient stage.
        let vis_start = Instant::now();
        update_visible_distant_objects(
            &self.distant_sky,
            &shading,
            &camera,
            self.width,
            self.height,
            &mut self.vis_distant,
        );
        self.threads.signal_vis_tested(&self.vis_distant);

        // Flat visibility and the painter sort overlap the distant sky and
        // voxel stages.
        update_visible_flats(
            entities,
            &camera,
            ceiling_height,
            self.fog_distance,
            grid,
            &self.visible_lights,
            &self.light_lists,
            &mut self.visible_flats,
        );
        self.stats.vis_testing_us = vis_start.elapsed().as_secs_f64() * 1e6;

        let flat_normal = DVec3::new(-camera.forward_x, 0.0, -camera.forward_z).normalize();
        self.threads
            .signal_sorted(&self.visible_flats, &self.flat_texture_groups, flat_normal);
        self.threads.finish_frame();

        self.stats.total_us = frame_start.elapsed().as_secs_f64() * 1e6;
        self.stats.drawing_us =
            (self.stats.total_us - self.stats.clear_us - self.stats.vis_testing_us).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::framebuffer::rgb_to_u32;
    use crate::rendering::lights::MAX_LIGHTS_PER_LIST;
    use crate::voxel::{VoxelDefinition, VoxelTextureIds};

    const WIDTH: usize = 40;
    const HEIGHT: usize = 30;

    fn ring_grid() -> VoxelGrid {
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
                if x == 0 || x == 7 || z == 0 || z == 7 {
                    grid.set_id(x, 1, z, wall);
                    grid.set_id(x, 2, z, wall);
                }
            }
        }
        grid
    }

    fn test_renderer() -> SoftwareRenderer {
        let mut renderer = SoftwareRenderer::new(WIDTH, HEIGHT, RenderThreadsMode::VeryLow);
        renderer.set_fog_distance(50.0);
        renderer.set_sky_palette(&[rgb_to_u32(40, 60, 120)]);
        renderer.set_voxel_texture(0, VoxelTexture::from_argb(2, 2, &[0xFF808080; 4]));
        renderer.set_voxel_texture(1, VoxelTexture::from_argb(2, 2, &[0xFFC03030; 4]));
        renderer
    }

    fn render_once(renderer: &mut SoftwareRenderer, grid: &VoxelGrid, output: &mut [u32]) {
        renderer.render(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            1.0,
            0.25,
            0.0,
            false,
            1.0,
            grid,
            &[],
            output,
        );
    }

    #[test]
    fn frame_covers_wall_and_sky() {
        let grid = ring_grid();
        let mut renderer = test_renderer();
        let mut output = vec![0u32; WIDTH * HEIGHT];
        render_once(&mut renderer, &grid, &mut output);

        // Wall straight ahead lands mid-screen; its red must dominate.
        let center = output[WIDTH / 2 + (HEIGHT / 2) * WIDTH];
        let red = (center >> 16) & 0xFF;
        let blue = center & 0xFF;
        assert!(
            red > blue,
            "center pixel {:#010x} should be the red wall",
            center
        );

        // Above the wall top the sky gradient shows through, and the sky is
        // bluer than red.
        let sky = output[WIDTH / 2];
        let sky_red = (sky >> 16) & 0xFF;
        let sky_blue = sky & 0xFF;
        assert!(
            sky_blue > sky_red,
            "top pixel {:#010x} should be sky",
            sky
        );
    }

    #[test]
    fn fully_faded_wall_shows_what_is_behind() {
        let grid = ring_grid();
        let mut renderer = test_renderer();

        let mut before = vec![0u32; WIDTH * HEIGHT];
        render_once(&mut renderer, &grid, &mut before);

        // Fade out the wall voxels straight ahead at eye level and above.
        renderer.set_fade_percent(7, 1, 4, 1.0);
        renderer.set_fade_percent(7, 2, 4, 1.0);
        let mut after = vec![0u32; WIDTH * HEIGHT];
        render_once(&mut renderer, &grid, &mut after);

        let center = WIDTH / 2 + (HEIGHT / 2) * WIDTH;
        assert_ne!(
            before[center], after[center],
            "fading the wall away must change the center pixel"
        );
    }

    #[test]
    fn resize_changes_output_dimensions() {
        let grid = ring_grid();
        let mut renderer = test_renderer();
        renderer.resize(16, 12);
        assert_eq!((renderer.width(), renderer.height()), (16, 12));

        let mut output = vec![0u32; 16 * 12];
        renderer.render(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            1.0,
            0.25,
            0.0,
            false,
            1.0,
            &grid,
            &[],
            &mut output,
        );
        assert!(output.iter().any(|&c| c != 0), "resized frame still draws");
    }

    /// Midnight frame with no ambient term, so any brightness comes from the
    /// light registry.
    fn render_dark(renderer: &mut SoftwareRenderer, grid: &VoxelGrid, output: &mut [u32]) {
        renderer.render(
            DVec3::new(4.5, 1.5, 4.5),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            0.0,
            0.0,
            0.0,
            false,
            1.0,
            grid,
            &[],
            output,
        );
    }

    fn red_channel(color: u32) -> u32 {
        (color >> 16) & 0xFF
    }

    #[test]
    fn far_wall_keeps_its_light_when_many_lights_crowd_the_eye() {
        let grid = ring_grid();
        let mut renderer = test_renderer();

        // One light next to the wall straight ahead.
        renderer.add_light(0, DVec3::new(6.5, 1.5, 4.5), 3.0);
        let mut alone = vec![0u32; WIDTH * HEIGHT];
        render_dark(&mut renderer, &grid, &mut alone);

        let center = WIDTH / 2 + (HEIGHT / 2) * WIDTH;
        assert!(
            red_channel(alone[center]) > 60,
            "wall pixel {:#010x} should be lit by the adjacent light",
            alone[center]
        );

        // A full list cap of tiny lights at the eye, too short-ranged to
        // reach the wall's voxel column 2.5 units away. They must not evict
        // the wall's own light.
        for id in 1..=MAX_LIGHTS_PER_LIST as LightId {
            renderer.add_light(id, DVec3::new(4.5, 1.5, 4.5), 0.2);
        }
        let mut crowded = vec![0u32; WIDTH * HEIGHT];
        render_dark(&mut renderer, &grid, &mut crowded);

        assert_eq!(
            alone[center], crowded[center],
            "lights clustered at the eye changed a wall column they cannot reach"
        );
    }

    #[test]
    fn player_light_brightens_a_dark_scene() {
        let grid = ring_grid();
        let mut renderer = test_renderer();

        let mut dark = vec![0u32; WIDTH * HEIGHT];
        render_dark(&mut renderer, &grid, &mut dark);

        renderer.set_player_light_active(true);
        let mut lit = vec![0u32; WIDTH * HEIGHT];
        render_dark(&mut renderer, &grid, &mut lit);

        let center = WIDTH / 2 + (HEIGHT / 2) * WIDTH;
        assert!(
            red_channel(lit[center]) > red_channel(dark[center]),
            "player light should brighten the wall ahead ({:#010x} vs {:#010x})",
            lit[center],
            dark[center]
        );
    }

    #[test]
    fn light_registry_tolerates_unknown_ids() {
        let mut renderer = test_renderer();
        renderer.add_light(7, DVec3::new(4.0, 1.5, 4.0), 3.0);
        renderer.update_light(7, Some(DVec3::new(4.5, 1.5, 4.0)), None);
        renderer.update_light(99, None, Some(2.0));
        renderer.remove_light(7);
        renderer.remove_light(7);
        assert!(renderer.lights.is_empty());
    }
}
