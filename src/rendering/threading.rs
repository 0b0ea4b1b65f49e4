//! Persistent render worker pool.
//!
//! Workers are spawned once per resolution/thread-count change and park on a
//! condition variable between frames. A frame runs in fixed stages, each with
//! its own pixel partition so no two threads write the same index:
//!
//!   sky gradient (row ranges) -> distant sky (column ranges) ->
//!   voxel columns (interleaved by thread index) -> flats (column ranges)
//!
//! The main thread overlaps its own work with the pool: distant object
//! visibility testing runs during the sky gradient stage, flat visibility
//! and painter sorting during the distant sky and voxel stages. A counter
//! barrier ends each stage; the two hand-offs from the main thread
//! (`done_vis_testing`, `done_sorting`) gate the stages that consume its
//! results.

use std::collections::HashMap;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use glam::DVec3;

use crate::camera::RayCamera;
use crate::rendering::flats::{draw_flats, VisibleFlat};
use crate::rendering::framebuffer::{FrameView, OcclusionData};
use crate::rendering::lights::{VisibleLight, VisibleLightList};
use crate::rendering::raycast::{ray_cast_2d, VoxelScene};
use crate::rendering::shading::ShadingInfo;
use crate::rendering::sky::{
    draw_distant_sky, draw_sky_gradient, SkyGradientCache, VisDistantObjects,
};
use crate::rendering::texture::{ChasmTextureGroups, FlatTextureGroup, SkyTexture, VoxelTexture};
use crate::voxel::{VoxelAnimState, VoxelGrid};

/// Worker count as a fraction of the machine's logical cores.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderThreadsMode {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    Max,
}

impl RenderThreadsMode {
    pub fn thread_count(self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self {
            Self::VeryLow => 1,
            Self::Low => (cores / 4).max(1),
            Self::Medium => (cores / 2).max(1),
            Self::High => ((3 * cores) / 4).max(1),
            Self::VeryHigh => cores.saturating_sub(1).max(1),
            Self::Max => cores,
        }
    }
}

/// Shared view of the per-column occlusion windows.
///
/// Safety: the voxel stage assigns column `x` to worker `x % total_threads`,
/// so no two workers ever hold the same column.
#[derive(Copy, Clone)]
pub struct OcclusionView {
    len: usize,
    ptr: *mut OcclusionData,
}

unsafe impl Send for OcclusionView {}
unsafe impl Sync for OcclusionView {}

impl OcclusionView {
    pub fn new(columns: &mut [OcclusionData]) -> Self {
        Self {
            len: columns.len(),
            ptr: columns.as_mut_ptr(),
        }
    }

    /// # Safety
    /// `x < width`, and only the worker that owns column `x` may call this
    /// during the voxel stage.
    #[inline]
    pub unsafe fn column(&self, x: usize) -> &mut OcclusionData {
        debug_assert!(x < self.len);
        &mut *self.ptr.add(x)
    }
}

struct SkyGradientStage {
    threads_done: usize,
    project_y_top: f64,
    project_y_bottom: f64,
    row_cache: *const SkyGradientCache,
    should_draw_stars: *const AtomicBool,
}

struct DistantSkyStage {
    threads_done: usize,
    /// Set by the main thread once visible distant objects are ready.
    done_vis_testing: bool,
    vis: *const VisDistantObjects,
    sky_textures: *const SkyTexture,
    sky_texture_count: usize,
}

struct VoxelsStage {
    threads_done: usize,
    grid: *const VoxelGrid,
    anim: *const VoxelAnimState,
    textures: *const VoxelTexture,
    texture_count: usize,
    chasm_textures: *const ChasmTextureGroups,
    chasm_anim_percent: f64,
    lights: *const VisibleLight,
    light_count: usize,
    light_lists: *const VisibleLightList,
    light_list_count: usize,
    ceiling_height: f64,
    occlusion: OcclusionView,
}

struct FlatsStage {
    threads_done: usize,
    /// Set by the main thread once visible flats are painter-sorted.
    done_sorting: bool,
    visible_flats: *const VisibleFlat,
    visible_flat_count: usize,
    texture_groups: *const HashMap<usize, FlatTextureGroup>,
    flat_normal: DVec3,
}

/// Per-frame state shared with the pool. Pointers are installed by
/// `begin_frame` and the two signal methods, and are only dereferenced by
/// workers between `go` and the flats barrier.
struct RenderThreadData {
    total_threads: usize,
    go: bool,
    is_destructing: bool,
    camera: *const RayCamera,
    shading: *const ShadingInfo,
    frame: *const FrameView,
    sky_gradient: SkyGradientStage,
    distant_sky: DistantSkyStage,
    voxels: VoxelsStage,
    flats: FlatsStage,
}

// Safety: the raw pointers reference values the renderer keeps alive and
// unmoved for the duration of a frame; outside a frame they are never read.
unsafe impl Send for RenderThreadData {}

impl RenderThreadData {
    fn new() -> Self {
        Self {
            total_threads: 0,
            go: false,
            is_destructing: false,
            camera: std::ptr::null(),
            shading: std::ptr::null(),
            frame: std::ptr::null(),
            sky_gradient: SkyGradientStage {
                threads_done: 0,
                project_y_top: 0.0,
                project_y_bottom: 0.0,
                row_cache: std::ptr::null(),
                should_draw_stars: std::ptr::null(),
            },
            distant_sky: DistantSkyStage {
                threads_done: 0,
                done_vis_testing: false,
                vis: std::ptr::null(),
                sky_textures: std::ptr::null(),
                sky_texture_count: 0,
            },
            voxels: VoxelsStage {
                threads_done: 0,
                grid: std::ptr::null(),
                anim: std::ptr::null(),
                textures: std::ptr::null(),
                texture_count: 0,
                chasm_textures: std::ptr::null(),
                chasm_anim_percent: 0.0,
                lights: std::ptr::null(),
                light_count: 0,
                light_lists: std::ptr::null(),
                light_list_count: 0,
                ceiling_height: 1.0,
                occlusion: OcclusionView {
                    len: 0,
                    ptr: std::ptr::null_mut(),
                },
            },
            flats: FlatsStage {
                threads_done: 0,
                done_sorting: false,
                visible_flats: std::ptr::null(),
                visible_flat_count: 0,
                texture_groups: std::ptr::null(),
                flat_normal: DVec3::ZERO,
            },
        }
    }
}

struct RenderSync {
    data: Mutex<RenderThreadData>,
    condvar: Condvar,
}

impl RenderSync {
    /// A poisoned lock means another render thread panicked. The shared
    /// state is plain data, so keep going with it; the panic surfaces at
    /// join time.
    fn lock(&self) -> MutexGuard<'_, RenderThreadData> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, RenderThreadData>,
    ) -> MutexGuard<'a, RenderThreadData> {
        match self.condvar.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Everything a frame hands to the pool up front. Objects computed by the
/// main thread during the frame (visible distant objects, sorted flats) are
/// delivered later through `signal_vis_tested` and `signal_sorted`.
pub struct FrameSetup<'a> {
    pub camera: &'a RayCamera,
    pub shading: &'a ShadingInfo,
    pub frame: &'a FrameView,
    pub gradient_proj_y_top: f64,
    pub gradient_proj_y_bottom: f64,
    pub row_cache: &'a SkyGradientCache,
    pub should_draw_stars: &'a AtomicBool,
    pub sky_textures: &'a [SkyTexture],
    pub scene: &'a VoxelScene<'a>,
    pub occlusion: OcclusionView,
}

/// The worker pool. Created at init/resize time; frames are driven with
/// `begin_frame`, the two signal methods, and `finish_frame`, in that order.
pub struct RenderThreads {
    sync: Arc<RenderSync>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderThreads {
    pub fn new(width: usize, height: usize, thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let sync = Arc::new(RenderSync {
            data: Mutex::new(RenderThreadData::new()),
            condvar: Condvar::new(),
        });

        // Rounded block partition so every row and column is covered exactly
        // once at any resolution.
        let block_width = width as f64 / thread_count as f64;
        let block_height = height as f64 / thread_count as f64;

        let workers = (0..thread_count)
            .map(|i| {
                let start_x = ((i as f64) * block_width).round() as usize;
                let end_x = (((i + 1) as f64) * block_width).round() as usize;
                let start_y = ((i as f64) * block_height).round() as usize;
                let end_y = (((i + 1) as f64) * block_height).round() as usize;
                debug_assert!(end_x <= width);
                debug_assert!(end_y <= height);

                let sync = Arc::clone(&sync);
                std::thread::spawn(move || {
                    render_thread_loop(sync, i, start_x, end_x, start_y, end_y)
                })
            })
            .collect();

        log::debug!(
            "render pool: {} worker(s) for {}x{}",
            thread_count,
            width,
            height
        );

        Self { sync, workers }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Install the frame's shared state and wake the pool. The referenced
    /// values must stay alive and unmoved until `finish_frame` returns.
    pub fn begin_frame(&self, setup: &FrameSetup<'_>) {
        {
            let mut data = self.sync.lock();
            data.total_threads = self.workers.len();
            data.go = true;
            data.camera = setup.camera;
            data.shading = setup.shading;
            data.frame = setup.frame;
            data.sky_gradient = SkyGradientStage {
                threads_done: 0,
                project_y_top: setup.gradient_proj_y_top,
                project_y_bottom: setup.gradient_proj_y_bottom,
                row_cache: setup.row_cache,
                should_draw_stars: setup.should_draw_stars,
            };
            data.distant_sky = DistantSkyStage {
                threads_done: 0,
                done_vis_testing: false,
                vis: std::ptr::null(),
                sky_textures: setup.sky_textures.as_ptr(),
                sky_texture_count: setup.sky_textures.len(),
            };
            data.voxels = VoxelsStage {
                threads_done: 0,
                grid: setup.scene.grid,
                anim: setup.scene.anim,
                textures: setup.scene.textures.as_ptr(),
                texture_count: setup.scene.textures.len(),
                chasm_textures: setup.scene.chasm_textures,
                chasm_anim_percent: setup.scene.chasm_anim_percent,
                lights: setup.scene.lights.as_ptr(),
                light_count: setup.scene.lights.len(),
                light_lists: setup.scene.light_lists.as_ptr(),
                light_list_count: setup.scene.light_lists.len(),
                ceiling_height: setup.scene.ceiling_height,
                occlusion: setup.occlusion,
            };
            data.flats = FlatsStage {
                threads_done: 0,
                done_sorting: false,
                visible_flats: std::ptr::null(),
                visible_flat_count: 0,
                texture_groups: std::ptr::null(),
                flat_normal: DVec3::ZERO,
            };
        }
        self.sync.condvar.notify_all();
    }

    /// Wait for the sky gradient stage, then release the distant sky stage
    /// with the visible objects the main thread computed meanwhile. Also
    /// clears `go` so workers park again after this frame.
    pub fn signal_vis_tested(&self, vis: &VisDistantObjects) {
        let mut data = self.sync.lock();
        while data.sky_gradient.threads_done < data.total_threads {
            data = self.sync.wait(data);
        }
        data.go = false;
        data.distant_sky.done_vis_testing = true;
        data.distant_sky.vis = vis;
        drop(data);
        self.sync.condvar.notify_all();
    }

    /// Wait for the voxel stage, then release the flats stage with the
    /// painter-sorted flats.
    pub fn signal_sorted(
        &self,
        visible_flats: &[VisibleFlat],
        texture_groups: &HashMap<usize, FlatTextureGroup>,
        flat_normal: DVec3,
    ) {
        let mut data = self.sync.lock();
        while data.voxels.threads_done < data.total_threads {
            data = self.sync.wait(data);
        }
        data.flats.done_sorting = true;
        data.flats.visible_flats = visible_flats.as_ptr();
        data.flats.visible_flat_count = visible_flats.len();
        data.flats.texture_groups = texture_groups;
        data.flats.flat_normal = flat_normal;
        drop(data);
        self.sync.condvar.notify_all();
    }

    /// Block until the flats stage is done. After this returns the frame
    /// buffers are complete and the pointers installed by `begin_frame` are
    /// no longer read.
    pub fn finish_frame(&self) {
        let mut data = self.sync.lock();
        while data.flats.threads_done < data.total_threads {
            data = self.sync.wait(data);
        }
    }
}

impl Drop for RenderThreads {
    fn drop(&mut self) {
        {
            let mut data = self.sync.lock();
            data.go = true;
            data.is_destructing = true;
        }
        self.sync.condvar.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("render worker panicked");
            }
        }
    }
}

fn render_thread_loop(
    sync: Arc<RenderSync>,
    thread_index: usize,
    start_x: usize,
    end_x: usize,
    start_y: usize,
    end_y: usize,
) {
    loop {
        // Park until the next frame (or shutdown).
        let mut data = sync.lock();
        while !data.go {
            data = sync.wait(data);
        }
        if data.is_destructing {
            break;
        }

        let total_threads = data.total_threads;

        // Safety: the renderer keeps every pointed-to value alive and
        // unmoved from `begin_frame` until `finish_frame` returns, and this
        // worker only uses them inside that window.
        let camera = unsafe { &*data.camera };
        let shading = unsafe { &*data.shading };
        let frame = unsafe { &*data.frame };
        let gradient_top = data.sky_gradient.project_y_top;
        let gradient_bottom = data.sky_gradient.project_y_bottom;
        let row_cache = unsafe { &*data.sky_gradient.row_cache };
        let should_draw_stars = unsafe { &*data.sky_gradient.should_draw_stars };
        let sky_textures = unsafe {
            slice::from_raw_parts(
                data.distant_sky.sky_textures,
                data.distant_sky.sky_texture_count,
            )
        };
        let scene = unsafe {
            VoxelScene {
                grid: &*data.voxels.grid,
                anim: &*data.voxels.anim,
                textures: slice::from_raw_parts(data.voxels.textures, data.voxels.texture_count),
                chasm_textures: &*data.voxels.chasm_textures,
                chasm_anim_percent: data.voxels.chasm_anim_percent,
                lights: slice::from_raw_parts(data.voxels.lights, data.voxels.light_count),
                light_lists: slice::from_raw_parts(
                    data.voxels.light_lists,
                    data.voxels.light_list_count,
                ),
                ceiling_height: data.voxels.ceiling_height,
            }
        };
        let occlusion = data.voxels.occlusion;
        drop(data);

        draw_sky_gradient(
            start_y,
            end_y,
            gradient_top,
            gradient_bottom,
            row_cache,
            should_draw_stars,
            shading,
            frame,
        );

        // Wait for the main thread's distant object visibility results.
        let mut data = sync.lock();
        data.sky_gradient.threads_done += 1;
        if data.sky_gradient.threads_done == total_threads {
            sync.condvar.notify_all();
        }
        while !data.distant_sky.done_vis_testing {
            data = sync.wait(data);
        }
        let vis = unsafe { &*data.distant_sky.vis };
        drop(data);

        // All gradient rows are written, so the star gate is final.
        let stars_visible = should_draw_stars.load(Ordering::Relaxed);

        draw_distant_sky(
            start_x,
            end_x,
            vis,
            sky_textures,
            row_cache,
            stars_visible,
            shading,
            frame,
        );

        // Counter barrier: voxel columns interleave across every worker's
        // X range, so none may start until the distant sky is done.
        {
            let mut data = sync.lock();
            data.distant_sky.threads_done += 1;
            if data.distant_sky.threads_done == total_threads {
                sync.condvar.notify_all();
            } else {
                while data.distant_sky.threads_done < total_threads {
                    data = sync.wait(data);
                }
            }
        }

        // Interleaved columns spread the cost of expensive columns evenly.
        let mut x = thread_index;
        while x < frame.width {
            let ray = camera.column_ray((x as f64 + 0.50) / frame.width_real);
            // Safety: this worker is the only one assigned column x.
            let column_occlusion = unsafe { occlusion.column(x) };
            ray_cast_2d(x, camera, &ray, shading, &scene, column_occlusion, frame);
            x += total_threads;
        }

        // Wait for the main thread's painter-sorted flats.
        let mut data = sync.lock();
        data.voxels.threads_done += 1;
        if data.voxels.threads_done == total_threads {
            sync.condvar.notify_all();
        }
        while !data.flats.done_sorting {
            data = sync.wait(data);
        }
        let visible_flats = unsafe {
            slice::from_raw_parts(data.flats.visible_flats, data.flats.visible_flat_count)
        };
        let texture_groups = unsafe { &*data.flats.texture_groups };
        let flat_normal = data.flats.flat_normal;
        drop(data);

        draw_flats(
            start_x,
            end_x,
            camera,
            flat_normal,
            visible_flats,
            texture_groups,
            row_cache,
            shading,
            frame,
        );

        let mut data = sync.lock();
        data.flats.threads_done += 1;
        if data.flats.threads_done == total_threads {
            sync.condvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::framebuffer::rgb_to_u32;
    use crate::rendering::sky::get_sky_gradient_projected_y_range;
    use crate::voxel::{VoxelDefinition, VoxelTextureIds};
    use glam::DVec3;

    #[test]
    fn every_mode_yields_at_least_one_thread() {
        let modes = [
            RenderThreadsMode::VeryLow,
            RenderThreadsMode::Low,
            RenderThreadsMode::Medium,
            RenderThreadsMode::High,
            RenderThreadsMode::VeryHigh,
            RenderThreadsMode::Max,
        ];
        for mode in modes {
            assert!(
                mode.thread_count() >= 1,
                "{:?} must give at least one worker",
                mode
            );
        }
        assert_eq!(RenderThreadsMode::VeryLow.thread_count(), 1);
    }

    #[test]
    fn occlusion_view_addresses_distinct_columns() {
        let mut columns = vec![OcclusionData::new(0, 100); 8];
        let view = OcclusionView::new(&mut columns);

        unsafe {
            view.column(3).update(0, 40);
            view.column(5).update(60, 100);
        }

        assert_eq!(columns[3], OcclusionData::new(40, 100));
        assert_eq!(columns[5], OcclusionData::new(0, 60));
        assert_eq!(columns[0], OcclusionData::new(0, 100), "other columns untouched");
    }

    // Drives the whole stage protocol with a wall-ring world and checks the
    // pool terminates with every pixel written.
    #[test]
    fn pool_completes_a_frame_without_deadlock() {
        const WIDTH: usize = 32;
        const HEIGHT: usize = 24;

        let mut grid = VoxelGrid::new(6, 3, 6);
        let wall = grid.add_definition(VoxelDefinition::Wall {
            textures: VoxelTextureIds {
                side: 0,
                floor: 0,
                ceiling: 0,
            },
        });
        for x in 0..6 {
            for z in 0..6 {
                let on_ring = x == 0 || x == 5 || z == 0 || z == 5;
                if on_ring {
                    for y in 0..3 {
                        grid.set_id(x, y, z, wall);
                    }
                }
            }
        }

        let camera = RayCamera::new(
            DVec3::new(3.0, 1.5, 3.0),
            DVec3::new(1.0, 0.0, 0.0),
            90.0_f64.to_radians(),
            WIDTH as f64 / HEIGHT as f64,
            1.0,
        );
        let palette = [DVec3::new(0.4, 0.5, 0.8)];
        let shading = ShadingInfo::new(&palette, 0.25, 0.0, 1.0, 50.0, false);
        let anim = VoxelAnimState::new();
        let textures = vec![VoxelTexture::from_argb(2, 2, &[0xFFD0D0D0; 4])];
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
        let mut depth = vec![0.0f64; WIDTH * HEIGHT];
        crate::rendering::framebuffer::clear_frame(&mut color, &mut depth, rgb_to_u32(0, 0, 0));
        let frame = FrameView::new(&mut color, &mut depth, WIDTH, HEIGHT);

        let mut occlusion_columns = vec![OcclusionData::new(0, HEIGHT as i32); WIDTH];
        let occlusion = OcclusionView::new(&mut occlusion_columns);

        let mut gradient_rows = vec![DVec3::ZERO; HEIGHT];
        let row_cache = SkyGradientCache::new(&mut gradient_rows);
        let should_draw_stars = AtomicBool::new(false);
        let (gradient_top, gradient_bottom) = get_sky_gradient_projected_y_range(&camera);

        let sky_textures: Vec<SkyTexture> = Vec::new();
        let pool = RenderThreads::new(WIDTH, HEIGHT, 3);
        pool.begin_frame(&FrameSetup {
            camera: &camera,
            shading: &shading,
            frame: &frame,
            gradient_proj_y_top: gradient_top,
            gradient_proj_y_bottom: gradient_bottom,
            row_cache: &row_cache,
            should_draw_stars: &should_draw_stars,
            sky_textures: &sky_textures,
            scene: &scene,
            occlusion,
        });

        let vis = VisDistantObjects::new();
        pool.signal_vis_tested(&vis);

        let visible_flats: Vec<VisibleFlat> = Vec::new();
        let texture_groups = HashMap::new();
        pool.signal_sorted(&visible_flats, &texture_groups, DVec3::X);
        pool.finish_frame();
        drop(pool);

        // Sky above and wall ahead must both have landed: finite depth at
        // the wall, infinite at the sky rows.
        let center = WIDTH / 2 + (HEIGHT / 2) * WIDTH;
        assert!(
            depth[center].is_finite(),
            "wall ahead must write finite depth, got {}",
            depth[center]
        );
        assert!(
            depth[WIDTH / 2].is_infinite(),
            "top sky row keeps infinite depth"
        );
        assert_ne!(color[WIDTH / 2], 0, "sky rows must be colored");
    }
}
