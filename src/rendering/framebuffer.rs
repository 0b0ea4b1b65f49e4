/// Frame output buffers and per-column occlusion bookkeeping.
///
/// The color buffer is caller-owned ARGB32; the depth buffer is f64 to match
/// the double-precision ray math. Worker threads write through a shared
/// `FrameView` of raw pointers; each render stage partitions pixels so no
/// two threads ever touch the same index.
use crate::camera::{get_lower_bounded_pixel, get_upper_bounded_pixel, RayCamera};
use glam::DVec3;

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{
    _mm256_set1_epi32, _mm256_set1_pd, _mm256_storeu_pd, _mm256_storeu_si256, _mm_set1_epi32,
    _mm_set1_pd, _mm_storeu_pd, _mm_storeu_si128,
};

/// Projected and pixel bounds of one vertical span in a column.
/// `y_start`/`y_end` are clamped to the frame; the projected values keep
/// their unclamped precision so texture rows interpolate correctly even
/// when the span pokes off-screen.
#[derive(Copy, Clone, Debug)]
pub struct DrawRange {
    pub y_proj_start: f64,
    pub y_proj_end: f64,
    pub y_start: i32,
    pub y_end: i32,
}

impl DrawRange {
    #[inline]
    pub fn new(y_proj_start: f64, y_proj_end: f64, y_start: i32, y_end: i32) -> Self {
        debug_assert!(y_start <= y_end);
        Self {
            y_proj_start,
            y_proj_end,
            y_start,
            y_end,
        }
    }

    /// Project two world points and derive the covered pixel rows.
    pub fn from_points(
        start_point: DVec3,
        end_point: DVec3,
        camera: &RayCamera,
        frame_height: usize,
    ) -> Self {
        let height_real = frame_height as f64;
        let y_proj_start = camera.get_projected_y(start_point) * height_real;
        let y_proj_end = camera.get_projected_y(end_point) * height_real;
        let y_start = get_lower_bounded_pixel(y_proj_start, frame_height);
        let y_end = get_upper_bounded_pixel(y_proj_end, frame_height);
        Self::new(y_proj_start, y_proj_end, y_start, y_end)
    }

    /// Two stacked ranges sharing their midpoint projection, so the seam
    /// between them never drops or doubles a pixel row.
    pub fn two_part(
        start_point: DVec3,
        mid_point: DVec3,
        end_point: DVec3,
        camera: &RayCamera,
        frame_height: usize,
    ) -> (Self, Self) {
        let height_real = frame_height as f64;
        let start_proj = camera.get_projected_y(start_point) * height_real;
        let mid_proj = camera.get_projected_y(mid_point) * height_real;
        let end_proj = camera.get_projected_y(end_point) * height_real;

        let start_pixel = get_lower_bounded_pixel(start_proj, frame_height);
        let mid_pixel = get_upper_bounded_pixel(mid_proj, frame_height);
        let end_pixel = get_upper_bounded_pixel(end_proj, frame_height);

        (
            Self::new(start_proj, mid_proj, start_pixel, mid_pixel),
            Self::new(mid_proj, end_proj, mid_pixel, end_pixel),
        )
    }

    /// Three stacked ranges sharing both interior midpoints.
    pub fn three_part(
        start_point: DVec3,
        mid_point1: DVec3,
        mid_point2: DVec3,
        end_point: DVec3,
        camera: &RayCamera,
        frame_height: usize,
    ) -> (Self, Self, Self) {
        let height_real = frame_height as f64;
        let start_proj = camera.get_projected_y(start_point) * height_real;
        let mid1_proj = camera.get_projected_y(mid_point1) * height_real;
        let mid2_proj = camera.get_projected_y(mid_point2) * height_real;
        let end_proj = camera.get_projected_y(end_point) * height_real;

        let start_pixel = get_lower_bounded_pixel(start_proj, frame_height);
        let mid1_pixel = get_upper_bounded_pixel(mid1_proj, frame_height);
        let mid2_pixel = get_upper_bounded_pixel(mid2_proj, frame_height);
        let end_pixel = get_upper_bounded_pixel(end_proj, frame_height);

        (
            Self::new(start_proj, mid1_proj, start_pixel, mid1_pixel),
            Self::new(mid1_proj, mid2_proj, mid1_pixel, mid2_pixel),
            Self::new(mid2_proj, end_proj, mid2_pixel, end_pixel),
        )
    }
}

/// Open vertical window [y_min, y_max) of a screen column that can still
/// receive pixels. Opaque spans shrink it; once it closes, the column's ray
/// walk stops early.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OcclusionData {
    pub y_min: i32,
    pub y_max: i32,
}

impl OcclusionData {
    #[inline]
    pub fn new(y_min: i32, y_max: i32) -> Self {
        Self { y_min, y_max }
    }

    /// Clamp a span's pixel rows to the open window. A span fully outside
    /// comes back empty (start == end).
    #[inline]
    pub fn clip_range(&self, y_start: &mut i32, y_end: &mut i32) {
        let fully_outside = (*y_end <= self.y_min) || (*y_start >= self.y_max);
        if fully_outside {
            *y_start = *y_end;
        } else {
            *y_start = (*y_start).clamp(self.y_min, self.y_max);
            *y_end = (*y_end).clamp(self.y_min, self.y_max);
        }
    }

    /// Shrink the window after an opaque span [y_start, y_end) was drawn.
    /// Only spans touching a window boundary can move it; an island in the
    /// middle leaves both bounds where they were.
    #[inline]
    pub fn update(&mut self, y_start: i32, y_end: i32) {
        let can_increase_min = y_start <= self.y_min;
        let can_decrease_max = y_end >= self.y_max;

        if can_increase_min && can_decrease_max {
            // The window is entirely covered.
            self.y_min = self.y_max;
        } else if can_increase_min {
            self.y_min = y_end.max(self.y_min);
        } else if can_decrease_max {
            self.y_max = y_start.min(self.y_max);
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.y_min == self.y_max
    }
}

/// Shared view of the frame's color and depth memory for one render pass.
///
/// Safety: FrameView is Send + Sync because it only carries raw pointers to
/// the backing buffers; the render stages partition pixel indices (rows for
/// the sky gradient, X ranges for distant objects and flats, interleaved
/// columns for voxels) so concurrent writers never alias the same pixel.
pub struct FrameView {
    pub width: usize,
    pub height: usize,
    pub width_real: f64,
    pub height_real: f64,
    color_ptr: *mut u32,
    depth_ptr: *mut f64,
}

unsafe impl Send for FrameView {}
unsafe impl Sync for FrameView {}

impl FrameView {
    pub fn new(color: &mut [u32], depth: &mut [f64], width: usize, height: usize) -> Self {
        assert_eq!(color.len(), width * height, "color buffer size mismatch");
        assert_eq!(depth.len(), width * height, "depth buffer size mismatch");
        Self {
            width,
            height,
            width_real: width as f64,
            height_real: height as f64,
            color_ptr: color.as_mut_ptr(),
            depth_ptr: depth.as_mut_ptr(),
        }
    }

    /// # Safety
    /// `index < width * height`, and no other thread may write the same
    /// pixel during this pass.
    #[inline]
    pub unsafe fn set_color(&self, index: usize, color: u32) {
        debug_assert!(index < self.width * self.height);
        *self.color_ptr.add(index) = color;
    }

    /// # Safety
    /// See [`FrameView::set_color`].
    #[inline]
    pub unsafe fn get_color(&self, index: usize) -> u32 {
        debug_assert!(index < self.width * self.height);
        *self.color_ptr.add(index)
    }

    /// # Safety
    /// See [`FrameView::set_color`].
    #[inline]
    pub unsafe fn set_depth(&self, index: usize, depth: f64) {
        debug_assert!(index < self.width * self.height);
        *self.depth_ptr.add(index) = depth;
    }

    /// # Safety
    /// See [`FrameView::set_color`].
    #[inline]
    pub unsafe fn get_depth(&self, index: usize) -> f64 {
        debug_assert!(index < self.width * self.height);
        *self.depth_ptr.add(index)
    }
}

/// Reset the frame to a flat color and infinite depth.
pub fn clear_frame(color: &mut [u32], depth: &mut [f64], clear_color: u32) {
    #[cfg(target_arch = "x86_64")]
    {
        // Prefer AVX (8 color / 4 depth lanes), then SSE2 (4 / 2).
        if std::arch::is_x86_feature_detected!("avx") {
            unsafe {
                return clear_frame_avx(color, depth, clear_color);
            }
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            unsafe {
                return clear_frame_sse2(color, depth, clear_color);
            }
        }
    }

    // Generic scalar fallback for non-x86_64 or CPUs without SIMD.
    color.fill(clear_color);
    depth.fill(f64::INFINITY);
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn clear_frame_sse2(color: &mut [u32], depth: &mut [f64], clear_color: u32) {
    let len = color.len();
    let mut i = 0usize;
    let color_vec = _mm_set1_epi32(clear_color as i32);
    while i + 4 <= len {
        let ptr = color.as_mut_ptr().add(i) as *mut _;
        _mm_storeu_si128(ptr, color_vec);
        i += 4;
    }
    for j in i..len {
        color[j] = clear_color;
    }

    let len_d = depth.len();
    let mut k = 0usize;
    let depth_vec = _mm_set1_pd(f64::INFINITY);
    while k + 2 <= len_d {
        let ptr = depth.as_mut_ptr().add(k);
        _mm_storeu_pd(ptr, depth_vec);
        k += 2;
    }
    for j in k..len_d {
        depth[j] = f64::INFINITY;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn clear_frame_avx(color: &mut [u32], depth: &mut [f64], clear_color: u32) {
    let len = color.len();
    let mut i = 0usize;
    let color_vec = _mm256_set1_epi32(clear_color as i32);
    while i + 8 <= len {
        let ptr = color.as_mut_ptr().add(i) as *mut _;
        _mm256_storeu_si256(ptr, color_vec);
        i += 8;
    }
    for j in i..len {
        color[j] = clear_color;
    }

    let len_d = depth.len();
    let mut k = 0usize;
    let depth_vec = _mm256_set1_pd(f64::INFINITY);
    while k + 4 <= len_d {
        let ptr = depth.as_mut_ptr().add(k);
        _mm256_storeu_pd(ptr, depth_vec);
        k += 4;
    }
    for j in k..len_d {
        depth[j] = f64::INFINITY;
    }
}

/// Convert RGB to ARGB u32.
#[inline]
pub const fn rgb_to_u32(r: u8, g: u8, b: u8) -> u32 {
    0xFF000000 | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Pack unit-range RGB, clamping highs. Negative inputs are programmer error
/// upstream, so only the high side is guarded.
#[inline]
pub fn pack_color(r: f64, g: f64, b: f64) -> u32 {
    let r8 = ((r.min(1.0)) * 255.0) as u32;
    let g8 = ((g.min(1.0)) * 255.0) as u32;
    let b8 = ((b.min(1.0)) * 255.0) as u32;
    0xFF000000 | (r8 << 16) | (g8 << 8) | b8
}

/// Unpack an ARGB u32 into unit-range RGB.
#[inline]
pub fn unpack_color(color: u32) -> glam::DVec3 {
    glam::DVec3::new(
        ((color >> 16) & 0xFF) as f64 / 255.0,
        ((color >> 8) & 0xFF) as f64 / 255.0,
        (color & 0xFF) as f64 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_empty_outside_window() {
        let occlusion = OcclusionData::new(10, 20);

        let (mut start, mut end) = (0, 8);
        occlusion.clip_range(&mut start, &mut end);
        assert_eq!(start, end, "span above the window must clip to empty");

        let (mut start, mut end) = (25, 30);
        occlusion.clip_range(&mut start, &mut end);
        assert_eq!(start, end, "span below the window must clip to empty");

        let (mut start, mut end) = (5, 15);
        occlusion.clip_range(&mut start, &mut end);
        assert_eq!((start, end), (10, 15));
    }

    #[test]
    fn update_only_moves_touched_boundaries() {
        let mut occlusion = OcclusionData::new(0, 100);

        // Island in the middle: no boundary touched, window unchanged.
        occlusion.update(40, 60);
        assert_eq!(occlusion, OcclusionData::new(0, 100));

        // Span touching the top moves y_min down to its end.
        occlusion.update(0, 30);
        assert_eq!(occlusion, OcclusionData::new(30, 100));

        // Span touching the bottom moves y_max up to its start.
        occlusion.update(70, 100);
        assert_eq!(occlusion, OcclusionData::new(30, 70));

        // Covering span closes the window.
        occlusion.update(30, 70);
        assert!(occlusion.is_closed());
    }

    #[test]
    fn clear_resets_color_and_depth() {
        let mut color = vec![0u32; 37]; // odd length exercises SIMD tails
        let mut depth = vec![0.0f64; 37];
        clear_frame(&mut color, &mut depth, rgb_to_u32(9, 9, 9));

        assert!(color.iter().all(|&c| c == rgb_to_u32(9, 9, 9)));
        assert!(depth.iter().all(|&d| d == f64::INFINITY));
    }

    #[test]
    fn pack_color_clamps_highs() {
        assert_eq!(pack_color(2.0, 1.0, 0.0), rgb_to_u32(255, 255, 0));
    }
}
