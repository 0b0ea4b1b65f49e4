/// Texture storage for the raycaster.
///
/// Texels are kept as unit-range f64 channels so the pixel shaders can fold
/// shading and fog in without unpack/repack churn; packing to ARGB32 happens
/// once per written pixel.
use crate::voxel::ChasmType;
use std::collections::HashMap;

/// Texel of a voxel-face texture. `emission` feeds the shading sum;
/// `transparent` marks cut-out texels for transparent walls, edges and
/// doors.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoxelTexel {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub emission: f64,
    pub transparent: bool,
}

impl VoxelTexel {
    pub fn from_argb(argb: u32, emission: f64) -> Self {
        let a = ((argb >> 24) & 0xFF) as f64 / 255.0;
        Self {
            r: ((argb >> 16) & 0xFF) as f64 / 255.0,
            g: ((argb >> 8) & 0xFF) as f64 / 255.0,
            b: (argb & 0xFF) as f64 / 255.0,
            emission,
            transparent: a == 0.0,
        }
    }
}

/// Texel of a billboard texture. Alpha is ternary in practice: 0 skips,
/// (0, 1) dims what is already in the frame, 1 draws shaded color.
#[derive(Copy, Clone, Debug, Default)]
pub struct FlatTexel {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl FlatTexel {
    pub fn from_argb(argb: u32) -> Self {
        Self {
            r: ((argb >> 16) & 0xFF) as f64 / 255.0,
            g: ((argb >> 8) & 0xFF) as f64 / 255.0,
            b: (argb & 0xFF) as f64 / 255.0,
            a: ((argb >> 24) & 0xFF) as f64 / 255.0,
        }
    }
}

/// Texel of a distant-sky texture. Same alpha semantics as `FlatTexel`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SkyTexel {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

/// Texel of an animated chasm floor/side. Always opaque.
#[derive(Copy, Clone, Debug, Default)]
pub struct ChasmTexel {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

pub struct VoxelTexture {
    pub width: usize,
    pub height: usize,
    pub texels: Vec<VoxelTexel>,
    /// Texel indices that glow when night lights are active.
    pub light_texels: Vec<usize>,
}

impl VoxelTexture {
    pub fn from_argb(width: usize, height: usize, argb: &[u32]) -> Self {
        assert_eq!(argb.len(), width * height, "voxel texture size mismatch");
        Self {
            width,
            height,
            texels: argb
                .iter()
                .map(|&color| VoxelTexel::from_argb(color, 0.0))
                .collect(),
            light_texels: Vec::new(),
        }
    }

    /// Flip between lit and unlit night texels. Emission applies at full
    /// strength so marked texels read as self-lit windows.
    pub fn set_night_lights_active(&mut self, active: bool) {
        let emission = if active { 1.0 } else { 0.0 };
        for &index in &self.light_texels {
            self.texels[index].emission = emission;
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> &VoxelTexel {
        debug_assert!(x < self.width && y < self.height);
        &self.texels[x + (y * self.width)]
    }
}

pub struct FlatTexture {
    pub width: usize,
    pub height: usize,
    pub texels: Vec<FlatTexel>,
    /// Mirror U when sampling.
    pub flipped: bool,
    /// Puddle: reflect the sky instead of drawing own color.
    pub reflective: bool,
}

impl FlatTexture {
    pub fn from_argb(width: usize, height: usize, argb: &[u32], flipped: bool) -> Self {
        assert_eq!(argb.len(), width * height, "flat texture size mismatch");
        Self {
            width,
            height,
            texels: argb.iter().map(|&color| FlatTexel::from_argb(color)).collect(),
            flipped,
            reflective: false,
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> &FlatTexel {
        debug_assert!(x < self.width && y < self.height);
        &self.texels[x + (y * self.width)]
    }
}

pub struct SkyTexture {
    pub width: usize,
    pub height: usize,
    pub texels: Vec<SkyTexel>,
}

impl SkyTexture {
    pub fn from_argb(width: usize, height: usize, argb: &[u32]) -> Self {
        assert_eq!(argb.len(), width * height, "sky texture size mismatch");
        Self {
            width,
            height,
            texels: argb
                .iter()
                .map(|&color| SkyTexel {
                    r: ((color >> 16) & 0xFF) as f64 / 255.0,
                    g: ((color >> 8) & 0xFF) as f64 / 255.0,
                    b: (color & 0xFF) as f64 / 255.0,
                    a: ((color >> 24) & 0xFF) as f64 / 255.0,
                })
                .collect(),
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> &SkyTexel {
        debug_assert!(x < self.width && y < self.height);
        &self.texels[x + (y * self.width)]
    }
}

pub struct ChasmTexture {
    pub width: usize,
    pub height: usize,
    pub texels: Vec<ChasmTexel>,
}

impl ChasmTexture {
    pub fn from_argb(width: usize, height: usize, argb: &[u32]) -> Self {
        assert_eq!(argb.len(), width * height, "chasm texture size mismatch");
        Self {
            width,
            height,
            texels: argb
                .iter()
                .map(|&color| ChasmTexel {
                    r: ((color >> 16) & 0xFF) as f64 / 255.0,
                    g: ((color >> 8) & 0xFF) as f64 / 255.0,
                    b: (color & 0xFF) as f64 / 255.0,
                })
                .collect(),
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> &ChasmTexel {
        debug_assert!(x < self.width && y < self.height);
        &self.texels[x + (y * self.width)]
    }
}

/// Animation frames of a flat, keyed by entity state and view angle.
/// A group with no frames for a requested key is missing content.
#[derive(Default)]
pub struct FlatTextureGroup {
    frames: HashMap<(i32, i32), Vec<FlatTexture>>,
}

impl FlatTextureGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frames(&mut self, state: i32, angle: i32, textures: Vec<FlatTexture>) {
        assert!(
            !textures.is_empty(),
            "flat texture list for state {} angle {} may not be empty",
            state,
            angle
        );
        self.frames.insert((state, angle), textures);
    }

    #[inline]
    pub fn get_frame(&self, state: i32, angle: i32, frame: usize) -> Option<&FlatTexture> {
        self.frames
            .get(&(state, angle))
            .and_then(|textures| textures.get(frame))
    }

    /// Pick the animation frame for the given percent through the loop.
    #[inline]
    pub fn get_frame_by_percent(
        &self,
        state: i32,
        angle: i32,
        anim_percent: f64,
    ) -> Option<&FlatTexture> {
        let count = self.frames.get(&(state, angle))?.len();
        let index = ((anim_percent.clamp(0.0, 1.0) * count as f64) as usize).min(count - 1);
        self.get_frame(state, angle, index)
    }
}

/// Chasm animation frames per chasm type.
#[derive(Default)]
pub struct ChasmTextureGroups {
    groups: HashMap<ChasmType, Vec<ChasmTexture>>,
}

impl ChasmTextureGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, chasm_type: ChasmType, texture: ChasmTexture) {
        self.groups.entry(chasm_type).or_default().push(texture);
    }

    /// Pick the animation frame for the given percent through the loop.
    /// A chasm voxel with no registered textures is a content error; the
    /// caller treats it as fatal.
    pub fn get_texture(&self, chasm_type: ChasmType, anim_percent: f64) -> Option<&ChasmTexture> {
        self.groups.get(&chasm_type).map(|textures| {
            let count = textures.len();
            let index = ((anim_percent.clamp(0.0, 1.0) * count as f64) as usize).min(count - 1);
            &textures[index]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_alpha_voxel_texel_is_transparent() {
        let texel = VoxelTexel::from_argb(0x00FF0000, 0.0);
        assert!(texel.transparent);

        let texel = VoxelTexel::from_argb(0xFFFF0000, 0.0);
        assert!(!texel.transparent);
        assert_eq!(texel.r, 1.0);
    }

    #[test]
    fn night_lights_toggle_emission() {
        let mut texture = VoxelTexture::from_argb(2, 1, &[0xFF102030, 0xFFFFFFA0]);
        texture.light_texels.push(1);

        texture.set_night_lights_active(true);
        assert_eq!(texture.sample(1, 0).emission, 1.0);
        assert_eq!(texture.sample(0, 0).emission, 0.0);

        texture.set_night_lights_active(false);
        assert_eq!(texture.sample(1, 0).emission, 0.0);
    }

    #[test]
    fn chasm_group_picks_frame_by_percent() {
        let mut groups = ChasmTextureGroups::new();
        for _ in 0..4 {
            groups.add(
                ChasmType::Wet,
                ChasmTexture {
                    width: 1,
                    height: 1,
                    texels: vec![ChasmTexel::default()],
                },
            );
        }

        assert!(groups.get_texture(ChasmType::Wet, 0.0).is_some());
        assert!(groups.get_texture(ChasmType::Wet, 1.0).is_some());
        assert!(
            groups.get_texture(ChasmType::Dry, 0.5).is_none(),
            "unregistered chasm type has no textures"
        );
    }
}
