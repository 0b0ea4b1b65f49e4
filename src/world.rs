//! Demo world: a walled arena exercising every voxel shape, with
//! noise-generated textures, billboard entities, point lights and a distant
//! sky. Everything here is content setup; the renderer never depends on it.

use glam::{DVec2, DVec3};
use noise::{NoiseFn, Perlin};

use crate::rendering::flats::Entity;
use crate::rendering::framebuffer::rgb_to_u32;
use crate::rendering::renderer::SoftwareRenderer;
use crate::rendering::sky::{
    DistantAir, DistantAnimatedLand, DistantLand, DistantMoon, DistantSky, DistantStar, MoonType,
};
use crate::rendering::texture::{ChasmTexture, FlatTexture, SkyTexture, VoxelTexture};
use crate::voxel::{ChasmType, DoorType, Facing2D, VoxelDefinition, VoxelGrid, VoxelTextureIds};

/// World generation parameters.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Arena side length in voxels.
    pub arena_size: usize,
    /// Noise seed for every generated texture.
    pub seed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            arena_size: 24,
            seed: 7,
        }
    }
}

/// Built world data the render loop needs each frame.
pub struct DemoWorld {
    pub grid: VoxelGrid,
    pub entities: Vec<Entity>,
    /// Grid coordinates of the animated doors.
    pub doors: Vec<(i32, i32, i32)>,
    pub spawn: DVec3,
    pub ceiling_height: f64,
}

// Voxel texture ids.
const TEX_STONE_FLOOR: usize = 0;
const TEX_BRICK_WALL: usize = 1;
const TEX_CEILING: usize = 2;
const TEX_PLATFORM: usize = 3;
const TEX_DIAGONAL: usize = 4;
const TEX_LATTICE: usize = 5;
const TEX_FENCE: usize = 6;
const TEX_DOOR: usize = 7;
const TEX_CHASM_WALL: usize = 8;

// Flat texture group keys.
const FLAT_TREE: usize = 0;
const FLAT_GHOST: usize = 1;
const FLAT_TORCH: usize = 2;
const FLAT_PUDDLE: usize = 3;

const VOXEL_TEXTURE_DIM: usize = 32;

/// Perlin-modulated solid color. `variation` scales how far the noise
/// pushes each channel from the base.
fn noise_argb(
    perlin: &Perlin,
    layer: f64,
    width: usize,
    height: usize,
    base: DVec3,
    variation: f64,
) -> Vec<u32> {
    let mut texels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let sample = perlin.get([x as f64 * 0.35, y as f64 * 0.35, layer]);
            let color = (base + DVec3::splat(sample * variation)).clamp(DVec3::ZERO, DVec3::ONE);
            texels.push(rgb_to_u32(
                (color.x * 255.0) as u8,
                (color.y * 255.0) as u8,
                (color.z * 255.0) as u8,
            ));
        }
    }
    texels
}

/// Punch fully transparent holes into a texture wherever `hole` says so.
fn cut_out(texels: &mut [u32], width: usize, hole: impl Fn(usize, usize) -> bool) {
    for (index, texel) in texels.iter_mut().enumerate() {
        if hole(index % width, index / width) {
            *texel &= 0x00FFFFFF;
        }
    }
}

fn register_voxel_textures(renderer: &mut SoftwareRenderer, perlin: &Perlin) {
    let dim = VOXEL_TEXTURE_DIM;
    let solid = |layer: f64, base: DVec3, variation: f64| {
        VoxelTexture::from_argb(dim, dim, &noise_argb(perlin, layer, dim, dim, base, variation))
    };

    renderer.set_voxel_texture(TEX_STONE_FLOOR, solid(0.0, DVec3::new(0.45, 0.44, 0.42), 0.12));
    renderer.set_voxel_texture(TEX_CEILING, solid(2.0, DVec3::new(0.35, 0.33, 0.30), 0.08));
    renderer.set_voxel_texture(TEX_PLATFORM, solid(3.0, DVec3::new(0.50, 0.38, 0.25), 0.10));
    renderer.set_voxel_texture(TEX_DIAGONAL, solid(4.0, DVec3::new(0.55, 0.50, 0.40), 0.10));
    renderer.set_voxel_texture(TEX_CHASM_WALL, solid(8.0, DVec3::new(0.30, 0.28, 0.26), 0.10));

    // Brick wall with mortar lines and a pair of night-light windows.
    let mut brick = noise_argb(perlin, 1.0, dim, dim, DVec3::new(0.52, 0.28, 0.22), 0.10);
    for y in (0..dim).step_by(8) {
        for x in 0..dim {
            brick[x + y * dim] = rgb_to_u32(90, 85, 80);
        }
    }
    let mut wall = VoxelTexture::from_argb(dim, dim, &brick);
    for window_y in 10..14 {
        for window_x in [6, 7, 24, 25] {
            wall.light_texels.push(window_x + window_y * dim);
        }
    }
    renderer.set_voxel_texture(TEX_BRICK_WALL, wall);

    // Lattice: transparent wall with square holes.
    let mut lattice = noise_argb(perlin, 5.0, dim, dim, DVec3::new(0.40, 0.45, 0.35), 0.08);
    cut_out(&mut lattice, dim, |x, y| (x % 8) >= 3 && (y % 8) >= 3);
    renderer.set_voxel_texture(TEX_LATTICE, VoxelTexture::from_argb(dim, dim, &lattice));

    // Fence: thin edge quad, vertical bars with gaps.
    let mut fence = noise_argb(perlin, 6.0, dim, dim, DVec3::new(0.35, 0.25, 0.15), 0.08);
    cut_out(&mut fence, dim, |x, y| (x % 6) >= 2 && y >= 4);
    renderer.set_voxel_texture(TEX_FENCE, VoxelTexture::from_argb(dim, dim, &fence));

    // Door: planks with dark seams.
    let mut door = noise_argb(perlin, 7.0, dim, dim, DVec3::new(0.42, 0.30, 0.18), 0.08);
    for x in (0..dim).step_by(6) {
        for y in 0..dim {
            door[x + y * dim] = rgb_to_u32(40, 28, 18);
        }
    }
    renderer.set_voxel_texture(TEX_DOOR, VoxelTexture::from_argb(dim, dim, &door));
}

fn register_chasm_textures(renderer: &mut SoftwareRenderer, perlin: &Perlin) {
    let dim = VOXEL_TEXTURE_DIM;
    // Animated frames per type; screen-space sampling hides the seams.
    for frame in 0..4 {
        let water = noise_argb(
            perlin,
            10.0 + frame as f64 * 0.7,
            dim,
            dim,
            DVec3::new(0.10, 0.22, 0.45),
            0.10,
        );
        renderer.add_chasm_texture(ChasmType::Wet, ChasmTexture::from_argb(dim, dim, &water));

        let lava = noise_argb(
            perlin,
            20.0 + frame as f64 * 0.7,
            dim,
            dim,
            DVec3::new(0.90, 0.35, 0.08),
            0.20,
        );
        renderer.add_chasm_texture(ChasmType::Lava, ChasmTexture::from_argb(dim, dim, &lava));
    }
    let dry = noise_argb(perlin, 30.0, dim, dim, DVec3::new(0.25, 0.22, 0.18), 0.08);
    renderer.add_chasm_texture(ChasmType::Dry, ChasmTexture::from_argb(dim, dim, &dry));
}

fn register_flat_textures(renderer: &mut SoftwareRenderer, perlin: &Perlin) {
    let dim = VOXEL_TEXTURE_DIM;

    // Tree: green blob over a trunk, transparent background.
    let mut tree = noise_argb(perlin, 40.0, dim, dim, DVec3::new(0.15, 0.40, 0.12), 0.15);
    cut_out(&mut tree, dim, |x, y| {
        let center_x = dim as f64 / 2.0;
        let canopy = {
            let dx = x as f64 - center_x;
            let dy = y as f64 - dim as f64 * 0.35;
            (dx * dx + dy * dy).sqrt() > dim as f64 * 0.34
        };
        let trunk = !(14..18).contains(&x) || y < dim / 2;
        canopy && trunk
    });
    renderer.set_flat_texture_frames(FLAT_TREE, 0, 0, vec![FlatTexture::from_argb(dim, dim, &tree, false)]);

    // Ghost: four view-angle lists, each a pale silhouette; the back views
    // are flipped so the lighting seam stays consistent.
    for angle in 0..4 {
        let mut ghost = noise_argb(
            perlin,
            50.0 + angle as f64,
            dim,
            dim,
            DVec3::new(0.75, 0.78, 0.85),
            0.06,
        );
        cut_out(&mut ghost, dim, |x, y| {
            let dx = x as f64 - dim as f64 / 2.0;
            let dy = y as f64 - dim as f64 / 2.0;
            (dx * dx * 1.8 + dy * dy).sqrt() > dim as f64 * 0.42
        });
        let flipped = angle >= 2;
        renderer.set_flat_texture_frames(
            FLAT_GHOST,
            0,
            angle,
            vec![FlatTexture::from_argb(dim, dim, &ghost, flipped)],
        );
    }

    // Torch: three animation frames of flame over a stick.
    let frames = (0..3)
        .map(|frame| {
            let mut torch = noise_argb(
                perlin,
                60.0 + frame as f64 * 0.9,
                dim,
                dim,
                DVec3::new(0.95, 0.65, 0.20),
                0.25,
            );
            cut_out(&mut torch, dim, |x, y| {
                let flame = {
                    let dx = x as f64 - dim as f64 / 2.0;
                    let dy = y as f64 - dim as f64 * 0.30;
                    (dx * dx * 2.5 + dy * dy).sqrt() > dim as f64 * 0.28
                };
                let stick = !(15..17).contains(&x) || y < dim / 2;
                flame && stick
            });
            FlatTexture::from_argb(dim, dim, &torch, false)
        })
        .collect();
    renderer.set_flat_texture_frames(FLAT_TORCH, 0, 0, frames);

    // Puddle: flat disc whose texels mirror the sky.
    let mut puddle_argb = noise_argb(perlin, 70.0, dim, dim, DVec3::new(0.30, 0.35, 0.45), 0.05);
    cut_out(&mut puddle_argb, dim, |x, y| {
        let dx = x as f64 - dim as f64 / 2.0;
        let dy = y as f64 - dim as f64 / 2.0;
        (dx * dx + dy * dy * 6.0).sqrt() > dim as f64 * 0.45
    });
    let mut puddle = FlatTexture::from_argb(dim, dim, &puddle_argb, false);
    puddle.reflective = true;
    renderer.set_flat_texture_frames(FLAT_PUDDLE, 0, 0, vec![puddle]);
}

/// Horizon-to-zenith palette over a full day: midnight blues through dawn
/// orange to daylight and back.
pub fn day_sky_palette() -> Vec<u32> {
    let keys = [
        DVec3::new(0.02, 0.03, 0.08), // midnight
        DVec3::new(0.05, 0.05, 0.12),
        DVec3::new(0.55, 0.35, 0.20), // dawn
        DVec3::new(0.55, 0.65, 0.85),
        DVec3::new(0.45, 0.60, 0.90), // noon
        DVec3::new(0.50, 0.55, 0.80),
        DVec3::new(0.60, 0.35, 0.25), // dusk
        DVec3::new(0.08, 0.07, 0.15),
    ];
    let count = 32;
    (0..count)
        .map(|i| {
            let t = i as f64 / count as f64 * keys.len() as f64;
            let index = t as usize % keys.len();
            let next = (index + 1) % keys.len();
            let color = keys[index].lerp(keys[next], t.fract());
            rgb_to_u32(
                (color.x * 255.0) as u8,
                (color.y * 255.0) as u8,
                (color.z * 255.0) as u8,
            )
        })
        .collect()
}

/// Mountains, a smoking volcano, clouds, sun, two moons and a star field.
pub fn build_distant_sky(perlin: &Perlin) -> DistantSky {
    let mut sky = DistantSky::default();

    let mountain = |layer: f64, width: usize, height: usize| -> SkyTexture {
        let mut argb = noise_argb(perlin, layer, width, height, DVec3::new(0.30, 0.28, 0.34), 0.10);
        cut_out(&mut argb, width, |x, y| {
            // Ridge line from noise; above it is open sky.
            let ridge = perlin.get([x as f64 * 0.15, layer]) * 0.35 + 0.40;
            (y as f64) < ridge * height as f64
        });
        SkyTexture::from_argb(width, height, &argb)
    };

    for i in 0..5 {
        let texture_index = sky.textures.len();
        sky.textures.push(mountain(80.0 + i as f64, 64, 32));
        sky.lands.push(DistantLand {
            texture_index,
            angle_radians: i as f64 * (std::f64::consts::TAU / 5.0),
        });
    }

    // Volcano: consecutive frames differ in their glow.
    let volcano_base = sky.textures.len();
    for frame in 0..3 {
        let mut argb = noise_argb(
            perlin,
            90.0 + frame as f64 * 0.5,
            64,
            40,
            DVec3::new(0.32, 0.25, 0.24),
            0.10,
        );
        cut_out(&mut argb, 64, |x, y| {
            let peak = (x as f64 - 32.0).abs() / 32.0;
            (y as f64) < (peak * 28.0) + 4.0
        });
        sky.textures.push(SkyTexture::from_argb(64, 40, &argb));
    }
    sky.anim_lands.push(DistantAnimatedLand {
        texture_index: volcano_base,
        frame_count: 3,
        angle_radians: 1.1,
    });

    // Clouds at a couple of heights.
    for i in 0..4 {
        let texture_index = sky.textures.len();
        let mut argb = noise_argb(
            perlin,
            100.0 + i as f64,
            48,
            12,
            DVec3::new(0.85, 0.85, 0.90),
            0.10,
        );
        cut_out(&mut argb, 48, |x, y| {
            perlin.get([x as f64 * 0.2, y as f64 * 0.4, 100.5 + i as f64]) < -0.05
        });
        sky.textures.push(SkyTexture::from_argb(48, 12, &argb));
        sky.airs.push(DistantAir {
            texture_index,
            angle_radians: 0.8 + i as f64 * 1.6,
            height: 0.25 + (i as f64 * 0.20),
        });
    }

    // Sun: radial falloff disc.
    let sun_index = sky.textures.len();
    let sun_dim = 24usize;
    let sun_argb: Vec<u32> = (0..sun_dim * sun_dim)
        .map(|index| {
            let x = (index % sun_dim) as f64 - sun_dim as f64 / 2.0;
            let y = (index / sun_dim) as f64 - sun_dim as f64 / 2.0;
            let dist = (x * x + y * y).sqrt() / (sun_dim as f64 / 2.0);
            if dist > 1.0 {
                0
            } else {
                let alpha = ((1.0 - dist) * 4.0).min(1.0);
                ((alpha * 255.0) as u32) << 24 | 0x00FFF2C8
            }
        })
        .collect();
    sky.textures.push(SkyTexture::from_argb(sun_dim, sun_dim, &sun_argb));
    sky.sun_texture_index = Some(sun_index);

    // Two moons at different phases.
    for (moon_type, phase_percent) in [(MoonType::First, 0.20), (MoonType::Second, 0.65)] {
        let texture_index = sky.textures.len();
        let moon_dim = 16usize;
        let moon_argb: Vec<u32> = (0..moon_dim * moon_dim)
            .map(|index| {
                let x = (index % moon_dim) as f64 - moon_dim as f64 / 2.0;
                let y = (index / moon_dim) as f64 - moon_dim as f64 / 2.0;
                let inside = (x * x + y * y).sqrt() < moon_dim as f64 / 2.0 - 0.5;
                if inside {
                    0xFFD8D8E0
                } else {
                    0
                }
            })
            .collect();
        sky.textures.push(SkyTexture::from_argb(moon_dim, moon_dim, &moon_argb));
        sky.moons.push(DistantMoon {
            texture_index,
            moon_type,
            phase_percent,
        });
    }

    // Star field: one shared texel, directions scattered over the upper
    // hemisphere with a cheap hash.
    let star_index = sky.textures.len();
    sky.textures.push(SkyTexture::from_argb(1, 1, &[0xFFFFFFFF]));
    let mut state = 0x2545F491u32;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state as f64 / u32::MAX as f64
    };
    for _ in 0..140 {
        let azimuth = next() * std::f64::consts::TAU;
        let elevation = next() * 0.45 * std::f64::consts::PI;
        let direction = DVec3::new(
            elevation.cos() * azimuth.cos(),
            elevation.sin(),
            elevation.cos() * azimuth.sin(),
        );
        sky.stars.push(DistantStar {
            texture_index: star_index,
            direction,
        });
    }

    sky
}

/// Build the arena grid, register all content with the renderer, and return
/// the per-frame world data.
pub fn build_demo_world(config: &WorldConfig, renderer: &mut SoftwareRenderer) -> DemoWorld {
    crate::perf_scope!("build_demo_world");

    let perlin = Perlin::new(config.seed);
    let size = config.arena_size.max(16);

    register_voxel_textures(renderer, &perlin);
    register_chasm_textures(renderer, &perlin);
    register_flat_textures(renderer, &perlin);
    renderer.set_sky_palette(&day_sky_palette());
    renderer.set_distant_sky(build_distant_sky(&perlin));

    let mut grid = VoxelGrid::new(size, 3, size);

    let floor = grid.add_definition(VoxelDefinition::Floor {
        texture: TEX_STONE_FLOOR,
    });
    let wall = grid.add_definition(VoxelDefinition::Wall {
        textures: VoxelTextureIds {
            side: TEX_BRICK_WALL,
            floor: TEX_CEILING,
            ceiling: TEX_CEILING,
        },
    });
    let ceiling = grid.add_definition(VoxelDefinition::Ceiling {
        texture: TEX_CEILING,
    });
    let platform = grid.add_definition(VoxelDefinition::Raised {
        textures: VoxelTextureIds {
            side: TEX_PLATFORM,
            floor: TEX_PLATFORM,
            ceiling: TEX_PLATFORM,
        },
        y_offset: 0.0,
        y_size: 0.40,
        v_top: 0.0,
        v_bottom: 0.40,
    });
    let diagonal_left = grid.add_definition(VoxelDefinition::Diagonal {
        texture: TEX_DIAGONAL,
        right_diagonal: false,
    });
    let diagonal_right = grid.add_definition(VoxelDefinition::Diagonal {
        texture: TEX_DIAGONAL,
        right_diagonal: true,
    });
    let lattice = grid.add_definition(VoxelDefinition::TransparentWall {
        texture: TEX_LATTICE,
        collider: true,
    });
    let fence = grid.add_definition(VoxelDefinition::Edge {
        texture: TEX_FENCE,
        facing: Facing2D::PosZ,
        flipped: false,
    });
    let wet_chasm = grid.add_definition(VoxelDefinition::Chasm {
        texture: TEX_CHASM_WALL,
        chasm_type: ChasmType::Wet,
    });
    let lava_chasm = grid.add_definition(VoxelDefinition::Chasm {
        texture: TEX_CHASM_WALL,
        chasm_type: ChasmType::Lava,
    });
    let doors = [
        grid.add_definition(VoxelDefinition::Door {
            texture: TEX_DOOR,
            door_type: DoorType::Swinging,
        }),
        grid.add_definition(VoxelDefinition::Door {
            texture: TEX_DOOR,
            door_type: DoorType::Sliding,
        }),
        grid.add_definition(VoxelDefinition::Door {
            texture: TEX_DOOR,
            door_type: DoorType::Raising,
        }),
        grid.add_definition(VoxelDefinition::Door {
            texture: TEX_DOOR,
            door_type: DoorType::Splitting,
        }),
    ];

    // Ground floor everywhere, perimeter walls two voxels high.
    let last = size - 1;
    for x in 0..size {
        for z in 0..size {
            grid.set_id(x, 0, z, floor);
            if x == 0 || x == last || z == 0 || z == last {
                grid.set_id(x, 1, z, wall);
                grid.set_id(x, 2, z, wall);
            }
        }
    }

    // Water pool and lava pit sunk into the ground floor.
    for x in 4..7 {
        for z in 4..7 {
            grid.set_id(x, 0, z, wet_chasm);
        }
    }
    for x in (size - 7)..(size - 5) {
        for z in 4..6 {
            grid.set_id(x, 0, z, lava_chasm);
        }
    }

    // Platform steps along the south side.
    for (step, x) in (5..9).enumerate() {
        grid.set_id(x, 1, size - 4, platform);
        if step >= 2 {
            grid.set_id(x, 1, size - 5, platform);
        }
    }

    // Diagonal braces against the interior corners.
    grid.set_id(2, 1, 2, diagonal_right);
    grid.set_id(last - 2, 1, 2, diagonal_left);

    // An interior wall with one door of each type, under a short roof.
    let mut door_positions = Vec::new();
    let door_z = size / 2 + 3;
    for (i, x) in ((size / 2 - 4)..(size / 2 + 4)).enumerate() {
        let id = match i {
            1 => doors[0],
            3 => doors[1],
            5 => doors[2],
            7 => doors[3],
            _ => wall,
        };
        if id != wall {
            door_positions.push((x as i32, 1, door_z as i32));
        }
        grid.set_id(x, 1, door_z, id);
        grid.set_id(x, 2, door_z, wall);
        grid.set_id(x, 2, door_z - 1, ceiling);
    }

    // Lattice screen and fence row near the pool.
    for z in 8..11 {
        grid.set_id(8, 1, z, lattice);
    }
    for x in 10..14 {
        grid.set_id(x, 1, 8, fence);
    }

    let center = size as f64 / 2.0;
    let entities = vec![
        Entity {
            position: DVec2::new(center - 4.0, center - 2.0),
            flat_index: FLAT_TREE,
            width: 1.2,
            height: 1.6,
            y_offset: 0.0,
            state: 0,
            direction: None,
            angle_count: 1,
            anim_percent: 0.0,
        },
        Entity {
            position: DVec2::new(center + 3.0, center - 5.0),
            flat_index: FLAT_TREE,
            width: 1.0,
            height: 1.4,
            y_offset: 0.0,
            state: 0,
            direction: None,
            angle_count: 1,
            anim_percent: 0.0,
        },
        Entity {
            position: DVec2::new(center, center - 3.0),
            flat_index: FLAT_GHOST,
            width: 0.8,
            height: 1.0,
            y_offset: 0.1,
            state: 0,
            direction: Some(DVec2::new(0.0, 1.0)),
            angle_count: 4,
            anim_percent: 0.0,
        },
        Entity {
            position: DVec2::new(center - 2.0, center + 2.4),
            flat_index: FLAT_TORCH,
            width: 0.4,
            height: 0.8,
            y_offset: 0.0,
            state: 0,
            direction: None,
            angle_count: 1,
            anim_percent: 0.0,
        },
        Entity {
            position: DVec2::new(7.2, 7.4),
            flat_index: FLAT_PUDDLE,
            width: 0.9,
            height: 0.15,
            y_offset: 0.0,
            state: 0,
            direction: None,
            angle_count: 1,
            anim_percent: 0.0,
        },
    ];

    // A light where each torch burns.
    renderer.add_light(0, DVec3::new(center - 2.0, 1.4, center + 2.4), 4.0);
    renderer.add_light(1, DVec3::new(center + 4.0, 1.4, center - 1.0), 3.0);

    DemoWorld {
        grid,
        entities,
        doors: door_positions,
        spawn: DVec3::new(center, 1.5, center),
        ceiling_height: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::threading::RenderThreadsMode;

    #[test]
    fn demo_world_places_every_shape() {
        let mut renderer = SoftwareRenderer::new(16, 12, RenderThreadsMode::VeryLow);
        let world = build_demo_world(&WorldConfig::default(), &mut renderer);

        let mut has = [false; 9];
        for x in 0..world.grid.width() as i32 {
            for y in 0..world.grid.height() as i32 {
                for z in 0..world.grid.depth() as i32 {
                    let index = match world.grid.get(x, y, z) {
                        VoxelDefinition::None => continue,
                        VoxelDefinition::Wall { .. } => 0,
                        VoxelDefinition::Floor { .. } => 1,
                        VoxelDefinition::Ceiling { .. } => 2,
                        VoxelDefinition::Raised { .. } => 3,
                        VoxelDefinition::Diagonal { .. } => 4,
                        VoxelDefinition::TransparentWall { .. } => 5,
                        VoxelDefinition::Edge { .. } => 6,
                        VoxelDefinition::Chasm { .. } => 7,
                        VoxelDefinition::Door { .. } => 8,
                    };
                    has[index] = true;
                }
            }
        }
        assert_eq!(has, [true; 9], "arena must exercise every voxel shape");
    }

    #[test]
    fn spawn_is_inside_open_space() {
        let mut renderer = SoftwareRenderer::new(16, 12, RenderThreadsMode::VeryLow);
        let world = build_demo_world(&WorldConfig::default(), &mut renderer);

        let x = world.spawn.x as i32;
        let z = world.spawn.z as i32;
        assert!(matches!(
            world.grid.get(x, 1, z),
            VoxelDefinition::None
        ));
    }

    #[test]
    fn sky_textures_cover_all_indices() {
        let perlin = Perlin::new(3);
        let sky = build_distant_sky(&perlin);

        let texture_count = sky.textures.len();
        let mut check = |index: usize| {
            assert!(
                index < texture_count,
                "texture index {} out of range {}",
                index,
                texture_count
            );
        };
        for land in &sky.lands {
            check(land.texture_index);
        }
        for anim in &sky.anim_lands {
            check(anim.texture_index + anim.frame_count - 1);
        }
        for air in &sky.airs {
            check(air.texture_index);
        }
        for moon in &sky.moons {
            check(moon.texture_index);
        }
        for star in &sky.stars {
            check(star.texture_index);
        }
        if let Some(sun) = sky.sun_texture_index {
            check(sun);
        }
    }
}
