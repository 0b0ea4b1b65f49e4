//! Integration tests that exercise the full rendering pipeline.
//! These act as correctness tests and lightweight, programmatic
//! benchmarks of the end-to-end path: grid -> ray cast -> shaded frame.

use std::time::Instant;

use glam::{DVec2, DVec3};
use column_caster::rendering::{FlatTexture, VoxelTexture};
use column_caster::voxel::VoxelTextureIds;
use column_caster::*;

const WIDTH: usize = 160;
const HEIGHT: usize = 120;

const TEX_FLOOR: usize = 1;
const TEX_RED: usize = 2;
const TEX_GREEN: usize = 3;

fn solid_voxel_texture(argb: u32) -> VoxelTexture {
    VoxelTexture::from_argb(1, 1, &[argb])
}

/// Renderer with one-color textures and a single-color sky palette so
/// pixel channels can be compared without knowing the exact shading.
fn make_renderer() -> SoftwareRenderer {
    let mut renderer = SoftwareRenderer::new(WIDTH, HEIGHT, RenderThreadsMode::VeryLow);
    renderer.set_sky_palette(&[0xFF2040A0]);
    renderer.set_voxel_texture(TEX_FLOOR, solid_voxel_texture(0xFF808080));
    renderer.set_voxel_texture(TEX_RED, solid_voxel_texture(0xFFFF0000));
    renderer.set_voxel_texture(TEX_GREEN, solid_voxel_texture(0xFF00FF00));
    renderer
}

/// 16x3x16 grid with a stone floor, an open interior, and the given
/// wall texture registered. Returns the grid and the wall id.
fn make_room(wall_texture: usize) -> (VoxelGrid, u16) {
    let mut grid = VoxelGrid::new(16, 3, 16);
    let floor = grid.add_definition(VoxelDefinition::Wall {
        textures: VoxelTextureIds {
            side: TEX_FLOOR,
            floor: TEX_FLOOR,
            ceiling: TEX_FLOOR,
        },
    });
    let wall = grid.add_definition(VoxelDefinition::Wall {
        textures: VoxelTextureIds {
            side: wall_texture,
            floor: wall_texture,
            ceiling: wall_texture,
        },
    });
    for z in 0..16 {
        for x in 0..16 {
            grid.set_id(x, 0, z, floor);
        }
    }
    (grid, wall)
}

fn render_frame(renderer: &mut SoftwareRenderer, grid: &VoxelGrid, entities: &[Entity]) -> Vec<u32> {
    let mut output = vec![0u32; WIDTH * HEIGHT];
    renderer.render(
        DVec3::new(8.0, 1.5, 2.0),
        DVec3::new(0.0, 0.0, 1.0),
        70.0_f64.to_radians(),
        0.30,
        0.50,
        0.0,
        false,
        1.0,
        grid,
        entities,
        &mut output,
    );
    output
}

fn center_pixel(frame: &[u32]) -> u32 {
    frame[(HEIGHT / 2) * WIDTH + WIDTH / 2]
}

fn red_channel(argb: u32) -> u32 {
    (argb >> 16) & 0xFF
}

fn green_channel(argb: u32) -> u32 {
    (argb >> 8) & 0xFF
}

fn blue_channel(argb: u32) -> u32 {
    argb & 0xFF
}

#[test]
fn wall_ahead_covers_the_horizon() {
    let mut renderer = make_renderer();
    let (mut grid, wall) = make_room(TEX_RED);
    for x in 0..16 {
        grid.set_id(x, 1, 8, wall);
        grid.set_id(x, 2, 8, wall);
    }

    let start = Instant::now();
    let frame = render_frame(&mut renderer, &grid, &[]);
    println!(
        "[PIPELINE] wall_ahead_covers_the_horizon: {:?}",
        start.elapsed()
    );

    let center = center_pixel(&frame);
    assert!(
        red_channel(center) > green_channel(center) && red_channel(center) > blue_channel(center),
        "center pixel {:08X} should be dominated by the red wall",
        center
    );

    // Sky above the wall keeps the palette's blue bias.
    let top = frame[WIDTH / 2];
    assert!(
        blue_channel(top) > red_channel(top),
        "top pixel {:08X} should still be sky",
        top
    );
}

#[test]
fn nearer_wall_wins_over_farther_wall() {
    let mut renderer = make_renderer();
    let (mut grid, red_wall) = make_room(TEX_RED);
    let green_wall = grid.add_definition(VoxelDefinition::Wall {
        textures: VoxelTextureIds {
            side: TEX_GREEN,
            floor: TEX_GREEN,
            ceiling: TEX_GREEN,
        },
    });
    for x in 0..16 {
        grid.set_id(x, 1, 12, red_wall);
        grid.set_id(x, 2, 12, red_wall);
    }
    for x in 0..16 {
        grid.set_id(x, 1, 6, green_wall);
        grid.set_id(x, 2, 6, green_wall);
    }

    let frame = render_frame(&mut renderer, &grid, &[]);
    let center = center_pixel(&frame);
    assert!(
        green_channel(center) > red_channel(center),
        "the nearer green wall must occlude the red one, got {:08X}",
        center
    );
}

#[test]
fn opening_a_door_reveals_the_wall_behind_it() {
    let mut renderer = make_renderer();
    let (mut grid, red_wall) = make_room(TEX_RED);
    let door = grid.add_definition(VoxelDefinition::Door {
        texture: TEX_GREEN,
        door_type: DoorType::Raising,
    });
    grid.set_id(8, 1, 6, door);
    for x in 0..16 {
        grid.set_id(x, 1, 12, red_wall);
        grid.set_id(x, 2, 12, red_wall);
    }

    // Eye centered in the door's column so the middle ray passes
    // through the doorway.
    let render_at_door = |renderer: &mut SoftwareRenderer| {
        let mut output = vec![0u32; WIDTH * HEIGHT];
        renderer.render(
            DVec3::new(8.5, 1.5, 2.5),
            DVec3::new(0.0, 0.0, 1.0),
            70.0_f64.to_radians(),
            0.30,
            0.50,
            0.0,
            false,
            1.0,
            &grid,
            &[],
            &mut output,
        );
        output
    };

    let closed = render_at_door(&mut renderer);
    let closed_center = center_pixel(&closed);
    assert!(
        green_channel(closed_center) > red_channel(closed_center),
        "closed door should show its own texture, got {:08X}",
        closed_center
    );

    renderer.set_door_open_percent(8, 1, 6, 0.95);
    let open = render_at_door(&mut renderer);
    let open_center = center_pixel(&open);
    assert!(
        red_channel(open_center) > green_channel(open_center),
        "a nearly open raising door should reveal the wall behind, got {:08X}",
        open_center
    );
}

#[test]
fn fading_a_wall_to_completion_removes_it() {
    let mut renderer = make_renderer();
    let (mut grid, wall) = make_room(TEX_RED);
    for x in 0..16 {
        grid.set_id(x, 1, 6, wall);
        grid.set_id(x, 2, 6, wall);
    }

    let before = render_frame(&mut renderer, &grid, &[]);
    for x in 0..16 {
        renderer.set_fade_percent(x as i32, 1, 6, 1.0);
        renderer.set_fade_percent(x as i32, 2, 6, 1.0);
    }
    let after = render_frame(&mut renderer, &grid, &[]);

    let before_center = center_pixel(&before);
    let after_center = center_pixel(&after);
    assert!(
        red_channel(before_center) > blue_channel(before_center),
        "wall should be visible before fading, got {:08X}",
        before_center
    );
    assert!(
        blue_channel(after_center) >= red_channel(after_center),
        "fully faded wall should expose the sky, got {:08X}",
        after_center
    );
}

#[test]
fn billboard_flat_draws_in_front_of_a_wall() {
    let mut renderer = make_renderer();
    let (mut grid, red_wall) = make_room(TEX_RED);
    for x in 0..16 {
        grid.set_id(x, 1, 12, red_wall);
        grid.set_id(x, 2, 12, red_wall);
    }

    renderer.set_flat_texture_frames(
        0,
        0,
        0,
        vec![FlatTexture::from_argb(1, 1, &[0xFFFFFFFF], false)],
    );
    let entity = Entity {
        position: DVec2::new(8.0, 6.0),
        flat_index: 0,
        width: 1.0,
        height: 1.0,
        y_offset: 0.0,
        state: 0,
        direction: None,
        angle_count: 1,
        anim_percent: 0.0,
    };

    let without = render_frame(&mut renderer, &grid, &[]);
    let with = render_frame(&mut renderer, &grid, &[entity]);

    let without_pixel = center_pixel(&without);
    let with_pixel = center_pixel(&with);
    assert_ne!(
        without_pixel, with_pixel,
        "the flat should change pixels in front of the wall"
    );
    assert!(
        green_channel(with_pixel) > green_channel(without_pixel),
        "a white flat over a red wall raises the green channel, got {:08X} -> {:08X}",
        without_pixel,
        with_pixel
    );
}

#[test]
fn fog_pulls_distant_walls_toward_the_horizon_color() {
    let mut renderer = make_renderer();
    renderer.set_fog_distance(8.0);
    let (mut grid, wall) = make_room(TEX_RED);
    for x in 0..16 {
        grid.set_id(x, 1, 14, wall);
        grid.set_id(x, 2, 14, wall);
    }

    // Same wall row seen from two distances along the same heading.
    let view_from = |renderer: &mut SoftwareRenderer, eye_z: f64| {
        let mut output = vec![0u32; WIDTH * HEIGHT];
        renderer.render(
            DVec3::new(8.0, 1.5, eye_z),
            DVec3::new(0.0, 0.0, 1.0),
            70.0_f64.to_radians(),
            0.30,
            0.50,
            0.0,
            false,
            1.0,
            &grid,
            &[],
            &mut output,
        );
        output
    };

    let near_frame = view_from(&mut renderer, 12.0);
    let far_frame = view_from(&mut renderer, 2.0);

    let near_pixel = center_pixel(&near_frame);
    let far_pixel = center_pixel(&far_frame);
    let near_redness = red_channel(near_pixel) as i64 - blue_channel(near_pixel) as i64;
    let far_redness = red_channel(far_pixel) as i64 - blue_channel(far_pixel) as i64;
    assert!(
        near_redness > far_redness,
        "fog should wash out the farther view of the wall ({:08X} vs {:08X})",
        near_pixel,
        far_pixel
    );
}

#[test]
fn demo_world_renders_from_spawn() {
    let mut renderer = SoftwareRenderer::new(WIDTH, HEIGHT, RenderThreadsMode::Low);
    let world = build_demo_world(&WorldConfig::default(), &mut renderer);
    let mut output = vec![0u32; WIDTH * HEIGHT];

    let start = Instant::now();
    renderer.render(
        world.spawn,
        DVec3::new(1.0, 0.0, 0.2).normalize(),
        70.0_f64.to_radians(),
        0.40,
        0.35,
        0.15,
        false,
        world.ceiling_height,
        &world.grid,
        &world.entities,
        &mut output,
    );
    let elapsed = start.elapsed();

    let stats = renderer.frame_stats();
    println!(
        "[PIPELINE] demo_world_renders_from_spawn: {:?} (clear {:.0}us, vis {:.0}us, draw {:.0}us)",
        elapsed, stats.clear_us, stats.vis_testing_us, stats.drawing_us
    );

    let distinct = {
        let mut colors: Vec<u32> = output.clone();
        colors.sort_unstable();
        colors.dedup();
        colors.len()
    };
    assert!(
        distinct > 16,
        "a demo world frame should contain many distinct colors, got {}",
        distinct
    );
    assert!(
        stats.total_us > 0.0,
        "frame stats should record elapsed time"
    );
}
