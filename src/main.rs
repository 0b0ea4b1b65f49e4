/// Main application entry point
/// Handles window creation, input, and render loop
use glam::{DVec2, DVec3};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use column_caster::world::{build_demo_world, WorldConfig};
use column_caster::{RenderThreadsMode, SoftwareRenderer};
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

/// Seconds per full in-game day.
const DAY_LENGTH_SECONDS: f64 = 240.0;
const MOVE_SPEED: f64 = 4.0;
const MOUSE_SENSITIVITY: f64 = 0.0035;
/// Keep the pitch shear finite.
const MAX_PITCH_RADIANS: f64 = 1.0;

#[derive(Default)]
struct InputState {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

fn main() {
    env_logger::init();

    println!("=== Column Caster - 2.5D Voxel Raycaster ===");
    println!("Controls:");
    println!("  WASD - Move");
    println!("  Space/Shift - Up/Down");
    println!("  Mouse (click to capture) - Look around");
    println!("  F - Toggle player light");
    println!("  N - Toggle night lights");
    println!("  P - Toggle parallax sky");
    println!("  1/2/3 - Render threads: one, half, all cores");
    println!("  ESC - Release mouse / exit");
    println!();

    let event_loop = EventLoop::new().unwrap();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Column Caster")
            .with_inner_size(winit::dpi::LogicalSize::new(960, 600))
            .build(&event_loop)
            .unwrap(),
    );

    let context = softbuffer::Context::new(window.clone()).unwrap();
    let mut surface = softbuffer::Surface::new(&context, window.clone()).unwrap();

    let window_size = window.inner_size();
    let mut width = window_size.width.max(1) as usize;
    let mut height = window_size.height.max(1) as usize;

    let mut renderer = SoftwareRenderer::new(width, height, RenderThreadsMode::Medium);
    renderer.set_fog_distance(30.0);

    println!("Building demo world...");
    let build_start = Instant::now();
    let mut world = build_demo_world(&WorldConfig::default(), &mut renderer);
    println!(
        "World setup: {:.2}ms ({} entities, {} doors)\n",
        build_start.elapsed().as_secs_f64() * 1e3,
        world.entities.len(),
        world.doors.len()
    );

    let mut output = vec![0u32; width * height];
    let mut eye = world.spawn;
    let mut yaw: f64 = 0.0;
    let mut pitch: f64 = 0.0;

    let mut input = InputState::default();
    let mut mouse_captured = false;
    let mut last_mouse_pos: Option<(f64, f64)> = None;
    let mut player_light = false;
    let mut night_lights = false;
    let mut parallax_sky = false;

    let start_time = Instant::now();
    let mut last_frame = Instant::now();
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        renderer.frame_stats().print_summary();
                        elwt.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        width = new_size.width.max(1) as usize;
                        height = new_size.height.max(1) as usize;
                        renderer.resize(width, height);
                        output.resize(width * height, 0);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let pressed = event.state == ElementState::Pressed;

                        if let PhysicalKey::Code(keycode) = event.physical_key {
                            match keycode {
                                KeyCode::KeyW => input.forward = pressed,
                                KeyCode::KeyS => input.backward = pressed,
                                KeyCode::KeyA => input.left = pressed,
                                KeyCode::KeyD => input.right = pressed,
                                KeyCode::Space => input.up = pressed,
                                KeyCode::ShiftLeft => input.down = pressed,
                                KeyCode::KeyF if pressed => {
                                    player_light = !player_light;
                                    renderer.set_player_light_active(player_light);
                                    println!(
                                        "Player light: {}",
                                        if player_light { "ON" } else { "OFF" }
                                    );
                                }
                                KeyCode::KeyN if pressed => {
                                    night_lights = !night_lights;
                                    renderer.set_night_lights_active(night_lights);
                                    println!(
                                        "Night lights: {}",
                                        if night_lights { "ON" } else { "OFF" }
                                    );
                                }
                                KeyCode::KeyP if pressed => {
                                    parallax_sky = !parallax_sky;
                                    println!(
                                        "Parallax sky: {}",
                                        if parallax_sky { "ON" } else { "OFF" }
                                    );
                                }
                                KeyCode::Digit1 if pressed => {
                                    renderer.set_render_threads(RenderThreadsMode::VeryLow);
                                    println!("Render threads: one");
                                }
                                KeyCode::Digit2 if pressed => {
                                    renderer.set_render_threads(RenderThreadsMode::Medium);
                                    println!("Render threads: half the cores");
                                }
                                KeyCode::Digit3 if pressed => {
                                    renderer.set_render_threads(RenderThreadsMode::Max);
                                    println!("Render threads: all cores");
                                }
                                KeyCode::Escape if pressed => {
                                    if mouse_captured {
                                        mouse_captured = false;
                                        last_mouse_pos = None;
                                        window.set_cursor_visible(true);
                                    } else {
                                        renderer.frame_stats().print_summary();
                                        elwt.exit();
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        if button == MouseButton::Left && state == ElementState::Pressed {
                            mouse_captured = true;
                            window.set_cursor_visible(false);
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        if mouse_captured {
                            if let Some(last_pos) = last_mouse_pos {
                                yaw += (position.x - last_pos.0) * MOUSE_SENSITIVITY;
                                pitch = (pitch - (position.y - last_pos.1) * MOUSE_SENSITIVITY)
                                    .clamp(-MAX_PITCH_RADIANS, MAX_PITCH_RADIANS);
                            }
                            last_mouse_pos = Some((position.x, position.y));
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = (now - last_frame).as_secs_f64();
                        last_frame = now;

                        // Move along the flattened forward/right axes.
                        let forward_xz = DVec2::new(yaw.cos(), yaw.sin());
                        let right_xz = DVec2::new(-forward_xz.y, forward_xz.x);
                        let mut movement = DVec3::ZERO;
                        if input.forward {
                            movement += DVec3::new(forward_xz.x, 0.0, forward_xz.y);
                        }
                        if input.backward {
                            movement -= DVec3::new(forward_xz.x, 0.0, forward_xz.y);
                        }
                        if input.right {
                            movement += DVec3::new(right_xz.x, 0.0, right_xz.y);
                        }
                        if input.left {
                            movement -= DVec3::new(right_xz.x, 0.0, right_xz.y);
                        }
                        if input.up {
                            movement += DVec3::Y;
                        }
                        if input.down {
                            movement -= DVec3::Y;
                        }
                        if movement != DVec3::ZERO {
                            eye += movement.normalize() * MOVE_SPEED * dt;
                        }

                        let elapsed = start_time.elapsed().as_secs_f64();
                        // Start the cycle mid-morning.
                        let daytime_percent = (0.30 + elapsed / DAY_LENGTH_SECONDS).fract();
                        let ambient =
                            0.20 + 0.60 * (daytime_percent * std::f64::consts::PI).sin().max(0.0);

                        // Scene animation: doors cycle open and closed,
                        // chasms and the volcano loop, the ghost circles.
                        for (i, &(x, y, z)) in world.doors.iter().enumerate() {
                            let phase = elapsed * 0.4 + i as f64 * 0.7;
                            renderer.set_door_open_percent(x, y, z, phase.sin().abs());
                        }
                        renderer.set_chasm_anim_percent((elapsed * 0.35).fract());
                        renderer.set_distant_anim_percent((elapsed * 0.20).fract());
                        for entity in &mut world.entities {
                            entity.anim_percent = (elapsed * 1.1).fract();
                            if entity.direction.is_some() {
                                let angle = elapsed * 0.8;
                                entity.direction =
                                    Some(DVec2::new(angle.cos(), angle.sin()));
                            }
                        }

                        let direction = DVec3::new(
                            forward_xz.x * pitch.cos(),
                            pitch.sin(),
                            forward_xz.y * pitch.cos(),
                        );
                        renderer.render(
                            eye,
                            direction,
                            70.0_f64.to_radians(),
                            ambient,
                            daytime_percent,
                            0.15,
                            parallax_sky,
                            world.ceiling_height,
                            &world.grid,
                            &world.entities,
                            &mut output,
                        );

                        surface
                            .resize(
                                NonZeroU32::new(width as u32).unwrap(),
                                NonZeroU32::new(height as u32).unwrap(),
                            )
                            .unwrap();
                        let mut buffer = surface.buffer_mut().unwrap();
                        buffer.copy_from_slice(&output);
                        buffer.present().unwrap();

                        frame_count += 1;
                        if fps_timer.elapsed().as_secs() >= 1 {
                            let stats = renderer.frame_stats();
                            println!(
                                "FPS: {} | clear {:.0}μs | vis {:.0}μs | draw {:.0}μs",
                                frame_count,
                                stats.clear_us,
                                stats.vis_testing_us,
                                stats.drawing_us
                            );
                            frame_count = 0;
                            fps_timer = Instant::now();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .unwrap();
}
