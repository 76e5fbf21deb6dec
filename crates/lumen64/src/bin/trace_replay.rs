//! # Trace Replay
//!
//! Drives the subsystem with a synthetic load trace and prints what the
//! adaptive controller and the caches did.
//!
//! ```text
//! trace_replay [config.toml]
//!
//!   frames   0..30   light    (entities 10, particles 20, 10 ms)
//!   frames  30..60   overload (entities 35, particles 150, 30 ms)
//!   frames  60..180  recovery (entities 10, particles 20, 10 ms)
//! ```
//!
//! Set `RUST_LOG=lumen64=debug` for per-frame detail.

use std::process::ExitCode;
use std::sync::Arc;

use lumen64::core::{
    AudioPacket, BackendKind, DisplayListRequest, Frame, Primitive, PrimitiveKind, RenderCommand,
    RenderConfig, SceneId, StateSlot, StateValue, Vertex,
};
use lumen64::Subsystem;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LIGHT: (u32, u32, f32) = (10, 20, 10.0);
const OVERLOAD: (u32, u32, f32) = (35, 150, 30.0);
const TOTAL_FRAMES: u64 = 180;

fn triangle(x: f32, y: f32, depth: f32, kind: PrimitiveKind) -> RenderCommand {
    RenderCommand::Draw(Primitive::new(
        vec![
            Vertex::at(x, y, depth),
            Vertex::at(x + 6.0, y, depth),
            Vertex::at(x, y + 6.0, depth),
        ],
        kind,
    ))
}

/// Static scenery, submitted every frame as the same display list.
fn scenery() -> DisplayListRequest {
    let mut commands = vec![RenderCommand::set(StateSlot::Texture0, StateValue::Handle(1))];
    for i in 0..64u16 {
        let x = f32::from(i % 16) * 18.0;
        let y = f32::from(i / 16) * 40.0;
        commands.push(triangle(x, y, 500.0 + f32::from(i) * 50.0, PrimitiveKind::World));
    }
    DisplayListRequest::new(commands)
}

fn phase(index: u64) -> (u32, u32, f32) {
    if (30..60).contains(&index) {
        OVERLOAD
    } else {
        LIGHT
    }
}

fn build_frame(index: u64, scenery: &DisplayListRequest, scene: &SceneId) -> Frame {
    let (entities, particles, frame_ms) = phase(index);
    let mut frame = Frame::new(index)
        .with_scene(scene.clone())
        .with_load(entities, particles)
        .with_frame_time(frame_ms)
        .with_item(RenderCommand::Clear { color: [0, 0, 0, 255], depth: Some(1.0) })
        .with_item(scenery.clone());

    frame.push(RenderCommand::set(StateSlot::BlendMode, StateValue::Bits(1)));
    for p in 0..particles {
        let x = (p * 7 % 300) as f32;
        let y = (p * 13 % 220) as f32;
        frame.push(triangle(x, y, 100.0, PrimitiveKind::Particle));
    }
    for e in 0..entities {
        let depth = 800.0 + e as f32 * 120.0;
        frame.push(triangle((e * 9) as f32, 120.0, depth, PrimitiveKind::Entity));
    }
    frame
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match RenderConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                error!(path = %path, error = %err, "cannot load config");
                return ExitCode::FAILURE;
            }
        },
        None => RenderConfig {
            backend: BackendKind::Recording,
            ..RenderConfig::default()
        },
    };

    let mut subsystem = match Subsystem::init(config) {
        Ok(subsystem) => subsystem,
        Err(err) => {
            error!(error = %err, "cannot start subsystem");
            return ExitCode::FAILURE;
        }
    };

    let scenery = scenery();
    let scene = SceneId::new("replay");
    let mut last_generation = 0;

    println!(
        "{:>5} {:>6} {:>10} {:>9} {:>8} {:>8} {:>7} {:>8}",
        "frame", "levels", "particles", "entities", "dl_hit", "batches", "supp", "overdraw"
    );

    for index in 0..TOTAL_FRAMES {
        let frame = build_frame(index, &scenery, &scene);
        if let Err(err) = subsystem.submit_frame(frame) {
            error!(frame = index, error = %err, "frame rejected");
            break;
        }
        if let Err(err) = subsystem.submit_audio(AudioPacket::new(index, vec![0; 735])) {
            error!(frame = index, error = %err, "audio rejected");
            break;
        }

        let t = subsystem.telemetry();
        let profile = subsystem.quality_profile();
        let levels = t.quality;
        println!(
            "{:>5} {}{}{}{:<3} {:>4}/{:<5} {:>4}/{:<4} {:>7.0}% {:>8} {:>6.0}% {:>8.2}",
            t.frame_index,
            levels.particles,
            levels.shadows as u8,
            levels.fog as u8,
            levels.detail,
            t.particles_skipped,
            t.particles_total,
            t.entities_culled,
            t.entities_total,
            t.dl_hit_rate() * 100.0,
            t.batch_count,
            t.state_suppression_rate() * 100.0,
            t.overdraw_estimate,
        );
        if profile.generation != last_generation {
            last_generation = profile.generation;
            info!(
                generation = profile.generation,
                keep_ratio = profile.particle_keep_ratio,
                shadows = ?profile.shadows,
                lossless = profile.is_lossless(),
                "quality profile changed"
            );
        }
    }

    let telemetry = Arc::clone(&subsystem.context().telemetry);
    let report = subsystem.shutdown();
    let profile = telemetry.profile();
    println!();
    println!("frames processed : {}", report.frames_processed);
    println!("audio packets    : {}", report.audio_packets);
    println!("stalls           : {}", report.pacing.backpressure_stalls);
    println!("final quality    : {:?}", profile.levels);

    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        if let Some(err) = report.error {
            error!(error = %err, "graphics stage failed");
        }
        ExitCode::FAILURE
    }
}
