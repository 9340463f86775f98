//! Aural Player - reference host for the aural mixing core
//!
//! Opens the configured output device and drives the engine the way a game
//! loop would:
//! 1. A simulation thread publishes one snapshot per tick (~60Hz) with a sine
//!    emitter orbiting the listener inside a distance-attenuating room
//! 2. The device callback renders, mixes and reports dropped renders
//! 3. The main thread monitors drops and render counters once per second
//!
//! ## Command line flags
//!
//! - `--list-devices`: Print output devices and exit
//! - `--save-config`: Write the effective config to the default path and exit
//! - `--tone`: Attach a listener effect graph with a reference tone
//! - `--seconds <n>`: Run for `n` seconds (default 30)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use basedrop::Shared;
use glam::{Quat, Vec3};

use aural_core::audio::{get_output_devices, start_audio_system, AudioSystem};
use aural_core::config::{default_config_path, load_config, save_config, EngineConfig};
use aural_core::effect::{EffectGraph, GainEffect, ListenerGraph, ToneEffect};
use aural_core::engine::{drop_channel, AudioEngine, AudioSource, SineProvider};
use aural_core::spatial::{DistanceSpatializer, Room};
use aural_core::Pose;

const SIM_RATE_HZ: f32 = 60.0;
const ORBIT_RADIUS: f32 = 3.0;
/// Radians per second
const ORBIT_SPEED: f32 = 0.8;
const ROOM_RADIUS: f32 = 20.0;

/// Everything the simulation tick lists in its snapshot
struct Scene {
    room: Shared<Room>,
    emitter: Shared<AudioSource>,
    hum: Shared<AudioSource>,
    listener_graph: Option<Shared<ListenerGraph>>,
}

impl Scene {
    fn build(engine: &mut AudioEngine, with_tone: bool) -> Self {
        let format = engine.format();
        let spatializer = DistanceSpatializer::new(format.channel_count(), format.frames());
        let room = engine.create_room(spatializer, Some(ROOM_RADIUS));
        let emitter = engine.create_source(SineProvider::new(440.0, 0.4, format.sample_rate));
        let hum = engine.create_source(SineProvider::new(110.0, 0.05, format.sample_rate));

        let listener_graph = with_tone.then(|| {
            let mut graph = EffectGraph::new()
                .with_node(ToneEffect::new(format.sample_rate))
                .with_node(GainEffect::new());
            graph.set_param(0, 1, 0.1); // tone level
            engine.create_listener_graph(graph)
        });

        Self {
            room,
            emitter,
            hum,
            listener_graph,
        }
    }

    /// Fill and publish the snapshot for simulation time `t`
    fn publish(&self, engine: &mut AudioEngine, t: f32) -> u64 {
        let angle = t * ORBIT_SPEED;
        let position = Vec3::new(angle.cos(), 0.0, angle.sin()) * ORBIT_RADIUS;

        let snapshot = engine.begin_snapshot();
        snapshot.set_listener(Pose::IDENTITY);
        snapshot.add_room(&self.room, Pose::IDENTITY);
        snapshot.add_point_source(&self.emitter, Pose::new(position, Quat::IDENTITY), 1.0);
        snapshot.add_ambient(&self.hum, 1.0);
        snapshot.set_listener_graph(self.listener_graph.as_ref());
        engine.publish_snapshot()
    }
}

/// Returns the engine so it can outlive the device stream
fn run_simulation(
    mut engine: AudioEngine,
    with_tone: bool,
    running: Arc<AtomicBool>,
) -> AudioEngine {
    let scene = Scene::build(&mut engine, with_tone);
    let tick = Duration::from_secs_f32(1.0 / SIM_RATE_HZ);
    let start = Instant::now();
    let mut next = start;

    log::info!("Simulation thread running at {}Hz", SIM_RATE_HZ);
    while running.load(Ordering::Relaxed) {
        let sequence = scene.publish(&mut engine, start.elapsed().as_secs_f32());
        if sequence % (SIM_RATE_HZ as u64 * 10) == 0 {
            log::debug!("Published snapshot {}", sequence);
        }

        next += tick;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    engine.destroy_source(scene.emitter);
    engine.destroy_source(scene.hum);
    engine.begin_snapshot();
    engine.publish_snapshot();
    log::info!("Simulation thread stopped");
    engine
}

fn list_devices() -> Result<()> {
    let devices = get_output_devices().context("Failed to enumerate output devices")?;
    if devices.is_empty() {
        println!("No output devices found");
        return Ok(());
    }
    for device in devices {
        println!(
            "{} {} [{}] {} ch, f32: {}, rates: {:?}",
            if device.is_default { "*" } else { " " },
            device.name,
            device.host,
            device.max_channels,
            device.supports_f32,
            device.sample_rates
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let with_tone = args.iter().any(|arg| arg == "--tone");
    let seconds = args
        .iter()
        .position(|arg| arg == "--seconds")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("--seconds expects a whole number")?
        .unwrap_or(30);

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if args.iter().any(|arg| arg == "--list-devices") {
        return list_devices();
    }

    let config_path = default_config_path();
    let config: EngineConfig = load_config(&config_path);

    if args.iter().any(|arg| arg == "--save-config") {
        save_config(&config, &config_path)?;
        println!("Config written to {}", config_path.display());
        return Ok(());
    }

    let (drop_hook, mut drops) = drop_channel();
    let AudioSystem {
        handle,
        engine,
        atomics,
        format,
        latency_ms,
    } = start_audio_system(&config, drop_hook).context("Failed to start audio output")?;

    println!(
        "Playing on {} ({}Hz, {} ch, {} frames, ~{:.1}ms) for {}s",
        handle.device_name(),
        format.sample_rate,
        format.channels,
        format.buffer_frames,
        latency_ms,
        seconds
    );

    let running = Arc::new(AtomicBool::new(true));
    let simulation = {
        let running = running.clone();
        thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || run_simulation(engine, with_tone, running))
            .context("Failed to spawn simulation thread")?
    };

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_secs(1));
        let recent = drops.drain();
        if recent > 0 {
            log::warn!("{} renders dropped in the last second", recent);
        }
        log::info!(
            "tick {} | {:.1}s rendered | snapshot {} | drops {}",
            atomics.processing_id(),
            atomics.rendered_frames() as f64 / format.sample_rate as f64,
            atomics.snapshot_sequence(),
            drops.total()
        );
    }

    running.store(false, Ordering::Relaxed);
    let engine = simulation.join();
    // Stop the callback before the engine's collector goes away
    drop(handle);
    if engine.is_err() {
        log::error!("Simulation thread panicked");
    }

    log::info!("Stopped after {} dropped renders", drops.total());
    Ok(())
}
