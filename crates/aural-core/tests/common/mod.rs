//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use aural_core::audio::StreamFormat;
use aural_core::config::RenderConfig;
use aural_core::engine::{AudioEngine, AudioProvider, AudioRenderer, CancelToken};
use aural_core::spatial::Spatializer;
use aural_core::{PlanarBuffer, Pose, ProcessingId, SourceKey};

pub fn inline_engine(frames: u32, channels: u16) -> (AudioEngine, AudioRenderer) {
    let format = StreamFormat::new(48000, channels, frames);
    AudioEngine::new(format, &RenderConfig::inline()).unwrap()
}

/// Run `n` ticks, returning each period's output
pub fn tick_n(renderer: &mut AudioRenderer, n: usize) -> Vec<Vec<f32>> {
    let mut out = vec![0.0; renderer.format().period_samples()];
    (0..n)
        .map(|_| {
            renderer.tick(&mut out);
            out.clone()
        })
        .collect()
}

/// Run `n` ticks paced like a device: tick `k` starts at `start + k * period`
pub fn tick_realtime(renderer: &mut AudioRenderer, n: usize) -> Vec<Vec<f32>> {
    let period = renderer.format().period_duration();
    let mut out = vec![0.0; renderer.format().period_samples()];
    let start = Instant::now();
    let mut outputs = Vec::with_capacity(n);

    for k in 0..n as u32 {
        let due = start + period * k;
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        renderer.tick(&mut out);
        outputs.push(out.clone());
    }
    outputs
}

pub fn all_equal(samples: &[f32], value: f32) -> bool {
    samples.iter().all(|&s| s == value)
}

/// Writes `scale * target` into every sample
pub struct TargetProvider {
    pub scale: f32,
}

impl AudioProvider for TargetProvider {
    fn provide(
        &self,
        target: ProcessingId,
        output: &mut PlanarBuffer,
        _scratch: &mut PlanarBuffer,
        _cancel: CancelToken<'_>,
    ) {
        output.fill(target as f32 * self.scale);
    }
}

/// Sleeps `delay` (or `slow_delay` for `slow_target`), polling for
/// cancellation, then fills `value`
pub struct DelayedProvider {
    pub value: f32,
    pub delay: Duration,
    pub slow_target: Option<ProcessingId>,
    pub slow_delay: Duration,
}

impl DelayedProvider {
    pub fn new(value: f32, delay: Duration) -> Self {
        Self {
            value,
            delay,
            slow_target: None,
            slow_delay: delay,
        }
    }

    pub fn with_slow_target(mut self, target: ProcessingId, delay: Duration) -> Self {
        self.slow_target = Some(target);
        self.slow_delay = delay;
        self
    }
}

impl AudioProvider for DelayedProvider {
    fn provide(
        &self,
        target: ProcessingId,
        output: &mut PlanarBuffer,
        _scratch: &mut PlanarBuffer,
        cancel: CancelToken<'_>,
    ) {
        let delay = if self.slow_target == Some(target) {
            self.slow_delay
        } else {
            self.delay
        };
        let start = Instant::now();
        while start.elapsed() < delay {
            if cancel.is_cancelled() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        output.fill(self.value);
    }
}

/// Writes half a buffer of garbage, then waits until cancelled
pub struct NeverCompletes;

impl AudioProvider for NeverCompletes {
    fn provide(
        &self,
        _target: ProcessingId,
        output: &mut PlanarBuffer,
        _scratch: &mut PlanarBuffer,
        cancel: CancelToken<'_>,
    ) {
        let half = output.len() / 2;
        output.as_mut_slice()[..half].fill(0.7);
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// One call into a spatializer
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Listener(Pose),
    Emitter {
        key: SourceKey,
        emitter: Pose,
        room: Pose,
        volume: f32,
        first_sample: f32,
    },
    Simulate,
    Remove(SourceKey),
}

/// Records every call; `simulate` writes the volume-weighted sum of the
/// registered emitters' first samples into the whole output
pub struct RecordingSpatializer {
    pub events: Arc<Mutex<Vec<RoomEvent>>>,
    pending: f32,
}

impl RecordingSpatializer {
    pub fn new() -> (Self, Arc<Mutex<Vec<RoomEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
                pending: 0.0,
            },
            events,
        )
    }

    fn record(&self, event: RoomEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Spatializer for RecordingSpatializer {
    fn set_listener_transform(&mut self, listener: Pose) {
        self.record(RoomEvent::Listener(listener));
    }

    fn add_emitter(
        &mut self,
        samples: &PlanarBuffer,
        emitter: Pose,
        room: Pose,
        key: SourceKey,
        volume: f32,
    ) {
        let first_sample = samples.as_slice()[0];
        self.pending += first_sample * volume;
        self.record(RoomEvent::Emitter {
            key,
            emitter,
            room,
            volume,
            first_sample,
        });
    }

    fn simulate(&mut self, output: &mut PlanarBuffer, _scratch: &mut PlanarBuffer) {
        output.fill(self.pending);
        self.pending = 0.0;
        self.record(RoomEvent::Simulate);
    }

    fn remove_emitter(&mut self, key: SourceKey) {
        self.record(RoomEvent::Remove(key));
    }
}
