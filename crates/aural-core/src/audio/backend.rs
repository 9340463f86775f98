//! Running output system handles

use std::sync::Arc;

use super::config::StreamFormat;
use crate::engine::{AudioEngine, RenderAtomics};

/// Keeps the device stream alive; drop to stop audio
pub struct OutputHandle {
    pub(crate) _stream: cpal::Stream,
    pub(crate) device_name: String,
}

impl OutputHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

/// Result of starting the audio system
///
/// The engine is the simulation thread's entry point; the renderer already
/// lives inside the device callback.
pub struct AudioSystem {
    pub handle: OutputHandle,
    pub engine: AudioEngine,
    pub atomics: Arc<RenderAtomics>,
    /// Format actually negotiated with the device
    pub format: StreamFormat,
    /// One-way output latency of one period
    pub latency_ms: f32,
}
