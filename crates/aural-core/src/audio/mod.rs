//! Audio output for Aural
//!
//! Opens a cpal output stream whose callback owns the engine's
//! [`AudioRenderer`](crate::engine::AudioRenderer):
//!
//! - **Simulation thread**: fills and publishes snapshots through the
//!   [`AudioEngine`](crate::engine::AudioEngine)
//! - **Audio thread**: swaps in the latest snapshot and renders one period
//!   per tick, never blocking
//! - **Atomics**: processing ID, drops and frame counters for any thread
//!
//! # Example Usage
//!
//! ```ignore
//! use aural_core::audio::start_audio_system;
//! use aural_core::config::EngineConfig;
//! use aural_core::engine::LogDropHook;
//!
//! let mut system = start_audio_system(&EngineConfig::default(), LogDropHook)?;
//! let source = system.engine.create_source(my_provider);
//! system.engine.begin_snapshot().add_ambient(&source, 1.0);
//! system.engine.publish_snapshot();
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;

pub use backend::{AudioSystem, OutputHandle};
pub use config::{
    AudioConfig, BufferSize, DeviceId, StreamFormat, DEFAULT_BUFFER_SIZE, LOW_LATENCY_BUFFER_SIZE,
    MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
pub use cpal_backend::{negotiate_format, start_audio_system};
pub use device::{default_output_device, find_device_by_id, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
