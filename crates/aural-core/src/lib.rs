//! Aural Core - real-time spatial audio mixing
//!
//! Renders spatialized point sources, ambient sources and a listener effect
//! graph into the interleaved period consumed by the audio device, under a
//! hard per-callback deadline.

pub mod audio;
pub mod config;
pub mod types;
pub mod effect;
pub mod spatial;
pub mod engine;

pub use types::*;
