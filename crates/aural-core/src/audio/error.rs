//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while setting up audio output
///
/// None of these are produced on the real-time path; once a stream runs,
/// every failure degrades to silence.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Render or engine settings rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A helper thread (render worker, GC) could not be started
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawnFailed(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
