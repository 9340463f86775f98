//! Audio backend configuration
//!
//! Defines the requested output device, sample rate, channel count and buffer
//! size, plus the [`StreamFormat`] actually negotiated with the device.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CHANNELS, SAMPLE_RATE};

/// Smallest buffer period accepted (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Largest buffer period accepted (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Buffer size requested in low-latency mode (~5.3ms @ 48kHz)
pub const LOW_LATENCY_BUFFER_SIZE: u32 = 256;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Use the engine default period
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to the supported range)
    Fixed(u32),
    /// Request a short period for interactive use
    LowLatency,
}

impl BufferSize {
    /// The buffer period in frames
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
            BufferSize::LowLatency => LOW_LATENCY_BUFFER_SIZE,
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.frames() as f32 / sample_rate.max(1) as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None = default host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Requested output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = use system default)
    pub device: Option<DeviceId>,
    /// Requested sample rate; the device's actual rate wins on mismatch
    pub sample_rate: u32,
    /// Requested channel count
    pub channels: u16,
    /// Preferred buffer size
    pub buffer_size: BufferSize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            buffer_size: BufferSize::default(),
        }
    }
}

impl AudioConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            buffer_size: BufferSize::LowLatency,
            ..Default::default()
        }
    }

    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// The format this config asks for, before device negotiation
    pub fn requested_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels, self.buffer_size.frames())
    }
}

/// Output format fixed at initialization
///
/// Every tick renders exactly `buffer_frames` frames of `channels`
/// interleaved samples at `sample_rate`. It never changes mid-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: u32,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16, buffer_frames: u32) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_frames,
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels as usize
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.buffer_frames as usize
    }

    /// Interleaved samples per tick
    #[inline]
    pub fn period_samples(&self) -> usize {
        self.frames() * self.channel_count()
    }

    /// Bytes per tick of interleaved `f32`
    #[inline]
    pub fn period_bytes(&self) -> usize {
        self.period_samples() * std::mem::size_of::<f32>()
    }

    /// Wall-clock length of one tick
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_frames as f64 / self.sample_rate.max(1) as f64)
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        AudioConfig::default().requested_format()
    }
}
