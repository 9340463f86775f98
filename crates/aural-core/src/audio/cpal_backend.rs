//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐  publish_snapshot()  ┌─────────────────────┐
//! │ Simulation Thread│─────────────────────►│  Snapshot Exchange  │
//! │  (AudioEngine)   │                      │   (triple buffer)   │
//! └──────────────────┘                      └──────────┬──────────┘
//!         ▲                                            │ swap()
//!         │ Relaxed atomics                            ▼
//! ┌──────────────────┐                      ┌─────────────────────┐
//! │  RenderAtomics   │◄─────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │                      │  (owns renderer)    │
//! └──────────────────┘                      └──────────┬──────────┘
//!                                                      │ try_send()
//!                                           ┌──────────▼──────────┐
//!                                           │   audio-worker-N    │
//!                                           │  (render providers) │
//!                                           └─────────────────────┘
//! ```
//!
//! The device format is negotiated once. Where the device cannot honor the
//! requested rate or channel count, its actual format is adopted and the
//! whole engine is built for it.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};

use super::backend::{AudioSystem, OutputHandle};
use super::config::{AudioConfig, StreamFormat};
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::config::EngineConfig;
use crate::engine::{AudioEngine, AudioRenderer, DropHook};

/// Pick an `f32` output configuration as close to `config` as the device allows
///
/// Returns the cpal stream config and the format the engine must render.
pub fn negotiate_format(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(StreamConfig, StreamFormat)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let Some(first) = supported.first() else {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    };

    let candidates: Vec<_> = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();
    if candidates.is_empty() {
        return Err(AudioError::UnsupportedFormat(format!(
            "device offers no f32 output (first config: {:?})",
            first.sample_format()
        )));
    }

    let rate = config.sample_rate;
    let channels = config.channels;

    let best = candidates
        .iter()
        .find(|c| c.channels() == channels && supports_rate(c, rate))
        .or_else(|| {
            candidates
                .iter()
                .find(|c| c.channels() >= channels && supports_rate(c, rate))
        })
        .or_else(|| candidates.iter().find(|c| supports_rate(c, rate)))
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| AudioError::ConfigError("No suitable output configuration".to_string()))?;

    let sample_rate = if supports_rate(best, rate) {
        rate
    } else {
        let fallback = best.max_sample_rate().0;
        log::warn!(
            "Audio device doesn't support {}Hz, adopting {}Hz",
            rate,
            fallback
        );
        fallback
    };

    if best.channels() != channels {
        log::warn!(
            "Audio device doesn't offer {} channels, adopting {}",
            channels,
            best.channels()
        );
    }

    let requested_frames = config.buffer_size.frames();
    let (buffer_size, frames) = match best.buffer_size() {
        SupportedBufferSize::Range { min, max } if min <= max => {
            let frames = requested_frames.clamp(*min, *max);
            (CpalBufferSize::Fixed(frames), frames)
        }
        // Device picks its own callback length; render_stream absorbs it
        _ => (CpalBufferSize::Default, requested_frames),
    };

    let stream_config = StreamConfig {
        channels: best.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size,
    };
    let format = StreamFormat::new(sample_rate, best.channels(), frames);

    log::debug!("Negotiated {:?} for requested {:?}", format, config.requested_format());
    Ok((stream_config, format))
}

fn supports_rate(config: &cpal::SupportedStreamConfigRange, rate: u32) -> bool {
    rate >= config.min_sample_rate().0 && rate <= config.max_sample_rate().0
}

/// Open the configured output device and start rendering
///
/// Device and format errors happen here, before anything runs on the audio
/// thread. `drop_hook` receives every callback's drop count.
pub fn start_audio_system(
    config: &EngineConfig,
    drop_hook: impl DropHook + 'static,
) -> AudioResult<AudioSystem> {
    config.validate()?;

    let device = match &config.audio.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (stream_config, format) = negotiate_format(&device, &config.audio)?;
    let latency_ms = format.period_duration().as_secs_f32() * 1000.0;
    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        format.channels,
        format.sample_rate,
        format.buffer_frames,
        latency_ms
    );

    let (engine, renderer) = AudioEngine::new(format, &config.render)?;
    let atomics = engine.atomics();
    let renderer = renderer.with_drop_hook(drop_hook);

    let stream = build_output_stream(&device, &stream_config, renderer)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioSystem {
        handle: OutputHandle {
            _stream: stream,
            device_name,
        },
        engine,
        atomics,
        format,
        latency_ms,
    })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut renderer: AudioRenderer,
) -> AudioResult<cpal::Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                renderer.render_stream(data);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
