//! Audio driver layer.
//!
//! [`AudioDriver`] is the narrow surface the engine needs from a platform
//! backend; [`CpalDriver`] is the one real implementation, reaching
//! CoreAudio, WASAPI, ASIO, and PipeWire (via its ALSA layer) through
//! cpal. Requested backend names map onto cpal hosts; `auto` takes the
//! platform default.
//!
//! # Duplex plumbing
//!
//! cpal gives us two independent callbacks, one per direction. The input
//! callback converts the device's channel layout to interleaved stereo and
//! produces into the SPSC ring; the output callback drains the ring, runs
//! the DSP pipeline, and maps the processed stereo onto the device's
//! output layout. Neither callback allocates: the conversion buffers come
//! out of the engine's buffer pool at build time and the ring is
//! fixed-size.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use amperio_core::{ring_buffer, BufferPool, PooledBuffer};

use crate::error::EngineError;
use crate::pipeline::DspPipeline;

/// Backend names accepted by the CLI and
/// [`CpalDriver::build`].
pub const DRIVER_NAMES: &[&str] = &["auto", "WASAPI", "ASIO", "CoreAudio", "PipeWire"];

/// Largest buffer (in frames) the conversion path is sized for.
pub const MAX_FRAMES: usize = 8192;

/// What the engine needs from a platform audio backend.
pub trait AudioDriver {
    /// Begin streaming. Idempotence is handled by the engine.
    fn start(&mut self) -> Result<(), EngineError>;
    /// Halt streaming; blocks until the backend confirms.
    fn stop(&mut self) -> Result<(), EngineError>;
    /// Negotiated sample rate in Hz.
    fn sample_rate(&self) -> u32;
    /// Negotiated buffer size in frames.
    fn buffer_size(&self) -> u32;
    /// Device input channel count.
    fn input_channels(&self) -> u16;
    /// Device output channel count.
    fn output_channels(&self) -> u16;
    /// Estimated input latency in seconds.
    fn input_latency(&self) -> f64;
    /// Estimated output latency in seconds.
    fn output_latency(&self) -> f64;
}

/// cpal-backed duplex driver.
pub struct CpalDriver {
    input_stream: cpal::Stream,
    output_stream: cpal::Stream,
    sample_rate: u32,
    buffer_size: u32,
    input_channels: u16,
    output_channels: u16,
}

impl CpalDriver {
    /// Resolve a backend name, open the default duplex devices, and wire
    /// `pipeline` into the output callback.
    ///
    /// The negotiated sample rate may differ from `requested_rate` when
    /// the device does not support it; a warning is logged and the device
    /// default wins. `pool` supplies the channel-conversion buffers.
    pub fn build(
        driver_name: &str,
        requested_rate: u32,
        requested_buffer: u32,
        pipeline: DspPipeline,
        pool: &BufferPool,
    ) -> Result<Self, EngineError> {
        let host = host_for_name(driver_name)?;

        let input_device = host
            .default_input_device()
            .ok_or_else(|| EngineError::DriverUnavailable("no input device".into()))?;
        let output_device = host
            .default_output_device()
            .ok_or_else(|| EngineError::DriverUnavailable("no output device".into()))?;

        let input_default = input_device
            .default_input_config()
            .map_err(|e| EngineError::Stream(e.to_string()))?;
        let output_default = output_device
            .default_output_config()
            .map_err(|e| EngineError::Stream(e.to_string()))?;

        let device_rate = output_default.sample_rate();
        let sample_rate = if requested_rate == device_rate {
            requested_rate
        } else {
            warn!(
                requested = requested_rate,
                substituted = device_rate,
                "requested sample rate not the device default, substituting"
            );
            device_rate
        };

        let input_channels = input_default.channels();
        let output_channels = output_default.channels();

        let input_config = cpal::StreamConfig {
            channels: input_channels,
            sample_rate,
            buffer_size: negotiated_buffer_size(input_default.buffer_size(), requested_buffer),
        };
        let output_config = cpal::StreamConfig {
            channels: output_channels,
            sample_rate,
            buffer_size: negotiated_buffer_size(output_default.buffer_size(), requested_buffer),
        };

        // Enough ring for several buffers of backlog without letting
        // latency run away.
        let ring_capacity = (requested_buffer as usize * 2 * 8).next_power_of_two();
        let (producer, consumer) = ring_buffer(ring_capacity);

        let input_stream = build_input_stream(
            &input_device,
            &input_config,
            input_channels,
            producer,
            pool.acquire(),
        )?;

        let output_stream = build_output_stream(
            &output_device,
            &output_config,
            output_channels,
            consumer,
            pipeline,
            pool.acquire(),
            pool.acquire(),
        )?;

        info!(
            backend = host.id().name(),
            sample_rate,
            buffer = requested_buffer,
            input_channels,
            output_channels,
            "audio driver ready"
        );

        Ok(Self {
            input_stream,
            output_stream,
            sample_rate,
            buffer_size: requested_buffer,
            input_channels,
            output_channels,
        })
    }
}

impl AudioDriver for CpalDriver {
    fn start(&mut self) -> Result<(), EngineError> {
        self.input_stream
            .play()
            .map_err(|e| EngineError::Stream(e.to_string()))?;
        self.output_stream
            .play()
            .map_err(|e| EngineError::Stream(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.input_stream
            .pause()
            .map_err(|e| EngineError::Stream(e.to_string()))?;
        self.output_stream
            .pause()
            .map_err(|e| EngineError::Stream(e.to_string()))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    fn input_channels(&self) -> u16 {
        self.input_channels
    }

    fn output_channels(&self) -> u16 {
        self.output_channels
    }

    fn input_latency(&self) -> f64 {
        // cpal does not report device latency; one buffer is the floor.
        f64::from(self.buffer_size) / f64::from(self.sample_rate.max(1))
    }

    fn output_latency(&self) -> f64 {
        f64::from(self.buffer_size) / f64::from(self.sample_rate.max(1))
    }
}

/// Pick a fixed buffer size when the device supports it, otherwise fall
/// back to the device default with a warning.
fn negotiated_buffer_size(supported: &cpal::SupportedBufferSize, requested: u32) -> cpal::BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&requested) => {
            cpal::BufferSize::Fixed(requested)
        }
        _ => {
            warn!(requested, "buffer size outside device range, using device default");
            cpal::BufferSize::Default
        }
    }
}

/// Map a user-facing backend name onto a cpal host.
fn host_for_name(name: &str) -> Result<cpal::Host, EngineError> {
    if name.is_empty() || name.eq_ignore_ascii_case("auto") {
        return Ok(cpal::default_host());
    }
    // PipeWire is reached through its ALSA compatibility layer.
    let wanted = if name.eq_ignore_ascii_case("pipewire") {
        "alsa"
    } else {
        name
    };
    for id in cpal::available_hosts() {
        if id.name().eq_ignore_ascii_case(wanted) {
            return cpal::host_from_id(id)
                .map_err(|e| EngineError::DriverUnavailable(e.to_string()));
        }
    }
    Err(EngineError::DriverUnavailable(format!(
        "backend '{name}' is not available on this platform"
    )))
}

fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: u16,
    mut producer: amperio_core::Producer,
    mut stage: PooledBuffer,
) -> Result<cpal::Stream, EngineError> {
    let channels = usize::from(channels.max(1));
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let frames = (data.len() / channels).min(stage.len() / 2);
                match channels {
                    2 => {
                        producer.write(&data[..frames * 2]);
                    }
                    1 => {
                        for i in 0..frames {
                            stage[i * 2] = data[i];
                            stage[i * 2 + 1] = data[i];
                        }
                        producer.write(&stage[..frames * 2]);
                    }
                    _ => {
                        for i in 0..frames {
                            stage[i * 2] = data[i * channels];
                            stage[i * 2 + 1] = data[i * channels + 1];
                        }
                        producer.write(&stage[..frames * 2]);
                    }
                }
            },
            |err| tracing::error!(%err, "input stream error"),
            None,
        )
        .map_err(|e| EngineError::Stream(e.to_string()))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: u16,
    mut consumer: amperio_core::Consumer,
    mut pipeline: DspPipeline,
    mut input_stage: PooledBuffer,
    mut output_stage: PooledBuffer,
) -> Result<cpal::Stream, EngineError> {
    let channels = usize::from(channels.max(1));
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = (data.len() / channels).min(input_stage.len() / 2);
                let samples = frames * 2;

                // Bound latency: if the producer has run ahead, shed the
                // oldest backlog instead of letting it accumulate.
                let backlog = consumer.available();
                if backlog > samples * 4 {
                    consumer.skip(backlog - samples * 2);
                }

                let got = consumer.read(&mut input_stage[..samples]);
                input_stage[got..samples].fill(0.0);

                if channels == 2 && data.len() == samples {
                    pipeline.process(&input_stage[..samples], data, frames);
                } else {
                    pipeline.process(&input_stage[..samples], &mut output_stage[..samples], frames);
                    for i in 0..frames {
                        for ch in 0..channels {
                            data[i * channels + ch] = output_stage[i * 2 + ch.min(1)];
                        }
                    }
                    // Zero any frames beyond the staging capacity.
                    for sample in data[frames * channels..].iter_mut() {
                        *sample = 0.0;
                    }
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| EngineError::Stream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_name_list_is_stable() {
        assert_eq!(DRIVER_NAMES.len(), 5);
        for name in ["auto", "WASAPI", "ASIO", "CoreAudio", "PipeWire"] {
            assert!(DRIVER_NAMES.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        match host_for_name("vaporwave") {
            Err(err) => assert!(matches!(err, EngineError::DriverUnavailable(_))),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_auto_resolves_to_default_host() {
        // Always succeeds: cpal exposes a default host even with no
        // devices attached.
        assert!(host_for_name("auto").is_ok());
        assert!(host_for_name("").is_ok());
    }
}
