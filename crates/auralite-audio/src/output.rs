//! Audio output using cpal.

use auralite_core::{Error, Result, SampleEncoding, SoundFormat};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// How `play` decides that the device has finished.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Wait for the output callback to report that it ran dry, bounded by
    /// the duration estimate plus `drain_slack_ms`.
    #[default]
    Signal,
    /// Sleep for `remaining bytes / byte rate` and return.
    Estimate,
}

/// Audio output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name. `None` selects the host default.
    pub device: Option<String>,
    /// Frames per device callback, when the device accepts a fixed size.
    pub period_frames: u32,
    /// Frames buffered between writer and device by the blocking backend.
    pub ring_frames: u32,
    pub completion: CompletionMode,
    /// Extra time allowed past the estimate before giving up on the drain signal.
    pub drain_slack_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            period_frames: 1024,
            ring_frames: 16_384,
            completion: CompletionMode::Signal,
            drain_slack_ms: 250,
        }
    }
}

impl OutputConfig {
    pub const fn drain_slack(&self) -> Duration {
        Duration::from_millis(self.drain_slack_ms)
    }
}

/// First stream error reported by the driver, if any.
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamFault(Arc<Mutex<Option<String>>>);

impl StreamFault {
    fn record(&self, message: String) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    pub(crate) fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}

/// An opened, paused output stream.
pub(crate) struct DeviceStream {
    stream: Stream,
    device_name: String,
    config: StreamConfig,
    fault: StreamFault,
}

impl DeviceStream {
    /// Open the configured device for `format` and build a paused stream.
    ///
    /// `render` fills interleaved `f32` samples on the device thread.
    pub(crate) fn open<F>(format: SoundFormat, config: &OutputConfig, render: F) -> Result<Self>
    where
        F: FnMut(&mut [f32]) + Send + 'static,
    {
        let device = select_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let range = select_config(&device, format)?;
        let sample_format = range.sample_format();
        let buffer_size = match range.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&config.period_frames) =>
            {
                BufferSize::Fixed(config.period_frames)
            }
            _ => BufferSize::Default,
        };

        let mut stream_config: StreamConfig =
            range.with_sample_rate(SampleRate(format.sample_rate)).config();
        stream_config.buffer_size = buffer_size;

        debug!(
            "Output config: {}Hz, {} channels, {:?}, buffer {:?}",
            stream_config.sample_rate.0,
            stream_config.channels,
            sample_format,
            stream_config.buffer_size
        );

        let fault = StreamFault::default();
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, F>(&device, &stream_config, render, &fault)?,
            SampleFormat::I16 => build_stream::<i16, F>(&device, &stream_config, render, &fault)?,
            SampleFormat::I32 => build_stream::<i32, F>(&device, &stream_config, render, &fault)?,
            SampleFormat::U16 => build_stream::<u16, F>(&device, &stream_config, render, &fault)?,
            SampleFormat::U8 => build_stream::<u8, F>(&device, &stream_config, render, &fault)?,
            _ => {
                return Err(Error::Device(format!(
                    "Unsupported sample format: {sample_format:?}"
                )));
            }
        };

        // Some hosts start streams on creation.
        stream
            .pause()
            .map_err(|e| Error::Device(format!("Failed to pause new stream: {e}")))?;

        info!("Using audio output device: {device_name}");

        Ok(Self {
            stream,
            device_name,
            config: stream_config,
            fault,
        })
    }

    pub(crate) fn start(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start stream: {e}")))
    }

    pub(crate) fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::Device(format!("Failed to pause stream: {e}")))
    }

    /// Surface a driver error recorded since the last check.
    pub(crate) fn check_fault(&self) -> Result<()> {
        match self.fault.take() {
            Some(message) => Err(Error::Device(message)),
            None => Ok(()),
        }
    }

    pub(crate) fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Frames per callback if fixed, for pacing the writer.
    pub(crate) const fn period_frames(&self) -> Option<u32> {
        match self.config.buffer_size {
            BufferSize::Fixed(frames) => Some(frames),
            BufferSize::Default => None,
        }
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        // Dropping the cpal stream stops it and releases the device.
        debug!("Releasing output device {}", self.device_name);
    }
}

fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    debug!("Audio host: {:?}", host.id());

    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {e}")))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| Error::Device(format!("Output device '{name}' not found"))),
        None => host
            .default_output_device()
            .ok_or_else(|| Error::Device("No output device found".to_string())),
    }
}

/// Pick a supported configuration with the exact channel count and rate.
///
/// Prefers the sample format native to the file, then `f32`.
fn select_config(device: &Device, format: SoundFormat) -> Result<SupportedStreamConfigRange> {
    let candidates: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| Error::Device(format!("Failed to get output configs: {e}")))?
        .filter(|range| {
            range.channels() == format.channels
                && range.min_sample_rate().0 <= format.sample_rate
                && range.max_sample_rate().0 >= format.sample_rate
        })
        .collect();

    let preference = format_preference(format.encoding());
    let rank = |range: &SupportedStreamConfigRange| {
        preference
            .iter()
            .position(|f| *f == range.sample_format())
            .unwrap_or(preference.len())
    };

    candidates
        .into_iter()
        .min_by_key(rank)
        .ok_or_else(|| {
            error!("No output configuration matches {format}");
            Error::Device(format!("Device cannot play {format}"))
        })
}

fn format_preference(encoding: Option<SampleEncoding>) -> [SampleFormat; 5] {
    match encoding {
        Some(SampleEncoding::U8) => [
            SampleFormat::U8,
            SampleFormat::F32,
            SampleFormat::I16,
            SampleFormat::I32,
            SampleFormat::U16,
        ],
        Some(SampleEncoding::S24 | SampleEncoding::S32) => [
            SampleFormat::I32,
            SampleFormat::F32,
            SampleFormat::I16,
            SampleFormat::U16,
            SampleFormat::U8,
        ],
        Some(SampleEncoding::S16) | None => [
            SampleFormat::I16,
            SampleFormat::F32,
            SampleFormat::I32,
            SampleFormat::U16,
            SampleFormat::U8,
        ],
    }
}

fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    mut render: F,
    fault: &StreamFault,
) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
    F: FnMut(&mut [f32]) + Send + 'static,
{
    let fault = fault.clone();
    let err_fn = move |err: cpal::StreamError| {
        error!("Audio stream error: {err}");
        fault.record(err.to_string());
    };

    // Grows to the largest callback size once, then is reused.
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                render(scratch.as_mut_slice());
                for (sample, value) in data.iter_mut().zip(scratch.iter()) {
                    *sample = T::from_sample(*value);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {e}")))
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::Device(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
