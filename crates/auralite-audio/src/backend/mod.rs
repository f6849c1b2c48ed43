//! Playback backends.
//!
//! Every backend implements [`PlaybackBackend`] with the same observable
//! behavior: `play` starts at the sound's cursor, advances it as audio reaches
//! the device, and returns once the device has consumed everything. They
//! differ in how audio is handed over:
//!
//! - [`QueuedBackend`] queues the whole remaining payload as one block.
//! - [`BlockingBackend`] writes period-sized chunks into a bounded ring,
//!   blocking while it is full.
//! - [`CallbackBackend`] lets the device callback pull from the sound directly.
//! - [`NullBackend`] discards audio without a device.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

pub mod blocking;
pub mod callback;
pub mod null;
pub mod queued;

pub use blocking::BlockingBackend;
pub use callback::CallbackBackend;
pub use null::NullBackend;
pub use queued::QueuedBackend;

use crate::output::{CompletionMode, OutputConfig};
use crate::sound::SoundBuffer;
use auralite_core::{Error, Result, SampleEncoding, SoundFormat};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::warn;

/// Backend chosen for the build target.
#[cfg(target_os = "windows")]
pub type PlatformBackend = QueuedBackend;

/// Backend chosen for the build target.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub type PlatformBackend = CallbackBackend;

/// Backend chosen for the build target.
#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "ios")))]
pub type PlatformBackend = BlockingBackend;

/// One native output stream and the operations a player needs from it.
pub trait PlaybackBackend: Sized {
    /// Short name for diagnostics.
    const NAME: &'static str;

    /// Open and configure an output stream for `format`.
    fn init(format: SoundFormat, config: &OutputConfig) -> Result<Self>;

    /// Format the stream was opened with.
    fn format(&self) -> SoundFormat;

    /// Play `sound` from its cursor to the end, blocking until done.
    fn play(&mut self, sound: &SoundBuffer) -> Result<()>;

    /// Cursor position of `sound` in seconds.
    fn query_time(&self, sound: &SoundBuffer) -> f64 {
        sound.current_time()
    }

    /// Move the cursor of `sound`; the next `play` starts there.
    fn seek(&self, sound: &SoundBuffer, seconds: f64) -> usize {
        sound.seek(seconds)
    }

    /// Release the output stream.
    fn close(self) -> Result<()>;
}

/// Reject a sound whose format differs from the opened stream.
pub(crate) fn ensure_format(expected: SoundFormat, sound: &SoundBuffer) -> Result<()> {
    if sound.format() == expected {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "sound is {} but the output was opened for {expected}",
            sound.format()
        )))
    }
}

pub(crate) fn encoding_of(format: SoundFormat) -> Result<SampleEncoding> {
    format.validate()?;
    format
        .encoding()
        .ok_or_else(|| Error::Format(format!("unsupported bit depth: {}", format.bits_per_sample)))
}

/// Wall-clock duration of `bytes` of payload.
pub(crate) fn estimate(format: SoundFormat, bytes: usize) -> Duration {
    Duration::from_secs_f64(format.seconds_for(bytes))
}

/// Notification from the output callback that it ran out of audio.
#[derive(Clone)]
pub(crate) struct DrainSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl DrainSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Called from the device thread; never blocks.
    pub(crate) fn notify(&self) {
        let _ = self.tx.try_send(());
    }

    /// Discard a notification left over from a previous run.
    pub(crate) fn reset(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    /// Block until playback that began at `started` should be over.
    ///
    /// In [`CompletionMode::Signal`] a missing drain signal means the device
    /// stopped consuming audio, which is a device error.
    pub(crate) fn wait(&self, started: Instant, estimate: Duration, config: &OutputConfig) -> Result<()> {
        match config.completion {
            CompletionMode::Estimate => {
                std::thread::sleep(estimate.saturating_sub(started.elapsed()));
                Ok(())
            }
            CompletionMode::Signal => {
                let limit = estimate + config.drain_slack();
                let timeout = limit.saturating_sub(started.elapsed());
                self.rx.recv_timeout(timeout).map_err(|_| {
                    warn!("Output did not report completion within {limit:?}");
                    Error::Device(format!("output did not finish playing within {limit:?}"))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_format() {
        let sound = SoundBuffer::new(SoundFormat::CD, vec![0u8; 8]).unwrap();
        assert!(ensure_format(SoundFormat::CD, &sound).is_ok());

        let err = ensure_format(SoundFormat::new(48_000, 2, 16), &sound).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_estimate() {
        assert_eq!(estimate(SoundFormat::CD, 176_400), Duration::from_secs(1));
        assert_eq!(estimate(SoundFormat::CD, 0), Duration::ZERO);
    }

    #[test]
    fn test_drain_signal_wakes_waiter() {
        let signal = DrainSignal::new();
        let config = OutputConfig::default();

        let notifier = signal.clone();
        let handle = std::thread::spawn(move || notifier.notify());

        let started = Instant::now();
        signal.wait(started, Duration::from_secs(5), &config).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_drain_signal_times_out() {
        let signal = DrainSignal::new();
        let config = OutputConfig {
            drain_slack_ms: 10,
            ..OutputConfig::default()
        };
        let err = signal
            .wait(Instant::now(), Duration::from_millis(10), &config)
            .unwrap_err();
        assert!(err.is_device_error(), "{err}");
    }

    #[test]
    fn test_reset_discards_stale_notification() {
        let signal = DrainSignal::new();
        signal.notify();
        signal.notify();
        signal.reset();

        let config = OutputConfig {
            drain_slack_ms: 0,
            ..OutputConfig::default()
        };
        assert!(signal.wait(Instant::now(), Duration::from_millis(5), &config).is_err());
    }

    #[test]
    fn test_estimate_mode_sleeps() {
        let signal = DrainSignal::new();
        let config = OutputConfig {
            completion: CompletionMode::Estimate,
            ..OutputConfig::default()
        };
        let started = Instant::now();
        signal.wait(started, Duration::from_millis(20), &config).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
