//! Pull-model backend: the device callback reads straight from the sound.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use super::{encoding_of, ensure_format, estimate, DrainSignal, PlaybackBackend};
use crate::output::{DeviceStream, OutputConfig};
use crate::pcm::{bytes_for_samples, decode_samples};
use crate::sound::{PcmSource, SoundBuffer};
use auralite_core::{Result, SampleEncoding, SoundFormat};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Sound attached to the stream while `play` runs.
type SourceSlot = Arc<Mutex<Option<PcmSource>>>;

/// Backend whose output callback pulls `min(remaining, capacity)` bytes from
/// the cursor on every request and advances it.
pub struct CallbackBackend {
    format: SoundFormat,
    config: OutputConfig,
    slot: SourceSlot,
    drained: DrainSignal,
    stream: DeviceStream,
}

impl PlaybackBackend for CallbackBackend {
    const NAME: &'static str = "callback";

    fn init(format: SoundFormat, config: &OutputConfig) -> Result<Self> {
        let encoding = encoding_of(format)?;
        let slot = SourceSlot::default();
        let drained = DrainSignal::new();

        let renderer = PullRenderer {
            slot: Arc::clone(&slot),
            encoding,
            drained: drained.clone(),
        };
        let stream = DeviceStream::open(format, config, move |out| renderer.render(out))?;

        Ok(Self {
            format,
            config: config.clone(),
            slot,
            drained,
            stream,
        })
    }

    fn format(&self) -> SoundFormat {
        self.format
    }

    fn play(&mut self, sound: &SoundBuffer) -> Result<()> {
        ensure_format(self.format, sound)?;

        let remaining = sound.remaining();
        if remaining == 0 {
            debug!("Nothing to play at byte {}", sound.position());
            return Ok(());
        }

        *self.slot.lock() = Some(sound.source());
        self.drained.reset();

        let started = Instant::now();
        let drained = self.stream.start().and_then(|()| {
            self.drained
                .wait(started, estimate(self.format, remaining), &self.config)
        });
        let paused = self.stream.pause();
        *self.slot.lock() = None;

        self.stream.check_fault()?;
        drained?;
        paused
    }

    fn close(self) -> Result<()> {
        self.slot.lock().take();
        self.stream.pause()?;
        info!("Closed output device {}", self.stream.device_name());
        Ok(())
    }
}

/// Device-thread side of [`CallbackBackend`].
struct PullRenderer {
    slot: SourceSlot,
    encoding: SampleEncoding,
    drained: DrainSignal,
}

impl PullRenderer {
    fn render(&self, out: &mut [f32]) {
        let slot = self.slot.lock();
        let Some(source) = slot.as_ref() else {
            out.fill(0.0);
            return;
        };

        let chunk = source.take_chunk(bytes_for_samples(out.len(), self.encoding));
        let written = decode_samples(&chunk, self.encoding, out);
        out[written..].fill(0.0);

        if chunk.is_empty() && !out.is_empty() {
            self.drained.notify();
        }
    }
}
