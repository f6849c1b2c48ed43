//! Blocking-write backend: `play` converts the payload a period at a time and
//! writes it into a bounded ring that the device drains, blocking while the
//! ring is full.

use super::{encoding_of, ensure_format, estimate, DrainSignal, PlaybackBackend};
use crate::buffer::{shared_sample_ring, SharedSampleRing};
use crate::output::{DeviceStream, OutputConfig};
use crate::pcm::decode_samples;
use crate::sound::{PcmSource, SoundBuffer};
use auralite_core::{Error, Result, SampleEncoding, SoundFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Backend that pushes audio into the device the way a blocking
/// `write(frames)` call would.
pub struct BlockingBackend {
    format: SoundFormat,
    config: OutputConfig,
    encoding: SampleEncoding,
    ring: SharedSampleRing,
    feeding: Arc<AtomicBool>,
    drained: DrainSignal,
    /// Conversion buffer, one period of samples.
    scratch: Vec<f32>,
    stream: DeviceStream,
}

impl PlaybackBackend for BlockingBackend {
    const NAME: &'static str = "blocking";

    fn init(format: SoundFormat, config: &OutputConfig) -> Result<Self> {
        let encoding = encoding_of(format)?;
        let channels = usize::from(format.channels);
        let ring = shared_sample_ring(config.ring_frames.max(1) as usize * channels);
        let feeding = Arc::new(AtomicBool::new(false));
        let drained = DrainSignal::new();

        let renderer = RingRenderer {
            ring: Arc::clone(&ring),
            feeding: Arc::clone(&feeding),
            drained: drained.clone(),
        };
        let stream = DeviceStream::open(format, config, move |out| renderer.render(out))?;

        let period = stream.period_frames().unwrap_or(config.period_frames).max(1) as usize;
        debug!(
            "Blocking writer: {period} frames per write, ring of {} samples",
            ring.capacity()
        );

        Ok(Self {
            format,
            config: config.clone(),
            encoding,
            ring,
            feeding,
            drained,
            scratch: vec![0.0; period * channels],
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
        let wait_for = estimate(self.format, remaining);

        self.ring.clear();
        self.feeding.store(true, Ordering::Release);
        self.drained.reset();

        let started = Instant::now();
        let deadline = started + wait_for + self.config.drain_slack();
        let fed = match self.stream.start() {
            Ok(()) => self.feed(&sound.source(), deadline),
            Err(e) => Err(e),
        };
        self.feeding.store(false, Ordering::Release);

        let drained = match fed {
            Ok(()) => self.drained.wait(started, wait_for, &self.config),
            Err(e) => Err(e),
        };
        let paused = self.stream.pause();
        self.ring.clear();

        self.stream.check_fault()?;
        drained?;
        paused
    }

    fn close(self) -> Result<()> {
        self.ring.clear();
        self.stream.pause()?;
        info!("Closed output device {}", self.stream.device_name());
        Ok(())
    }
}

impl BlockingBackend {
    /// Write everything from the cursor into the ring.
    fn feed(&mut self, source: &PcmSource, deadline: Instant) -> Result<()> {
        let channels = usize::from(self.format.channels);
        let period_bytes = (self.scratch.len() / channels) * source.frame_bytes();
        // Poll several times per period while the ring is full.
        let backoff = Duration::from_secs_f64(self.format.seconds_for(period_bytes) / 4.0);

        loop {
            let chunk = source.take_chunk(period_bytes);
            if chunk.is_empty() {
                return Ok(());
            }

            let samples = decode_samples(&chunk, self.encoding, &mut self.scratch);
            let written = write_blocking(&self.ring, &self.scratch[..samples], backoff, || {
                self.stream.check_fault()?;
                if Instant::now() > deadline {
                    return Err(Error::Device("output stopped consuming audio".to_string()));
                }
                Ok(())
            })?;
            trace!("Wrote {written} samples");
        }
    }
}

/// Push all of `samples`, sleeping `backoff` whenever the ring is full.
///
/// `check` runs before each sleep and aborts the write on error.
fn write_blocking<F>(
    ring: &SharedSampleRing,
    samples: &[f32],
    backoff: Duration,
    mut check: F,
) -> Result<usize>
where
    F: FnMut() -> Result<()>,
{
    let mut written = 0;
    while written < samples.len() {
        let pushed = ring.push_slice(&samples[written..]);
        written += pushed;
        if pushed == 0 {
            check()?;
            std::thread::sleep(backoff);
        }
    }
    Ok(written)
}

/// Device-thread side of [`BlockingBackend`].
struct RingRenderer {
    ring: SharedSampleRing,
    feeding: Arc<AtomicBool>,
    drained: DrainSignal,
}

impl RingRenderer {
    fn render(&self, out: &mut [f32]) {
        let read = self.ring.pop_slice(out);
        out[read..].fill(0.0);

        // Completion needs a finished writer and a callback that found
        // nothing left, so the final samples have already gone out.
        if read == 0 && !out.is_empty() && !self.feeding.load(Ordering::Acquire) {
            self.drained.notify();
        }
    }
}
