//! Queued-block backend: `play` hands the device one block holding the whole
//! remaining payload, and the device reports progress as it consumes it.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use super::{encoding_of, ensure_format, estimate, DrainSignal, PlaybackBackend};
use crate::output::{DeviceStream, OutputConfig};
use crate::pcm::{bytes_for_samples, decode_samples};
use crate::sound::{PcmSource, SoundBuffer};
use auralite_core::{Result, SampleEncoding, SoundFormat};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A submitted block and how far the device has read into it.
struct QueuedBlock {
    source: PcmSource,
    data: Bytes,
    offset: usize,
}

#[derive(Default)]
struct BlockQueue {
    pending: VecDeque<QueuedBlock>,
    current: Option<QueuedBlock>,
}

impl BlockQueue {
    fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}

/// Backend that queues the payload with the device and waits for it to be
/// played out.
pub struct QueuedBackend {
    format: SoundFormat,
    config: OutputConfig,
    queue: Arc<Mutex<BlockQueue>>,
    drained: DrainSignal,
    stream: DeviceStream,
}

impl PlaybackBackend for QueuedBackend {
    const NAME: &'static str = "queued";

    fn init(format: SoundFormat, config: &OutputConfig) -> Result<Self> {
        let encoding = encoding_of(format)?;
        let queue = Arc::new(Mutex::new(BlockQueue::default()));
        let drained = DrainSignal::new();

        let renderer = BlockRenderer {
            queue: Arc::clone(&queue),
            encoding,
            drained: drained.clone(),
        };
        let stream = DeviceStream::open(format, config, move |out| renderer.render(out))?;

        Ok(Self {
            format,
            config: config.clone(),
            queue,
            drained,
            stream,
        })
    }

    fn format(&self) -> SoundFormat {
        self.format
    }

    fn play(&mut self, sound: &SoundBuffer) -> Result<()> {
        ensure_format(self.format, sound)?;

        let source = sound.source();
        let data = source.remaining_bytes();
        if data.is_empty() {
            debug!("Nothing to play at byte {}", sound.position());
            return Ok(());
        }

        let wait_for = estimate(self.format, data.len());
        debug!("Queueing {} bytes ({wait_for:?})", data.len());
        self.queue.lock().pending.push_back(QueuedBlock {
            source,
            data,
            offset: 0,
        });
        self.drained.reset();

        let started = Instant::now();
        let drained = self
            .stream
            .start()
            .and_then(|()| self.drained.wait(started, wait_for, &self.config));
        let paused = self.stream.pause();
        self.queue.lock().clear();

        self.stream.check_fault()?;
        drained?;
        paused
    }

    fn close(self) -> Result<()> {
        self.queue.lock().clear();
        self.stream.pause()?;
        info!("Closed output device {}", self.stream.device_name());
        Ok(())
    }
}

/// Device-thread side of [`QueuedBackend`].
struct BlockRenderer {
    queue: Arc<Mutex<BlockQueue>>,
    encoding: SampleEncoding,
    drained: DrainSignal,
}

impl BlockRenderer {
    fn render(&self, out: &mut [f32]) {
        let mut queue = self.queue.lock();
        let mut written = 0;

        while written < out.len() {
            if queue.current.is_none() {
                queue.current = queue.pending.pop_front();
            }
            let Some(block) = queue.current.as_mut() else {
                break;
            };

            let samples = decode_samples(&block.data[block.offset..], self.encoding, &mut out[written..]);
            let consumed = bytes_for_samples(samples, self.encoding);
            block.offset += consumed;
            block.source.advance(consumed);
            written += samples;

            if samples == 0 || block.offset >= block.data.len() {
                queue.current = None;
            }
        }

        out[written..].fill(0.0);

        // The last samples go out in the previous callback; only a request
        // that gets pure silence means they were consumed.
        if written == 0 && queue.current.is_none() && queue.pending.is_empty() {
            self.drained.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CompletionMode;
    use std::time::Duration;

    fn submit(queue: &Arc<Mutex<BlockQueue>>, sound: &SoundBuffer) {
        let source = sound.source();
        let data = source.remaining_bytes();
        queue.lock().pending.push_back(QueuedBlock {
            source,
            data,
            offset: 0,
        });
    }

    fn renderer(encoding: SampleEncoding) -> (BlockRenderer, Arc<Mutex<BlockQueue>>, DrainSignal) {
        let queue = Arc::new(Mutex::new(BlockQueue::default()));
        let drained = DrainSignal::new();
        let renderer = BlockRenderer {
            queue: Arc::clone(&queue),
            encoding,
            drained: drained.clone(),
        };
        (renderer, queue, drained)
    }

    fn drained_now(drained: &DrainSignal) -> bool {
        let config = OutputConfig {
            completion: CompletionMode::Signal,
            drain_slack_ms: 0,
            ..OutputConfig::default()
        };
        drained.wait(Instant::now(), Duration::ZERO, &config).is_ok()
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_block_consumed_across_callbacks() {
        let sound = SoundBuffer::new(SoundFormat::new(8_000, 1, 8), vec![128u8, 255, 0, 128, 192]).unwrap();
        let (renderer, queue, drained) = renderer(SampleEncoding::U8);
        submit(&queue, &sound);

        let mut out = [1.0f32; 2];
        renderer.render(&mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(sound.position(), 2);
        assert!(!drained_now(&drained));

        renderer.render(&mut out);
        assert_eq!(out, [-1.0, 0.0]);
        assert_eq!(sound.position(), 4);

        renderer.render(&mut out);
        assert_eq!(out, [0.5, 0.0]);
        assert_eq!(sound.position(), 5);
        assert!(!drained_now(&drained));

        renderer.render(&mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert!(drained_now(&drained));
    }

    #[test]
    fn test_tail_callback_does_not_signal() {
        let sound = SoundBuffer::new(SoundFormat::new(8_000, 1, 8), vec![200u8; 6]).unwrap();
        let (renderer, queue, drained) = renderer(SampleEncoding::U8);
        submit(&queue, &sound);

        let mut out = [0.0f32; 8];
        renderer.render(&mut out);
        assert_eq!(sound.position(), 6);
        assert!(!drained_now(&drained));

        renderer.render(&mut out);
        assert!(drained_now(&drained));
    }

    #[test]
    fn test_block_starts_at_cursor() {
        let sound = SoundBuffer::new(SoundFormat::CD, vec![0u8; 176_400]).unwrap();
        sound.seek(0.75);
        let (renderer, queue, _) = renderer(SampleEncoding::S16);
        submit(&queue, &sound);

        let mut out = [0.0f32; 1024];
        for _ in 0..((176_400 / 4) / 512 + 1) {
            renderer.render(&mut out);
        }
        assert_eq!(sound.position(), sound.len());
    }

    #[test]
    fn test_empty_queue_renders_silence_and_signals() {
        let (renderer, _, drained) = renderer(SampleEncoding::S16);
        let mut out = [0.3f32; 16];
        renderer.render(&mut out);
        assert!(out.iter().all(|s| s.abs() < f32::EPSILON));
        assert!(drained_now(&drained));
    }

    #[test]
    fn test_clear_drops_pending_audio() {
        let sound = SoundBuffer::new(SoundFormat::CD, vec![0u8; 64]).unwrap();
        let (renderer, queue, _) = renderer(SampleEncoding::S16);
        submit(&queue, &sound);
        queue.lock().clear();

        let mut out = [0.0f32; 8];
        renderer.render(&mut out);
        assert_eq!(sound.position(), 0);
    }
}
