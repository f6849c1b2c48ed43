//! In-memory PCM sound buffer with a playback cursor.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use auralite_core::{Error, Result, SoundFormat};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Decoded sound: raw interleaved PCM bytes plus their format.
///
/// The cursor is a byte offset into the payload. It always sits on a frame
/// boundary and within `0..=len`. Playback advances it from the device
/// callback thread, so it lives in an atomic shared with the active backend.
#[derive(Debug)]
pub struct SoundBuffer {
    data: Bytes,
    format: SoundFormat,
    position: Arc<AtomicUsize>,
}

impl SoundBuffer {
    /// Wrap a PCM payload.
    ///
    /// Fails with a format error if the format is unusable or the payload is
    /// not a whole number of frames.
    pub fn new(format: SoundFormat, data: impl Into<Bytes>) -> Result<Self> {
        format.validate()?;
        let data = data.into();

        let frame = format.bytes_per_frame();
        if data.len() % frame != 0 {
            return Err(Error::Format(format!(
                "payload of {} bytes is not a multiple of the {frame}-byte frame",
                data.len()
            )));
        }

        Ok(Self {
            data,
            format,
            position: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Raw sample bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn format(&self) -> SoundFormat {
        self.format
    }

    pub const fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.format.channels
    }

    pub const fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    /// Current cursor in bytes.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Bytes left between the cursor and the end of the payload.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    /// Total playback duration in seconds.
    pub fn duration(&self) -> f64 {
        self.format.seconds_for(self.len())
    }

    /// Cursor position in seconds.
    pub fn current_time(&self) -> f64 {
        self.format.seconds_for(self.position())
    }

    /// Move the cursor to `seconds`, rounded to the nearest frame.
    ///
    /// Targets before the start clamp to 0 and targets past the end clamp to
    /// the payload length. Returns the new byte position.
    pub fn seek(&self, seconds: f64) -> usize {
        let position = if seconds.is_nan() || seconds <= 0.0 {
            0
        } else {
            let frames = (seconds * f64::from(self.format.sample_rate)).round();
            let bytes = frames * self.format.bytes_per_frame() as f64;
            if bytes >= self.len() as f64 {
                self.len()
            } else {
                bytes as usize
            }
        };

        self.position.store(position, Ordering::Release);
        position
    }

    /// Move the cursor back to the start.
    pub fn rewind(&self) {
        self.position.store(0, Ordering::Release);
    }

    /// Handle for a device thread that reads the payload and moves the cursor.
    pub(crate) fn source(&self) -> PcmSource {
        PcmSource {
            data: self.data.clone(),
            frame: self.format.bytes_per_frame(),
            position: Arc::clone(&self.position),
        }
    }
}

/// Shared view of a [`SoundBuffer`] held by the playback side.
#[derive(Debug, Clone)]
pub(crate) struct PcmSource {
    data: Bytes,
    frame: usize,
    position: Arc<AtomicUsize>,
}

impl PcmSource {
    /// Take up to `max_bytes` (whole frames only) from the cursor and advance it.
    ///
    /// Returns an empty slice once the payload is exhausted.
    pub(crate) fn take_chunk(&self, max_bytes: usize) -> Bytes {
        let len = self.data.len();
        let max = max_bytes - max_bytes % self.frame;
        if max == 0 {
            return Bytes::new();
        }

        let advanced = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| {
                (pos < len).then(|| pos + (len - pos).min(max))
            });

        match advanced {
            Ok(start) => self.data.slice(start..start + (len - start).min(max)),
            Err(_) => Bytes::new(),
        }
    }

    /// Everything from the cursor to the end, without moving the cursor.
    pub(crate) fn remaining_bytes(&self) -> Bytes {
        let start = self.position.load(Ordering::Acquire).min(self.data.len());
        self.data.slice(start..)
    }

    /// Move the cursor forward by `bytes`, saturating at the end.
    pub(crate) fn advance(&self, bytes: usize) {
        let len = self.data.len();
        let _ = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| {
                Some(pos.saturating_add(bytes).min(len))
            });
    }

    pub(crate) const fn frame_bytes(&self) -> usize {
        self.frame
    }
}
