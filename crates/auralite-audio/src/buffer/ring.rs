//! Lock-free sample ring between a writer thread and the device callback.
//!
//! Single producer, single consumer. The blocking backend writes converted
//! samples from the caller's thread and the output callback drains them.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed-capacity SPSC ring of `f32` samples.
///
/// Slots store the sample bit patterns in atomics, so neither side needs a
/// lock or unsafe access. Positions grow monotonically and wrap through the
/// power-of-two mask.
pub struct SampleRing {
    slots: Box<[AtomicU32]>,
    /// Total samples consumed.
    read_pos: AtomicUsize,
    /// Total samples produced.
    write_pos: AtomicUsize,
    capacity: usize,
    mask: usize,
}

impl SampleRing {
    /// Create a ring holding at least `capacity` samples.
    ///
    /// The capacity is rounded up to the next power of 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();

        Self {
            slots,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Free slots for writing.
    pub fn free(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Write as many samples as fit. Producer side only.
    ///
    /// Returns the number of samples written.
    pub fn push_slice(&self, samples: &[f32]) -> usize {
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let read_pos = self.read_pos.load(Ordering::Acquire);

        let space = self.capacity - write_pos.wrapping_sub(read_pos);
        let count = samples.len().min(space);

        for (offset, sample) in samples[..count].iter().enumerate() {
            let idx = write_pos.wrapping_add(offset) & self.mask;
            self.slots[idx].store(sample.to_bits(), Ordering::Relaxed);
        }

        self.write_pos
            .store(write_pos.wrapping_add(count), Ordering::Release);
        count
    }

    /// Read as many samples as are available into `output`. Consumer side only.
    ///
    /// Returns the number of samples read.
    pub fn pop_slice(&self, output: &mut [f32]) -> usize {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        let count = output.len().min(write_pos.wrapping_sub(read_pos));

        for (offset, sample) in output[..count].iter_mut().enumerate() {
            let idx = read_pos.wrapping_add(offset) & self.mask;
            *sample = f32::from_bits(self.slots[idx].load(Ordering::Relaxed));
        }

        self.read_pos
            .store(read_pos.wrapping_add(count), Ordering::Release);
        count
    }

    /// Drop everything currently buffered.
    pub fn clear(&self) {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }
}

/// Thread-safe reference to a sample ring.
pub type SharedSampleRing = Arc<SampleRing>;

/// Create a new shared sample ring.
pub fn shared_sample_ring(capacity: usize) -> SharedSampleRing {
    Arc::new(SampleRing::new(capacity))
}
