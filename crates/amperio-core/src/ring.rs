//! Lock-free single-producer single-consumer sample queue.
//!
//! The queue carries `f32` samples between exactly two threads: one producer
//! (typically the input half of a duplex audio driver) and one consumer (the
//! output half, which drives the DSP pipeline). Coordination uses only two
//! atomic positions, so neither side ever blocks.
//!
//! # Algorithm
//!
//! `write_pos` and `read_pos` are monotonic counters that never wrap; cell
//! addressing uses `pos & (capacity - 1)`, which requires the capacity to be
//! a power of two (rounded up at construction). One slot stays reserved so a
//! full queue is distinguishable from an empty one:
//!
//! - producer space: `capacity - (write_pos - read_pos) - 1`
//! - consumer backlog: `write_pos - read_pos`
//!
//! Each side publishes its own position with `Release` after copying and
//! reads the opposite position with `Acquire`. Fills and drains touch at
//! most two contiguous regions of the backing storage.
//!
//! Sample storage is a slice of [`AtomicU32`] cells holding `f32` bit
//! patterns; the acquire/release pairing on the positions is what orders the
//! plain cell traffic, so the cells themselves use relaxed operations.
//!
//! # SPSC contract
//!
//! [`ring_buffer`] returns split [`Producer`] / [`Consumer`] handles; each
//! requires `&mut self` for its operations, so a second writer or reader
//! cannot exist without cloning an `Arc` the API never hands out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Shared state behind a [`Producer`] / [`Consumer`] pair.
#[derive(Debug)]
pub struct RingBuffer {
    cells: Box<[AtomicU32]>,
    mask: usize,
    /// Monotonic total of samples ever written. Producer-owned.
    write_pos: AtomicUsize,
    /// Monotonic total of samples ever read. Consumer-owned.
    read_pos: AtomicUsize,
}

impl RingBuffer {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let cells = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            cells,
            mask: capacity - 1,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Total cell count. The usable capacity is one less (reserved slot).
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Samples currently buffered, as a consistent snapshot.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write - read
    }

    fn copy_in(&self, start: usize, src: &[f32]) {
        // At most two contiguous regions: [index..capacity) then [0..rest).
        let index = start & self.mask;
        let first = src.len().min(self.cells.len() - index);
        for (cell, &sample) in self.cells[index..index + first].iter().zip(&src[..first]) {
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }
        for (cell, &sample) in self.cells.iter().zip(&src[first..]) {
            cell.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    fn copy_out(&self, start: usize, dst: &mut [f32]) {
        let index = start & self.mask;
        let first = dst.len().min(self.cells.len() - index);
        for (cell, sample) in self.cells[index..index + first].iter().zip(dst[..first].iter_mut()) {
            *sample = f32::from_bits(cell.load(Ordering::Relaxed));
        }
        let rest = dst.len() - first;
        for (cell, sample) in self.cells[..rest].iter().zip(dst[first..].iter_mut()) {
            *sample = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }
}

/// Create a queue with at least `capacity` slots (rounded up to a power of
/// two) and split it into its two ends.
pub fn ring_buffer(capacity: usize) -> (Producer, Consumer) {
    let shared = Arc::new(RingBuffer::with_capacity(capacity));
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Write end of the queue. Exactly one thread may hold this.
#[derive(Debug)]
pub struct Producer {
    shared: Arc<RingBuffer>,
}

impl Producer {
    /// Append as many samples from `src` as fit.
    ///
    /// Returns the number of samples accepted, which may be less than
    /// `src.len()` (including 0 when the queue is full or `src` is empty).
    pub fn write(&mut self, src: &[f32]) -> usize {
        let shared = &self.shared;
        let write = shared.write_pos.load(Ordering::Relaxed);
        let read = shared.read_pos.load(Ordering::Acquire);

        let space = shared.cells.len() - (write - read) - 1;
        let count = src.len().min(space);
        if count == 0 {
            return 0;
        }

        shared.copy_in(write, &src[..count]);
        shared.write_pos.store(write + count, Ordering::Release);
        count
    }

    /// Free slots currently visible to the producer.
    pub fn space(&self) -> usize {
        let shared = &self.shared;
        let write = shared.write_pos.load(Ordering::Relaxed);
        let read = shared.read_pos.load(Ordering::Acquire);
        shared.cells.len() - (write - read) - 1
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.shared.available()
    }

    /// Clear both positions.
    ///
    /// The caller must guarantee the consumer is quiescent for the duration
    /// of the call; this is intended for reuse between driver sessions, not
    /// for live operation.
    pub fn reset(&mut self) {
        self.shared.write_pos.store(0, Ordering::Release);
        self.shared.read_pos.store(0, Ordering::Release);
    }
}

/// Read end of the queue. Exactly one thread may hold this.
#[derive(Debug)]
pub struct Consumer {
    shared: Arc<RingBuffer>,
}

impl Consumer {
    /// Drain up to `dst.len()` samples into `dst`.
    ///
    /// Returns the number of samples copied, which may be less than
    /// `dst.len()` (including 0 when the queue is empty or `dst` is empty).
    pub fn read(&mut self, dst: &mut [f32]) -> usize {
        let shared = &self.shared;
        let write = shared.write_pos.load(Ordering::Acquire);
        let read = shared.read_pos.load(Ordering::Relaxed);

        let backlog = write - read;
        let count = dst.len().min(backlog);
        if count == 0 {
            return 0;
        }

        shared.copy_out(read, &mut dst[..count]);
        shared.read_pos.store(read + count, Ordering::Release);
        count
    }

    /// Discard up to `count` buffered samples without copying them out.
    ///
    /// Returns the number of samples dropped. Used to shed backlog when the
    /// consumer has fallen behind the producer.
    pub fn skip(&mut self, count: usize) -> usize {
        let shared = &self.shared;
        let write = shared.write_pos.load(Ordering::Acquire);
        let read = shared.read_pos.load(Ordering::Relaxed);

        let dropped = count.min(write - read);
        if dropped > 0 {
            shared.read_pos.store(read + dropped, Ordering::Release);
        }
        dropped
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.shared.available()
    }

    /// Total cell count of the underlying queue.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_up_to_power_of_two() {
        let (producer, _consumer) = ring_buffer(100);
        assert_eq!(producer.shared.capacity(), 128);

        let (producer, _consumer) = ring_buffer(256);
        assert_eq!(producer.shared.capacity(), 256);
    }

    #[test]
    fn test_write_then_read() {
        let (mut producer, mut consumer) = ring_buffer(8);
        let written = producer.write(&[1.0, 2.0, 3.0]);
        assert_eq!(written, 3);
        assert_eq!(producer.available(), 3);
        assert_eq!(consumer.available(), 3);

        let mut out = [0.0; 3];
        assert_eq!(consumer.read(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_full_queue_rejects_overflow() {
        let (mut producer, _consumer) = ring_buffer(8);
        // One slot stays reserved, so 7 of 8 fit.
        assert_eq!(producer.write(&[0.5; 16]), 7);
        assert_eq!(producer.write(&[0.5; 4]), 0);
        assert_eq!(producer.space(), 0);
    }

    #[test]
    fn test_zero_length_ops() {
        let (mut producer, mut consumer) = ring_buffer(8);
        assert_eq!(producer.write(&[]), 0);
        let mut out = [0.0; 0];
        assert_eq!(consumer.read(&mut out), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let (mut producer, mut consumer) = ring_buffer(8);
        let mut out = [0.0; 5];

        // Push the positions near the wrap point, then straddle it.
        for round in 0..10 {
            let base = round as f32 * 10.0;
            let chunk = [base, base + 1.0, base + 2.0, base + 3.0, base + 4.0];
            assert_eq!(producer.write(&chunk), 5);
            assert_eq!(consumer.read(&mut out), 5);
            assert_eq!(out, chunk);
        }
    }

    #[test]
    fn test_skip_drops_backlog() {
        let (mut producer, mut consumer) = ring_buffer(16);
        producer.write(&[1.0; 10]);
        assert_eq!(consumer.skip(4), 4);
        assert_eq!(consumer.available(), 6);
        assert_eq!(consumer.skip(100), 6);
        assert_eq!(consumer.available(), 0);
    }

    #[test]
    fn test_reset_clears_positions() {
        let (mut producer, mut consumer) = ring_buffer(8);
        producer.write(&[1.0; 5]);
        let mut out = [0.0; 2];
        consumer.read(&mut out);

        producer.reset();
        assert_eq!(consumer.available(), 0);
        assert_eq!(producer.space(), 7);
    }

    #[test]
    fn test_threaded_conservation() {
        // Every sample written is read exactly once, in order, across an
        // arbitrary interleaving of the two threads.
        const TOTAL: usize = 100_000;

        let (mut producer, mut consumer) = ring_buffer(64);

        let writer = std::thread::spawn(move || {
            let mut next = 0usize;
            while next < TOTAL {
                let end = (next + 17).min(TOTAL);
                let chunk: Vec<f32> = (next..end).map(|i| i as f32).collect();
                let accepted = producer.write(&chunk);
                next += accepted;
                if accepted == 0 {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = 0usize;
        let mut buf = [0.0f32; 23];
        while received < TOTAL {
            let got = consumer.read(&mut buf);
            for &sample in &buf[..got] {
                assert_eq!(sample, received as f32, "out-of-order sample");
                received += 1;
            }
            if got == 0 {
                std::thread::yield_now();
            }
        }

        writer.join().unwrap();
        assert_eq!(consumer.available(), 0);
    }
}
