//! Fixed-capacity circular (ring) buffer with a monotonic write cursor.
//!
//! The buffer stores the most-recent `capacity` samples; when full, new
//! writes **overwrite** the oldest data so the producer is never throttled
//! by readers.  Every sample is identified by its position in the overall
//! stream: the write cursor `write_seq` counts all samples ever written, so
//! the retained content is always the span `[write_seq - len, write_seq)`.
//!
//! Sequence numbers let a push-to-talk session snapshot the cursor on key
//! down and key up and later ask for exactly that span — and let the buffer
//! detect when part of that span has already been overwritten
//! ([`BufferError::Overrun`]).
//!
//! # Example
//!
//! ```rust
//! use voicewire::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.write(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]); // 5 items → capacity 4 → oldest dropped
//! assert_eq!(buf.write_seq(), 5);
//! assert_eq!(buf.read_latest(2), vec![4.0, 5.0]);
//! // Sample 0 was overwritten — the span [0, 2) is gone.
//! assert!(buf.extract_range(0, 2).is_err());
//! // The span [1, 5) is still fully retained.
//! assert_eq!(buf.extract_range(1, 5).unwrap(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

use std::sync::{Arc, Mutex};

use thiserror::Error;

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Reason a requested sample span could not be extracted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Part of the requested span has already been overwritten.
    #[error("span [{start_seq}, {end_seq}) overwritten: oldest retained sample is {oldest_seq}")]
    Overrun {
        start_seq: u64,
        end_seq: u64,
        oldest_seq: u64,
    },

    /// The span is malformed or reaches past the write cursor.
    #[error("invalid span [{start_seq}, {end_seq}): write cursor is at {write_seq}")]
    InvalidRange {
        start_seq: u64,
        end_seq: u64,
        write_seq: u64,
    },
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer with sequence-numbered contents.
///
/// Generic over `T: Copy + Default` so it can store any `Copy` scalar,
/// though the audio pipeline uses `RingBuffer<f32>` exclusively.
///
/// ## Overflow behaviour
///
/// When [`write`](Self::write) would exceed `capacity`, the oldest samples
/// are silently overwritten (drop-oldest).  The write cursor still advances
/// by the full batch length, so overwritten spans remain detectable.  The
/// buffer never allocates after construction.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
    /// Total samples ever written; the stream position of the next sample.
    write_seq: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
            write_seq: 0,
        }
    }

    /// Append `samples`, advancing the write cursor by `samples.len()`.
    ///
    /// Oldest samples are overwritten when the batch exceeds the remaining
    /// capacity.  Never allocates, never fails.
    pub fn write(&mut self, samples: &[T]) {
        for &item in samples {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            }
        }
        self.write_seq += samples.len() as u64;
    }

    /// The most recent `min(n, len)` samples, in chronological order.
    pub fn read_latest(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        if n == 0 {
            return Vec::new();
        }
        let start = (self.write_pos + self.capacity - n) % self.capacity;
        let mut result = Vec::with_capacity(n);
        if start + n <= self.capacity {
            result.extend_from_slice(&self.buf[start..start + n]);
        } else {
            result.extend_from_slice(&self.buf[start..]);
            result.extend_from_slice(&self.buf[..n - (self.capacity - start)]);
        }
        result
    }

    /// Extract the exact span `[start_seq, end_seq)` in order.
    ///
    /// # Errors
    ///
    /// * [`BufferError::InvalidRange`] — `start_seq > end_seq` or the span
    ///   reaches past the write cursor.
    /// * [`BufferError::Overrun`] — `start_seq` precedes the oldest retained
    ///   sample; part of the span has been overwritten.  Never returns a
    ///   partially-overwritten span.
    pub fn extract_range(&self, start_seq: u64, end_seq: u64) -> Result<Vec<T>, BufferError> {
        if start_seq > end_seq || end_seq > self.write_seq {
            return Err(BufferError::InvalidRange {
                start_seq,
                end_seq,
                write_seq: self.write_seq,
            });
        }
        let oldest = self.oldest_seq();
        if start_seq < oldest {
            return Err(BufferError::Overrun {
                start_seq,
                end_seq,
                oldest_seq: oldest,
            });
        }

        let count = (end_seq - start_seq) as usize;
        if count == 0 {
            return Ok(Vec::new());
        }
        // Physical index of the oldest retained sample, then offset forward.
        let oldest_pos = (self.write_pos + self.capacity - self.len) % self.capacity;
        let start = (oldest_pos + (start_seq - oldest) as usize) % self.capacity;

        let mut result = Vec::with_capacity(count);
        if start + count <= self.capacity {
            result.extend_from_slice(&self.buf[start..start + count]);
        } else {
            result.extend_from_slice(&self.buf[start..]);
            result.extend_from_slice(&self.buf[..count - (self.capacity - start)]);
        }
        Ok(result)
    }

    /// Discard all samples.  The write cursor is *not* reset — sequence
    /// numbers stay monotonic for the life of the buffer.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Stream position of the next sample to be written (`W`).
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Sequence number of the oldest sample still retrievable.
    pub fn oldest_seq(&self) -> u64 {
        self.write_seq - self.len as u64
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// SharedRingBuffer
// ---------------------------------------------------------------------------

/// Thread-safe handle to the audio ring buffer, shared between the capture
/// callback (sole producer) and the analysis / extraction readers.
///
/// All access is a short bounded critical section: the producer writes one
/// batch, readers copy one window out.  The capture callback uses
/// `try_lock` and drops the batch on contention so it can never block on a
/// reader.
pub type SharedRingBuffer = Arc<Mutex<RingBuffer<f32>>>;

/// Construct a new [`SharedRingBuffer`] with the given capacity in samples.
pub fn shared_ring(capacity: usize) -> SharedRingBuffer {
    Arc::new(Mutex::new(RingBuffer::new(capacity)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Basic write / read ------------------------------------------------

    #[test]
    fn write_within_capacity() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[1.0_f32, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.write_seq(), 3);
        assert_eq!(buf.oldest_seq(), 0);
    }

    #[test]
    fn read_latest_returns_most_recent() {
        let mut buf = RingBuffer::new(1024);
        buf.write(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.read_latest(3), vec![3.0, 4.0, 5.0]);
        assert_eq!(buf.read_latest(1), vec![5.0]);
        // Requesting more than available returns all
        assert_eq!(buf.read_latest(10), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn read_latest_after_wrap() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // Buffer contains [3.0, 4.0, 5.0, 6.0]
        assert_eq!(buf.read_latest(2), vec![5.0, 6.0]);
        assert_eq!(buf.read_latest(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn read_latest_empty() {
        let buf: RingBuffer<f32> = RingBuffer::new(4);
        assert!(buf.read_latest(4).is_empty());
    }

    // ---- Overflow (oldest sample discarded) --------------------------------

    #[test]
    fn overflow_drops_oldest_but_cursor_advances() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]); // 5 > capacity(4)

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.write_seq(), 5);
        assert_eq!(buf.oldest_seq(), 1);
        assert_eq!(buf.read_latest(4), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn multiple_overflows_in_separate_calls() {
        let mut buf = RingBuffer::new(3);
        buf.write(&[1.0_f32, 2.0, 3.0]); // fill
        buf.write(&[4.0, 5.0]); // 2 more → overwrites 1 and 2

        assert_eq!(buf.read_latest(3), vec![3.0, 4.0, 5.0]);
        assert_eq!(buf.oldest_seq(), 2);
    }

    // ---- extract_range round-trip ------------------------------------------

    #[test]
    fn round_trip_exact_span() {
        let mut buf = RingBuffer::new(1024);
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        buf.write(&samples);
        let extracted = buf.extract_range(0, 100).expect("span retained");
        assert_eq!(extracted, samples);

        // Extraction is non-consuming
        let again = buf.extract_range(0, 100).expect("span retained");
        assert_eq!(again, samples);
    }

    #[test]
    fn round_trip_across_multiple_writes() {
        let mut buf = RingBuffer::new(64);
        buf.write(&[1.0_f32, 2.0]);
        buf.write(&[3.0, 4.0, 5.0]);
        buf.write(&[6.0]);
        assert_eq!(
            buf.extract_range(0, 6).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(buf.extract_range(2, 5).unwrap(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn round_trip_spanning_wrap_point() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[0.0_f32; 6]); // seq 0..6
        buf.write(&[1.0, 2.0, 3.0, 4.0]); // seq 6..10, wraps physically
        assert_eq!(buf.extract_range(6, 10).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn extract_empty_span_is_empty() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[1.0_f32, 2.0]);
        assert_eq!(buf.extract_range(1, 1).unwrap(), Vec::<f32>::new());
    }

    // ---- Overrun / invalid range -------------------------------------------

    #[test]
    fn stale_span_fails_with_overrun() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0_f32, 2.0, 3.0, 4.0]);
        buf.write(&[5.0, 6.0]); // samples 0 and 1 overwritten

        let err = buf.extract_range(0, 4).unwrap_err();
        assert_eq!(
            err,
            BufferError::Overrun {
                start_seq: 0,
                end_seq: 4,
                oldest_seq: 2,
            }
        );
        // A span that starts at the oldest retained sample still succeeds.
        assert_eq!(buf.extract_range(2, 6).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn span_past_cursor_is_invalid() {
        let mut buf = RingBuffer::new(8);
        buf.write(&[1.0_f32, 2.0]);
        assert!(matches!(
            buf.extract_range(0, 3),
            Err(BufferError::InvalidRange { .. })
        ));
        assert!(matches!(
            buf.extract_range(2, 1),
            Err(BufferError::InvalidRange { .. })
        ));
    }

    // ---- Push-to-talk scenario ---------------------------------------------

    /// Capacity 16000 (1 s @ 16 kHz).  Key down at seq 0, 8000 samples in,
    /// key up at seq 8000, 8000 more samples arrive.  The span [0, 8000)
    /// must come back as exactly the first 8000 written samples.
    #[test]
    fn utterance_survives_continued_capture() {
        let mut buf = RingBuffer::new(16_000);
        let first: Vec<f32> = (0..8_000).map(|i| (i as f32 * 0.001).sin()).collect();
        let second: Vec<f32> = (0..8_000).map(|i| (i as f32 * 0.002).cos()).collect();

        buf.write(&first); // seq 0..8000, key down was at 0
        buf.write(&second); // seq 8000..16000, key up was at 8000

        let extracted = buf.extract_range(0, 8_000).expect("span retained");
        assert_eq!(extracted, first);
    }

    // ---- Concurrency: no torn reads ----------------------------------------

    /// Writer pushes constant-valued batches while a reader snapshots
    /// windows.  All writes are `BATCH` long and the reads are
    /// batch-aligned multiples, so every `BATCH`-sized chunk of a returned
    /// window must be uniform — a mixed chunk would be a torn read.
    #[test]
    fn concurrent_reads_are_consistent() {
        use std::thread;

        const BATCH: usize = 64;
        let ring = shared_ring(BATCH * 16);
        let writer_ring = Arc::clone(&ring);

        let writer = thread::spawn(move || {
            for value in 1..=500u32 {
                let batch = vec![value as f32; BATCH];
                writer_ring.lock().unwrap().write(&batch);
            }
        });

        let mut windows_checked = 0;
        while windows_checked < 200 {
            let window = ring.lock().unwrap().read_latest(BATCH * 4);
            if window.len() < BATCH {
                continue;
            }
            let mut prev = 0.0_f32;
            for chunk in window.chunks(BATCH) {
                let first = chunk[0];
                assert!(chunk.iter().all(|&s| s == first), "torn batch in window");
                assert!(first >= prev, "batches out of order");
                prev = first;
            }
            windows_checked += 1;
        }

        writer.join().unwrap();
    }

    /// Extraction under concurrent writes either returns the exact span or
    /// reports `Overrun` — never silently corrupted data.
    #[test]
    fn concurrent_extract_is_exact_or_overrun() {
        use std::thread;

        let ring = shared_ring(4_096);
        let writer_ring = Arc::clone(&ring);

        let writer = thread::spawn(move || {
            let mut seq = 0u64;
            for _ in 0..300 {
                let batch: Vec<f32> = (0..32).map(|i| (seq + i) as f32).collect();
                writer_ring.lock().unwrap().write(&batch);
                seq += 32;
            }
        });

        for _ in 0..100 {
            let (start, end, result) = {
                let buf = ring.lock().unwrap();
                let end = buf.write_seq();
                let start = end.saturating_sub(256);
                (start, end, buf.extract_range(start, end))
            };
            match result {
                Ok(samples) => {
                    assert_eq!(samples.len(), (end - start) as usize);
                    for (i, &s) in samples.iter().enumerate() {
                        assert_eq!(s, (start + i as u64) as f32);
                    }
                }
                Err(BufferError::Overrun { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        writer.join().unwrap();
    }

    // ---- Misc --------------------------------------------------------------

    #[test]
    fn clear_keeps_cursor_monotonic() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0_f32, 2.0, 3.0]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.write_seq(), 3);
        assert_eq!(buf.oldest_seq(), 3);

        buf.write(&[9.0]);
        assert_eq!(buf.extract_range(3, 4).unwrap(), vec![9.0]);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}
