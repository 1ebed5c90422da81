//! Lock-free playback queue for audio samples
//!
//! The input callback pushes captured chunks, the output callback pops
//! them. Push and pop never wait on each other. Each push allocates one
//! owned chunk for the decoded samples.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::AudioError;

/// Bounded SPSC queue of interleaved i16 chunks
pub struct SampleQueue {
    queue: ArrayQueue<Vec<i16>>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl SampleQueue {
    /// Create a new queue holding at most `capacity` chunks
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Decode S16LE bytes and push them as one chunk
    pub fn push_bytes(&self, data: &[u8]) -> Result<(), AudioError> {
        if data.len() % 2 != 0 {
            return Err(AudioError::InvalidData(format!(
                "{} bytes is not a whole number of samples",
                data.len()
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        let samples = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        self.queue.push(samples).map_err(|_| {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
            AudioError::QueueFull
        })
    }

    /// Pop the oldest chunk
    pub fn pop(&self) -> Option<Vec<i16>> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Chunks rejected because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Output buffers that had to be padded with silence
    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a sample queue
pub type SharedSampleQueue = Arc<SampleQueue>;

/// Output-side reader that hands out samples one buffer at a time,
/// keeping the unread tail of a partially consumed chunk.
pub struct QueueReader {
    queue: SharedSampleQueue,
    pending: Vec<i16>,
    cursor: usize,
}

impl QueueReader {
    pub fn new(queue: SharedSampleQueue) -> Self {
        Self {
            queue,
            pending: Vec::new(),
            cursor: 0,
        }
    }

    /// Fill `out` with queued samples, padding with silence when the
    /// queue runs dry. Returns the number of real samples written.
    pub fn fill(&mut self, out: &mut [i16]) -> usize {
        let mut written = 0;

        while written < out.len() {
            if self.cursor == self.pending.len() {
                match self.queue.pop() {
                    Some(chunk) => {
                        self.pending = chunk;
                        self.cursor = 0;
                    }
                    None => break,
                }
            }

            let n = (out.len() - written).min(self.pending.len() - self.cursor);
            out[written..written + n]
                .copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
            written += n;
            self.cursor += n;
        }

        if written < out.len() {
            out[written..].fill(0);
            self.queue.underrun_count.fetch_add(1, Ordering::Relaxed);
        }

        written
    }
}
