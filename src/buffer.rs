use std::collections::VecDeque;

use crate::types::PositionSample;

/// Bounded FIFO of the most recent valid samples for one session.
///
/// Single-writer: only the owning session's ingestion path pushes. When the
/// buffer is full the oldest entry is evicted.
pub struct SessionBuffer {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl SessionBuffer {
    pub fn new(capacity: usize) -> Self {
        SessionBuffer {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PositionSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Last `n` samples in chronological order (fewer if not yet available).
    pub fn recent(&self, n: usize) -> Vec<PositionSample> {
        let start = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(start).cloned().collect()
    }

    /// Most recently accepted sample, if any.
    pub fn latest(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }
}
