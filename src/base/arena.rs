use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A free-index queue used to recycle storage slots.
///
/// Mutation and gamete turnover is high: every generation retires entries and
/// creates new ones. Rather than letting the backing vectors grow without
/// bound, retired indices are parked here and handed back out before the
/// vector is extended. All external references are plain indices, so reuse is
/// a pure bookkeeping operation.
///
/// The queue is FIFO so recently freed slots cool off before reuse, which
/// keeps slot assignment deterministic for a fixed random seed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecyclingBin {
    free: VecDeque<usize>,
}

impl RecyclingBin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the bin with every index whose count is zero.
    ///
    /// Used when adopting an existing collection, e.g. right after decoding a
    /// serialized population.
    pub fn from_counts(counts: &[u32]) -> Self {
        let free = counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(i, _)| i)
            .collect();
        Self { free }
    }

    /// Take a previously freed slot, if any.
    ///
    /// Returns `None` when the bin is empty; the caller then extends the
    /// backing collection instead.
    pub fn acquire(&mut self) -> Option<usize> {
        self.free.pop_front()
    }

    /// Mark a slot as free for future reuse.
    ///
    /// The caller must guarantee the slot is no longer referenced by any live
    /// entity; the sweep and the generational driver only release indices
    /// whose counts have been observed to reach zero.
    pub fn release(&mut self, index: usize) {
        self.free.push_back(index);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}
