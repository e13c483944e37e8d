//! Fixed-capacity ring of call outcomes.
//!
//! Running counters are kept alongside the slots so that `counts()` is O(1):
//! when a slot is overwritten, the counter of its previous outcome is
//! decremented before the new one is added.

use serde::Serialize;

/// Outcome of one completed call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Failure)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    cursor: usize,
    capacity: usize,
    slots: Vec<Outcome>,
    failed: usize,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cursor: 0,
            capacity,
            slots: Vec::with_capacity(capacity),
            failed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Append an outcome, returning the outcome it displaced once full.
    pub fn record(&mut self, outcome: Outcome) -> Option<Outcome> {
        if outcome.is_failure() {
            self.failed += 1;
        }

        if !self.is_full() {
            self.slots.push(outcome);
            self.cursor = self.slots.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.cursor], outcome);
        if evicted.is_failure() {
            self.failed -= 1;
        }
        self.advance();
        Some(evicted)
    }

    /// Returns `(total, failed)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.slots.len(), self.failed)
    }

    /// Failure rate in percent, or `None` until the buffer is full.
    pub fn failure_rate(&self) -> Option<f32> {
        if !self.is_full() {
            return None;
        }
        let (total, failed) = self.counts();
        Some(failed as f32 * 100.0 / total as f32)
    }

    /// Contents ordered oldest to newest.
    pub fn snapshot(&self) -> Vec<Outcome> {
        if !self.is_full() {
            return self.slots.clone();
        }
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer).copied().collect()
    }

    fn advance(&mut self) {
        if self.cursor == self.capacity - 1 {
            self.cursor = 0;
        } else {
            self.cursor += 1;
        }
    }
}
