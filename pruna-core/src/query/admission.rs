//! Bounded top-score admission
//!
//! Decides, per document, whether the low-impact part of a pruned query is
//! worth evaluating: only documents whose high-impact score is among the K
//! best seen so far are admitted. The decision depends on visiting order, so
//! a document rejected early may have been admitted had it arrived first.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::{Error, Result, Score};

/// Default number of scores retained per segment scorer
pub const DEFAULT_ADMISSION_CAPACITY: usize = 50;

/// Score wrapper with a total order; NaN is never stored
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapScore(Score);

impl Eq for HeapScore {}

impl Ord for HeapScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for HeapScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity min-heap of the highest scores admitted so far
#[derive(Debug, Clone)]
pub struct BoundedScoreHeap {
    heap: BinaryHeap<Reverse<HeapScore>>,
    capacity: usize,
}

impl Default for BoundedScoreHeap {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::with_capacity(DEFAULT_ADMISSION_CAPACITY),
            capacity: DEFAULT_ADMISSION_CAPACITY,
        }
    }
}

impl BoundedScoreHeap {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "admission capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            heap: BinaryHeap::with_capacity(capacity),
            capacity,
        })
    }

    /// Offer a score. Returns `true` if it now belongs to the retained set.
    ///
    /// A full heap only admits scores strictly greater than its minimum,
    /// which is then evicted. NaN is never admitted.
    pub fn admit(&mut self, score: Score) -> bool {
        if score.is_nan() {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(HeapScore(score)));
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(min)) if score > min.0 => {
                self.heap.pop();
                self.heap.push(Reverse(HeapScore(score)));
                true
            }
            _ => false,
        }
    }

    /// Smallest retained score; the admission boundary once full
    pub fn min(&self) -> Option<Score> {
        self.heap.peek().map(|Reverse(s)| s.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }
}
