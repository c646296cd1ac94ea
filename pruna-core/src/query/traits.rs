//! Query, ScorerSupplier and Scorer traits
//!
//! Scoring a query against a segment happens in two steps:
//! 1. [`Query::scorer_supplier`] does the cheap, fallible per-segment lookup
//!    (which terms exist, which clauses can match) and returns `None` when the
//!    query cannot match anything in the segment.
//! 2. [`ScorerSupplier::get`] builds the iterator. It cannot fail, so callers
//!    may defer it into the per-document loop.

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score, TERMINATED};

pub use super::docset::DocSet;

/// Per-segment scorer factory
pub trait ScorerSupplier<'a>: Send {
    /// Build the scorer, positioned on its first document
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a>;

    /// Estimated number of matching documents
    fn cost(&self) -> u64;
}

/// A search query
pub trait Query: Send + Sync + std::fmt::Debug {
    /// Prepare scoring against a single segment; `None` matches nothing
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>>;

    /// Create a scorer for this query against a single segment
    fn scorer<'a>(&'a self, reader: &'a SegmentReader) -> Result<Box<dyn Scorer + 'a>> {
        Ok(match self.scorer_supplier(reader)? {
            Some(supplier) => supplier.get(),
            None => Box::new(EmptyScorer),
        })
    }

    /// Estimated number of matching documents in a segment
    fn count_estimate(&self, reader: &SegmentReader) -> Result<u32> {
        Ok(self
            .scorer_supplier(reader)?
            .map_or(0, |supplier| supplier.cost().min(u32::MAX as u64) as u32))
    }
}

/// Scorer that iterates over matching documents and computes scores
pub trait Scorer: DocSet {
    /// Score for current document
    fn score(&self) -> Score;

    /// Upper bound of `score()` for any document in `[doc(), up_to]`
    fn max_score(&self, up_to: DocId) -> Score;

    /// Two-phase verification of the current document. Iteration may stop on
    /// approximate candidates; only documents for which this returns `true`
    /// are actual matches.
    fn matches(&mut self) -> bool {
        true
    }
}

/// Empty scorer for queries that match nothing
pub struct EmptyScorer;

impl DocSet for EmptyScorer {
    fn doc(&self) -> DocId {
        TERMINATED
    }

    fn advance(&mut self) -> DocId {
        TERMINATED
    }

    fn seek(&mut self, _target: DocId) -> DocId {
        TERMINATED
    }

    fn size_hint(&self) -> u32 {
        0
    }
}

impl Scorer for EmptyScorer {
    fn score(&self) -> Score {
        0.0
    }

    fn max_score(&self, _up_to: DocId) -> Score {
        0.0
    }

    fn matches(&mut self) -> bool {
        false
    }
}
