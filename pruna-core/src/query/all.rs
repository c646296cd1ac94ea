//! Match-all query: every document in the segment with a constant score

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score, TERMINATED};

use super::{DocSet, Query, Scorer, ScorerSupplier};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchAllQuery {
    pub score: Score,
}

impl Default for MatchAllQuery {
    fn default() -> Self {
        Self { score: 1.0 }
    }
}

impl MatchAllQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(score: Score) -> Self {
        Self { score }
    }
}

impl Query for MatchAllQuery {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        if reader.num_docs() == 0 {
            return Ok(None);
        }
        Ok(Some(Box::new(AllScorer {
            current: 0,
            num_docs: reader.num_docs(),
            score: self.score,
        })))
    }
}

/// Yields all documents `0..num_docs`
struct AllScorer {
    current: u32,
    num_docs: u32,
    score: Score,
}

impl<'a> ScorerSupplier<'a> for AllScorer {
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a> {
        self
    }

    fn cost(&self) -> u64 {
        self.num_docs as u64
    }
}

impl DocSet for AllScorer {
    #[inline]
    fn doc(&self) -> DocId {
        if self.current >= self.num_docs {
            TERMINATED
        } else {
            self.current
        }
    }

    #[inline]
    fn advance(&mut self) -> DocId {
        self.current = self.current.saturating_add(1);
        self.doc()
    }

    #[inline]
    fn seek(&mut self, target: DocId) -> DocId {
        self.current = self.current.max(target);
        self.doc()
    }

    fn size_hint(&self) -> u32 {
        self.num_docs.saturating_sub(self.current)
    }
}

impl Scorer for AllScorer {
    fn score(&self) -> Score {
        self.score
    }

    fn max_score(&self, _up_to: DocId) -> Score {
        self.score
    }
}
