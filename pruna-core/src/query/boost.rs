//! Boost query - multiplies the score of the inner query

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score};

use super::{DocSet, Query, QueryNode, Scorer, ScorerSupplier};

/// Boost query - multiplies the score of the inner query
#[derive(Debug, Clone, PartialEq)]
pub struct BoostQuery {
    pub inner: Box<QueryNode>,
    pub boost: f32,
}

impl std::fmt::Display for BoostQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}^{}", self.inner, self.boost)
    }
}

impl BoostQuery {
    pub fn new(query: impl Into<QueryNode>, boost: f32) -> Self {
        Self {
            inner: Box::new(query.into()),
            boost,
        }
    }
}

impl Query for BoostQuery {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        Ok(self.inner.scorer_supplier(reader)?.map(|inner| {
            Box::new(BoostWeight {
                inner,
                boost: self.boost,
            }) as Box<dyn ScorerSupplier<'a> + 'a>
        }))
    }
}

struct BoostWeight<'a> {
    inner: Box<dyn ScorerSupplier<'a> + 'a>,
    boost: f32,
}

impl<'a> ScorerSupplier<'a> for BoostWeight<'a> {
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a> {
        Box::new(BoostScorer::new(self.inner.get(), self.boost))
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

pub(crate) struct BoostScorer<'a> {
    inner: Box<dyn Scorer + 'a>,
    boost: f32,
}

impl<'a> BoostScorer<'a> {
    pub(crate) fn new(inner: Box<dyn Scorer + 'a>, boost: f32) -> Self {
        Self { inner, boost }
    }
}

impl DocSet for BoostScorer<'_> {
    fn doc(&self) -> DocId {
        self.inner.doc()
    }

    fn advance(&mut self) -> DocId {
        self.inner.advance()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        self.inner.seek(target)
    }

    fn size_hint(&self) -> u32 {
        self.inner.size_hint()
    }
}

impl Scorer for BoostScorer<'_> {
    fn score(&self) -> Score {
        self.inner.score() * self.boost
    }

    fn max_score(&self, up_to: DocId) -> Score {
        // Negative boosts yield non-positive scores, bounded by 0
        (self.inner.max_score(up_to) * self.boost).max(0.0)
    }

    fn matches(&mut self) -> bool {
        self.inner.matches()
    }
}
