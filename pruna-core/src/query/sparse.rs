//! Sparse term-weight queries and ratio-of-max pruning
//!
//! A [`SparseQuery`] scores a document as `boost * Σ q_w * d_w` over the query
//! terms present in the document. [`split_by_ratio`] partitions a query's
//! terms into a high-impact part (weight >= ratio * max weight) and the
//! low-impact remainder.

use std::collections::BTreeMap;

use crate::segment::{SegmentReader, SparsePostingIterator};
use crate::{DocId, Error, Result, Score};

use super::boolean::BooleanScorer;
use super::{DocSet, Query, Scorer, ScorerSupplier};

/// Term → weight map produced by a sparse encoder
pub type TermWeightMap = BTreeMap<String, f32>;

/// High/low partition of a [`TermWeightMap`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSplit {
    /// Terms with weight >= `ratio * max`
    pub high: TermWeightMap,
    /// Terms below the threshold
    pub low: TermWeightMap,
}

/// Split `tokens` by `weight >= max(weights) * ratio`.
///
/// The max is taken over a floor of 0.0, so an empty map yields two empty
/// partitions. For non-negative weights and `ratio` in `[0, 1]` the heaviest
/// term always lands in `high`.
pub fn split_by_ratio(tokens: &TermWeightMap, ratio: f32) -> ThresholdSplit {
    let max = tokens.values().copied().fold(0.0f32, f32::max);
    let threshold = max * ratio;
    let (high, low): (TermWeightMap, TermWeightMap) = tokens
        .iter()
        .map(|(term, &weight)| (term.clone(), weight))
        .partition(|&(_, weight)| weight >= threshold);

    log::trace!(
        "[sparse split] {} terms, max={:.4}, threshold={:.4}: high={}, low={}",
        tokens.len(),
        max,
        threshold,
        high.len(),
        low.len()
    );

    ThresholdSplit { high, low }
}

/// Identity of a sparse query's content: field and exact term weights.
/// Boost is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SparseContentKey {
    field: String,
    tokens: Vec<(String, u32)>,
}

/// Sparse term-weight query over one field
#[derive(Debug, Clone, PartialEq)]
pub struct SparseQuery {
    pub field: String,
    pub tokens: TermWeightMap,
    pub boost: f32,
}

impl std::fmt::Display for SparseQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sparse({}, terms={}", self.field, self.tokens.len())?;
        if self.boost != 1.0 {
            write!(f, ", boost={}", self.boost)?;
        }
        write!(f, ")")
    }
}

impl SparseQuery {
    /// Create a sparse query. Weights must be finite and non-negative.
    pub fn new(field: impl Into<String>, tokens: TermWeightMap) -> Result<Self> {
        if let Some((term, weight)) = tokens.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidInput(format!(
                "sparse token {:?} has weight {}, expected a finite non-negative value",
                term, weight
            )));
        }
        Ok(Self {
            field: field.into(),
            tokens,
            boost: 1.0,
        })
    }

    /// Create from `(term, weight)` pairs; a repeated term keeps its last weight
    pub fn from_pairs<I, T>(field: impl Into<String>, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, f32)>,
        T: Into<String>,
    {
        let tokens = pairs
            .into_iter()
            .map(|(term, weight)| (term.into(), weight))
            .collect();
        Self::new(field, tokens)
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn content_key(&self) -> SparseContentKey {
        SparseContentKey {
            field: self.field.clone(),
            tokens: self
                .tokens
                .iter()
                .map(|(term, weight)| (term.clone(), weight.to_bits()))
                .collect(),
        }
    }

    /// Split into high/low-impact queries carrying the same field and boost
    pub fn prune(&self, ratio: f32) -> PrunedSparseQuery {
        let ThresholdSplit { high, low } = split_by_ratio(&self.tokens, ratio);
        PrunedSparseQuery {
            high: self.with_tokens(high),
            low: self.with_tokens(low),
        }
    }

    fn with_tokens(&self, tokens: TermWeightMap) -> SparseQuery {
        SparseQuery {
            field: self.field.clone(),
            tokens,
            boost: self.boost,
        }
    }

    /// Exact `Σ q_w * d_w * boost` for a document's term weights
    pub fn dot(&self, doc_terms: &TermWeightMap) -> Score {
        self.tokens
            .iter()
            .filter_map(|(term, q_w)| doc_terms.get(term).map(|d_w| q_w * d_w))
            .sum::<f32>()
            * self.boost
    }
}

/// A sparse query split into its high- and low-impact partitions
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedSparseQuery {
    pub high: SparseQuery,
    pub low: SparseQuery,
}

impl Query for SparseQuery {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        let mut terms = Vec::with_capacity(self.tokens.len());
        for (term, &weight) in &self.tokens {
            if weight == 0.0 {
                continue;
            }
            if let Some(postings) = reader.postings(&self.field, term) {
                terms.push(SparseTermCursor {
                    postings: postings.iterator(),
                    weight: weight * self.boost,
                });
            }
        }

        if terms.is_empty() {
            log::trace!(
                "[sparse query] {} matches nothing in segment {}",
                self,
                reader.id()
            );
            return Ok(None);
        }
        Ok(Some(Box::new(SparseWeight { terms })))
    }
}

/// Resolved per-segment term cursors of a [`SparseQuery`]
struct SparseWeight<'a> {
    terms: Vec<SparseTermCursor<'a>>,
}

impl<'a> ScorerSupplier<'a> for SparseWeight<'a> {
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a> {
        let mut terms = self.terms;
        if terms.len() == 1
            && let Some(term) = terms.pop()
        {
            return Box::new(term);
        }
        let scorers = terms
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn Scorer + 'a>)
            .collect();
        Box::new(BooleanScorer::new(Vec::new(), scorers, Vec::new()))
    }

    fn cost(&self) -> u64 {
        self.terms
            .iter()
            .map(|t| t.postings.remaining() as u64)
            .sum()
    }
}

/// Scorer for a single sparse term: `weight * stored_weight`
struct SparseTermCursor<'a> {
    postings: SparsePostingIterator<'a>,
    /// Query weight with the query boost folded in
    weight: f32,
}

impl DocSet for SparseTermCursor<'_> {
    fn doc(&self) -> DocId {
        self.postings.doc()
    }

    fn advance(&mut self) -> DocId {
        self.postings.advance()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        self.postings.seek(target)
    }

    fn size_hint(&self) -> u32 {
        self.postings.remaining()
    }
}

impl Scorer for SparseTermCursor<'_> {
    fn score(&self) -> Score {
        self.weight * self.postings.weight()
    }

    fn max_score(&self, up_to: DocId) -> Score {
        self.weight * self.postings.block_max(up_to)
    }
}
