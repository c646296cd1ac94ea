//! Dual-phase sparse scoring
//!
//! A [`DualPhaseQuery`] holds a sparse query split into high- and low-impact
//! partitions. Every document the enclosing query scores gets the high
//! partition; the low partition is only evaluated for documents whose high
//! score enters a bounded top-score heap. Each segment scorer owns its heap, so admission is
//! bounded per segment.
//!
//! ```text
//!   Created ──first doc──▶ Iterating ──advance/seek──▶ Iterating
//!                              │
//!                              └──────end of postings──▶ Exhausted
//! ```

use std::cell::{Cell, OnceCell, RefCell};

use crate::segment::{SegmentId, SegmentReader};
use crate::{DocId, Error, Result, Score, TERMINATED};

use super::admission::BoundedScoreHeap;
use super::{
    BooleanQuery, BoostQuery, DocSet, EmptyScorer, PrunedSparseQuery, Query, QueryNode, Scorer,
    ScorerSupplier, SparseQuery,
};

/// Sparse query evaluated as high-impact terms plus admitted low-impact terms
#[derive(Debug, Clone, PartialEq)]
pub struct DualPhaseQuery {
    pub high: SparseQuery,
    pub low: SparseQuery,
    capacity: usize,
}

impl std::fmt::Display for DualPhaseQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DualPhase({}, high={}, low={}, k={})",
            self.high.field,
            self.high.tokens.len(),
            self.low.tokens.len(),
            self.capacity
        )
    }
}

impl DualPhaseQuery {
    /// Split `query` by `prune_ratio`, admitting up to `capacity` documents
    /// per segment into the low-impact phase.
    pub fn new(query: &SparseQuery, prune_ratio: f32, capacity: usize) -> Result<Self> {
        validate_prune_ratio(prune_ratio)?;
        Self::from_pruned(query.prune(prune_ratio), capacity)
    }

    pub fn from_pruned(pruned: PrunedSparseQuery, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "admission capacity must be at least 1".to_string(),
            ));
        }
        if pruned.high.is_empty() {
            return Err(Error::InvalidInput(format!(
                "dual-phase query on field {:?} has no high-impact terms",
                pruned.high.field
            )));
        }
        Ok(Self {
            high: pruned.high,
            low: pruned.low,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn validate_prune_ratio(ratio: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(Error::InvalidConfiguration(format!(
            "prune ratio must be within [0, 1], got {}",
            ratio
        )));
    }
    Ok(())
}

impl Query for DualPhaseQuery {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        let Some(high) = self.high.scorer_supplier(reader)? else {
            return Ok(None);
        };
        let low = self.low.scorer_supplier(reader)?;
        let heap = BoundedScoreHeap::new(self.capacity)?;

        Ok(Some(Box::new(DualPhaseWeight {
            high,
            low,
            heap,
            segment: reader.id(),
        })))
    }
}

struct DualPhaseWeight<'a> {
    high: Box<dyn ScorerSupplier<'a> + 'a>,
    low: Option<Box<dyn ScorerSupplier<'a> + 'a>>,
    heap: BoundedScoreHeap,
    segment: SegmentId,
}

impl<'a> ScorerSupplier<'a> for DualPhaseWeight<'a> {
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a> {
        let this = *self;
        Box::new(DualPhaseScorer::new(
            this.high.get(),
            LazyScorer::new(this.low),
            this.heap,
            this.segment,
        ))
    }

    fn cost(&self) -> u64 {
        self.high.cost()
    }
}

/// Low-impact scorer built on first admission, at most once
struct LazyScorer<'a> {
    supplier: Option<Box<dyn ScorerSupplier<'a> + 'a>>,
    slot: OnceCell<Box<dyn Scorer + 'a>>,
}

impl<'a> LazyScorer<'a> {
    fn new(supplier: Option<Box<dyn ScorerSupplier<'a> + 'a>>) -> Self {
        Self {
            supplier,
            slot: OnceCell::new(),
        }
    }

    fn get_mut(&mut self) -> Option<&mut Box<dyn Scorer + 'a>> {
        let supplier = &mut self.supplier;
        self.slot.get_or_init(|| match supplier.take() {
            Some(s) => s.get(),
            None => Box::new(EmptyScorer),
        });
        self.slot.get_mut()
    }

    #[cfg(test)]
    fn is_materialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DualPhaseState {
    Created,
    Iterating,
    Exhausted,
}

/// Scores the high partition on every collected document and adds the low
/// partition for admitted ones.
///
/// Admission happens in [`Scorer::score`], so documents an enclosing
/// conjunction or exclusion only steps over never reach the heap.
pub(crate) struct DualPhaseScorer<'a> {
    high: Box<dyn Scorer + 'a>,
    low: RefCell<LazyScorer<'a>>,
    heap: RefCell<BoundedScoreHeap>,
    state: DualPhaseState,
    /// Last scored document and its score
    scored: Cell<Option<(DocId, Score)>>,
    visited: u32,
    admitted: Cell<u32>,
    segment: SegmentId,
}

impl<'a> DualPhaseScorer<'a> {
    fn new(
        high: Box<dyn Scorer + 'a>,
        low: LazyScorer<'a>,
        heap: BoundedScoreHeap,
        segment: SegmentId,
    ) -> Self {
        let mut scorer = Self {
            high,
            low: RefCell::new(low),
            heap: RefCell::new(heap),
            state: DualPhaseState::Created,
            scored: Cell::new(None),
            visited: 0,
            admitted: Cell::new(0),
            segment,
        };
        scorer.land();
        scorer
    }

    /// Track the document the high scorer just moved to
    fn land(&mut self) {
        if self.high.doc() != TERMINATED {
            self.state = DualPhaseState::Iterating;
            self.visited += 1;
            return;
        }
        if self.state != DualPhaseState::Exhausted {
            self.state = DualPhaseState::Exhausted;
            log::debug!(
                "[dual-phase] segment {}: visited {}, admitted {} (k={})",
                self.segment,
                self.visited,
                self.admitted.get(),
                self.heap.borrow().capacity()
            );
        }
    }

    /// High score of `doc`, plus the low score when the high score is
    /// admitted. The low scorer only moves forward.
    fn score_doc(&self, doc: DocId) -> Score {
        let high = self.high.score();
        if !self.heap.borrow_mut().admit(high) {
            return high;
        }
        self.admitted.set(self.admitted.get() + 1);

        let mut lazy = self.low.borrow_mut();
        let Some(low) = lazy.get_mut() else {
            return high;
        };
        if low.doc() < doc {
            low.seek(doc);
        }
        if low.doc() == doc && low.matches() {
            high + low.score()
        } else {
            high
        }
    }
}

impl DocSet for DualPhaseScorer<'_> {
    fn doc(&self) -> DocId {
        self.high.doc()
    }

    fn advance(&mut self) -> DocId {
        if self.state == DualPhaseState::Exhausted {
            return TERMINATED;
        }
        self.high.advance();
        self.land();
        self.high.doc()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        let doc = self.high.doc();
        if self.state == DualPhaseState::Exhausted || doc >= target {
            return doc;
        }
        self.high.seek(target);
        self.land();
        self.high.doc()
    }

    fn size_hint(&self) -> u32 {
        self.high.size_hint()
    }
}

impl Scorer for DualPhaseScorer<'_> {
    /// Admits each document at most once; repeated calls on the same
    /// document return the cached score.
    fn score(&self) -> Score {
        let doc = self.high.doc();
        if doc == TERMINATED {
            return 0.0;
        }
        if let Some((scored_doc, score)) = self.scored.get()
            && scored_doc == doc
        {
            return score;
        }
        let score = self.score_doc(doc);
        self.scored.set(Some((doc, score)));
        score
    }

    fn max_score(&self, up_to: DocId) -> Score {
        self.high.max_score(up_to)
    }

    fn matches(&mut self) -> bool {
        self.high.matches()
    }
}

/// Replace sparse leaves reachable through SHOULD clauses and boost wrappers
/// with [`DualPhaseQuery`] nodes. Leaves with no tokens are kept as-is.
pub fn rewrite_for_dual_phase(
    node: QueryNode,
    prune_ratio: f32,
    capacity: usize,
) -> Result<QueryNode> {
    validate_prune_ratio(prune_ratio)?;
    if capacity == 0 {
        return Err(Error::InvalidConfiguration(
            "admission capacity must be at least 1".to_string(),
        ));
    }
    rewrite_node(node, prune_ratio, capacity)
}

fn rewrite_node(node: QueryNode, prune_ratio: f32, capacity: usize) -> Result<QueryNode> {
    Ok(match node {
        QueryNode::Boolean(b) => {
            let should = b
                .should
                .into_iter()
                .map(|child| rewrite_node(child, prune_ratio, capacity))
                .collect::<Result<Vec<_>>>()?;
            QueryNode::Boolean(BooleanQuery { should, ..b })
        }
        QueryNode::Boosted(BoostQuery { inner, boost }) => QueryNode::Boosted(BoostQuery {
            inner: Box::new(rewrite_node(*inner, prune_ratio, capacity)?),
            boost,
        }),
        QueryNode::Sparse(q) if !q.is_empty() => {
            QueryNode::DualPhase(DualPhaseQuery::new(&q, prune_ratio, capacity)?)
        }
        other => other,
    })
}
