//! Two-phase query tree rewrite
//!
//! [`TwoPhaseCollector`] walks a query tree through SHOULD clauses and boost
//! wrappers, replaces each sparse leaf in place with its high-impact
//! partition and gathers the low-impact partitions into one boosted
//! disjunction for a later rescore pass.
//!
//! The same sparse content reached through several branches collapses to a
//! single clause whose boost is the sum, over occurrences, of
//! `path boost × leaf boost`.

use rustc_hash::FxHashMap;

use super::sparse::SparseContentKey;
use super::{BooleanQuery, QueryNode, SparseQuery};

/// One occurrence of a sparse leaf: boost accumulated on the path to it and
/// the leaf's own boost
#[derive(Debug, Clone, Copy, PartialEq)]
struct Occurrence {
    path_boost: f32,
    own_boost: f32,
}

#[derive(Debug, Clone)]
struct AccumulatedLeaf {
    low: SparseQuery,
    occurrences: Vec<Occurrence>,
}

impl AccumulatedLeaf {
    fn final_boost(&self) -> f32 {
        self.occurrences
            .iter()
            .map(|o| o.path_boost * o.own_boost)
            .sum()
    }
}

/// Low partitions keyed by sparse content, in first-seen order
#[derive(Debug, Default)]
pub struct BoostAccumulator {
    index: FxHashMap<SparseContentKey, usize>,
    leaves: Vec<AccumulatedLeaf>,
}

impl BoostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of the sparse leaf `key`
    pub fn record(
        &mut self,
        key: SparseContentKey,
        low: SparseQuery,
        path_boost: f32,
        own_boost: f32,
    ) {
        let occurrence = Occurrence {
            path_boost,
            own_boost,
        };
        match self.index.get(&key) {
            Some(&idx) => self.leaves[idx].occurrences.push(occurrence),
            None => {
                self.index.insert(key, self.leaves.len());
                self.leaves.push(AccumulatedLeaf {
                    low,
                    occurrences: vec![occurrence],
                });
            }
        }
    }

    /// Number of distinct sparse contents recorded
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Final boost per distinct content, in first-seen order
    pub fn final_boosts(&self) -> Vec<f32> {
        self.leaves
            .iter()
            .map(AccumulatedLeaf::final_boost)
            .collect()
    }

    /// SHOULD-disjunction of every non-empty low partition with its final
    /// boost; `None` when no low partition has terms.
    pub fn into_combined(self) -> Option<BooleanQuery> {
        let should: Vec<QueryNode> = self
            .leaves
            .into_iter()
            .filter(|leaf| !leaf.low.is_empty())
            .map(|leaf| {
                let boost = leaf.final_boost();
                QueryNode::Sparse(leaf.low.with_boost(boost))
            })
            .collect();
        if should.is_empty() {
            return None;
        }
        Some(BooleanQuery {
            should,
            ..BooleanQuery::default()
        })
    }
}

/// Prunes sparse leaves in place and gathers their low-impact partitions
#[derive(Debug)]
pub struct TwoPhaseCollector {
    prune_ratio: f32,
    accumulator: BoostAccumulator,
    leaves_seen: usize,
}

impl TwoPhaseCollector {
    pub fn new(prune_ratio: f32) -> Self {
        Self {
            prune_ratio,
            accumulator: BoostAccumulator::new(),
            leaves_seen: 0,
        }
    }

    /// Walk `node`, multiplying `boost_so_far` by the boost of every boolean
    /// and boost wrapper passed through. MUST and MUST_NOT clauses, opaque
    /// queries and already dual-phase leaves are left alone.
    pub fn collect(&mut self, node: &mut QueryNode, boost_so_far: f32) {
        match node {
            QueryNode::Boolean(b) => {
                let boost = boost_so_far * b.boost;
                for child in &mut b.should {
                    self.collect(child, boost);
                }
            }
            QueryNode::Boosted(b) => {
                let boost = boost_so_far * b.boost;
                self.collect(&mut b.inner, boost);
            }
            QueryNode::Sparse(leaf) => {
                if leaf.is_empty() {
                    return;
                }
                let key = leaf.content_key();
                let own_boost = leaf.boost;
                let pruned = leaf.prune(self.prune_ratio);
                log::trace!(
                    "[two-phase] pruned {}: high={}, low={}, path boost={}",
                    leaf,
                    pruned.high.tokens.len(),
                    pruned.low.tokens.len(),
                    boost_so_far
                );
                self.accumulator.record(key, pruned.low, boost_so_far, own_boost);
                self.leaves_seen += 1;
                *leaf = pruned.high;
            }
            QueryNode::DualPhase(_) | QueryNode::Opaque(_) => {}
        }
    }

    /// Number of sparse leaves rewritten so far
    pub fn leaves_seen(&self) -> usize {
        self.leaves_seen
    }

    pub fn accumulator(&self) -> &BoostAccumulator {
        &self.accumulator
    }

    /// Combined low-impact disjunction, or `None` if nothing is left to
    /// rescore
    pub fn finish(self) -> Option<BooleanQuery> {
        log::debug!(
            "[two-phase] collected {} sparse leaves, {} distinct",
            self.leaves_seen,
            self.accumulator.len()
        );
        self.accumulator.into_combined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{BoostQuery, MatchAllQuery};

    fn sparse(pairs: &[(&str, f32)]) -> SparseQuery {
        SparseQuery::from_pairs("body", pairs.iter().copied()).unwrap()
    }

    fn leaf() -> SparseQuery {
        sparse(&[("a", 1.0), ("b", 0.8), ("c", 0.1), ("d", 0.05)])
    }

    #[test]
    fn test_duplicate_leaf_boost_aggregates() {
        let b0 = 2.0;
        let b1 = 3.0;
        let b2 = 0.5;
        let nested = BooleanQuery::new()
            .should(leaf().with_boost(b0))
            .with_boost(b1);
        let mut tree: QueryNode = BooleanQuery::new()
            .should(nested)
            .should(BoostQuery::new(leaf().with_boost(b0), b2))
            .into();

        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut tree, 1.0);
        assert_eq!(collector.leaves_seen(), 2);
        assert_eq!(collector.accumulator().len(), 1);
        let boosts = collector.accumulator().final_boosts();
        assert!((boosts[0] - b0 * (b1 + b2)).abs() < 1e-6);

        let combined = collector.finish().unwrap();
        assert_eq!(combined.should.len(), 1);
        assert_eq!(combined.boost, 1.0);
        let QueryNode::Sparse(low) = &combined.should[0] else {
            panic!("expected sparse clause");
        };
        assert_eq!(low.tokens.len(), 2);
        assert!((low.boost - b0 * (b1 + b2)).abs() < 1e-6);
    }

    #[test]
    fn test_leaves_replaced_by_high_partition() {
        let mut tree: QueryNode = BooleanQuery::new()
            .should(leaf())
            .should(sparse(&[("x", 0.2), ("y", 0.9)]))
            .into();

        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut tree, 1.0);

        let QueryNode::Boolean(b) = &tree else {
            panic!("expected boolean root");
        };
        let first = b.should[0].as_sparse().unwrap();
        assert_eq!(first.tokens.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let second = b.should[1].as_sparse().unwrap();
        assert_eq!(second.tokens.keys().collect::<Vec<_>>(), vec!["y"]);

        let combined = collector.finish().unwrap();
        assert_eq!(combined.should.len(), 2);
    }

    #[test]
    fn test_must_clauses_and_opaque_untouched() {
        let original: QueryNode = BooleanQuery::new()
            .must(leaf())
            .must_not(leaf())
            .should(MatchAllQuery::new())
            .into();
        let mut tree = original.clone();

        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut tree, 1.0);
        assert_eq!(collector.leaves_seen(), 0);
        assert_eq!(tree, original);
        assert!(collector.finish().is_none());
    }

    #[test]
    fn test_root_leaf_and_empty_low() {
        let mut root: QueryNode = sparse(&[("a", 1.0), ("b", 0.9)]).into();
        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut root, 1.0);
        assert_eq!(collector.leaves_seen(), 1);
        // Nothing fell below the threshold, so there is nothing to rescore
        assert!(collector.finish().is_none());
    }

    #[test]
    fn test_empty_leaf_not_recorded() {
        let mut root: QueryNode = BooleanQuery::new()
            .should(SparseQuery::new("body", Default::default()).unwrap())
            .into();
        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut root, 1.0);
        assert_eq!(collector.leaves_seen(), 0);
        assert!(collector.accumulator().is_empty());
    }

    #[test]
    fn test_distinct_fields_are_distinct_keys() {
        let body = leaf();
        let title = SparseQuery {
            field: "title".to_string(),
            ..leaf()
        };
        let mut root: QueryNode = BooleanQuery::new().should(body).should(title).into();
        let mut collector = TwoPhaseCollector::new(0.4);
        collector.collect(&mut root, 1.0);
        assert_eq!(collector.accumulator().len(), 2);
    }
}
