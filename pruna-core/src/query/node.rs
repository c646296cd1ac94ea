//! Closed query tree
//!
//! Rewrites need to know which nodes are boolean disjunctions, boost wrappers
//! and sparse leaves. Everything else is carried as an opaque [`Query`].

use std::sync::Arc;

use crate::Result;
use crate::segment::SegmentReader;

use super::{BooleanQuery, BoostQuery, DualPhaseQuery, Query, ScorerSupplier, SparseQuery};

#[derive(Debug, Clone)]
pub enum QueryNode {
    Boolean(BooleanQuery),
    Boosted(BoostQuery),
    Sparse(SparseQuery),
    DualPhase(DualPhaseQuery),
    Opaque(Arc<dyn Query>),
}

impl QueryNode {
    pub fn opaque(query: impl Query + 'static) -> Self {
        QueryNode::Opaque(Arc::new(query))
    }

    /// The node's own boost; opaque queries report 1.0
    pub fn boost(&self) -> f32 {
        match self {
            QueryNode::Boolean(q) => q.boost,
            QueryNode::Boosted(q) => q.boost,
            QueryNode::Sparse(q) => q.boost,
            QueryNode::DualPhase(q) => q.high.boost,
            QueryNode::Opaque(_) => 1.0,
        }
    }

    pub fn as_sparse(&self) -> Option<&SparseQuery> {
        match self {
            QueryNode::Sparse(q) => Some(q),
            _ => None,
        }
    }

    /// Visit every node depth-first, parents before children
    pub fn walk(&self, visit: &mut impl FnMut(&QueryNode)) {
        visit(self);
        match self {
            QueryNode::Boolean(b) => {
                for child in b.must.iter().chain(&b.should).chain(&b.must_not) {
                    child.walk(visit);
                }
            }
            QueryNode::Boosted(b) => b.inner.walk(visit),
            QueryNode::Sparse(_) | QueryNode::DualPhase(_) | QueryNode::Opaque(_) => {}
        }
    }
}

impl PartialEq for QueryNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (QueryNode::Boolean(a), QueryNode::Boolean(b)) => a == b,
            (QueryNode::Boosted(a), QueryNode::Boosted(b)) => a == b,
            (QueryNode::Sparse(a), QueryNode::Sparse(b)) => a == b,
            (QueryNode::DualPhase(a), QueryNode::DualPhase(b)) => a == b,
            (QueryNode::Opaque(a), QueryNode::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Display for QueryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryNode::Boolean(q) => write!(f, "{}", q),
            QueryNode::Boosted(q) => write!(f, "{}", q),
            QueryNode::Sparse(q) => write!(f, "{}", q),
            QueryNode::DualPhase(q) => write!(f, "{}", q),
            QueryNode::Opaque(q) => write!(f, "{:?}", q),
        }
    }
}

impl Query for QueryNode {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        match self {
            QueryNode::Boolean(q) => q.scorer_supplier(reader),
            QueryNode::Boosted(q) => q.scorer_supplier(reader),
            QueryNode::Sparse(q) => q.scorer_supplier(reader),
            QueryNode::DualPhase(q) => q.scorer_supplier(reader),
            QueryNode::Opaque(q) => q.scorer_supplier(reader),
        }
    }
}

impl From<BooleanQuery> for QueryNode {
    fn from(q: BooleanQuery) -> Self {
        QueryNode::Boolean(q)
    }
}

impl From<BoostQuery> for QueryNode {
    fn from(q: BoostQuery) -> Self {
        QueryNode::Boosted(q)
    }
}

impl From<SparseQuery> for QueryNode {
    fn from(q: SparseQuery) -> Self {
        QueryNode::Sparse(q)
    }
}

impl From<DualPhaseQuery> for QueryNode {
    fn from(q: DualPhaseQuery) -> Self {
        QueryNode::DualPhase(q)
    }
}

impl From<super::MatchAllQuery> for QueryNode {
    fn from(q: super::MatchAllQuery) -> Self {
        QueryNode::opaque(q)
    }
}

impl From<Arc<dyn Query>> for QueryNode {
    fn from(q: Arc<dyn Query>) -> Self {
        QueryNode::Opaque(q)
    }
}
