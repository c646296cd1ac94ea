//! Query types, scorers and the two-phase rewrite

mod admission;
mod all;
mod boolean;
mod boost;
mod collector;
mod docset;
mod dual_phase;
mod node;
mod rescorer;
mod rewrite;
mod sparse;
mod traits;

pub use admission::{BoundedScoreHeap, DEFAULT_ADMISSION_CAPACITY};
pub use all::MatchAllQuery;
pub use boolean::BooleanQuery;
pub use boost::BoostQuery;
pub(crate) use collector::sort_by_rank;
pub use collector::{
    Collector, SearchResponse, SearchResult, TopKCollector, collect_segment, search_segment,
    search_segment_with_count,
};
pub use dual_phase::{DualPhaseQuery, rewrite_for_dual_phase};
pub use node::QueryNode;
pub use rescorer::{RescoreStage, ScoreMode, rescore};
pub use rewrite::{BoostAccumulator, TwoPhaseCollector};
pub use sparse::{
    PrunedSparseQuery, SparseContentKey, SparseQuery, TermWeightMap, ThresholdSplit,
    split_by_ratio,
};
pub use traits::{DocSet, EmptyScorer, Query, Scorer, ScorerSupplier};
