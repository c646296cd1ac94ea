//! Pruna - two-phase pruned scoring for sparse-vector retrieval
//!
//! Learned sparse encoders emit queries with hundreds or thousands of weighted
//! terms, but most of the ranking signal sits in a few high-weight terms. This
//! library provides:
//! - Ratio-of-max splitting of a query's term weights into high/low partitions
//! - A dual-phase scorer that scores every candidate with the high partition
//!   and adds the low partition only for documents that enter a bounded
//!   top-score heap
//! - A query-tree collector that prunes sparse leaves in place and gathers
//!   their low partitions into one boosted disjunction
//! - A two-phase search request processor that installs that disjunction as a
//!   windowed rescore stage
//! - A small in-memory segment/scorer runtime to execute all of the above

pub mod config;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod segment;

pub use config::TwoPhaseConfig;
pub use error::{Error, Result};
pub use index::Searcher;
pub use pipeline::{
    RescoreWindow, SearchPipeline, SearchRequest, SearchRequestProcessor, TwoPhaseProcessor,
};
pub use query::{
    BooleanQuery, BoostQuery, BoundedScoreHeap, DualPhaseQuery, EmptyScorer, PrunedSparseQuery,
    Query, QueryNode, RescoreStage, ScoreMode, Scorer, ScorerSupplier, SearchResponse,
    SearchResult, SparseQuery, TermWeightMap, ThresholdSplit, TopKCollector, split_by_ratio,
};
pub use segment::{Document, SegmentBuilder, SegmentReader};

pub type DocId = u32;
pub type Score = f32;

/// Sentinel doc id returned by exhausted iterators
pub const TERMINATED: DocId = u32::MAX;
