//! Windowed rescoring of primary results
//!
//! A [`RescoreStage`] re-scores the top `window_size` hits of a ranked list
//! with a secondary query and combines both scores per [`ScoreMode`]. Hits
//! beyond the window keep their order after the rescored window.

use serde::{Deserialize, Serialize};

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score, TERMINATED};

use super::collector::sort_by_rank;
use super::{Query, QueryNode, SearchResult};

/// How the primary and secondary scores are combined for matched documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    #[default]
    Total,
    Multiply,
    Avg,
    Max,
    Min,
}

impl ScoreMode {
    /// Combine already weighted primary and secondary scores
    pub fn combine(self, primary: Score, secondary: Score) -> Score {
        match self {
            ScoreMode::Total => primary + secondary,
            ScoreMode::Multiply => primary * secondary,
            ScoreMode::Avg => (primary + secondary) / 2.0,
            ScoreMode::Max => primary.max(secondary),
            ScoreMode::Min => primary.min(secondary),
        }
    }
}

/// One re-ranking stage applied after primary retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct RescoreStage {
    pub query: QueryNode,
    pub window_size: usize,
    /// Weight applied to the primary score
    pub query_weight: f32,
    /// Weight applied to the secondary score
    pub rescore_query_weight: f32,
    pub score_mode: ScoreMode,
}

impl RescoreStage {
    pub fn new(query: impl Into<QueryNode>, window_size: usize) -> Self {
        Self {
            query: query.into(),
            window_size,
            query_weight: 1.0,
            rescore_query_weight: 1.0,
            score_mode: ScoreMode::Total,
        }
    }

    pub fn with_query_weight(mut self, weight: f32) -> Self {
        self.query_weight = weight;
        self
    }

    pub fn with_rescore_query_weight(mut self, weight: f32) -> Self {
        self.rescore_query_weight = weight;
        self
    }

    pub fn with_score_mode(mut self, mode: ScoreMode) -> Self {
        self.score_mode = mode;
        self
    }

    fn combine(&self, primary: Score, secondary: Option<Score>) -> Score {
        let primary = primary * self.query_weight;
        match secondary {
            Some(s) => self
                .score_mode
                .combine(primary, s * self.rescore_query_weight),
            None => primary,
        }
    }
}

/// Index of the segment holding global `doc_id`; `segments` are ordered by
/// doc id offset
fn segment_for(segments: &[SegmentReader], doc_id: DocId) -> Option<usize> {
    let idx = segments
        .partition_point(|s| s.doc_id_offset() <= doc_id)
        .checked_sub(1)?;
    let segment = &segments[idx];
    (doc_id - segment.doc_id_offset() < segment.num_docs()).then_some(idx)
}

/// Apply `stage` to ranked `hits`.
///
/// Window hits are scored against the stage query within their own segment,
/// in ascending doc order so each segment needs a single forward pass.
pub fn rescore(
    segments: &[SegmentReader],
    mut hits: Vec<SearchResult>,
    stage: &RescoreStage,
) -> Result<Vec<SearchResult>> {
    let window = stage.window_size.min(hits.len());
    if window == 0 {
        return Ok(hits);
    }
    let t0 = std::time::Instant::now();
    let rest = hits.split_off(window);

    // (segment, local doc, window position)
    let mut reads: Vec<(usize, DocId, usize)> = Vec::with_capacity(window);
    let mut unresolved = 0u32;
    for (pos, hit) in hits.iter().enumerate() {
        match segment_for(segments, hit.doc_id) {
            Some(si) => reads.push((si, hit.doc_id - segments[si].doc_id_offset(), pos)),
            None => unresolved += 1,
        }
    }
    reads.sort_unstable_by_key(|&(si, local, _)| (si, local));

    let mut secondary: Vec<Option<Score>> = vec![None; window];
    let mut matched = 0u32;
    for group in reads.chunk_by(|a, b| a.0 == b.0) {
        let reader = &segments[group[0].0];
        let mut scorer = stage.query.scorer(reader)?;
        for &(_, local, pos) in group {
            let doc = scorer.seek(local);
            if doc == TERMINATED {
                break;
            }
            if doc == local && scorer.matches() {
                secondary[pos] = Some(scorer.score());
                matched += 1;
            }
        }
    }

    for (hit, secondary) in hits.iter_mut().zip(secondary) {
        hit.score = stage.combine(hit.score, secondary);
    }
    sort_by_rank(&mut hits);

    log::debug!(
        "[rescorer] window {}: {} matched, {} unresolved, {} passed through, took {:.1}ms",
        window,
        matched,
        unresolved,
        rest.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );

    hits.extend(rest);
    Ok(hits)
}
