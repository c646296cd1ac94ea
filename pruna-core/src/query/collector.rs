//! Search result collection and response types

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score, TERMINATED};

use super::Query;

/// Search result with a global doc id and score
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub score: Score,
}

impl SearchResult {
    pub fn new(doc_id: DocId, score: Score) -> Self {
        Self { doc_id, score }
    }
}

/// Search response with ranked hits
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchResult>,
    /// Number of documents matched by the primary query across all segments
    pub total_hits: u32,
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.doc_id == other.doc_id
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ranking order: higher score first, then lower doc id
impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Sort hits into ranking order
pub(crate) fn sort_by_rank(hits: &mut [SearchResult]) {
    hits.sort_by(|a, b| a.cmp(b));
}

/// Trait for search result collectors
pub trait Collector {
    /// Called for each matching document
    fn collect(&mut self, doc_id: DocId, score: Score);
}

/// Collector for top-k results
pub struct TopKCollector {
    heap: BinaryHeap<SearchResult>,
    k: usize,
    /// Total documents seen by this collector
    total_seen: u32,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            k,
            total_seen: 0,
        }
    }

    /// Get the total number of documents seen (scored) by this collector
    pub fn total_seen(&self) -> u32 {
        self.total_seen
    }

    pub fn into_sorted_results(self) -> Vec<SearchResult> {
        let mut results = self.heap.into_vec();
        sort_by_rank(&mut results);
        results
    }

    /// Consume collector and return (sorted_results, total_seen)
    pub fn into_results_with_count(self) -> (Vec<SearchResult>, u32) {
        let total = self.total_seen;
        (self.into_sorted_results(), total)
    }
}

impl Collector for TopKCollector {
    fn collect(&mut self, doc_id: DocId, score: Score) {
        self.total_seen += 1;
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(SearchResult { doc_id, score });
        } else if let Some(min) = self.heap.peek()
            && score > min.score
        {
            self.heap.pop();
            self.heap.push(SearchResult { doc_id, score });
        }
    }
}

/// Execute a search query on a single segment
pub fn search_segment(
    reader: &SegmentReader,
    query: &dyn Query,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let mut collector = TopKCollector::new(limit);
    collect_segment(reader, query, &mut collector)?;
    Ok(collector.into_sorted_results())
}

/// Execute a search query on a single segment and return (results, total_seen)
pub fn search_segment_with_count(
    reader: &SegmentReader,
    query: &dyn Query,
    limit: usize,
) -> Result<(Vec<SearchResult>, u32)> {
    let mut collector = TopKCollector::new(limit);
    collect_segment(reader, query, &mut collector)?;
    Ok(collector.into_results_with_count())
}

/// Drive a query's scorer over one segment, feeding verified matches to
/// `collector`.
///
/// Doc IDs are adjusted by the segment's doc_id_offset to produce global doc
/// IDs that can be used across all segments.
pub fn collect_segment<C: Collector>(
    reader: &SegmentReader,
    query: &dyn Query,
    collector: &mut C,
) -> Result<()> {
    let doc_id_offset = reader.doc_id_offset();
    let mut scorer = query.scorer(reader)?;

    let mut doc = scorer.doc();
    while doc != TERMINATED {
        if scorer.matches() {
            collector.collect(doc + doc_id_offset, scorer.score());
        }
        doc = scorer.advance();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SparseQuery;
    use crate::segment::{Document, SegmentBuilder, SegmentId};

    #[test]
    fn test_top_k_collector() {
        let mut collector = TopKCollector::new(3);

        collector.collect(0, 1.0);
        collector.collect(1, 3.0);
        collector.collect(2, 2.0);
        collector.collect(3, 4.0);
        collector.collect(4, 0.5);

        let results = collector.into_sorted_results();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].doc_id, 3); // score 4.0
        assert_eq!(results[1].doc_id, 1); // score 3.0
        assert_eq!(results[2].doc_id, 2); // score 2.0
    }

    #[test]
    fn test_top_k_ties_prefer_lower_doc_id() {
        let mut collector = TopKCollector::new(2);
        collector.collect(5, 1.0);
        collector.collect(2, 1.0);
        collector.collect(9, 1.0);

        let (results, seen) = collector.into_results_with_count();
        assert_eq!(seen, 3);
        assert_eq!(
            results.iter().map(|r| r.doc_id).collect::<Vec<_>>(),
            vec![2, 5]
        );
    }

    #[test]
    fn test_collect_segment_applies_offset() {
        let mut builder = SegmentBuilder::new();
        for w in [0.2, 0.9, 0.5] {
            let mut doc = Document::new();
            doc.add_sparse("body", [("rust", w)]);
            builder.add_document(doc);
        }
        let mut reader = builder.build(SegmentId(4));
        reader.set_doc_id_offset(100);

        let query = SparseQuery::from_pairs("body", [("rust", 1.0)]).unwrap();
        let (results, total) = search_segment_with_count(&reader, &query, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            results.iter().map(|r| r.doc_id).collect::<Vec<_>>(),
            vec![101, 102]
        );
    }
}
