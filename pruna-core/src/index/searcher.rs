//! Multi-segment searcher

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::pipeline::SearchRequest;
use crate::query::{
    Query, SearchResponse, SearchResult, rescore, search_segment_with_count, sort_by_rank,
};
use crate::segment::SegmentReader;
use crate::{DocId, Result};

/// Searches a fixed set of segments
///
/// Segments get consecutive global doc id ranges in the order given.
#[derive(Debug)]
pub struct Searcher {
    segments: Vec<SegmentReader>,
    num_docs: u32,
}

impl Searcher {
    pub fn new(mut segments: Vec<SegmentReader>) -> Self {
        let mut doc_id_offset: DocId = 0;
        for reader in &mut segments {
            reader.set_doc_id_offset(doc_id_offset);
            doc_id_offset += reader.num_docs();
        }
        log::debug!(
            "[searcher] opened {} segments, {} docs",
            segments.len(),
            doc_id_offset
        );
        Self {
            segments,
            num_docs: doc_id_offset,
        }
    }

    pub fn segment_readers(&self) -> &[SegmentReader] {
        &self.segments
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Top `limit` hits of `query` across segments and the total match count
    pub fn search_with_count(
        &self,
        query: &dyn Query,
        limit: usize,
    ) -> Result<(Vec<SearchResult>, u32)> {
        #[cfg(feature = "parallel")]
        let per_segment: Vec<(Vec<SearchResult>, u32)> = self
            .segments
            .par_iter()
            .map(|segment| search_segment_with_count(segment, query, limit))
            .collect::<Result<_>>()?;
        #[cfg(not(feature = "parallel"))]
        let per_segment: Vec<(Vec<SearchResult>, u32)> = self
            .segments
            .iter()
            .map(|segment| search_segment_with_count(segment, query, limit))
            .collect::<Result<_>>()?;

        let mut total_seen: u32 = 0;
        let mut all_results = Vec::new();
        for (results, seen) in per_segment {
            total_seen += seen;
            all_results.extend(results);
        }

        sort_by_rank(&mut all_results);
        all_results.truncate(limit);
        Ok((all_results, total_seen))
    }

    /// Execute a request: primary retrieval deep enough for every rescore
    /// window, then each rescore stage in order, then truncation to the
    /// requested size.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let size = request.effective_size();
        let fetch = request.fetch_size();

        let t0 = std::time::Instant::now();
        let (mut hits, total_hits) = self.search_with_count(&request.query, fetch)?;
        let primary_elapsed = t0.elapsed();

        for stage in &request.rescore {
            hits = rescore(&self.segments, hits, stage)?;
        }
        hits.truncate(size);

        log::debug!(
            "[searcher] {} hits of {} matches ({} rescore stages): primary={:.1}ms total={:.1}ms",
            hits.len(),
            total_hits,
            request.rescore.len(),
            primary_elapsed.as_secs_f64() * 1000.0,
            t0.elapsed().as_secs_f64() * 1000.0
        );

        Ok(SearchResponse { hits, total_hits })
    }
}
