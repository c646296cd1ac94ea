//! Sparse posting lists with per-block max weights
//!
//! Each posting stores `(doc_id, weight)` where `weight` is the document-side
//! impact of the term. Postings are grouped into fixed-size blocks whose max
//! weight gives a cheap score upper bound for a doc-id range.

use crate::{DocId, TERMINATED};

/// Postings per block for block-max upper bounds
pub const BLOCK_SIZE: usize = 64;

/// Posting list for one sparse term in one segment
#[derive(Debug, Clone, Default)]
pub struct SparsePostingList {
    doc_ids: Vec<DocId>,
    weights: Vec<f32>,
    block_max: Vec<f32>,
    max_weight: f32,
}

impl SparsePostingList {
    /// Build from unsorted postings. A later duplicate of a doc id replaces
    /// the earlier one.
    pub fn from_postings(mut postings: Vec<(DocId, f32)>) -> Self {
        postings.sort_by_key(|&(doc, _)| doc);
        let mut doc_ids: Vec<DocId> = Vec::with_capacity(postings.len());
        let mut weights: Vec<f32> = Vec::with_capacity(postings.len());
        for (doc, weight) in postings {
            if doc_ids.last() == Some(&doc) {
                if let Some(last) = weights.last_mut() {
                    *last = weight;
                }
                continue;
            }
            doc_ids.push(doc);
            weights.push(weight);
        }

        let block_max: Vec<f32> = weights
            .chunks(BLOCK_SIZE)
            .map(|block| block.iter().copied().fold(0.0f32, f32::max))
            .collect();
        let max_weight = block_max.iter().copied().fold(0.0f32, f32::max);

        Self {
            doc_ids,
            weights,
            block_max,
            max_weight,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_ids.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Largest stored weight in the list
    pub fn max_weight(&self) -> f32 {
        self.max_weight
    }

    pub fn iterator(&self) -> SparsePostingIterator<'_> {
        SparsePostingIterator { list: self, pos: 0 }
    }
}

/// Forward-only cursor over a [`SparsePostingList`]
#[derive(Debug, Clone)]
pub struct SparsePostingIterator<'a> {
    list: &'a SparsePostingList,
    pos: usize,
}

impl SparsePostingIterator<'_> {
    #[inline]
    pub fn doc(&self) -> DocId {
        let doc_ids = &self.list.doc_ids;
        doc_ids.get(self.pos).copied().unwrap_or(TERMINATED)
    }

    /// Weight at the current position, 0.0 when exhausted
    #[inline]
    pub fn weight(&self) -> f32 {
        self.list.weights.get(self.pos).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn advance(&mut self) -> DocId {
        if self.pos < self.list.doc_ids.len() {
            self.pos += 1;
        }
        self.doc()
    }

    /// Seek to the first doc >= `target`. Never moves backwards.
    pub fn seek(&mut self, target: DocId) -> DocId {
        if self.pos >= self.list.doc_ids.len() {
            return TERMINATED;
        }
        let remaining = &self.list.doc_ids[self.pos..];
        self.pos += remaining.partition_point(|&d| d < target);
        self.doc()
    }

    pub fn remaining(&self) -> u32 {
        self.list.doc_ids.len().saturating_sub(self.pos) as u32
    }

    /// Max stored weight over the blocks overlapping `[doc(), up_to]`
    pub fn block_max(&self, up_to: DocId) -> f32 {
        if self.pos >= self.list.doc_ids.len() {
            return 0.0;
        }
        let num_blocks = self.list.block_max.len();
        let mut block = self.pos / BLOCK_SIZE;
        let mut max = 0.0f32;
        while block < num_blocks {
            let first_doc = self.list.doc_ids[block * BLOCK_SIZE];
            if first_doc > up_to && block != self.pos / BLOCK_SIZE {
                break;
            }
            max = max.max(self.list.block_max[block]);
            block += 1;
        }
        max
    }
}
