//! In-memory segments holding sparse posting lists
//!
//! A segment is an immutable partition of the collection. Doc ids are local
//! to the segment; [`SegmentReader::doc_id_offset`] maps them into the global
//! id space used by search results.

mod postings;

pub use postings::{BLOCK_SIZE, SparsePostingIterator, SparsePostingList};

use rustc_hash::FxHashMap;

use crate::DocId;
use crate::query::TermWeightMap;

/// Segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A document: one term-weight map per sparse field
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: Vec<(String, TermWeightMap)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add sparse terms for a field. Repeated calls for the same field merge,
    /// with later weights replacing earlier ones.
    pub fn add_sparse<I, T>(&mut self, field: &str, terms: I)
    where
        I: IntoIterator<Item = (T, f32)>,
        T: Into<String>,
    {
        let idx = match self.fields.iter().position(|(name, _)| name == field) {
            Some(idx) => idx,
            None => {
                self.fields.push((field.to_string(), TermWeightMap::new()));
                self.fields.len() - 1
            }
        };
        let entry = &mut self.fields[idx].1;
        for (term, weight) in terms {
            entry.insert(term.into(), weight);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &TermWeightMap)> {
        self.fields.iter().map(|(name, map)| (name.as_str(), map))
    }
}

/// Accumulates documents into an in-memory segment
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    postings: FxHashMap<String, FxHashMap<String, Vec<(DocId, f32)>>>,
    num_docs: u32,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its segment-local doc id
    pub fn add_document(&mut self, doc: Document) -> DocId {
        let doc_id = self.num_docs;
        for (field, terms) in doc.fields() {
            let field_postings = self.postings.entry(field.to_string()).or_default();
            for (term, &weight) in terms {
                if !weight.is_finite() || weight <= 0.0 {
                    log::trace!(
                        "[segment builder] doc {}: dropping term {:?} with weight {}",
                        doc_id,
                        term,
                        weight
                    );
                    continue;
                }
                field_postings
                    .entry(term.clone())
                    .or_default()
                    .push((doc_id, weight));
            }
        }
        self.num_docs += 1;
        doc_id
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn build(self, id: SegmentId) -> SegmentReader {
        let fields: FxHashMap<String, FxHashMap<String, SparsePostingList>> = self
            .postings
            .into_iter()
            .map(|(field, terms)| {
                let lists = terms
                    .into_iter()
                    .map(|(term, postings)| (term, SparsePostingList::from_postings(postings)))
                    .collect();
                (field, lists)
            })
            .collect();

        log::debug!(
            "[segment builder] built segment {}: {} docs, {} fields",
            id,
            self.num_docs,
            fields.len()
        );

        SegmentReader {
            id,
            num_docs: self.num_docs,
            doc_id_offset: 0,
            fields,
        }
    }
}

/// Read-only view of one segment
#[derive(Debug)]
pub struct SegmentReader {
    id: SegmentId,
    num_docs: u32,
    doc_id_offset: DocId,
    fields: FxHashMap<String, FxHashMap<String, SparsePostingList>>,
}

impl SegmentReader {
    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// First global doc id of this segment
    pub fn doc_id_offset(&self) -> DocId {
        self.doc_id_offset
    }

    pub(crate) fn set_doc_id_offset(&mut self, offset: DocId) {
        self.doc_id_offset = offset;
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Posting list for `term` in `field`, if any document contains it
    pub fn postings(&self, field: &str, term: &str) -> Option<&SparsePostingList> {
        self.fields.get(field)?.get(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_sequential_ids() {
        let mut builder = SegmentBuilder::new();
        let mut doc = Document::new();
        doc.add_sparse("body", [("rust", 1.0)]);
        assert_eq!(builder.add_document(doc.clone()), 0);
        assert_eq!(builder.add_document(doc), 1);
        assert_eq!(builder.num_docs(), 2);

        let reader = builder.build(SegmentId(7));
        assert_eq!(reader.num_docs(), 2);
        assert_eq!(reader.postings("body", "rust").unwrap().doc_count(), 2);
        assert!(reader.postings("body", "python").is_none());
        assert!(reader.postings("title", "rust").is_none());
    }

    #[test]
    fn test_builder_drops_non_positive_weights() {
        let mut builder = SegmentBuilder::new();
        let mut doc = Document::new();
        doc.add_sparse(
            "body",
            [
                ("zero", 0.0),
                ("neg", -1.0),
                ("nan", f32::NAN),
                ("ok", 0.5),
            ],
        );
        builder.add_document(doc);

        let reader = builder.build(SegmentId(1));
        assert!(reader.postings("body", "zero").is_none());
        assert!(reader.postings("body", "neg").is_none());
        assert!(reader.postings("body", "nan").is_none());
        assert!(reader.postings("body", "ok").is_some());
    }

    #[test]
    fn test_document_merges_repeated_fields() {
        let mut doc = Document::new();
        doc.add_sparse("body", [("a", 1.0), ("b", 2.0)]);
        doc.add_sparse("body", [("b", 3.0)]);
        let fields: Vec<_> = doc.fields().collect();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].1.get("b"), Some(&3.0));
    }
}
