//! DocSet trait: the base abstraction for forward-only cursors over sorted
//! document IDs. Posting cursors and scorers all implement it.

use crate::{DocId, TERMINATED};

/// Forward-only cursor over sorted document IDs.
///
/// A freshly constructed cursor is already positioned on its first document
/// (or [`TERMINATED`] when empty).
pub trait DocSet: Send {
    /// Current document ID, or [`TERMINATED`] if exhausted.
    fn doc(&self) -> DocId;

    /// Advance to the next document. Returns the new doc ID or [`TERMINATED`].
    fn advance(&mut self) -> DocId;

    /// Seek to the first document >= `target`. Returns doc ID or [`TERMINATED`].
    /// Never moves backwards: seeking to a target <= `doc()` is a no-op.
    fn seek(&mut self, target: DocId) -> DocId {
        let mut doc = self.doc();
        while doc < target {
            doc = self.advance();
        }
        doc
    }

    /// Estimated number of remaining documents.
    fn size_hint(&self) -> u32;

    fn is_exhausted(&self) -> bool {
        self.doc() == TERMINATED
    }
}
