//! Search request passed through the processor pipeline

use crate::query::{QueryNode, RescoreStage};

/// Result count used when a request does not specify one
pub const DEFAULT_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: QueryNode,
    /// Requested number of hits; `None` means [`DEFAULT_SIZE`]
    pub size: Option<usize>,
    /// Rescore stages, applied in order after primary retrieval
    pub rescore: Vec<RescoreStage>,
}

impl SearchRequest {
    pub fn new(query: impl Into<QueryNode>) -> Self {
        Self {
            query: query.into(),
            size: None,
            rescore: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_rescore(mut self, stage: RescoreStage) -> Self {
        self.rescore.push(stage);
        self
    }

    pub fn effective_size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_SIZE)
    }

    /// Number of hits primary retrieval must keep so every stage sees its
    /// full window
    pub fn fetch_size(&self) -> usize {
        self.rescore
            .iter()
            .map(|stage| stage.window_size)
            .fold(self.effective_size(), usize::max)
    }
}
