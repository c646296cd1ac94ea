//! Search request pipeline
//!
//! A [`SearchPipeline`] runs its request processors in order before the
//! request reaches the searcher. Pipelines are defined in JSON:
//!
//! ```json
//! {
//!   "request_processors": [
//!     { "neural_sparse_two_phase_processor": {
//!         "tag": "two-phase",
//!         "enabled": true,
//!         "two_phase_parameter": {
//!           "prune_ratio": 0.4, "expansion_rate": 5.0, "max_window_size": 10000
//!         } } }
//!   ]
//! }
//! ```

mod request;
mod two_phase;

pub use request::{DEFAULT_SIZE, SearchRequest};
pub use two_phase::{
    PROCESSOR_TYPE as TWO_PHASE_PROCESSOR_TYPE, RescoreWindow, TwoPhaseProcessor,
    compute_window_size,
};

use serde::Deserialize;
use serde_json::Value;

use crate::config::TwoPhaseProcessorSpec;
use crate::{Error, Result};

/// Rewrites a search request before execution
pub trait SearchRequestProcessor: Send + Sync + std::fmt::Debug {
    /// Type name used in pipeline definitions
    fn processor_type(&self) -> &'static str;

    fn tag(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> Option<&str> {
        None
    }

    /// Whether a failure should be logged and the request passed on unchanged
    fn ignore_failure(&self) -> bool {
        false
    }

    fn process_request(&self, request: SearchRequest) -> Result<SearchRequest>;
}

#[derive(Debug, Deserialize)]
struct PipelineDefinition {
    #[serde(default)]
    request_processors: Vec<serde_json::Map<String, Value>>,
}

/// Ordered list of request processors
#[derive(Debug, Default)]
pub struct SearchPipeline {
    processors: Vec<Box<dyn SearchRequestProcessor>>,
}

impl SearchPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, processor: impl SearchRequestProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn processors(&self) -> &[Box<dyn SearchRequestProcessor>] {
        &self.processors
    }

    /// Parse a pipeline definition
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: PipelineDefinition = serde_json::from_str(json)?;
        let mut pipeline = Self::new();

        for entry in definition.request_processors {
            if entry.len() != 1 {
                return Err(Error::InvalidConfiguration(format!(
                    "each request processor must have exactly one type key, got {}",
                    entry.len()
                )));
            }
            for (kind, body) in entry {
                let processor = build_processor(&kind, body)?;
                log::debug!(
                    "[pipeline] added {} processor (tag={:?})",
                    processor.processor_type(),
                    processor.tag()
                );
                pipeline.processors.push(processor);
            }
        }
        Ok(pipeline)
    }

    /// Run every processor in order
    pub fn process(&self, mut request: SearchRequest) -> Result<SearchRequest> {
        for processor in &self.processors {
            if processor.ignore_failure() {
                let fallback = request.clone();
                request = match processor.process_request(request) {
                    Ok(processed) => processed,
                    Err(e) => {
                        log::warn!(
                            "[pipeline] {} processor (tag={:?}) failed, passing request on: {}",
                            processor.processor_type(),
                            processor.tag(),
                            e
                        );
                        fallback
                    }
                };
            } else {
                request = processor.process_request(request)?;
            }
        }
        Ok(request)
    }
}

fn build_processor(kind: &str, body: Value) -> Result<Box<dyn SearchRequestProcessor>> {
    match kind {
        two_phase::PROCESSOR_TYPE => {
            let spec: TwoPhaseProcessorSpec = serde_json::from_value(body).map_err(|e| {
                Error::InvalidConfiguration(format!("invalid {} definition: {}", kind, e))
            })?;
            Ok(Box::new(TwoPhaseProcessor::from_spec(&spec)?))
        }
        other => Err(Error::InvalidConfiguration(format!(
            "unknown request processor type {:?}",
            other
        ))),
    }
}
