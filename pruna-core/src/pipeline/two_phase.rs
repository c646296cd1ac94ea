//! Two-phase request processor
//!
//! Prunes every sparse leaf of the primary query to its high-impact terms and
//! appends a rescore stage that adds the low-impact terms back for the top
//! `size × expansion_rate` hits.

use crate::config::{TwoPhaseConfig, TwoPhaseProcessorSpec};
use crate::query::{BooleanQuery, QueryNode, RescoreStage, TwoPhaseCollector};
use crate::{Error, Result};

use super::{DEFAULT_SIZE, SearchRequest, SearchRequestProcessor};

/// Type name of the processor in pipeline definitions
pub const PROCESSOR_TYPE: &str = "neural_sparse_two_phase_processor";

/// Size and weight of the installed rescore stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescoreWindow {
    pub size: usize,
    /// Product of the query weights of the stages already on the request
    pub weight: f32,
}

/// `floor(requested_or_default × expansion)`, rejected when above
/// `max_window_size`
pub fn compute_window_size(
    requested: Option<usize>,
    expansion: f32,
    max_window_size: usize,
) -> Result<usize> {
    let base = requested.unwrap_or(DEFAULT_SIZE);
    let window = (base as f64 * expansion as f64).floor();
    if !window.is_finite() || window < 0.0 || window > max_window_size as f64 {
        return Err(Error::InvalidConfiguration(format!(
            "two-phase window size {} (size {} × expansion {}) is outside [0, {}]",
            window, base, expansion, max_window_size
        )));
    }
    Ok(window as usize)
}

impl RescoreWindow {
    pub fn build(
        requested: Option<usize>,
        config: &TwoPhaseConfig,
        existing: &[RescoreStage],
    ) -> Result<Self> {
        let size = compute_window_size(
            requested,
            config.window_expansion(),
            config.max_window_size(),
        )?;
        let weight = existing.iter().map(|stage| stage.query_weight).product();
        Ok(Self { size, weight })
    }
}

/// Request processor installing the two-phase rescore stage
#[derive(Debug, Clone)]
pub struct TwoPhaseProcessor {
    config: TwoPhaseConfig,
    tag: Option<String>,
    description: Option<String>,
    ignore_failure: bool,
}

impl TwoPhaseProcessor {
    pub fn new(config: TwoPhaseConfig) -> Self {
        Self {
            config,
            tag: None,
            description: None,
            ignore_failure: false,
        }
    }

    pub fn from_spec(spec: &TwoPhaseProcessorSpec) -> Result<Self> {
        Ok(Self {
            config: spec.config()?,
            tag: spec.tag.clone(),
            description: spec.description.clone(),
            ignore_failure: spec.ignore_failure,
        })
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_ignore_failure(mut self, ignore_failure: bool) -> Self {
        self.ignore_failure = ignore_failure;
        self
    }

    pub fn config(&self) -> &TwoPhaseConfig {
        &self.config
    }

    /// Prune `query` in place. Returns the combined low-impact disjunction,
    /// or `None` when there is nothing to rescore.
    fn collect(&self, query: &mut QueryNode) -> Option<BooleanQuery> {
        let mut collector = TwoPhaseCollector::new(self.config.prune_ratio());
        collector.collect(query, 1.0);
        collector.finish()
    }
}

impl SearchRequestProcessor for TwoPhaseProcessor {
    fn processor_type(&self) -> &'static str {
        PROCESSOR_TYPE
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn ignore_failure(&self) -> bool {
        self.ignore_failure
    }

    fn process_request(&self, request: SearchRequest) -> Result<SearchRequest> {
        if self.config.is_noop() {
            return Ok(request);
        }

        let mut pruned = request.query.clone();
        let Some(mut combined) = self.collect(&mut pruned) else {
            log::debug!("[two-phase] no sparse sub-query to prune, request unchanged");
            return Ok(request);
        };

        let window = RescoreWindow::build(request.size, &self.config, &request.rescore)?;
        combined.boost = window.weight;

        log::debug!(
            "[two-phase] installing rescore stage: window={}, weight={}, clauses={}",
            window.size,
            window.weight,
            combined.should.len()
        );

        let mut request = request;
        request.query = pruned;
        request
            .rescore
            .push(RescoreStage::new(combined, window.size));
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{BoostQuery, MatchAllQuery, ScoreMode, SparseQuery};

    fn sparse(pairs: &[(&str, f32)]) -> SparseQuery {
        SparseQuery::from_pairs("body", pairs.iter().copied()).unwrap()
    }

    fn leaf() -> SparseQuery {
        sparse(&[("a", 1.0), ("b", 0.9), ("c", 0.2), ("d", 0.1)])
    }

    #[test]
    fn test_window_size() {
        assert_eq!(compute_window_size(Some(10), 5.0, 10_000).unwrap(), 50);
        assert_eq!(compute_window_size(None, 5.0, 10_000).unwrap(), 50);
        assert_eq!(compute_window_size(Some(3), 1.5, 10_000).unwrap(), 4);
        assert_eq!(compute_window_size(Some(0), 5.0, 50).unwrap(), 0);
        assert!(matches!(
            compute_window_size(Some(10), 5.0, 40),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            compute_window_size(Some(2001), 5.0, 10_000),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_window_weight_is_product_of_existing() {
        let existing = vec![
            RescoreStage::new(MatchAllQuery::new(), 10).with_query_weight(2.0),
            RescoreStage::new(MatchAllQuery::new(), 10).with_query_weight(0.25),
        ];
        let window = RescoreWindow::build(Some(4), &TwoPhaseConfig::default(), &existing).unwrap();
        assert_eq!(window.size, 20);
        assert!((window.weight - 0.5).abs() < 1e-6);

        let window = RescoreWindow::build(None, &TwoPhaseConfig::default(), &[]).unwrap();
        assert_eq!(window.weight, 1.0);
    }

    #[test]
    fn test_installs_stage_and_prunes_query() {
        let processor = TwoPhaseProcessor::new(TwoPhaseConfig::default());
        let existing = RescoreStage::new(MatchAllQuery::new(), 7)
            .with_query_weight(3.0)
            .with_score_mode(ScoreMode::Max);
        let request = SearchRequest::new(BooleanQuery::new().should(BoostQuery::new(leaf(), 2.0)))
            .with_size(20)
            .with_rescore(existing.clone());

        let out = processor.process_request(request).unwrap();

        assert_eq!(out.rescore.len(), 2);
        assert_eq!(out.rescore[0], existing);
        let stage = &out.rescore[1];
        assert_eq!(stage.window_size, 100);
        assert_eq!(stage.query_weight, 1.0);
        let QueryNode::Boolean(combined) = &stage.query else {
            panic!("expected boolean rescore query");
        };
        assert_eq!(combined.boost, 3.0);
        let low = combined.should[0].as_sparse().unwrap();
        assert_eq!(low.tokens.keys().collect::<Vec<_>>(), vec!["c", "d"]);
        assert_eq!(low.boost, 2.0);

        let QueryNode::Boolean(primary) = &out.query else {
            panic!("expected boolean primary query");
        };
        let QueryNode::Boosted(boosted) = &primary.should[0] else {
            panic!("expected boost wrapper");
        };
        let high = boosted.inner.as_sparse().unwrap();
        assert_eq!(high.tokens.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_noop_cases_return_request_unchanged() {
        let request = SearchRequest::new(BooleanQuery::new().should(leaf()));

        let disabled = TwoPhaseProcessor::new(TwoPhaseConfig::disabled());
        assert_eq!(disabled.process_request(request.clone()).unwrap(), request);

        let zero_ratio = TwoPhaseProcessor::new(TwoPhaseConfig::new(true, 0.0, 5.0, 100).unwrap());
        assert_eq!(
            zero_ratio.process_request(request.clone()).unwrap(),
            request
        );

        let enabled = TwoPhaseProcessor::new(TwoPhaseConfig::default());
        let no_sparse = SearchRequest::new(MatchAllQuery::new());
        assert_eq!(
            enabled.process_request(no_sparse.clone()).unwrap(),
            no_sparse
        );

        let must_only = SearchRequest::new(BooleanQuery::new().must(leaf()));
        assert_eq!(
            enabled.process_request(must_only.clone()).unwrap(),
            must_only
        );
    }

    #[test]
    fn test_window_over_max_fails() {
        let processor = TwoPhaseProcessor::new(TwoPhaseConfig::new(true, 0.4, 5.0, 50).unwrap());
        let request = SearchRequest::new(leaf()).with_size(11);
        assert!(matches!(
            processor.process_request(request),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
