//! Two-phase processor end to end: pipeline definition → pruned primary
//! query → rescore stage → final ranking.

use crate::config::TwoPhaseConfig;
use crate::error::Error;
use crate::index::Searcher;
use crate::pipeline::{SearchPipeline, SearchRequest, SearchRequestProcessor, TwoPhaseProcessor};
use crate::query::{BooleanQuery, BoostQuery, MatchAllQuery, QueryNode, RescoreStage, SparseQuery};
use crate::segment::{Document, SegmentBuilder, SegmentId};

const DOCS_PER_SEGMENT: u32 = 10;

/// 30 docs over 3 segments. Every doc has the high-impact term "a", so the
/// pruned primary query still matches all of them; "c" and "d" make the
/// low-impact contribution differ per doc.
fn searcher() -> Searcher {
    let segments = (0..3u32)
        .map(|seg| {
            let mut builder = SegmentBuilder::new();
            for local in 0..DOCS_PER_SEGMENT {
                let i = seg * DOCS_PER_SEGMENT + local;
                let mut doc = Document::new();
                doc.add_sparse(
                    "body",
                    [
                        ("a", 0.1 + i as f32 * 0.01),
                        ("c", ((i * 7) % 30) as f32 * 0.03 + 0.01),
                    ],
                );
                if i % 4 == 0 {
                    doc.add_sparse("body", [("d", 0.5)]);
                }
                builder.add_document(doc);
            }
            builder.build(SegmentId(seg as u64))
        })
        .collect();
    Searcher::new(segments)
}

fn query() -> SparseQuery {
    SparseQuery::from_pairs("body", [("a", 1.0), ("b", 0.9), ("c", 0.2), ("d", 0.02)]).unwrap()
}

fn pipeline(extra: &str) -> SearchPipeline {
    SearchPipeline::from_json(&format!(
        r#"{{"request_processors": [{{"neural_sparse_two_phase_processor": {{
            "tag": "two-phase" {extra} }} }}]}}"#
    ))
    .unwrap()
}

#[test]
fn test_two_phase_ranking_matches_exact_when_window_covers_matches() {
    let searcher = searcher();
    let request = SearchRequest::new(BooleanQuery::new().should(query())).with_size(10);

    let exact = searcher.search(&request).unwrap();
    let processed = pipeline("").process(request).unwrap();
    assert_eq!(processed.rescore.len(), 1);
    assert_eq!(processed.rescore[0].window_size, 50);

    let two_phase = searcher.search(&processed).unwrap();
    assert_eq!(two_phase.total_hits, 30);
    assert_eq!(two_phase.hits.len(), 10);
    for (got, want) in two_phase.hits.iter().zip(&exact.hits) {
        assert_eq!(got.doc_id, want.doc_id);
        assert!((got.score - want.score).abs() < 1e-5);
    }
}

#[test]
fn test_small_window_only_rescored_top() {
    let searcher = searcher();
    let processor = TwoPhaseProcessor::new(TwoPhaseConfig::new(true, 0.4, 1.0, 50).unwrap());
    let request = SearchRequest::new(query()).with_size(3);
    let processed = processor.process_request(request).unwrap();
    assert_eq!(processed.rescore[0].window_size, 3);

    let response = searcher.search(&processed).unwrap();
    let primary_only = SearchRequest::new(processed.query.clone());
    let high_only = searcher.search(&primary_only).unwrap();

    // The window is the primary top 3, rescored; nothing outside it moves in
    let mut window: Vec<u32> = high_only.hits[..3].iter().map(|h| h.doc_id).collect();
    let mut got: Vec<u32> = response.hits.iter().map(|h| h.doc_id).collect();
    window.sort_unstable();
    got.sort_unstable();
    assert_eq!(got, window);
    for hit in &response.hits {
        let primary = high_only
            .hits
            .iter()
            .find(|h| h.doc_id == hit.doc_id)
            .unwrap();
        assert!(hit.score >= primary.score - 1e-6);
    }
}

#[test]
fn test_disabled_processor_gives_identical_results() {
    let searcher = searcher();
    let request = SearchRequest::new(BooleanQuery::new().should(query())).with_size(5);
    let processed = pipeline(r#", "enabled": false"#).process(request.clone()).unwrap();
    assert_eq!(processed, request);

    let a = searcher.search(&request).unwrap();
    let b = searcher.search(&processed).unwrap();
    assert_eq!(a.total_hits, b.total_hits);
    for (x, y) in a.hits.iter().zip(&b.hits) {
        assert_eq!(x.doc_id, y.doc_id);
        assert_eq!(x.score, y.score);
    }
}

#[test]
fn test_zero_prune_ratio_is_noop() {
    let request = SearchRequest::new(query());
    let processed = pipeline(r#", "two_phase_parameter": {"prune_ratio": 0.0}"#)
        .process(request.clone())
        .unwrap();
    assert_eq!(processed, request);
}

#[test]
fn test_existing_stage_weight_chain_and_nested_boosts() {
    let existing = RescoreStage::new(MatchAllQuery::new(), 20).with_query_weight(0.5);
    let nested = BooleanQuery::new()
        .should(query().with_boost(2.0))
        .with_boost(0.5);
    let tree = BooleanQuery::new()
        .should(BoostQuery::new(query().with_boost(2.0), 3.0))
        .should(nested)
        .must(MatchAllQuery::new());
    let request = SearchRequest::new(tree)
        .with_size(4)
        .with_rescore(existing.clone());

    let processed = pipeline("").process(request).unwrap();
    assert_eq!(processed.rescore[0], existing);
    let stage = &processed.rescore[1];
    assert_eq!(stage.window_size, 20);

    let QueryNode::Boolean(combined) = &stage.query else {
        panic!("expected boolean rescore query");
    };
    assert!((combined.boost - 0.5).abs() < 1e-6);
    assert_eq!(combined.should.len(), 1);
    let low = combined.should[0].as_sparse().unwrap();
    // 2.0 × (3.0 + 0.5)
    assert!((low.boost - 7.0).abs() < 1e-6);
    assert_eq!(low.tokens.keys().collect::<Vec<_>>(), vec!["c", "d"]);
}

#[test]
fn test_window_over_max_fails_unless_ignored() {
    let request = SearchRequest::new(query()).with_size(11);
    let strict = pipeline(r#", "two_phase_parameter": {"max_window_size": 50}"#);
    assert!(matches!(
        strict.process(request.clone()),
        Err(Error::InvalidConfiguration(_))
    ));

    let lenient = pipeline(
        r#", "ignore_failure": true, "two_phase_parameter": {"max_window_size": 50}"#,
    );
    assert!(lenient.processors()[0].ignore_failure());
    let processed = lenient.process(request.clone()).unwrap();
    assert_eq!(processed, request);
    assert!(searcher().search(&processed).is_ok());
}
