//! Boolean query with MUST, SHOULD, and MUST_NOT clauses

use crate::segment::SegmentReader;
use crate::{DocId, Result, Score, TERMINATED};

use super::boost::BoostScorer;
use super::{DocSet, Query, QueryNode, Scorer, ScorerSupplier};

/// Boolean query with MUST, SHOULD, and MUST_NOT clauses
///
/// A document matches when it matches every MUST clause, none of the
/// MUST_NOT clauses, and (if there are no MUST clauses) at least one SHOULD
/// clause. Its score is the boosted sum of the matching MUST and SHOULD
/// clause scores.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanQuery {
    pub must: Vec<QueryNode>,
    pub should: Vec<QueryNode>,
    pub must_not: Vec<QueryNode>,
    pub boost: f32,
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            boost: 1.0,
        }
    }
}

impl std::fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Boolean(")?;
        let mut first = true;
        let clauses = self
            .must
            .iter()
            .map(|q| ("+", q))
            .chain(self.should.iter().map(|q| ("", q)))
            .chain(self.must_not.iter().map(|q| ("-", q)));
        for (prefix, q) in clauses {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}{}", prefix, q)?;
            first = false;
        }
        write!(f, ")")?;
        if self.boost != 1.0 {
            write!(f, "^{}", self.boost)?;
        }
        Ok(())
    }
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: impl Into<QueryNode>) -> Self {
        self.must.push(query.into());
        self
    }

    pub fn should(mut self, query: impl Into<QueryNode>) -> Self {
        self.should.push(query.into());
        self
    }

    pub fn must_not(mut self, query: impl Into<QueryNode>) -> Self {
        self.must_not.push(query.into());
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }
}

impl Query for BooleanQuery {
    fn scorer_supplier<'a>(
        &'a self,
        reader: &'a SegmentReader,
    ) -> Result<Option<Box<dyn ScorerSupplier<'a> + 'a>>> {
        let mut must = Vec::with_capacity(self.must.len());
        for q in &self.must {
            match q.scorer_supplier(reader)? {
                Some(s) => must.push(s),
                // A required clause that matches nothing empties the whole query
                None => return Ok(None),
            }
        }

        let mut should = Vec::with_capacity(self.should.len());
        for q in &self.should {
            if let Some(s) = q.scorer_supplier(reader)? {
                should.push(s);
            }
        }

        if must.is_empty() && should.is_empty() {
            return Ok(None);
        }

        let mut must_not = Vec::with_capacity(self.must_not.len());
        for q in &self.must_not {
            if let Some(s) = q.scorer_supplier(reader)? {
                must_not.push(s);
            }
        }

        Ok(Some(Box::new(BooleanWeight {
            must,
            should,
            must_not,
            boost: self.boost,
        })))
    }
}

struct BooleanWeight<'a> {
    must: Vec<Box<dyn ScorerSupplier<'a> + 'a>>,
    should: Vec<Box<dyn ScorerSupplier<'a> + 'a>>,
    must_not: Vec<Box<dyn ScorerSupplier<'a> + 'a>>,
    boost: f32,
}

impl<'a> ScorerSupplier<'a> for BooleanWeight<'a> {
    fn get(self: Box<Self>) -> Box<dyn Scorer + 'a> {
        let build = |suppliers: Vec<Box<dyn ScorerSupplier<'a> + 'a>>| {
            suppliers.into_iter().map(|s| s.get()).collect::<Vec<_>>()
        };
        let scorer: Box<dyn Scorer + 'a> = Box::new(BooleanScorer::new(
            build(self.must),
            build(self.should),
            build(self.must_not),
        ));
        if self.boost == 1.0 {
            scorer
        } else {
            Box::new(BoostScorer::new(scorer, self.boost))
        }
    }

    fn cost(&self) -> u64 {
        if self.must.is_empty() {
            self.should.iter().map(|s| s.cost()).sum()
        } else {
            self.must.iter().map(|s| s.cost()).min().unwrap_or(0)
        }
    }
}

/// Conjunction/disjunction over child scorers, positioned on construction
pub(crate) struct BooleanScorer<'a> {
    must: Vec<Box<dyn Scorer + 'a>>,
    should: Vec<Box<dyn Scorer + 'a>>,
    must_not: Vec<Box<dyn Scorer + 'a>>,
    current_doc: DocId,
}

impl<'a> BooleanScorer<'a> {
    pub(crate) fn new(
        must: Vec<Box<dyn Scorer + 'a>>,
        should: Vec<Box<dyn Scorer + 'a>>,
        must_not: Vec<Box<dyn Scorer + 'a>>,
    ) -> Self {
        let mut scorer = Self {
            must,
            should,
            must_not,
            current_doc: 0,
        };
        scorer.current_doc = scorer.find_next_match();
        scorer
    }

    fn find_next_match(&mut self) -> DocId {
        if self.must.is_empty() && self.should.is_empty() {
            return TERMINATED;
        }

        loop {
            let candidate = if !self.must.is_empty() {
                let mut max_doc = self
                    .must
                    .iter()
                    .map(|s| s.doc())
                    .max()
                    .unwrap_or(TERMINATED);

                if max_doc == TERMINATED {
                    return TERMINATED;
                }

                loop {
                    let mut all_match = true;
                    for scorer in &mut self.must {
                        let doc = scorer.seek(max_doc);
                        if doc == TERMINATED {
                            return TERMINATED;
                        }
                        if doc > max_doc {
                            max_doc = doc;
                            all_match = false;
                            break;
                        }
                    }
                    if all_match {
                        break;
                    }
                }
                max_doc
            } else {
                self.should
                    .iter()
                    .map(|s| s.doc())
                    .filter(|&d| d != TERMINATED)
                    .min()
                    .unwrap_or(TERMINATED)
            };

            if candidate == TERMINATED {
                return TERMINATED;
            }

            let excluded = self
                .must_not
                .iter_mut()
                .any(|scorer| scorer.seek(candidate) == candidate);

            if !excluded {
                // SHOULD scorers must sit on the candidate for score() to see them
                for scorer in &mut self.should {
                    scorer.seek(candidate);
                }
                return candidate;
            }

            if !self.must.is_empty() {
                for scorer in &mut self.must {
                    scorer.advance();
                }
            } else {
                for scorer in &mut self.should {
                    if scorer.doc() <= candidate && scorer.doc() != TERMINATED {
                        scorer.seek(candidate + 1);
                    }
                }
            }
        }
    }
}

impl DocSet for BooleanScorer<'_> {
    fn doc(&self) -> DocId {
        self.current_doc
    }

    fn advance(&mut self) -> DocId {
        if self.current_doc == TERMINATED {
            return TERMINATED;
        }
        if !self.must.is_empty() {
            for scorer in &mut self.must {
                scorer.advance();
            }
        } else {
            for scorer in &mut self.should {
                if scorer.doc() == self.current_doc {
                    scorer.advance();
                }
            }
        }

        self.current_doc = self.find_next_match();
        self.current_doc
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.current_doc >= target {
            return self.current_doc;
        }
        for scorer in &mut self.must {
            scorer.seek(target);
        }
        for scorer in &mut self.should {
            scorer.seek(target);
        }

        self.current_doc = self.find_next_match();
        self.current_doc
    }

    fn size_hint(&self) -> u32 {
        if !self.must.is_empty() {
            self.must.iter().map(|s| s.size_hint()).min().unwrap_or(0)
        } else {
            self.should.iter().map(|s| s.size_hint()).sum()
        }
    }
}

impl Scorer for BooleanScorer<'_> {
    fn score(&self) -> Score {
        self.must
            .iter()
            .chain(self.should.iter())
            .filter(|s| s.doc() == self.current_doc)
            .map(|s| s.score())
            .sum()
    }

    fn max_score(&self, up_to: DocId) -> Score {
        self.must
            .iter()
            .chain(self.should.iter())
            .map(|s| s.max_score(up_to))
            .sum()
    }

    fn matches(&mut self) -> bool {
        let doc = self.current_doc;
        if doc == TERMINATED {
            return false;
        }
        if !self.must.iter_mut().all(|s| s.matches()) {
            return false;
        }
        if !self.must.is_empty() {
            return true;
        }
        self.should
            .iter_mut()
            .any(|s| s.doc() == doc && s.matches())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{MatchAllQuery, SparseQuery};
    use crate::segment::{Document, SegmentBuilder, SegmentId};

    fn segment() -> SegmentReader {
        let mut builder = SegmentBuilder::new();
        let docs: [&[(&str, f32)]; 5] = [
            &[("rust", 1.0), ("fast", 0.5)],
            &[("rust", 0.2)],
            &[("fast", 0.8), ("safe", 0.3)],
            &[("rust", 0.4), ("safe", 0.9)],
            &[("python", 1.0)],
        ];
        for terms in docs {
            let mut doc = Document::new();
            doc.add_sparse("body", terms.iter().copied());
            builder.add_document(doc);
        }
        builder.build(SegmentId(1))
    }

    fn term(t: &str) -> SparseQuery {
        SparseQuery::from_pairs("body", [(t, 1.0)]).unwrap()
    }

    fn collect(query: &dyn Query, reader: &SegmentReader) -> Vec<(DocId, Score)> {
        let mut scorer = query.scorer(reader).unwrap();
        let mut out = Vec::new();
        let mut doc = scorer.doc();
        while doc != TERMINATED {
            if scorer.matches() {
                out.push((doc, scorer.score()));
            }
            doc = scorer.advance();
        }
        out
    }

    #[test]
    fn test_should_only_is_disjunction() {
        let reader = segment();
        let query = BooleanQuery::new().should(term("fast")).should(term("safe"));
        let docs: Vec<DocId> = collect(&query, &reader)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert_eq!(docs, vec![0, 2, 3]);

        let scores = collect(&query, &reader);
        assert!((scores[1].1 - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_must_and_must_not() {
        let reader = segment();
        let query = BooleanQuery::new()
            .must(term("rust"))
            .should(term("safe"))
            .must_not(term("fast"));
        let hits = collect(&query, &reader);
        let docs: Vec<DocId> = hits.iter().map(|(d, _)| *d).collect();
        assert_eq!(docs, vec![1, 3]);
        // doc 3: rust 0.4 + safe 0.9
        assert!((hits[1].1 - 1.3).abs() < 1e-6);
    }

    #[test]
    fn test_missing_must_clause_matches_nothing() {
        let reader = segment();
        let query = BooleanQuery::new().must(term("java")).should(term("rust"));
        assert!(query.scorer_supplier(&reader).unwrap().is_none());
    }

    #[test]
    fn test_empty_boolean_matches_nothing() {
        let reader = segment();
        let empty = BooleanQuery::new();
        assert!(empty.scorer_supplier(&reader).unwrap().is_none());
        let only_excluded = BooleanQuery::new().must_not(term("rust"));
        assert!(only_excluded.scorer_supplier(&reader).unwrap().is_none());
    }

    #[test]
    fn test_boost_scales_scores() {
        let reader = segment();
        let plain = BooleanQuery::new().should(term("rust"));
        let boosted = plain.clone().with_boost(3.0);
        let a = collect(&plain, &reader);
        let b = collect(&boosted, &reader);
        assert_eq!(a.len(), b.len());
        for ((_, sa), (_, sb)) in a.iter().zip(&b) {
            assert!((sa * 3.0 - sb).abs() < 1e-6);
        }
    }

    #[test]
    fn test_match_all_with_must_not() {
        let reader = segment();
        let query = BooleanQuery::new()
            .must(MatchAllQuery::new())
            .must_not(term("rust"));
        let docs: Vec<DocId> = collect(&query, &reader)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert_eq!(docs, vec![2, 4]);
    }

    #[test]
    fn test_seek_lands_on_next_match() {
        let reader = segment();
        let query = BooleanQuery::new().should(term("rust"));
        let mut scorer = query.scorer(&reader).unwrap();
        assert_eq!(scorer.doc(), 0);
        assert_eq!(scorer.seek(2), 3);
        assert_eq!(scorer.seek(1), 3);
        assert_eq!(scorer.advance(), TERMINATED);
    }
}
