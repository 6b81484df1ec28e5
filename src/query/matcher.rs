use roaring::RoaringBitmap;
use crate::analysis::analyzer::Analyzer;
use crate::index::inverted::InvertedIndex;
use crate::query::ast::{BoolQuery, Query};

/// Evaluates queries against one inverted index, producing matching ordinals
pub struct DocumentMatcher<'a> {
    index: &'a InvertedIndex,
    analyzer: &'a Analyzer,
}

impl<'a> DocumentMatcher<'a> {
    pub fn new(index: &'a InvertedIndex, analyzer: &'a Analyzer) -> Self {
        DocumentMatcher { index, analyzer }
    }

    pub fn matches(&self, query: &Query) -> RoaringBitmap {
        match query {
            Query::MatchAll => self.index.all_docs(),
            Query::Term(term) => self.index.term_docs(&term.field, &term.value),
            Query::Match(query) => {
                let tokens = self.analyzer.analyze(&query.text);
                if tokens.is_empty() {
                    return RoaringBitmap::new();
                }
                let mut result: Option<RoaringBitmap> = None;
                for token in tokens {
                    let docs = self.index.term_docs(&query.field, &token.text);
                    result = Some(match result {
                        Some(acc) => acc & docs,
                        None => docs,
                    });
                }
                result.unwrap_or_default()
            }
            Query::Bool(query) => self.matches_bool(query),
        }
    }

    fn matches_bool(&self, query: &BoolQuery) -> RoaringBitmap {
        let mut result = self.index.all_docs();

        for clause in &query.must {
            result &= self.matches(clause);
        }

        if !query.should.is_empty() {
            let mut any = RoaringBitmap::new();
            for clause in &query.should {
                any |= self.matches(clause);
            }
            if query.must.is_empty() {
                result = any;
            } else {
                result &= any;
            }
        }

        for clause in &query.must_not {
            result -= self.matches(clause);
        }

        result
    }
}
