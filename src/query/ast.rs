use serde::{Deserialize, Serialize};
use crate::index::document::fields;

/// Queries over index documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),    // Exact keyword term
    Match(MatchQuery),  // Analyzed text, every token must occur
    Bool(BoolQuery),    // Boolean combinations
    MatchAll,           // Match all documents
}

/// Single exact term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

/// Text run through the analyzer before lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub field: String,
    pub text: String,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match (OR)
    pub must_not: Vec<Query>,  // None must match (NOT)
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn matches(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::Match(MatchQuery {
            field: field.into(),
            text: text.into(),
        })
    }

    /// Every live document of a node, leaf and containers.
    pub fn node_id(id: impl Into<String>) -> Self {
        Query::term(fields::ID, id)
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn build(self) -> Query {
        Query::Bool(self)
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}
