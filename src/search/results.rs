use std::collections::BTreeSet;
use crate::index::document::Document;

/// Where a hit was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOrigin {
    /// Committed main index
    Main,
    /// The caller's own uncommitted delta
    Delta,
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub document: Document,
    pub origin: HitOrigin,
}

/// Search results container
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<Hit>,
    pub total_hits: usize,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct `ID` values across the hits
    pub fn node_ids(&self) -> BTreeSet<String> {
        self.hits
            .iter()
            .filter_map(|hit| hit.document.id().map(str::to_string))
            .collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.hits.iter().map(|hit| &hit.document)
    }
}
