use std::collections::BTreeSet;
use std::sync::Arc;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::Analyzer;
use crate::core::types::{DocId, NodeRef};
use crate::index::document::{fields, DeletionScope, DocType};
use crate::index::inverted::InvertedIndex;
use crate::mvcc::controller::Snapshot;
use crate::query::ast::Query;
use crate::query::matcher::DocumentMatcher;
use crate::search::results::{Hit, HitOrigin, SearchResults};

/// Pending state of one transaction laid over the main index
#[derive(Debug, Clone, Default)]
pub struct DeltaOverlay {
    pub index: Arc<InvertedIndex>,
    /// Delta documents superseded within the transaction
    pub masked: RoaringBitmap,
    pub leaf_deletions: BTreeSet<NodeRef>,
    pub container_deletions: BTreeSet<NodeRef>,
}

/// Point-in-time reader over a main index snapshot, optionally overlaid
/// with a transaction's own delta.
pub struct IndexSearcher {
    snapshot: Arc<Snapshot>,
    /// Per main segment: tombstones plus the transaction's deletions
    excluded: Vec<RoaringBitmap>,
    delta: Option<(Arc<InvertedIndex>, RoaringBitmap)>,
    analyzer: Arc<Analyzer>,
}

impl IndexSearcher {
    /// Committed state only.
    pub fn new(snapshot: Arc<Snapshot>, analyzer: Arc<Analyzer>) -> Self {
        let excluded = snapshot.tombstones.iter().map(|t| (**t).clone()).collect();
        IndexSearcher {
            snapshot,
            excluded,
            delta: None,
            analyzer,
        }
    }

    /// Committed state with the transaction's pending writes and deletions.
    pub fn with_overlay(snapshot: Arc<Snapshot>, overlay: DeltaOverlay, analyzer: Arc<Analyzer>) -> Self {
        let mut searcher = Self::new(snapshot, analyzer);
        for (scope, nodes) in [
            (DeletionScope::Leaf, &overlay.leaf_deletions),
            (DeletionScope::Container, &overlay.container_deletions),
        ] {
            for node in nodes {
                let id = node.to_string();
                for (i, excluded) in searcher.excluded.iter_mut().enumerate() {
                    *excluded |= searcher.snapshot.segments[i].index.scope_docs(&id, scope);
                }
            }
        }
        searcher.delta = Some((overlay.index, overlay.masked));
        searcher
    }

    pub fn search(&self, query: &Query) -> SearchResults {
        let mut results = SearchResults::default();

        for (i, segment) in self.snapshot.segments.iter().enumerate() {
            let matcher = DocumentMatcher::new(&segment.index, &self.analyzer);
            let docs = matcher.matches(query) - &self.excluded[i] - markers(&segment.index);
            collect(&mut results, &segment.index, docs, HitOrigin::Main);
        }

        if let Some((index, masked)) = &self.delta {
            let matcher = DocumentMatcher::new(index, &self.analyzer);
            let docs = matcher.matches(query) - masked - markers(index);
            collect(&mut results, index, docs, HitOrigin::Delta);
        }

        results.total_hits = results.hits.len();
        results
    }

    pub fn count(&self, query: &Query) -> usize {
        self.search(query).total_hits
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot.version
    }
}

/// Markers only track backlog work and never answer queries.
fn markers(index: &InvertedIndex) -> RoaringBitmap {
    index.term_docs(fields::DOCTYPE, DocType::Marker.as_str())
}

fn collect(results: &mut SearchResults, index: &InvertedIndex, docs: RoaringBitmap, origin: HitOrigin) {
    for doc in docs.iter() {
        if let Some(document) = index.document(DocId(doc)) {
            results.hits.push(Hit {
                document: document.clone(),
                origin,
            });
        }
    }
}
