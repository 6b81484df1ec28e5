use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use roaring::RoaringBitmap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::core::types::DocId;
use crate::index::document::{fields, DeletionScope, Document};
use crate::index::inverted::InvertedIndex;
use crate::storage::segment::Segment;

/// A committed segment with its in-memory postings
#[derive(Debug)]
pub struct LoadedSegment {
    pub segment: Segment,
    pub index: InvertedIndex,
}

/// Address of a document inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocAddress {
    pub segment: usize,
    pub doc: DocId,
}

/// Main index of one store at a point in time.
///
/// Segments are immutable; deletions live in one tombstone bitmap per
/// segment, replaced (never mutated) when a commit adds deletions.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub segments: Vec<Arc<LoadedSegment>>,
    pub tombstones: Vec<Arc<RoaringBitmap>>,
    pub timestamp: DateTime<Utc>,
    pub last_commit: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            version: 0,
            segments: Vec::new(),
            tombstones: Vec::new(),
            timestamp: Utc::now(),
            last_commit: None,
        }
    }
}

impl Snapshot {
    /// Live documents of segment `i` matching a keyword term.
    pub fn live_term_docs(&self, i: usize, field: &str, value: &str) -> RoaringBitmap {
        self.segments[i].index.term_docs(field, value) - self.tombstones[i].as_ref()
    }

    /// Live documents of segment `i` within a node's deletion scope.
    pub fn live_scope_docs(&self, i: usize, node_id: &str, scope: DeletionScope) -> RoaringBitmap {
        self.segments[i].index.scope_docs(node_id, scope) - self.tombstones[i].as_ref()
    }

    /// Whether any live document of the node falls within `scope`.
    pub fn has_live(&self, node_id: &str, scope: DeletionScope) -> bool {
        (0..self.segments.len()).any(|i| !self.live_scope_docs(i, node_id, scope).is_empty())
    }

    pub fn live_matching(&self, field: &str, value: &str) -> Vec<DocAddress> {
        let mut out = Vec::new();
        for i in 0..self.segments.len() {
            for doc in self.live_term_docs(i, field, value).iter() {
                out.push(DocAddress { segment: i, doc: DocId(doc) });
            }
        }
        out
    }

    pub fn document(&self, addr: DocAddress) -> Option<&Document> {
        self.segments.get(addr.segment)?.index.document(addr.doc)
    }

    /// Live documents carrying the given ID.
    pub fn live_documents_of(&self, node_id: &str) -> Vec<&Document> {
        self.live_matching(fields::ID, node_id)
            .into_iter()
            .filter_map(|addr| self.document(addr))
            .collect()
    }

    pub fn total_documents(&self) -> usize {
        self.segments.iter().map(|s| s.index.len()).sum()
    }

    pub fn deleted_documents(&self) -> usize {
        self.tombstones.iter().map(|t| t.len() as usize).sum()
    }

    pub fn live_documents(&self) -> usize {
        self.total_documents() - self.deleted_documents()
    }
}

/// Publishes snapshots of one store's main index.
///
/// Readers take an `Arc<Snapshot>` and keep it as long as they like; the
/// controller only retains the most recent `max_versions` entries.
pub struct MainIndexController {
    pub versions: RwLock<BTreeMap<u64, Arc<Snapshot>>>,
    pub current_version: AtomicU64,
    pub max_versions: usize,
}

impl Default for MainIndexController {
    fn default() -> Self {
        Self::new()
    }
}

impl MainIndexController {
    pub fn new() -> Self {
        let controller = MainIndexController {
            versions: RwLock::new(BTreeMap::new()),
            current_version: AtomicU64::new(0),
            max_versions: 16,
        };
        controller.versions.write().insert(0, Arc::new(Snapshot::default()));
        controller
    }

    /// Makes `snapshot` the current generation and returns it.
    pub fn publish(&self, mut snapshot: Snapshot) -> Arc<Snapshot> {
        let mut versions = self.versions.write();
        let version = self.current_version.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.version = version;
        snapshot.timestamp = Utc::now();
        let snapshot = Arc::new(snapshot);
        versions.insert(version, Arc::clone(&snapshot));

        while versions.len() > self.max_versions {
            let Some(oldest) = versions.keys().next().copied() else { break };
            versions.remove(&oldest);
        }

        snapshot
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        let versions = self.versions.read();
        versions
            .values()
            .next_back()
            .cloned()
            .unwrap_or_default()
    }

    pub fn version(&self) -> u64 {
        self.current_version.load(Ordering::Acquire)
    }
}
