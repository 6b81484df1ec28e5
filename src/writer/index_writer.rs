use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use roaring::RoaringBitmap;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::core::types::NodeRef;
use crate::index::document::{fields, DeletionScope, Document};
use crate::index::inverted::InvertedIndex;
use crate::mvcc::controller::{LoadedSegment, MainIndexController, Snapshot};
use crate::storage::delta_status::DeltaStatusRecord;
use crate::storage::layout::StoreLayout;
use crate::storage::segment::{Segment, SegmentId, SegmentMetadata};
use crate::storage::segment_reader::SegmentReader;
use crate::storage::wal::{CommitJournal, JournalRecord, SyncMode};

/// Deletions and documents a commit applies to the main index
#[derive(Debug, Clone, Copy)]
pub struct CommitChanges<'a> {
    pub leaf_deletions: &'a [NodeRef],
    pub container_deletions: &'a [NodeRef],
    pub fts_targets: &'a [(NodeRef, String)],
}

/// Single writer for one store's main index.
///
/// Commits are serialized by `lock`; the journal append is the point at
/// which a delta becomes committed.
pub struct MainIndexWriter {
    layout: Arc<StoreLayout>,
    journal: Mutex<CommitJournal>,
    controller: Arc<MainIndexController>,
    analyzer: Arc<Analyzer>,
    lock: Mutex<()>,
    lock_timeout: Duration,
    committed: RwLock<HashSet<String>>,
}

impl MainIndexWriter {
    /// Opens the journal and rebuilds the main index from it.
    pub fn open(
        layout: Arc<StoreLayout>,
        controller: Arc<MainIndexController>,
        analyzer: Arc<Analyzer>,
        sync_mode: SyncMode,
        lock_timeout: Duration,
    ) -> Result<Self> {
        let (journal, entries) = CommitJournal::open(&layout.journal_path(), sync_mode)?;

        let mut snapshot = Snapshot::default();
        let mut committed = HashSet::new();
        let mut referenced = HashSet::new();

        for entry in &entries {
            let JournalRecord::Commit {
                delta_id,
                segment,
                leaf_deletions,
                container_deletions,
                fts_targets,
            } = &entry.record;

            let loaded = match segment {
                Some(id) => {
                    referenced.insert(*id);
                    Some(Arc::new(load_segment(&layout, *id, &analyzer)?))
                }
                None => None,
            };
            let changes = CommitChanges {
                leaf_deletions,
                container_deletions,
                fts_targets,
            };
            snapshot = apply(&snapshot, changes, loaded, entry.timestamp);
            committed.insert(delta_id.clone());
        }

        remove_orphan_segments(&layout, &referenced)?;

        tracing::debug!(
            store = %layout.base_dir.display(),
            commits = entries.len(),
            segments = snapshot.segments.len(),
            "main index replayed"
        );
        controller.publish(snapshot);

        Ok(MainIndexWriter {
            layout,
            journal: Mutex::new(journal),
            controller,
            analyzer,
            lock: Mutex::new(()),
            lock_timeout,
            committed: RwLock::new(committed),
        })
    }

    pub fn is_committed(&self, delta_id: &str) -> bool {
        self.committed.read().contains(delta_id)
    }

    /// Merges a prepared delta into the main index.
    ///
    /// `docs` are the delta's live documents; when `None` they are read back
    /// from the delta's segment file (recovered in-doubt deltas).
    pub fn commit(&self, record: &DeltaStatusRecord, docs: Option<Vec<Document>>) -> Result<Arc<Snapshot>> {
        let _guard = self.lock.try_lock_for(self.lock_timeout).ok_or_else(|| {
            Error::storage(format!(
                "timed out after {:?} waiting for the index writer of {}",
                self.lock_timeout,
                self.layout.base_dir.display()
            ))
        })?;

        if self.is_committed(&record.delta_id) {
            return Ok(self.controller.current_snapshot());
        }

        let loaded = match record.segment {
            Some(id) => {
                let from = self.layout.delta_segment_path(&record.delta_id);
                let to = self.layout.segment_path(&id);
                if from.exists() {
                    fs::rename(&from, &to)?;
                } else if !to.exists() {
                    return Err(Error::storage(format!(
                        "segment of delta {} is missing",
                        record.delta_id
                    )));
                }
                let loaded = match docs {
                    Some(docs) => {
                        let size_bytes = fs::metadata(&to)?.len();
                        let index = InvertedIndex::from_documents(docs, &self.analyzer);
                        LoadedSegment {
                            segment: Segment {
                                id,
                                doc_count: index.len() as u32,
                                metadata: SegmentMetadata {
                                    created_at: Utc::now(),
                                    size_bytes,
                                },
                            },
                            index,
                        }
                    }
                    None => load_segment(&self.layout, id, &self.analyzer)?,
                };
                Some(Arc::new(loaded))
            }
            None => None,
        };

        let now = Utc::now();
        let base = self.controller.current_snapshot();
        let changes = CommitChanges {
            leaf_deletions: &record.leaf_deletions,
            container_deletions: &record.container_deletions,
            fts_targets: &record.fts_targets,
        };
        let next = apply(&base, changes, loaded, now);

        self.journal.lock().append(JournalRecord::Commit {
            delta_id: record.delta_id.clone(),
            segment: record.segment,
            leaf_deletions: record.leaf_deletions.clone(),
            container_deletions: record.container_deletions.clone(),
            fts_targets: record.fts_targets.clone(),
        })?;
        self.committed.write().insert(record.delta_id.clone());

        let published = self.controller.publish(next);
        tracing::debug!(
            delta = %record.delta_id,
            version = published.version,
            leaf_deletions = record.leaf_deletions.len(),
            container_deletions = record.container_deletions.len(),
            "delta merged into main index"
        );
        Ok(published)
    }
}

/// Produces the snapshot that follows `base` once a commit is applied.
///
/// Deterministic: journal replay calls it with the same inputs in the same
/// order as the original commits did.
pub fn apply(
    base: &Snapshot,
    changes: CommitChanges<'_>,
    segment: Option<Arc<LoadedSegment>>,
    committed_at: DateTime<Utc>,
) -> Snapshot {
    let mut next = base.clone();

    for node in changes.leaf_deletions {
        mask(&mut next, &node.to_string(), DeletionScope::Leaf);
    }
    for node in changes.container_deletions {
        mask(&mut next, &node.to_string(), DeletionScope::Container);
    }

    let mut superseded = RoaringBitmap::new();
    for (node, tx) in changes.fts_targets {
        let id = node.to_string();
        if has_pending(&next, &id, tx) {
            mask(&mut next, &id, DeletionScope::Leaf);
        } else if let Some(segment) = &segment {
            // A newer transaction re-indexed the node; drop this result
            superseded |= segment.index.term_docs(fields::ID, &id);
        }
    }

    if let Some(segment) = segment {
        if !segment.index.is_empty() {
            next.segments.push(segment);
            next.tombstones.push(Arc::new(superseded));
        }
    }

    next.last_commit = Some(committed_at);
    next
}

fn mask(snapshot: &mut Snapshot, node_id: &str, scope: DeletionScope) {
    for i in 0..snapshot.segments.len() {
        let docs = snapshot.segments[i].index.scope_docs(node_id, scope);
        if docs.is_subset(&snapshot.tombstones[i]) {
            continue;
        }
        let tombstone = Arc::make_mut(&mut snapshot.tombstones[i]);
        *tombstone |= docs;
    }
}

/// Whether a live leaf-scope document of the node still awaits backlog work for `tx`.
fn has_pending(snapshot: &Snapshot, node_id: &str, tx: &str) -> bool {
    (0..snapshot.segments.len()).any(|i| {
        snapshot
            .live_scope_docs(i, node_id, DeletionScope::Leaf)
            .iter()
            .filter_map(|doc| snapshot.segments[i].index.document(doc.into()))
            .any(|doc| {
                doc.get(fields::TX) == Some(tx)
                    && doc.fts_status().is_some_and(|status| status.is_pending())
            })
    })
}

fn load_segment(layout: &StoreLayout, id: SegmentId, analyzer: &Analyzer) -> Result<LoadedSegment> {
    let path = layout.segment_path(&id);
    let size_bytes = fs::metadata(&path)?.len();
    let created_at: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
    let docs = SegmentReader::open(&path, id)?.read_all()?;
    let index = InvertedIndex::from_documents(docs, analyzer);

    Ok(LoadedSegment {
        segment: Segment {
            id,
            doc_count: index.len() as u32,
            metadata: SegmentMetadata { created_at, size_bytes },
        },
        index,
    })
}

/// Deletes segment files no journal record refers to (crash between
/// segment rename and journal append).
fn remove_orphan_segments(layout: &StoreLayout, referenced: &HashSet<SegmentId>) -> Result<()> {
    for entry in fs::read_dir(&layout.segments_dir)? {
        let path = entry?.path();
        let known = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| uuid::Uuid::parse_str(stem).ok())
            .is_some_and(|uuid| referenced.contains(&SegmentId(uuid)));
        if !known {
            tracing::warn!(path = %path.display(), "removing unreferenced segment file");
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
