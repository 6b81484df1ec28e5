use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::stats::IndexStats;
use crate::core::transaction::Xid;
use crate::core::types::{NodeRef, StoreRef};
use crate::index::document::{fields, FtsStatus};
use crate::indexer::generator::DocumentGenerator;
use crate::mvcc::controller::{MainIndexController, Snapshot};
use crate::reader::snapshot_reader::IndexSearcher;
use crate::storage::delta_status::{DeltaStatus, DeltaStatusRecord};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StoreLayout;
use crate::writer::index_writer::MainIndexWriter;

/// A node whose committed leaf still waits for full-text indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNode {
    pub node: NodeRef,
    /// `TX` of the pending document
    pub tx: String,
}

/// Everything one store's index needs: on-disk layout, the exclusive
/// writer and the published snapshots.
pub struct IndexStore {
    store: StoreRef,
    config: Arc<Config>,
    layout: Arc<StoreLayout>,
    _lock: FileLock,
    controller: Arc<MainIndexController>,
    writer: MainIndexWriter,
    analyzer: Arc<Analyzer>,
    generator: Arc<DocumentGenerator>,
    in_doubt: Mutex<BTreeMap<String, DeltaStatusRecord>>,
}

impl IndexStore {
    /// Opens (creating if needed) the index of `store`.
    ///
    /// Replays the commit journal, then sorts leftover delta directories:
    /// unprepared ones are discarded, prepared ones already in the journal
    /// are cleaned up, the rest become in doubt.
    pub fn open(
        config: Arc<Config>,
        store: StoreRef,
        generator: Arc<DocumentGenerator>,
        analyzer: Arc<Analyzer>,
    ) -> Result<Arc<Self>> {
        let layout = Arc::new(StoreLayout::new(&config.index_root, &store)?);
        let lock = FileLock::acquire(&layout)?;
        let controller = Arc::new(MainIndexController::new());
        let writer = MainIndexWriter::open(
            Arc::clone(&layout),
            Arc::clone(&controller),
            Arc::clone(&analyzer),
            config.journal_sync,
            Duration::from_millis(config.writer_lock_timeout_ms),
        )?;

        let mut in_doubt = BTreeMap::new();
        for delta_id in layout.delta_ids()? {
            let record = match DeltaStatusRecord::load(&layout.delta_status_path(&delta_id)) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(store = %store, delta = %delta_id, error = %e, "unreadable delta status, discarding");
                    remove_delta_dir(&layout, &delta_id);
                    continue;
                }
            };
            match record.status {
                DeltaStatus::Prepared | DeltaStatus::Committing if writer.is_committed(&delta_id) => {
                    tracing::debug!(store = %store, delta = %delta_id, "cleaning up committed delta");
                    remove_delta_dir(&layout, &delta_id);
                }
                DeltaStatus::Prepared | DeltaStatus::Committing => {
                    tracing::info!(store = %store, delta = %delta_id, xid = ?record.xid, "delta in doubt");
                    in_doubt.insert(delta_id, record);
                }
                status => {
                    tracing::info!(store = %store, delta = %delta_id, %status, "discarding unprepared delta");
                    remove_delta_dir(&layout, &delta_id);
                }
            }
        }

        tracing::info!(
            store = %store,
            version = controller.version(),
            in_doubt = in_doubt.len(),
            "index store opened"
        );

        Ok(Arc::new(IndexStore {
            store,
            config,
            layout,
            _lock: lock,
            controller,
            writer,
            analyzer,
            generator,
            in_doubt: Mutex::new(in_doubt),
        }))
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn writer(&self) -> &MainIndexWriter {
        &self.writer
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }

    pub fn generator(&self) -> &Arc<DocumentGenerator> {
        &self.generator
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.controller.current_snapshot()
    }

    /// Reader over committed state only.
    pub fn searcher(&self) -> IndexSearcher {
        IndexSearcher::new(self.snapshot(), Arc::clone(&self.analyzer))
    }

    /// Nodes whose live leaf or marker is `New` or `Dirty`, in node order.
    pub fn pending_fts(&self, limit: usize) -> Vec<PendingNode> {
        let snapshot = self.snapshot();
        let mut pending = BTreeMap::new();
        for status in [FtsStatus::Dirty, FtsStatus::New] {
            for addr in snapshot.live_matching(fields::FTSSTATUS, status.as_str()) {
                let Some(doc) = snapshot.document(addr) else { continue };
                if !doc.doc_type().is_some_and(|t| t.is_leaf_scope()) {
                    continue;
                }
                let Some(node) = doc.id().and_then(|id| id.parse::<NodeRef>().ok()) else { continue };
                let tx = doc.get(fields::TX).unwrap_or_default().to_string();
                pending.entry(node).or_insert(tx);
            }
        }
        pending
            .into_iter()
            .take(limit)
            .map(|(node, tx)| PendingNode { node, tx })
            .collect()
    }

    pub fn pending_fts_count(&self) -> usize {
        self.pending_fts(usize::MAX).len()
    }

    /// Deltas found prepared at startup with no commit decision yet.
    pub fn in_doubt(&self) -> Vec<DeltaStatusRecord> {
        self.in_doubt.lock().values().cloned().collect()
    }

    pub fn in_doubt_xids(&self) -> BTreeSet<Xid> {
        self.in_doubt.lock().values().filter_map(|r| r.xid.clone()).collect()
    }

    /// Commits or discards every in-doubt delta of the branch `xid`.
    ///
    /// Returns false when the store holds no in-doubt delta for it.
    pub fn resolve_in_doubt(&self, xid: &Xid, commit: bool) -> Result<bool> {
        let mut in_doubt = self.in_doubt.lock();
        let ids: Vec<String> = in_doubt
            .iter()
            .filter(|(_, r)| r.xid.as_ref() == Some(xid))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &ids {
            let Some(record) = in_doubt.get(id) else { continue };
            if commit {
                self.writer.commit(record, None).map_err(|e| {
                    Error::with_source(e.kind, format!("committing in-doubt delta {}", id), e)
                })?;
                tracing::info!(store = %self.store, delta = %id, %xid, "in-doubt delta committed");
            } else {
                tracing::info!(store = %self.store, delta = %id, %xid, "in-doubt delta rolled back");
            }
            remove_delta_dir(&self.layout, id);
            in_doubt.remove(id);
        }
        Ok(!ids.is_empty())
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        IndexStats {
            store: self.store.to_string(),
            generation: snapshot.version,
            segments: snapshot.segments.len(),
            documents: snapshot.total_documents(),
            live_documents: snapshot.live_documents(),
            deleted_documents: snapshot.deleted_documents(),
            pending_backlog: self.pending_fts_count(),
            in_doubt_deltas: self.in_doubt.lock().len(),
            last_commit: snapshot.last_commit,
        }
    }
}

/// Best-effort removal; a leftover directory is retried on the next open.
pub(crate) fn remove_delta_dir(layout: &StoreLayout, delta_id: &str) {
    let dir = layout.delta_dir(delta_id);
    if let Err(e) = fs::remove_dir_all(&dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove delta directory");
        }
    }
}

