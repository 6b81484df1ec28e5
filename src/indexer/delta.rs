use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use roaring::RoaringBitmap;
use uuid::Uuid;
use crate::coordinator::resource::Vote;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::index_store::{remove_delta_dir, IndexStore, PendingNode};
use crate::core::transaction::Xid;
use crate::core::types::{ChildAssocRef, NodeRef, StoreRef};
use crate::graph::service::NodeService;
use crate::index::document::{fields, DeletionScope, DocType, Document};
use crate::index::inverted::InvertedIndex;
use crate::indexer::command::{reduce, Action, Command, CommandQueue, FlushPlan, ResolvedAction};
use crate::indexer::generator::{ContainerLookup, FlushScope, GenerateOptions};
use crate::mvcc::controller::Snapshot;
use crate::reader::snapshot_reader::{DeltaOverlay, IndexSearcher};
use crate::storage::delta_status::{DeltaStatus, DeltaStatusRecord};
use crate::storage::segment::SegmentId;
use crate::storage::segment_writer::write_segment;

/// What a delta is fed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Change notifications of a transaction
    Sync,
    /// Documents produced by a full-text backlog pass
    Backlog,
}

/// What a successful commit merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub documents: usize,
    pub leaf_deletions: usize,
    pub container_deletions: usize,
    /// Committed documents still wait for the full-text backlog
    pub requires_backlog: bool,
}

/// Pending index changes of one transaction against one store.
///
/// Notifications are queued as commands, flattened on flush into one
/// action per node and regenerated into a private delta index. Committed
/// documents the transaction supersedes are not touched: they are named
/// in the leaf/container deletion sets and masked at read time until the
/// commit applies them.
pub struct DeltaIndexer {
    id: String,
    store: Arc<IndexStore>,
    mode: IndexMode,
    xid: Option<Xid>,
    status: DeltaStatus,
    queue: CommandQueue,
    index: Arc<InvertedIndex>,
    /// Delta documents superseded later in the transaction
    masked: RoaringBitmap,
    leaf_deletions: BTreeSet<NodeRef>,
    container_deletions: BTreeSet<NodeRef>,
    fts_targets: BTreeMap<NodeRef, String>,
    scope: FlushScope,
    modified: bool,
    persisted: bool,
    requires_backlog: bool,
    prepared: Option<DeltaStatusRecord>,
}

impl DeltaIndexer {
    pub fn new(store: Arc<IndexStore>, mode: IndexMode, xid: Option<Xid>) -> Self {
        let capacity = NonZeroUsize::new(store.config().child_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        DeltaIndexer {
            id: Uuid::new_v4().to_string(),
            store,
            mode,
            xid,
            status: DeltaStatus::Active,
            queue: CommandQueue::new(),
            index: Arc::new(InvertedIndex::new()),
            masked: RoaringBitmap::new(),
            leaf_deletions: BTreeSet::new(),
            container_deletions: BTreeSet::new(),
            fts_targets: BTreeMap::new(),
            scope: FlushScope::new(capacity),
            modified: false,
            persisted: false,
            requires_backlog: false,
            prepared: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &StoreRef {
        self.store.store()
    }

    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    pub fn xid(&self) -> Option<&Xid> {
        self.xid.as_ref()
    }

    pub fn status(&self) -> DeltaStatus {
        self.status
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn leaf_deletions(&self) -> &BTreeSet<NodeRef> {
        &self.leaf_deletions
    }

    pub fn container_deletions(&self) -> &BTreeSet<NodeRef> {
        &self.container_deletions
    }

    /// Committed nodes this delta hides from its own readers.
    pub fn deletions(&self) -> BTreeSet<NodeRef> {
        self.leaf_deletions.union(&self.container_deletions).cloned().collect()
    }

    /// Live documents written so far; unflushed commands are not counted.
    pub fn document_count(&self) -> usize {
        self.index.len() - self.masked.len() as usize
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    // Notifications

    pub fn create_node(&mut self, assoc: &ChildAssocRef) -> Result<()> {
        self.check_store(&assoc.child)?;
        if assoc.parent.is_none() {
            let snapshot = self.store.snapshot();
            for root in self.view_ids(&snapshot, fields::ISROOT, fields::TRUE, Some(DeletionScope::Leaf)) {
                self.push(Action::Delete, root)?;
            }
        }
        self.push(Action::Index, assoc.child.clone())
    }

    pub fn update_node(&mut self, node: &NodeRef) -> Result<()> {
        self.check_store(node)?;
        self.push(Action::Reindex, node.clone())
    }

    pub fn delete_node(&mut self, assoc: &ChildAssocRef) -> Result<()> {
        self.check_store(&assoc.child)?;
        self.push(Action::Delete, assoc.child.clone())
    }

    pub fn create_child_relationship(&mut self, assoc: &ChildAssocRef) -> Result<()> {
        self.check_store(&assoc.child)?;
        self.relationship_changed(assoc)
    }

    pub fn update_child_relationship(&mut self, before: &ChildAssocRef, after: &ChildAssocRef) -> Result<()> {
        self.check_store(&before.child)?;
        self.check_store(&after.child)?;
        self.relationship_changed(before)?;
        self.relationship_changed(after)
    }

    pub fn delete_child_relationship(&mut self, assoc: &ChildAssocRef) -> Result<()> {
        self.check_store(&assoc.child)?;
        self.relationship_changed(assoc)
    }

    /// Cascades below the child, unless it is filed under so many parents
    /// that cascading the single changed parent is cheaper.
    fn relationship_changed(&mut self, assoc: &ChildAssocRef) -> Result<()> {
        let threshold = self.store.config().cascade_fanout_threshold;
        let secondary = match self.graph().parent_assocs(&assoc.child) {
            Ok(parents) => parents.iter().filter(|a| !a.primary).count(),
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(self.fail(e)),
        };

        if secondary > threshold {
            if let Some(parent) = &assoc.parent {
                self.push(Action::CascadeReindex, parent.clone())?;
            }
            self.push(Action::Reindex, assoc.child.clone())
        } else {
            self.push(Action::CascadeReindex, assoc.child.clone())
        }
    }

    fn graph(&self) -> &dyn NodeService {
        self.store.generator().collaborators().graph.as_ref()
    }

    fn check_store(&mut self, node: &NodeRef) -> Result<()> {
        if &node.store == self.store.store() {
            return Ok(());
        }
        let e = Error::invalid_argument(format!(
            "node {} does not belong to store {}",
            node,
            self.store.store()
        ));
        Err(self.fail(e))
    }

    fn push(&mut self, action: Action, node: NodeRef) -> Result<()> {
        self.ensure_active()?;
        if let Err(e) = self.persist_active() {
            return Err(self.fail(e));
        }
        if self.queue.push(Command::new(action, node)) {
            self.modified = true;
        }
        if self.queue.len() > self.store.config().indexer_batch_size {
            self.flush()?;
        }
        Ok(())
    }

    // State

    fn ensure_active(&self) -> Result<()> {
        match self.status {
            DeltaStatus::Active => Ok(()),
            DeltaStatus::MarkedRollback => Err(Error::invalid_state(format!(
                "delta {} is marked for rollback",
                self.id
            ))),
            status => Err(Error::invalid_state(format!("delta {} is {}", self.id, status))),
        }
    }

    /// Marks the delta rollback-only and hands the error back.
    fn fail(&mut self, e: Error) -> Error {
        tracing::debug!(delta = %self.id, error = %e, "delta marked for rollback");
        self.set_rollback_only();
        e
    }

    /// After this only `rollback` is accepted.
    pub fn set_rollback_only(&mut self) {
        if matches!(
            self.status,
            DeltaStatus::Committed | DeltaStatus::RollingBack | DeltaStatus::RolledBack | DeltaStatus::MarkedRollback
        ) {
            return;
        }
        self.status = DeltaStatus::MarkedRollback;
        if self.persisted {
            if let Err(e) = self.status_record(DeltaStatus::MarkedRollback).save(&self.status_path()) {
                tracing::warn!(delta = %self.id, error = %e, "failed to record rollback-only status");
            }
        }
    }

    fn status_path(&self) -> std::path::PathBuf {
        self.store.layout().delta_status_path(&self.id)
    }

    fn status_record(&self, status: DeltaStatus) -> DeltaStatusRecord {
        let mut record = DeltaStatusRecord::new(self.id.clone(), status);
        record.xid = self.xid.clone();
        record
    }

    /// Creates the delta directory with an `Active` status on first use.
    fn persist_active(&mut self) -> Result<()> {
        if self.persisted {
            return Ok(());
        }
        fs::create_dir_all(self.store.layout().delta_dir(&self.id))?;
        self.status_record(DeltaStatus::Active).save(&self.status_path())?;
        self.persisted = true;
        Ok(())
    }

    // Flush

    /// Applies every queued command to the delta index.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.queue.is_empty() {
            return Ok(());
        }
        let commands = self.queue.drain();
        let plan = reduce(&commands);
        match self.apply_plan(plan) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn apply_plan(&mut self, mut plan: FlushPlan) -> Result<()> {
        let started = Instant::now();
        let snapshot = self.store.snapshot();
        let commands = plan.len();

        let mut removed = BTreeSet::new();
        let mut referrers = BTreeSet::new();
        for (node, action) in &plan.actions {
            if plan.deleted.contains(node) {
                let closure = self.deletion_closure(&snapshot, node);
                referrers.extend(self.secondary_referrers(&snapshot, &closure));
                for member in &closure {
                    self.mask_delta(member, None);
                    self.mask_main(&snapshot, member, true, true);
                }
                removed.extend(closure);
                continue;
            }
            match action {
                ResolvedAction::Index => {}
                ResolvedAction::Reindex => {
                    self.mask_delta(node, None);
                    self.mask_main(&snapshot, node, true, true);
                }
                ResolvedAction::CascadeReindex => {
                    let descendants = self.container_descendants(&snapshot, node);
                    self.mask_delta(node, None);
                    self.mask_main(&snapshot, node, true, true);
                    for descendant in &descendants {
                        self.mask_delta(descendant, Some(DeletionScope::Container));
                        self.mask_main(&snapshot, descendant, false, true);
                    }
                }
            }
        }

        for node in referrers {
            if removed.contains(&node) || plan.get(&node).is_some_and(|a| a > ResolvedAction::Index) {
                continue;
            }
            self.mask_delta(&node, None);
            self.mask_main(&snapshot, &node, true, true);
            plan.add(node, ResolvedAction::Reindex);
        }

        let generator = Arc::clone(self.store.generator());
        let mut generated = Vec::with_capacity(plan.len());
        {
            let lookup = ViewLookup {
                index: &self.index,
                masked: &self.masked,
                snapshot: &snapshot,
                container_deletions: &self.container_deletions,
            };
            for (node, action) in &plan.actions {
                let mut options = match action {
                    ResolvedAction::Index => GenerateOptions::index(),
                    ResolvedAction::Reindex => GenerateOptions::reindex(),
                    ResolvedAction::CascadeReindex => GenerateOptions::cascade_reindex(),
                };
                options.marker_on_missing = plan.deleted.contains(node) && self.leaf_deletions.contains(node);

                match generator.generate(node, &options, &mut self.scope, Some(&lookup)) {
                    Ok(result) => generated.push((node.clone(), result.documents)),
                    Err(e) if e.kind == ErrorKind::Consistency => {
                        tracing::debug!(node = %node, error = %e, "node vanished, skipping");
                    }
                    Err(e) if matches!(e.kind, ErrorKind::Extraction | ErrorKind::Schema) => {
                        tracing::warn!(delta = %self.id, node = %node, error = %e, "node not indexed, skipping");
                    }
                    Err(e) => {
                        return Err(Error::with_source(e.kind, format!("regenerating {}", node), e));
                    }
                }
            }
        }
        self.scope.clear();

        let mut written = 0;
        for (node, documents) in generated {
            written += documents.len();
            self.write_documents(&node, documents);
        }

        tracing::debug!(
            delta = %self.id,
            commands,
            documents = written,
            leaf_deletions = self.leaf_deletions.len(),
            container_deletions = self.container_deletions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "delta flushed"
        );
        Ok(())
    }

    /// Replaces the node's leaf-scope documents and any container document
    /// with the same path.
    fn write_documents(&mut self, node: &NodeRef, documents: Vec<Document>) {
        self.mask_delta(node, Some(DeletionScope::Leaf));
        for doc in &documents {
            if doc.doc_type() != Some(DocType::Container) {
                continue;
            }
            let (Some(id), Some(path)) = (doc.id(), doc.get(fields::PATH)) else { continue };
            let stale = (self.index.scope_docs(id, DeletionScope::Container) & self.index.term_docs(fields::PATH, path))
                - &self.masked;
            self.masked |= stale;
        }

        let analyzer = Arc::clone(self.store.analyzer());
        let index = Arc::make_mut(&mut self.index);
        for doc in documents {
            if doc.fts_status().is_some_and(|s| s.is_pending()) {
                self.requires_backlog = true;
            }
            index.add_document(doc, &analyzer);
        }
    }

    /// The node, the containers below it and the non-container children
    /// of any of those.
    fn deletion_closure(&self, snapshot: &Snapshot, node: &NodeRef) -> BTreeSet<NodeRef> {
        let mut closure = BTreeSet::from([node.clone()]);
        closure.extend(self.container_descendants(snapshot, node));
        let parents: Vec<NodeRef> = closure.iter().cloned().collect();
        for parent in parents {
            closure.extend(self.view_ids(snapshot, fields::PRIMARYPARENT, &parent.to_string(), Some(DeletionScope::Leaf)));
        }
        closure
    }

    /// Nodes outside `closure` filed under one of its members.
    fn secondary_referrers(&self, snapshot: &Snapshot, closure: &BTreeSet<NodeRef>) -> BTreeSet<NodeRef> {
        closure
            .iter()
            .flat_map(|member| self.view_ids(snapshot, fields::PARENT, &member.to_string(), Some(DeletionScope::Leaf)))
            .filter(|n| !closure.contains(n))
            .collect()
    }

    fn container_descendants(&self, snapshot: &Snapshot, node: &NodeRef) -> BTreeSet<NodeRef> {
        let mut descendants =
            self.view_ids(snapshot, fields::ANCESTOR, &node.to_string(), Some(DeletionScope::Container));
        descendants.remove(node);
        descendants
    }

    /// IDs of documents matching a term in the transaction's view: live
    /// delta documents plus committed ones not hidden by this delta.
    fn view_ids(
        &self,
        snapshot: &Snapshot,
        field: &str,
        value: &str,
        scope: Option<DeletionScope>,
    ) -> BTreeSet<NodeRef> {
        let in_scope = |doc: &Document| match (scope, doc.doc_type()) {
            (None, _) => true,
            (Some(scope), Some(doc_type)) => scope.covers(doc_type),
            (Some(_), None) => false,
        };

        let mut ids = BTreeSet::new();
        for addr in snapshot.live_matching(field, value) {
            let Some(doc) = snapshot.document(addr) else { continue };
            if !in_scope(doc) {
                continue;
            }
            let Some(node) = parse_id(doc) else { continue };
            let hidden = match doc.doc_type() {
                Some(DocType::Container) => self.container_deletions.contains(&node),
                _ => self.leaf_deletions.contains(&node),
            };
            if !hidden {
                ids.insert(node);
            }
        }

        for doc_id in (self.index.term_docs(field, value) - &self.masked).iter() {
            let Some(doc) = self.index.document(doc_id.into()) else { continue };
            if in_scope(doc) {
                ids.extend(parse_id(doc));
            }
        }
        ids
    }

    fn mask_delta(&mut self, node: &NodeRef, scope: Option<DeletionScope>) {
        let id = node.to_string();
        let docs = match scope {
            Some(scope) => self.index.scope_docs(&id, scope),
            None => self.index.term_docs(fields::ID, &id),
        };
        self.masked |= docs;
    }

    fn mask_main(&mut self, snapshot: &Snapshot, node: &NodeRef, leaf: bool, container: bool) {
        let id = node.to_string();
        if leaf && snapshot.has_live(&id, DeletionScope::Leaf) {
            self.leaf_deletions.insert(node.clone());
        }
        if container && snapshot.has_live(&id, DeletionScope::Container) {
            self.container_deletions.insert(node.clone());
        }
    }

    // Reads

    /// Flushes, then returns a reader that sees this delta's own changes.
    pub fn searcher(&mut self) -> Result<IndexSearcher> {
        self.flush()?;
        Ok(IndexSearcher::with_overlay(
            self.store.snapshot(),
            self.overlay(),
            Arc::clone(self.store.analyzer()),
        ))
    }

    pub fn overlay(&self) -> DeltaOverlay {
        DeltaOverlay {
            index: Arc::clone(&self.index),
            masked: self.masked.clone(),
            leaf_deletions: self.leaf_deletions.clone(),
            container_deletions: self.container_deletions.clone(),
        }
    }

    fn live_documents(&self) -> Vec<Document> {
        self.index
            .documents()
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.masked.contains(*i as u32))
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    // Backlog

    /// Records documents regenerated for a pending node; the commit
    /// retires the pending document carrying `pending.tx`.
    pub fn write_backlog(&mut self, pending: &PendingNode, documents: Vec<Document>) -> Result<()> {
        self.ensure_active()?;
        if let Err(e) = self.persist_active() {
            return Err(self.fail(e));
        }
        let analyzer = Arc::clone(self.store.analyzer());
        let index = Arc::make_mut(&mut self.index);
        for doc in documents {
            index.add_document(doc, &analyzer);
        }
        self.fts_targets.insert(pending.node.clone(), pending.tx.clone());
        self.modified = true;
        Ok(())
    }

    // Two-phase commit

    /// Flushes and makes the delta durable.
    ///
    /// Votes `ReadOnly` when the transaction changed nothing here.
    pub fn prepare(&mut self) -> Result<Vote> {
        match self.status {
            DeltaStatus::Active => {}
            DeltaStatus::Prepared => {
                return Ok(if self.prepared.is_some() { Vote::Ok } else { Vote::ReadOnly });
            }
            _ => self.ensure_active()?,
        }
        self.flush()?;

        if !self.modified {
            self.status = DeltaStatus::Prepared;
            return Ok(Vote::ReadOnly);
        }

        self.status = DeltaStatus::Preparing;
        match self.write_prepared() {
            Ok(record) => {
                tracing::debug!(
                    delta = %self.id,
                    documents = record.document_count,
                    segment = ?record.segment,
                    "delta prepared"
                );
                self.prepared = Some(record);
                self.status = DeltaStatus::Prepared;
                Ok(Vote::Ok)
            }
            Err(e) => {
                self.status = DeltaStatus::Active;
                Err(self.fail(e))
            }
        }
    }

    fn write_prepared(&mut self) -> Result<DeltaStatusRecord> {
        self.persist_active()?;
        let docs = self.live_documents();
        let segment = if docs.is_empty() {
            None
        } else {
            let id = SegmentId::new();
            write_segment(&self.store.layout().delta_segment_path(&self.id), id, docs.iter())?;
            Some(id)
        };

        let mut record = self.status_record(DeltaStatus::Prepared);
        record.segment = segment;
        record.document_count = docs.len();
        record.leaf_deletions = self.leaf_deletions.iter().cloned().collect();
        record.container_deletions = self.container_deletions.iter().cloned().collect();
        record.fts_targets = self.fts_targets.iter().map(|(n, tx)| (n.clone(), tx.clone())).collect();
        record.save(&self.status_path())?;
        Ok(record)
    }

    /// Merges the delta into the main index, preparing first if needed.
    ///
    /// A failed merge rolls the delta back before the error is returned.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        if self.status == DeltaStatus::Active {
            self.prepare()?;
        }
        if self.status != DeltaStatus::Prepared {
            self.ensure_active()?;
        }

        let Some(record) = self.prepared.take() else {
            self.status = DeltaStatus::Committed;
            self.cleanup();
            return Ok(CommitSummary::default());
        };

        self.status = DeltaStatus::Committing;
        if let Err(e) = self.store.writer().commit(&record, Some(self.live_documents())) {
            tracing::warn!(delta = %self.id, error = %e, "commit failed, rolling back");
            self.status = DeltaStatus::Prepared;
            self.rollback();
            return Err(e);
        }
        self.status = DeltaStatus::Committed;
        self.cleanup();

        let summary = CommitSummary {
            documents: record.document_count,
            leaf_deletions: record.leaf_deletions.len(),
            container_deletions: record.container_deletions.len(),
            requires_backlog: self.mode == IndexMode::Sync && self.requires_backlog,
        };
        tracing::debug!(delta = %self.id, store = %self.store.store(), ?summary, "delta committed");
        Ok(summary)
    }

    /// Discards all pending work. Never fails.
    pub fn rollback(&mut self) {
        if matches!(self.status, DeltaStatus::Committed | DeltaStatus::RolledBack) {
            return;
        }
        self.status = DeltaStatus::RollingBack;
        self.queue.drain();
        self.index = Arc::new(InvertedIndex::new());
        self.masked.clear();
        self.leaf_deletions.clear();
        self.container_deletions.clear();
        self.fts_targets.clear();
        self.prepared = None;
        self.cleanup();
        self.status = DeltaStatus::RolledBack;
        tracing::debug!(delta = %self.id, "delta rolled back");
    }

    fn cleanup(&mut self) {
        if self.persisted {
            remove_delta_dir(self.store.layout(), &self.id);
            self.persisted = false;
        }
    }
}

fn parse_id(doc: &Document) -> Option<NodeRef> {
    doc.id()?.parse().ok()
}

/// Container liveness as the flushing transaction sees it
struct ViewLookup<'a> {
    index: &'a InvertedIndex,
    masked: &'a RoaringBitmap,
    snapshot: &'a Snapshot,
    container_deletions: &'a BTreeSet<NodeRef>,
}

impl ContainerLookup for ViewLookup<'_> {
    fn has_live_container(&self, node: &NodeRef, path: &str) -> bool {
        let id = node.to_string();
        let in_delta =
            (self.index.scope_docs(&id, DeletionScope::Container) & self.index.term_docs(fields::PATH, path)) - self.masked;
        if !in_delta.is_empty() {
            return true;
        }
        if self.container_deletions.contains(node) {
            return false;
        }
        (0..self.snapshot.segments.len()).any(|i| {
            let live = self.snapshot.live_scope_docs(i, &id, DeletionScope::Container);
            !(live & self.snapshot.segments[i].index.term_docs(fields::PATH, path)).is_empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::Analyzer;
    use crate::content::memory::InMemoryContentStore;
    use crate::core::config::Config;
    use crate::core::types::QName;
    use crate::graph::memory::InMemoryGraph;
    use crate::indexer::generator::{Collaborators, DocumentGenerator};
    use crate::query::ast::Query;
    use crate::schema::memory::InMemoryDictionary;
    use crate::schema::model;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        graph: Arc<InMemoryGraph>,
        store: Arc<IndexStore>,
        root: NodeRef,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(InMemoryGraph::new());
        let store_ref = StoreRef::new("workspace", "test");
        let root = graph.create_store(&store_ref);
        let config = Arc::new(Config::default().with_index_root(dir.path()));
        let generator = DocumentGenerator::new(
            Collaborators {
                graph: graph.clone(),
                dictionary: Arc::new(InMemoryDictionary::with_defaults()),
                content: Arc::new(InMemoryContentStore::new()),
            },
            &config,
        )
        .unwrap();
        let store = IndexStore::open(config, store_ref, Arc::new(generator), Arc::new(Analyzer::standard())).unwrap();
        Fixture { _dir: dir, graph, store, root }
    }

    fn folder(f: &Fixture, parent: &NodeRef, name: &str) -> ChildAssocRef {
        f.graph
            .create_node(parent, model::assoc_contains(), QName::new("cm", name), model::type_folder())
            .unwrap()
    }

    fn ids(delta: &mut DeltaIndexer, query: &Query) -> BTreeSet<String> {
        delta.searcher().unwrap().search(query).node_ids()
    }

    #[test]
    fn create_and_delete_in_one_transaction_leaves_nothing() {
        let f = fixture();
        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        let assoc = folder(&f, &f.root, "temp");
        delta.create_node(&assoc).unwrap();
        delta.flush().unwrap();
        assert!(delta.document_count() > 0);

        f.graph.delete_node(&assoc.child).unwrap();
        delta.delete_node(&assoc).unwrap();
        delta.flush().unwrap();

        assert_eq!(delta.document_count(), 0);
        assert!(delta.deletions().is_empty());
        assert!(ids(&mut delta, &Query::node_id(assoc.child.to_string())).is_empty());
    }

    #[test]
    fn own_writes_are_visible_before_commit() {
        let f = fixture();
        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        let assoc = folder(&f, &f.root, "reports");
        delta.create_node(&assoc).unwrap();

        let id = assoc.child.to_string();
        assert_eq!(ids(&mut delta, &Query::node_id(assoc.child.to_string())), BTreeSet::from([id.clone()]));
        assert_eq!(f.store.searcher().count(&Query::node_id(assoc.child.to_string())), 0);

        let summary = delta.commit().unwrap();
        assert!(summary.documents > 0);
        assert_eq!(delta.status(), DeltaStatus::Committed);
        assert!(f.store.searcher().count(&Query::node_id(assoc.child.to_string())) > 0);
    }

    #[test]
    fn deleting_a_committed_folder_hides_its_subtree() {
        let f = fixture();
        let top = folder(&f, &f.root, "top");
        let inner = folder(&f, &top.child, "inner");

        let mut setup = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        setup.create_node(&top).unwrap();
        setup.create_node(&inner).unwrap();
        setup.commit().unwrap();

        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        f.graph.delete_node(&top.child).unwrap();
        delta.delete_node(&top).unwrap();
        delta.flush().unwrap();

        assert!(delta.leaf_deletions().contains(&top.child));
        assert!(delta.leaf_deletions().contains(&inner.child));
        assert!(delta.container_deletions().contains(&inner.child));
        assert!(ids(&mut delta, &Query::node_id(inner.child.to_string())).is_empty());

        delta.commit().unwrap();
        assert_eq!(f.store.searcher().count(&Query::node_id(inner.child.to_string())), 0);
    }

    #[test]
    fn foreign_store_marks_rollback_only() {
        let f = fixture();
        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        let stranger = NodeRef::new(StoreRef::new("archive", "other"), "n1");

        let err = delta.update_node(&stranger).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(delta.status(), DeltaStatus::MarkedRollback);
        assert_eq!(delta.prepare().unwrap_err().kind, ErrorKind::InvalidState);

        delta.rollback();
        assert_eq!(delta.status(), DeltaStatus::RolledBack);
    }

    #[test]
    fn untouched_delta_votes_read_only() {
        let f = fixture();
        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        assert_eq!(delta.prepare().unwrap(), Vote::ReadOnly);
        assert_eq!(delta.commit().unwrap(), CommitSummary::default());
        assert!(f.store.layout().delta_ids().unwrap().is_empty());
    }

    #[test]
    fn prepare_persists_status_and_rollback_removes_it() {
        let f = fixture();
        let mut delta = DeltaIndexer::new(f.store.clone(), IndexMode::Sync, None);
        delta.create_node(&folder(&f, &f.root, "x")).unwrap();

        assert_eq!(delta.prepare().unwrap(), Vote::Ok);
        let record = DeltaStatusRecord::load(&f.store.layout().delta_status_path(delta.id())).unwrap();
        assert_eq!(record.status, DeltaStatus::Prepared);
        assert!(record.segment.is_some());

        delta.rollback();
        assert!(f.store.layout().delta_ids().unwrap().is_empty());
    }
}
