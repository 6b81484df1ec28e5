use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use parking_lot::Mutex;
use crate::analysis::analyzer::Analyzer;
use crate::coordinator::resource::{EndFlags, Resource, StartFlags, Vote};
use crate::coordinator::tenant::{IdentityTranslator, TenantTranslator};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::index_store::IndexStore;
use crate::core::registry::StoreRegistry;
use crate::core::stats::{CoordinatorStats, IndexStats};
use crate::core::transaction::{TransactionContext, TxIdentity, Xid};
use crate::core::types::{ChildAssocRef, NodeRef, StoreRef};
use crate::fts::backlog::{DrainOutcome, FtsBacklog};
use crate::fts::scheduler::FtsScheduler;
use crate::indexer::delta::{DeltaIndexer, IndexMode};
use crate::indexer::generator::{Collaborators, DocumentGenerator};
use crate::reader::snapshot_reader::IndexSearcher;

pub type SharedDelta = Arc<Mutex<DeltaIndexer>>;

/// Where a transaction branch stands in the two-phase-commit protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Active,
    Suspended,
    /// Work finished; waiting for prepare or one-phase commit
    Ended,
    Prepared,
}

/// A transaction's deltas, at most one per store
struct Branch {
    state: BranchState,
    deltas: BTreeMap<StoreRef, SharedDelta>,
}

impl Branch {
    fn new() -> Self {
        Branch {
            state: BranchState::Active,
            deltas: BTreeMap::new(),
        }
    }
}

/// Entry point of the engine: routes notifications to per-transaction
/// deltas and drives their lifecycle.
///
/// Implicit (local) transactions commit on call; global ones are driven by
/// an external transaction manager through the [`Resource`] interface.
pub struct IndexCoordinator {
    registry: Arc<StoreRegistry>,
    scheduler: Arc<FtsScheduler>,
    tenant: Arc<dyn TenantTranslator>,
    branches: Mutex<HashMap<TxIdentity, Branch>>,
}

impl IndexCoordinator {
    /// Opens every store already on disk so in-doubt branches can be
    /// recovered, and schedules stores with pending full-text work.
    pub fn open(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let generator = Arc::new(DocumentGenerator::new(collaborators, &config)?);
        let registry = Arc::new(StoreRegistry::new(
            Arc::clone(&config),
            generator,
            Arc::new(Analyzer::standard()),
        ));
        let scheduler = Arc::new(FtsScheduler::new(Arc::clone(&registry)));

        let stores = registry.open_existing()?;
        for store in &stores {
            if store.pending_fts_count() > 0 {
                scheduler.requires_index(store.store());
            }
        }
        tracing::info!(root = %config.index_root.display(), stores = stores.len(), "index coordinator opened");

        Ok(IndexCoordinator {
            registry,
            scheduler,
            tenant: Arc::new(IdentityTranslator),
            branches: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_tenant_translator(mut self, tenant: Arc<dyn TenantTranslator>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn scheduler(&self) -> &Arc<FtsScheduler> {
        &self.scheduler
    }

    pub fn store(&self, store: &StoreRef) -> Result<Arc<IndexStore>> {
        self.registry.get(&self.tenant.store_name(store))
    }

    /// Starts a branch for the context. Local contexts also start
    /// implicitly on first use.
    pub fn begin(&self, ctx: &TransactionContext) -> Result<()> {
        match ctx.xid() {
            Some(xid) => self.start(xid, StartFlags::NoFlags),
            None => {
                self.branches.lock().entry(ctx.identity().clone()).or_insert_with(Branch::new);
                Ok(())
            }
        }
    }

    /// The transaction's delta for `store`, created on first use.
    pub fn indexer(&self, ctx: &TransactionContext, store: &StoreRef) -> Result<SharedDelta> {
        self.delta_for(ctx, &self.tenant.store_name(store))
    }

    fn delta_for(&self, ctx: &TransactionContext, store: &StoreRef) -> Result<SharedDelta> {
        let index = self.registry.get(store)?;
        let identity = ctx.identity();

        let mut branches = self.branches.lock();
        if ctx.xid().is_none() {
            branches.entry(identity.clone()).or_insert_with(Branch::new);
        }
        let branch = branches.get_mut(identity).ok_or_else(|| unknown(identity))?;
        if branch.state != BranchState::Active {
            return Err(Error::protocol(format!(
                "branch {} is {:?}, not active",
                identity, branch.state
            )));
        }
        let delta = branch.deltas.entry(store.clone()).or_insert_with(|| {
            tracing::debug!(branch = %identity, store = %store, "delta enlisted");
            Arc::new(Mutex::new(DeltaIndexer::new(index, IndexMode::Sync, ctx.xid().cloned())))
        });
        Ok(Arc::clone(delta))
    }

    fn with_delta<T>(
        &self,
        ctx: &TransactionContext,
        node: &NodeRef,
        f: impl FnOnce(&mut DeltaIndexer) -> Result<T>,
    ) -> Result<T> {
        let delta = self.delta_for(ctx, &node.store)?;
        let mut delta = delta.lock();
        f(&mut delta)
    }

    // Notifications

    pub fn node_created(&self, ctx: &TransactionContext, assoc: &ChildAssocRef) -> Result<()> {
        let assoc = self.tenant.assoc_name(assoc);
        self.with_delta(ctx, &assoc.child, |d| d.create_node(&assoc))
    }

    pub fn node_updated(&self, ctx: &TransactionContext, node: &NodeRef) -> Result<()> {
        let node = self.tenant.node_name(node);
        self.with_delta(ctx, &node, |d| d.update_node(&node))
    }

    pub fn node_deleted(&self, ctx: &TransactionContext, assoc: &ChildAssocRef) -> Result<()> {
        let assoc = self.tenant.assoc_name(assoc);
        self.with_delta(ctx, &assoc.child, |d| d.delete_node(&assoc))
    }

    pub fn child_assoc_created(&self, ctx: &TransactionContext, assoc: &ChildAssocRef) -> Result<()> {
        let assoc = self.tenant.assoc_name(assoc);
        self.with_delta(ctx, &assoc.child, |d| d.create_child_relationship(&assoc))
    }

    pub fn child_assoc_updated(
        &self,
        ctx: &TransactionContext,
        before: &ChildAssocRef,
        after: &ChildAssocRef,
    ) -> Result<()> {
        let before = self.tenant.assoc_name(before);
        let after = self.tenant.assoc_name(after);
        self.with_delta(ctx, &after.child, |d| d.update_child_relationship(&before, &after))
    }

    pub fn child_assoc_deleted(&self, ctx: &TransactionContext, assoc: &ChildAssocRef) -> Result<()> {
        let assoc = self.tenant.assoc_name(assoc);
        self.with_delta(ctx, &assoc.child, |d| d.delete_child_relationship(&assoc))
    }

    // Reads

    /// Committed state of `store` overlaid with the context's own pending
    /// changes, if it has any there.
    pub fn searcher(&self, ctx: &TransactionContext, store: &StoreRef) -> Result<IndexSearcher> {
        let store = self.tenant.store_name(store);
        let delta = self
            .branches
            .lock()
            .get(ctx.identity())
            .and_then(|b| b.deltas.get(&store).cloned());
        match delta {
            Some(delta) => delta.lock().searcher(),
            None => Ok(self.registry.get(&store)?.searcher()),
        }
    }

    pub fn flush(&self, ctx: &TransactionContext) -> Result<()> {
        for delta in self.deltas_of(ctx.identity())? {
            delta.lock().flush()?;
        }
        Ok(())
    }

    fn deltas_of(&self, identity: &TxIdentity) -> Result<Vec<SharedDelta>> {
        let branches = self.branches.lock();
        let branch = branches.get(identity).ok_or_else(|| unknown(identity))?;
        Ok(branch.deltas.values().cloned().collect())
    }

    // Implicit transactions

    pub fn prepare(&self, ctx: &TransactionContext) -> Result<Vote> {
        self.prepare_branch(ctx.identity())
    }

    /// Prepares every enlisted delta, then commits them.
    pub fn commit(&self, ctx: &TransactionContext) -> Result<()> {
        let identity = ctx.identity();
        let state = self.branches.lock().get(identity).map(|b| b.state);
        match state {
            None => Err(unknown(identity)),
            Some(BranchState::Prepared) => self.commit_branch(identity, false),
            Some(_) => match self.prepare_branch(identity) {
                Ok(Vote::ReadOnly) => Ok(()),
                Ok(Vote::Ok) => self.commit_branch(identity, false),
                Err(e) => {
                    self.rollback_branch(identity)?;
                    Err(e)
                }
            },
        }
    }

    pub fn rollback(&self, ctx: &TransactionContext) -> Result<()> {
        self.rollback_branch(ctx.identity())
    }

    // Branch protocol

    fn prepare_branch(&self, identity: &TxIdentity) -> Result<Vote> {
        let deltas = {
            let branches = self.branches.lock();
            let branch = branches.get(identity).ok_or_else(|| unknown(identity))?;
            match branch.state {
                BranchState::Suspended => {
                    return Err(Error::protocol(format!("branch {} is suspended", identity)));
                }
                BranchState::Prepared => {
                    return Err(Error::protocol(format!("branch {} is already prepared", identity)));
                }
                BranchState::Active | BranchState::Ended => {}
            }
            branch.deltas.values().cloned().collect::<Vec<_>>()
        };

        let mut vote = Vote::ReadOnly;
        for delta in &deltas {
            let result = delta.lock().prepare();
            match result {
                Ok(Vote::Ok) => vote = Vote::Ok,
                Ok(Vote::ReadOnly) => {}
                Err(e) => {
                    tracing::warn!(branch = %identity, error = %e, "prepare failed, branch marked for rollback");
                    for other in &deltas {
                        other.lock().set_rollback_only();
                    }
                    return Err(e);
                }
            }
        }

        let mut branches = self.branches.lock();
        if vote == Vote::ReadOnly {
            branches.remove(identity);
        } else if let Some(branch) = branches.get_mut(identity) {
            branch.state = BranchState::Prepared;
        }
        tracing::debug!(branch = %identity, stores = deltas.len(), ?vote, "branch prepared");
        Ok(vote)
    }

    fn commit_branch(&self, identity: &TxIdentity, one_phase: bool) -> Result<()> {
        let (state, deltas) = {
            let branches = self.branches.lock();
            match branches.get(identity) {
                Some(branch) => (branch.state, branch.deltas.values().cloned().collect::<Vec<_>>()),
                None => {
                    drop(branches);
                    return self.resolve_in_doubt(identity, true);
                }
            }
        };

        if state == BranchState::Suspended {
            return Err(Error::protocol(format!("branch {} is suspended", identity)));
        }
        if one_phase {
            if deltas.len() > 1 {
                return Err(Error::protocol(format!(
                    "one-phase commit of branch {} spans {} stores",
                    identity,
                    deltas.len()
                )));
            }
        } else if state != BranchState::Prepared {
            return Err(Error::protocol(format!("branch {} was not prepared", identity)));
        }

        let mut result = Ok(());
        for delta in &deltas {
            let mut delta = delta.lock();
            if result.is_err() {
                delta.rollback();
                continue;
            }
            let store = delta.store().clone();
            match delta.commit() {
                Ok(summary) if summary.requires_backlog => self.scheduler.requires_index(&store),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(branch = %identity, store = %store, error = %e, "commit failed");
                    result = Err(e);
                }
            }
        }

        self.branches.lock().remove(identity);
        if result.is_ok() {
            tracing::debug!(branch = %identity, stores = deltas.len(), "branch committed");
        }
        result
    }

    fn rollback_branch(&self, identity: &TxIdentity) -> Result<()> {
        let branch = self.branches.lock().remove(identity);
        match branch {
            Some(branch) => {
                for delta in branch.deltas.values() {
                    delta.lock().rollback();
                }
                tracing::debug!(branch = %identity, stores = branch.deltas.len(), "branch rolled back");
                Ok(())
            }
            None => self.resolve_in_doubt(identity, false),
        }
    }

    /// Finishes a branch that was prepared before a restart.
    fn resolve_in_doubt(&self, identity: &TxIdentity, commit: bool) -> Result<()> {
        let TxIdentity::Global(xid) = identity else {
            return Err(unknown(identity));
        };
        let mut found = false;
        for store in self.registry.open_stores() {
            found |= store.resolve_in_doubt(xid, commit)?;
        }
        if !found {
            return Err(unknown(identity));
        }
        Ok(())
    }

    fn is_in_doubt(&self, xid: &Xid) -> bool {
        self.registry.open_stores().iter().any(|s| s.in_doubt_xids().contains(xid))
    }

    // Backlog and monitoring

    /// One backlog pass over `store`, outside any transaction.
    pub fn drain(&self, store: &StoreRef, max: usize) -> Result<DrainOutcome> {
        FtsBacklog::new(self.store(store)?).drain(max)
    }

    pub fn index_stats(&self, store: &StoreRef) -> Result<IndexStats> {
        Ok(self.store(store)?.stats())
    }

    pub fn stats(&self) -> CoordinatorStats {
        let mut stats = CoordinatorStats::default();
        for branch in self.branches.lock().values() {
            match branch.state {
                BranchState::Active | BranchState::Ended => stats.active += 1,
                BranchState::Suspended => stats.suspended += 1,
                BranchState::Prepared => stats.prepared += 1,
            }
        }
        let stores = self.registry.open_stores();
        stats.open_stores = stores.len();
        stats.in_doubt = stores.iter().map(|s| s.in_doubt().len()).sum();
        stats
    }
}

impl Resource for IndexCoordinator {
    fn start(&self, xid: &Xid, flags: StartFlags) -> Result<()> {
        let identity = TxIdentity::Global(xid.clone());
        if flags == StartFlags::NoFlags && self.is_in_doubt(xid) {
            return Err(Error::protocol(format!("branch {} is in doubt", identity)));
        }

        let mut branches = self.branches.lock();
        match flags {
            StartFlags::NoFlags => {
                if branches.contains_key(&identity) {
                    return Err(Error::protocol(format!("branch {} already exists", identity)));
                }
                branches.insert(identity, Branch::new());
            }
            StartFlags::Join => {
                let branch = branches.get_mut(&identity).ok_or_else(|| unknown(&identity))?;
                if !matches!(branch.state, BranchState::Active | BranchState::Ended) {
                    return Err(Error::protocol(format!("cannot join branch {} in state {:?}", identity, branch.state)));
                }
                branch.state = BranchState::Active;
            }
            StartFlags::Resume => {
                let branch = branches.get_mut(&identity).ok_or_else(|| unknown(&identity))?;
                if branch.state != BranchState::Suspended {
                    return Err(Error::protocol(format!("branch {} is not suspended", identity)));
                }
                branch.state = BranchState::Active;
            }
        }
        Ok(())
    }

    fn end(&self, xid: &Xid, flags: EndFlags) -> Result<()> {
        let identity = TxIdentity::Global(xid.clone());
        let deltas = {
            let mut branches = self.branches.lock();
            let branch = branches.get_mut(&identity).ok_or_else(|| unknown(&identity))?;
            match (flags, branch.state) {
                (EndFlags::Suspend, BranchState::Active) => branch.state = BranchState::Suspended,
                (EndFlags::Suspend, state) => {
                    return Err(Error::protocol(format!("cannot suspend branch {} in state {:?}", identity, state)));
                }
                (_, BranchState::Prepared) => {
                    return Err(Error::protocol(format!("branch {} is already prepared", identity)));
                }
                (EndFlags::Success | EndFlags::Fail, _) => branch.state = BranchState::Ended,
            }
            branch.deltas.values().cloned().collect::<Vec<_>>()
        };

        if flags == EndFlags::Fail {
            for delta in &deltas {
                delta.lock().set_rollback_only();
            }
        }
        Ok(())
    }

    fn prepare(&self, xid: &Xid) -> Result<Vote> {
        self.prepare_branch(&TxIdentity::Global(xid.clone()))
    }

    fn commit(&self, xid: &Xid, one_phase: bool) -> Result<()> {
        self.commit_branch(&TxIdentity::Global(xid.clone()), one_phase)
    }

    fn rollback(&self, xid: &Xid) -> Result<()> {
        self.rollback_branch(&TxIdentity::Global(xid.clone()))
    }

    fn recover(&self) -> Result<Vec<Xid>> {
        let mut xids = BTreeSet::new();
        for store in self.registry.open_existing()? {
            xids.extend(store.in_doubt_xids());
        }
        Ok(xids.into_iter().collect())
    }

    fn forget(&self, xid: &Xid) -> Result<()> {
        let identity = TxIdentity::Global(xid.clone());
        if self.branches.lock().remove(&identity).is_some() || self.is_in_doubt(xid) {
            return Ok(());
        }
        Err(unknown(&identity))
    }
}

fn unknown(identity: &TxIdentity) -> Error {
    Error::protocol(format!("unknown transaction branch {}", identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::memory::InMemoryContentStore;
    use crate::core::error::ErrorKind;
    use crate::core::types::QName;
    use crate::graph::memory::InMemoryGraph;
    use crate::schema::memory::InMemoryDictionary;
    use crate::schema::model;
    use crate::storage::delta_status::DeltaStatus;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        graph: Arc<InMemoryGraph>,
        coordinator: IndexCoordinator,
        store: StoreRef,
        root: NodeRef,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(InMemoryGraph::new());
        let store = StoreRef::new("workspace", "test");
        let root = graph.create_store(&store);
        let coordinator = IndexCoordinator::open(
            Config::default().with_index_root(dir.path()),
            Collaborators {
                graph: graph.clone(),
                dictionary: Arc::new(InMemoryDictionary::with_defaults()),
                content: Arc::new(InMemoryContentStore::new()),
            },
        )
        .unwrap();
        Fixture { _dir: dir, graph, coordinator, store, root }
    }

    fn xid(id: &str) -> Xid {
        Xid::new(1, id.as_bytes().to_vec(), b"b1".to_vec())
    }

    /// Starts a global branch holding one created folder.
    fn started(f: &Fixture, xid: &Xid) -> SharedDelta {
        Resource::start(&f.coordinator, xid, StartFlags::NoFlags).unwrap();
        let ctx = TransactionContext::global(xid.clone());
        let folder = f
            .graph
            .create_node(&f.root, model::assoc_contains(), QName::new("cm", "projects"), model::type_folder())
            .unwrap();
        f.coordinator.node_created(&ctx, &folder).unwrap();
        f.coordinator.indexer(&ctx, &f.store).unwrap()
    }

    #[test]
    fn failed_end_marks_every_delta_rollback_only() {
        let f = fixture();
        let xid = xid("fail");
        let delta = started(&f, &xid);

        Resource::end(&f.coordinator, &xid, EndFlags::Fail).unwrap();
        assert_eq!(delta.lock().status(), DeltaStatus::MarkedRollback);

        let err = Resource::prepare(&f.coordinator, &xid).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);

        Resource::rollback(&f.coordinator, &xid).unwrap();
        assert_eq!(delta.lock().status(), DeltaStatus::RolledBack);
        assert_eq!(f.coordinator.stats().active, 0);
    }

    #[test]
    fn successful_end_still_prepares() {
        let f = fixture();
        let xid = xid("ok");
        let delta = started(&f, &xid);

        Resource::end(&f.coordinator, &xid, EndFlags::Success).unwrap();
        assert_eq!(delta.lock().status(), DeltaStatus::Active);
        assert_eq!(Resource::prepare(&f.coordinator, &xid).unwrap(), Vote::Ok);
        assert_eq!(f.coordinator.stats().prepared, 1);
        Resource::commit(&f.coordinator, &xid, false).unwrap();
    }

    #[test]
    fn forget_drops_a_live_branch() {
        let f = fixture();
        let xid = xid("forgotten");
        started(&f, &xid);
        assert_eq!(f.coordinator.stats().active, 1);

        Resource::forget(&f.coordinator, &xid).unwrap();
        assert_eq!(f.coordinator.stats().active, 0);

        let err = Resource::forget(&f.coordinator, &xid).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }

    #[test]
    fn forget_of_unknown_branch_is_a_protocol_error() {
        let f = fixture();
        let err = Resource::forget(&f.coordinator, &xid("never-started")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }
}
