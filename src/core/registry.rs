use std::collections::BTreeMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::index_store::IndexStore;
use crate::core::types::StoreRef;
use crate::indexer::generator::DocumentGenerator;
use crate::storage::layout::StoreLayout;

/// Opens each store's index on first use and keeps it open.
pub struct StoreRegistry {
    config: Arc<Config>,
    generator: Arc<DocumentGenerator>,
    analyzer: Arc<Analyzer>,
    stores: RwLock<BTreeMap<StoreRef, Arc<IndexStore>>>,
}

impl StoreRegistry {
    pub fn new(config: Arc<Config>, generator: Arc<DocumentGenerator>, analyzer: Arc<Analyzer>) -> Self {
        StoreRegistry {
            config,
            generator,
            analyzer,
            stores: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn get(&self, store: &StoreRef) -> Result<Arc<IndexStore>> {
        if let Some(open) = self.stores.read().get(store) {
            return Ok(Arc::clone(open));
        }

        let mut stores = self.stores.write();
        if let Some(open) = stores.get(store) {
            return Ok(Arc::clone(open));
        }
        let opened = IndexStore::open(
            Arc::clone(&self.config),
            store.clone(),
            Arc::clone(&self.generator),
            Arc::clone(&self.analyzer),
        )?;
        stores.insert(store.clone(), Arc::clone(&opened));
        Ok(opened)
    }

    /// Opens every store that already has an index on disk.
    pub fn open_existing(&self) -> Result<Vec<Arc<IndexStore>>> {
        StoreLayout::discover(&self.config.index_root)?
            .iter()
            .map(|store| self.get(store))
            .collect()
    }

    pub fn open_stores(&self) -> Vec<Arc<IndexStore>> {
        self.stores.read().values().cloned().collect()
    }
}
