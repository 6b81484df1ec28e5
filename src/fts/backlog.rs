use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use rayon::prelude::*;
use crate::core::error::Result;
use crate::core::index_store::{IndexStore, PendingNode};
use crate::core::types::NodeRef;
use crate::index::document::Document;
use crate::indexer::delta::{DeltaIndexer, IndexMode};
use crate::indexer::generator::{DocumentGenerator, FlushScope, GenerateOptions};

/// Result of one backlog pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub processed: usize,
    /// Nodes still pending once the pass committed
    pub remaining: usize,
}

/// Completes the full-text indexing deferred by atomic passes.
pub struct FtsBacklog {
    store: Arc<IndexStore>,
}

impl FtsBacklog {
    pub fn new(store: Arc<IndexStore>) -> Self {
        FtsBacklog { store }
    }

    /// Regenerates up to `max` pending nodes with every property and
    /// commits them in one backlog delta.
    ///
    /// Nodes are regenerated in parallel; writing stops once the delta
    /// holds `fts_write_ceiling` documents.
    pub fn drain(&self, max: usize) -> Result<DrainOutcome> {
        let started = Instant::now();
        let pending = self.store.pending_fts(max);
        if pending.is_empty() {
            return Ok(DrainOutcome { processed: 0, remaining: self.store.pending_fts_count() });
        }

        let generator = self.store.generator();
        let capacity = NonZeroUsize::new(self.store.config().child_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let regenerated: Vec<(&PendingNode, Option<Vec<Document>>)> = pending
            .par_iter()
            .map(|p| (p, regenerate(generator, &p.node, capacity)))
            .collect();

        let ceiling = self.store.config().fts_write_ceiling;
        let mut delta = DeltaIndexer::new(Arc::clone(&self.store), IndexMode::Backlog, None);
        let mut written = 0;
        let mut processed = 0;
        for (pending, documents) in regenerated {
            if written >= ceiling {
                break;
            }
            let Some(documents) = documents else { continue };
            written += documents.len();
            if let Err(e) = delta.write_backlog(pending, documents) {
                delta.rollback();
                return Err(e);
            }
            processed += 1;
        }

        if processed > 0 {
            delta.commit()?;
        } else {
            delta.rollback();
        }

        let remaining = self.store.pending_fts_count();
        tracing::info!(
            store = %self.store.store(),
            processed,
            documents = written,
            remaining,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "full-text backlog drained"
        );
        Ok(DrainOutcome { processed, remaining })
    }
}

/// Full pass, then the atomic-only fallback. A vanished node yields no
/// documents so its pending leaf or marker is retired.
fn regenerate(generator: &DocumentGenerator, node: &NodeRef, capacity: NonZeroUsize) -> Option<Vec<Document>> {
    let mut scope = FlushScope::new(capacity);
    let error = match generator.generate(node, &GenerateOptions::backlog(), &mut scope, None) {
        Ok(generated) => return Some(generated.documents),
        Err(e) if e.is_not_found() => return Some(Vec::new()),
        Err(e) => e,
    };
    tracing::warn!(node = %node, error = %error, "full-text pass failed, indexing atomically");

    scope.clear();
    match generator.generate(node, &GenerateOptions::backlog_fallback(), &mut scope, None) {
        Ok(generated) => Some(generated.documents),
        Err(e) if e.is_not_found() => Some(Vec::new()),
        Err(e) => {
            tracing::warn!(node = %node, error = %e, "node left in the full-text backlog");
            None
        }
    }
}
