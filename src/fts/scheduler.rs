use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use crate::core::error::Error;
use crate::core::registry::StoreRegistry;
use crate::core::types::StoreRef;
use crate::fts::backlog::FtsBacklog;

/// Told about every scheduled backlog pass.
pub trait IndexCompletionListener: Send + Sync {
    fn index_completed(&self, store: &StoreRef, remaining: usize, error: Option<&Error>);
}

/// Runs backlog passes for stores that asked for one.
pub struct FtsScheduler {
    registry: Arc<StoreRegistry>,
    batch_size: usize,
    pending: Mutex<BTreeSet<StoreRef>>,
    listeners: RwLock<Vec<Arc<dyn IndexCompletionListener>>>,
}

impl FtsScheduler {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        let batch_size = registry.config().fts_batch_size;
        FtsScheduler {
            registry,
            batch_size,
            pending: Mutex::new(BTreeSet::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers a store for the next pass. Idempotent.
    pub fn requires_index(&self, store: &StoreRef) {
        if self.pending.lock().insert(store.clone()) {
            tracing::debug!(store = %store, "store registered for full-text indexing");
        }
    }

    pub fn is_pending(&self, store: &StoreRef) -> bool {
        self.pending.lock().contains(store)
    }

    pub fn add_listener(&self, listener: Arc<dyn IndexCompletionListener>) {
        self.listeners.write().push(listener);
    }

    /// One pass over every registered store; stores with work left, or
    /// whose pass failed, stay registered. Returns the nodes processed.
    pub fn run_pending(&self) -> usize {
        let stores = std::mem::take(&mut *self.pending.lock());
        let mut processed = 0;

        for store in stores {
            let outcome = self
                .registry
                .get(&store)
                .and_then(|index| FtsBacklog::new(index).drain(self.batch_size));

            let (remaining, error) = match outcome {
                Ok(outcome) => {
                    processed += outcome.processed;
                    (outcome.remaining, None)
                }
                Err(e) => {
                    tracing::warn!(store = %store, error = %e, "full-text pass failed");
                    let remaining = self
                        .registry
                        .get(&store)
                        .map(|index| index.pending_fts_count())
                        .unwrap_or(0);
                    (remaining, Some(e))
                }
            };

            if remaining > 0 || error.is_some() {
                self.requires_index(&store);
            }
            for listener in self.listeners.read().iter() {
                listener.index_completed(&store, remaining, error.as_ref());
            }
        }
        processed
    }

    /// Runs `run_pending` every `interval` on a background thread.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> SchedulerHandle {
        let (stop, stopped) = bounded::<()>(1);
        let scheduler = Arc::clone(self);
        let join = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    scheduler.run_pending();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        SchedulerHandle {
            stop: Some(stop),
            join: Some(join),
        }
    }
}

/// Stops the background scheduler when dropped.
pub struct SchedulerHandle {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("full-text scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
