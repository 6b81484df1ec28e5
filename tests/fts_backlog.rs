mod common;

use std::sync::Arc;
use parking_lot::Mutex;
use common::{by_id, description_contains, Harness};
use deltadex::core::error::Error;
use deltadex::core::transaction::TransactionContext;
use deltadex::core::types::{PropertyValue, StoreRef};
use deltadex::fts::backlog::DrainOutcome;
use deltadex::core::index_store::PendingNode;
use deltadex::fts::scheduler::IndexCompletionListener;
use deltadex::indexer::delta::{DeltaIndexer, IndexMode};
use deltadex::indexer::generator::{FlushScope, GenerateOptions};
use std::num::NonZeroUsize;
use deltadex::schema::model;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(StoreRef, usize, bool)>>,
}

impl IndexCompletionListener for Recorder {
    fn index_completed(&self, store: &StoreRef, remaining: usize, error: Option<&Error>) {
        self.calls.lock().push((store.clone(), remaining, error.is_some()));
    }
}

#[test]
fn non_atomic_property_becomes_searchable_after_drain() {
    let h = Harness::new();
    let ctx = TransactionContext::local();
    h.coordinator().node_created(&ctx, &h.root_assoc()).unwrap();
    let child = h.document(&h.root, "c1.txt");
    h.graph
        .set_property(&child.child, model::prop_description(), PropertyValue::text("quarterly revenue figures"))
        .unwrap();
    h.coordinator().node_created(&ctx, &child).unwrap();
    h.coordinator().commit(&ctx).unwrap();

    assert!(h.committed(&description_contains("revenue")).is_empty());
    assert_eq!(h.committed(&by_id(&child.child)).len(), 1);
    assert_eq!(h.coordinator().index_stats(&h.store).unwrap().pending_backlog, 1);

    let outcome = h.coordinator().drain(&h.store, 10).unwrap();
    assert_eq!(outcome, DrainOutcome { processed: 1, remaining: 0 });

    let hits = h.committed(&description_contains("revenue"));
    assert_eq!(hits.len(), 1);
    assert!(hits.contains(&child.child.to_string()));
    assert_eq!(h.coordinator().index_stats(&h.store).unwrap().pending_backlog, 0);
}

#[test]
fn commit_with_deferred_work_registers_the_store() {
    let h = Harness::new();
    let recorder = Arc::new(Recorder::default());
    h.coordinator().scheduler().add_listener(recorder.clone());

    let plain = h.document(&h.root, "plain.txt");
    h.commit_created(&[&plain]);
    assert!(!h.coordinator().scheduler().is_pending(&h.store));

    let deferred = h.document(&h.root, "deferred.txt");
    h.graph
        .set_property(&deferred.child, model::prop_description(), PropertyValue::text("needs the backlog"))
        .unwrap();
    h.commit_created(&[&deferred]);
    assert!(h.coordinator().scheduler().is_pending(&h.store));

    assert_eq!(h.coordinator().scheduler().run_pending(), 1);
    assert!(!h.coordinator().scheduler().is_pending(&h.store));
    assert_eq!(recorder.calls.lock().as_slice(), &[(h.store.clone(), 0, false)]);
    assert_eq!(h.committed(&description_contains("backlog")).len(), 1);
}

#[test]
fn drain_stops_at_the_write_ceiling() {
    let h = Harness::with_config(|c| c.fts_write_ceiling = 2);
    let mut created = Vec::new();
    for i in 0..3 {
        let doc = h.document(&h.root, &format!("d{}.txt", i));
        h.graph
            .set_property(&doc.child, model::prop_description(), PropertyValue::text("pending text"))
            .unwrap();
        created.push(doc);
    }
    let refs: Vec<_> = created.iter().collect();
    h.commit_created(&refs);

    assert_eq!(h.coordinator().drain(&h.store, 10).unwrap(), DrainOutcome { processed: 2, remaining: 1 });
    assert_eq!(h.coordinator().drain(&h.store, 10).unwrap(), DrainOutcome { processed: 1, remaining: 0 });
    assert_eq!(h.committed(&description_contains("pending")).len(), 3);
}

#[test]
fn empty_drain_still_reports_the_backlog() {
    let h = Harness::new();
    let doc = h.document(&h.root, "waiting.txt");
    h.graph
        .set_property(&doc.child, model::prop_description(), PropertyValue::text("still waiting"))
        .unwrap();
    h.commit_created(&[&doc]);

    assert_eq!(h.coordinator().drain(&h.store, 0).unwrap(), DrainOutcome { processed: 0, remaining: 1 });
    assert_eq!(h.coordinator().drain(&h.store, 10).unwrap(), DrainOutcome { processed: 1, remaining: 0 });
    assert_eq!(h.coordinator().drain(&h.store, 10).unwrap(), DrainOutcome { processed: 0, remaining: 0 });
}

#[test]
fn deleted_node_marker_is_retired_by_drain() {
    let h = Harness::new();
    let doomed = h.document(&h.root, "doomed.txt");
    h.graph
        .set_property(&doomed.child, model::prop_description(), PropertyValue::text("short lived"))
        .unwrap();
    h.commit_created(&[&doomed]);

    h.graph.set_transaction("2");
    h.graph.delete_node(&doomed.child).unwrap();
    let ctx = TransactionContext::local();
    h.coordinator().node_deleted(&ctx, &doomed).unwrap();
    h.coordinator().commit(&ctx).unwrap();

    assert!(h.committed(&by_id(&doomed.child)).is_empty());
    assert_eq!(h.coordinator().index_stats(&h.store).unwrap().pending_backlog, 1);

    let outcome = h.coordinator().drain(&h.store, 10).unwrap();
    assert_eq!(outcome, DrainOutcome { processed: 1, remaining: 0 });
    assert!(h.committed(&description_contains("lived")).is_empty());
}

#[test]
fn backlog_indexes_the_latest_committed_version() {
    let h = Harness::new();
    let doc = h.document(&h.root, "busy.txt");
    h.graph
        .set_property(&doc.child, model::prop_description(), PropertyValue::text("first draft"))
        .unwrap();
    h.commit_created(&[&doc]);

    // A newer transaction rewrites the node before the backlog runs
    h.graph.set_transaction("2");
    h.graph
        .set_property(&doc.child, model::prop_description(), PropertyValue::text("second draft"))
        .unwrap();
    let ctx = TransactionContext::local();
    h.coordinator().node_updated(&ctx, &doc.child).unwrap();
    h.coordinator().commit(&ctx).unwrap();

    let outcome = h.coordinator().drain(&h.store, 10).unwrap();
    assert_eq!(outcome, DrainOutcome { processed: 1, remaining: 0 });
    assert_eq!(h.committed(&description_contains("second")).len(), 1);
    assert_eq!(h.committed(&by_id(&doc.child)).len(), 1);
}

#[test]
fn stale_backlog_result_is_dropped_at_commit() {
    let h = Harness::new();
    let doc = h.document(&h.root, "raced.txt");
    h.graph
        .set_property(&doc.child, model::prop_description(), PropertyValue::text("stale wording"))
        .unwrap();
    h.commit_created(&[&doc]);

    // A backlog pass regenerates the tx 1 version...
    let store = h.coordinator().store(&h.store).unwrap();
    let mut scope = FlushScope::new(NonZeroUsize::new(8).unwrap());
    let stale = store
        .generator()
        .generate(&doc.child, &GenerateOptions::backlog(), &mut scope, None)
        .unwrap()
        .documents;

    // ...while tx 2 re-indexes the node
    h.graph.set_transaction("2");
    h.graph
        .set_property(&doc.child, model::prop_description(), PropertyValue::text("fresh wording"))
        .unwrap();
    let ctx = TransactionContext::local();
    h.coordinator().node_updated(&ctx, &doc.child).unwrap();
    h.coordinator().commit(&ctx).unwrap();

    let mut backlog = DeltaIndexer::new(store.clone(), IndexMode::Backlog, None);
    let pending = PendingNode { node: doc.child.clone(), tx: "1".to_string() };
    backlog.write_backlog(&pending, stale).unwrap();
    let summary = backlog.commit().unwrap();
    assert!(!summary.requires_backlog);

    assert!(h.committed(&description_contains("stale")).is_empty());
    assert_eq!(h.committed(&by_id(&doc.child)).len(), 1);
    assert_eq!(store.pending_fts(10), vec![PendingNode { node: doc.child.clone(), tx: "2".to_string() }]);
}
