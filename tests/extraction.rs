mod common;

use std::sync::Arc;
use common::{by_id, Harness};
use deltadex::content::service::{ContentReader, ContentService, ContentTransformer};
use deltadex::coordinator::coordinator::IndexCoordinator;
use deltadex::core::config::Config;
use deltadex::core::error::{Error, Result};
use deltadex::core::transaction::TransactionContext;
use deltadex::core::types::{ContentData, NodeRef, PropertyValue, QName, StoreRef};
use deltadex::fts::backlog::DrainOutcome;
use deltadex::graph::memory::InMemoryGraph;
use deltadex::index::document::{fields, not_indexed, FtsStatus};
use deltadex::indexer::generator::Collaborators;
use deltadex::query::ast::Query;
use deltadex::schema::dictionary::{DataType, PropertyDefinition};
use deltadex::schema::memory::InMemoryDictionary;
use deltadex::schema::model;
use tempfile::TempDir;

/// Content store whose bytes can never be read
struct UnreadableContent;

impl ContentService for UnreadableContent {
    fn reader(&self, node: &NodeRef, _property: &QName) -> Result<Option<ContentReader>> {
        Err(Error::extraction(format!("content store offline for {}", node)))
    }

    fn transformer(&self, _source: &str, _target: &str) -> Option<Arc<dyn ContentTransformer>> {
        None
    }
}

struct BrokenTransformer;

impl ContentTransformer for BrokenTransformer {
    fn cost(&self) -> u64 {
        1
    }

    fn transform(&self, _reader: &ContentReader) -> Result<String> {
        Err(Error::extraction("corrupt pdf"))
    }
}

fn atomic_content(dictionary: &InMemoryDictionary) {
    dictionary.register_property(PropertyDefinition::new(model::prop_content(), DataType::Content).with_atomic(true));
}

fn pdf() -> PropertyValue {
    PropertyValue::Content(ContentData::new("store://pdf", "application/pdf", 4))
}

#[test]
fn unreadable_content_does_not_fail_the_transaction() {
    let dir = TempDir::new().unwrap();
    let graph = Arc::new(InMemoryGraph::new());
    let dictionary = Arc::new(InMemoryDictionary::with_defaults());
    atomic_content(&dictionary);
    let store = StoreRef::new("workspace", "spaces");
    let root = graph.create_store(&store);
    let coordinator = IndexCoordinator::open(
        Config::default().with_index_root(dir.path()),
        Collaborators { graph: graph.clone(), dictionary, content: Arc::new(UnreadableContent) },
    )
    .unwrap();

    let plain = graph
        .create_node(&root, model::assoc_contains(), QName::new("cm", "a"), model::type_content())
        .unwrap();
    let unreadable = graph
        .create_node(&root, model::assoc_contains(), QName::new("cm", "b"), model::type_content())
        .unwrap();
    graph.set_property(&unreadable.child, model::prop_content(), pdf()).unwrap();

    let ctx = TransactionContext::local();
    coordinator.node_created(&ctx, &plain).unwrap();
    coordinator.node_created(&ctx, &unreadable).unwrap();
    coordinator.commit(&ctx).unwrap();

    let committed = |node: &NodeRef| {
        coordinator
            .searcher(&TransactionContext::local(), &store)
            .unwrap()
            .search(&by_id(node))
            .len()
    };
    assert_eq!(committed(&plain.child), 1);
    assert_eq!(committed(&unreadable.child), 1);
    assert_eq!(coordinator.index_stats(&store).unwrap().pending_backlog, 1);

    // The full pass fails too and falls back to the atomic fields
    assert_eq!(coordinator.drain(&store, 10).unwrap(), DrainOutcome { processed: 1, remaining: 0 });
    assert_eq!(committed(&unreadable.child), 1);
}

#[test]
fn failed_transformation_is_deferred_then_marked() {
    let h = Harness::new();
    atomic_content(&h.dictionary);
    h.content.register_transformer("application/pdf", Arc::new(BrokenTransformer));

    let doc = h.document(&h.root, "report.pdf");
    h.graph.set_property(&doc.child, model::prop_content(), pdf()).unwrap();
    h.content.put(&doc.child, &model::prop_content(), ContentReader::new("application/pdf", "UTF-8", b"%PDF".to_vec()));
    h.commit_created(&[&doc]);

    let marker = Query::term(fields::property(&model::prop_content()), not_indexed::TRANSFORMATION_FAILED);
    assert!(h.committed(&marker).is_empty());
    assert_eq!(h.coordinator().index_stats(&h.store).unwrap().pending_backlog, 1);

    assert_eq!(h.coordinator().drain(&h.store, 10).unwrap(), DrainOutcome { processed: 1, remaining: 0 });

    let results = h
        .coordinator()
        .searcher(&TransactionContext::local(), &h.store)
        .unwrap()
        .search(&marker);
    let statuses: Vec<_> = results.documents().map(|d| d.fts_status()).collect();
    assert_eq!(statuses, vec![Some(FtsStatus::Clean)]);
}
