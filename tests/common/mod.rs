#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use deltadex::content::memory::InMemoryContentStore;
use deltadex::coordinator::coordinator::IndexCoordinator;
use deltadex::core::config::Config;
use deltadex::core::transaction::TransactionContext;
use deltadex::core::types::{ChildAssocRef, NodeRef, PropertyValue, QName, StoreRef};
use deltadex::graph::memory::InMemoryGraph;
use deltadex::index::document::fields;
use deltadex::indexer::generator::Collaborators;
use deltadex::query::ast::Query;
use deltadex::schema::dictionary::{DataType, PropertyDefinition};
use deltadex::schema::memory::InMemoryDictionary;
use deltadex::schema::model;
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub graph: Arc<InMemoryGraph>,
    pub dictionary: Arc<InMemoryDictionary>,
    pub content: Arc<InMemoryContentStore>,
    pub store: StoreRef,
    pub root: NodeRef,
    coordinator: Option<IndexCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default().with_index_root(dir.path());
        adjust(&mut config);

        let graph = Arc::new(InMemoryGraph::new());
        let dictionary = Arc::new(InMemoryDictionary::with_defaults());
        // Descriptions only reach the index through the full-text backlog
        dictionary.register_property(
            PropertyDefinition::new(model::prop_description(), DataType::Text).with_atomic(false),
        );
        let content = Arc::new(InMemoryContentStore::new());
        let store = StoreRef::new("workspace", "spaces");
        let root = graph.create_store(&store);

        let mut harness = Harness {
            dir,
            config,
            graph,
            dictionary,
            content,
            store,
            root,
            coordinator: None,
        };
        harness.reopen();
        harness
    }

    pub fn coordinator(&self) -> &IndexCoordinator {
        self.coordinator.as_ref().unwrap()
    }

    /// Closes the coordinator (releasing store locks) and opens a new one
    /// over the same index root.
    pub fn reopen(&mut self) {
        self.coordinator = None;
        let collaborators = Collaborators {
            graph: self.graph.clone(),
            dictionary: self.dictionary.clone(),
            content: self.content.clone(),
        };
        self.coordinator = Some(IndexCoordinator::open(self.config.clone(), collaborators).unwrap());
    }

    pub fn root_assoc(&self) -> ChildAssocRef {
        ChildAssocRef::root(self.root.clone(), model::assoc_children())
    }

    pub fn folder(&self, parent: &NodeRef, name: &str) -> ChildAssocRef {
        self.graph
            .create_node(parent, model::assoc_contains(), QName::new("cm", name), model::type_folder())
            .unwrap()
    }

    pub fn document(&self, parent: &NodeRef, name: &str) -> ChildAssocRef {
        let assoc = self
            .graph
            .create_node(parent, model::assoc_contains(), QName::new("cm", name), model::type_content())
            .unwrap();
        self.graph
            .set_property(&assoc.child, model::prop_name(), PropertyValue::text(name))
            .unwrap();
        assoc
    }

    /// Creates and indexes nodes in one committed local transaction.
    pub fn commit_created(&self, assocs: &[&ChildAssocRef]) {
        let ctx = TransactionContext::local();
        for assoc in assocs {
            self.coordinator().node_created(&ctx, assoc).unwrap();
        }
        self.coordinator().commit(&ctx).unwrap();
    }

    /// Node IDs the context sees for a query.
    pub fn visible(&self, ctx: &TransactionContext, query: &Query) -> BTreeSet<String> {
        self.coordinator()
            .searcher(ctx, &self.store)
            .unwrap()
            .search(query)
            .node_ids()
    }

    pub fn committed(&self, query: &Query) -> BTreeSet<String> {
        self.visible(&TransactionContext::local(), query)
    }
}

pub fn by_id(node: &NodeRef) -> Query {
    Query::node_id(node.to_string())
}

pub fn description_contains(word: &str) -> Query {
    Query::matches(fields::property(&model::prop_description()), word)
}
