use std::collections::{BTreeSet, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use lru::LruCache;
use crate::content::service::ContentService;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{ChildAssocRef, NodeRef, Path, PropertyValue, QName};
use crate::graph::service::NodeService;
use crate::index::document::{fields, DocType, Document, FtsStatus};
use crate::indexer::properties::{residual_definition, EmitContext, PropertyHandler};
use crate::schema::dictionary::{DataType, DictionaryService};
use crate::schema::model;

/// Services the generator reads from
#[derive(Clone)]
pub struct Collaborators {
    pub graph: Arc<dyn NodeService>,
    pub dictionary: Arc<dyn DictionaryService>,
    pub content: Arc<dyn ContentService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Status written on the leaf when atomic indexing was incomplete
    pub fts_status: FtsStatus,
    /// Materialize non-atomic properties too
    pub index_all: bool,
    pub include_containers: bool,
    /// Also regenerate the container documents of descendants
    pub cascade: bool,
    /// The node was deleted in this delta and had committed documents
    pub marker_on_missing: bool,
}

impl GenerateOptions {
    /// First indexing of a new node.
    pub fn index() -> Self {
        GenerateOptions {
            fts_status: FtsStatus::New,
            index_all: false,
            include_containers: true,
            cascade: false,
            marker_on_missing: false,
        }
    }

    pub fn reindex() -> Self {
        GenerateOptions {
            fts_status: FtsStatus::Dirty,
            ..Self::index()
        }
    }

    pub fn cascade_reindex() -> Self {
        GenerateOptions {
            cascade: true,
            ..Self::reindex()
        }
    }

    /// Full-text backlog pass: every property, leaf only.
    pub fn backlog() -> Self {
        GenerateOptions {
            fts_status: FtsStatus::Clean,
            index_all: true,
            include_containers: false,
            cascade: false,
            marker_on_missing: false,
        }
    }

    /// Backlog fallback after a failed full pass.
    pub fn backlog_fallback() -> Self {
        GenerateOptions {
            index_all: false,
            ..Self::backlog()
        }
    }
}

#[derive(Debug, Default)]
pub struct Generated {
    pub documents: Vec<Document>,
    /// False when some property was left for the backlog
    pub all_atomic: bool,
}

/// Memoization shared by every node of one flush
pub struct FlushScope {
    processed: HashSet<(NodeRef, String)>,
    children: LruCache<NodeRef, bool>,
}

impl FlushScope {
    pub fn new(child_cache_capacity: NonZeroUsize) -> Self {
        FlushScope {
            processed: HashSet::new(),
            children: LruCache::new(child_cache_capacity),
        }
    }

    /// Records a container path; false if it was already generated in this flush.
    pub fn mark_processed(&mut self, node: &NodeRef, path: &str) -> bool {
        self.processed.insert((node.clone(), path.to_string()))
    }

    pub fn clear(&mut self) {
        self.processed.clear();
        self.children.clear();
    }
}

/// Answers whether a container document is already live in the index views
pub trait ContainerLookup {
    fn has_live_container(&self, node: &NodeRef, path: &str) -> bool;
}

/// Turns graph nodes into index documents
pub struct DocumentGenerator {
    collaborators: Collaborators,
    always_indexed: HashSet<QName>,
    exclude_property: QName,
    locale_property: QName,
    default_locale: String,
    max_transformation_cost: u64,
}

impl DocumentGenerator {
    pub fn new(collaborators: Collaborators, config: &Config) -> Result<Self> {
        let always_indexed = config
            .always_indexed_container_types
            .iter()
            .map(|t| t.parse())
            .collect::<Result<HashSet<QName>>>()?;

        Ok(DocumentGenerator {
            collaborators,
            always_indexed,
            exclude_property: config.exclude_from_index_property.parse()?,
            locale_property: config.locale_property.parse()?,
            default_locale: config.default_locale.clone(),
            max_transformation_cost: config.max_atomic_transformation_cost,
        })
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn graph(&self) -> &dyn NodeService {
        self.collaborators.graph.as_ref()
    }

    fn dictionary(&self) -> &dyn DictionaryService {
        self.collaborators.dictionary.as_ref()
    }

    /// Documents for one node: the leaf first, then container documents.
    ///
    /// A vanished node yields a `Consistency` error, or a single marker
    /// when `marker_on_missing` is set.
    pub fn generate(
        &self,
        node: &NodeRef,
        options: &GenerateOptions,
        scope: &mut FlushScope,
        lookup: Option<&dyn ContainerLookup>,
    ) -> Result<Generated> {
        let status = self.graph().node_status(node)?;
        if !status.exists {
            if options.marker_on_missing {
                let mut marker = Document::of_type(DocType::Marker, &node.to_string());
                marker.keyword(fields::TX, status.change_tx.unwrap_or_default());
                marker.keyword(fields::FTSSTATUS, FtsStatus::Dirty.as_str());
                return Ok(Generated {
                    documents: vec![marker],
                    all_atomic: true,
                });
            }
            return Err(Error::consistency(format!("node does not exist: {}", node)));
        }

        let properties = self.graph().properties(node)?;
        let excluded = properties
            .get(&self.exclude_property)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false);
        if excluded {
            return Ok(Generated {
                documents: Vec::new(),
                all_atomic: true,
            });
        }

        let node_type = self.graph().node_type(node)?;
        let aspects = self.graph().aspects(node)?;
        let parents = self.graph().parent_assocs(node)?;
        let is_root = parents.is_empty() && self.graph().root_node(&node.store).ok().as_ref() == Some(node);

        let mut leaf = Document::of_type(DocType::Node, &node.to_string());
        leaf.keyword(fields::TX, status.change_tx.clone().unwrap_or_default());

        let locale = properties
            .get(&self.locale_property)
            .and_then(PropertyValue::as_text)
            .unwrap_or(self.default_locale.as_str())
            .to_string();
        let ctx = EmitContext {
            node,
            content: self.collaborators.content.as_ref(),
            locale: &locale,
            atomic_only: !options.index_all,
            max_transformation_cost: self.max_transformation_cost,
        };
        let mut all_atomic = true;
        for (name, value) in &properties {
            let def = self.dictionary().property(name).unwrap_or_else(|| residual_definition(name));
            let handler = PropertyHandler::for_type(def.data_type);
            all_atomic &= handler.emit(&ctx, &def, value, &mut leaf)?;
        }

        if is_root {
            leaf.keyword(fields::ISROOT, fields::TRUE);
            leaf.keyword(fields::ISCONTAINER, fields::TRUE);
            leaf.keyword(fields::PATH, "");
            leaf.keyword(fields::QNAME, "");
            leaf.keyword(fields::PRIMARYASSOCTYPEQNAME, model::assoc_children().to_string());
        } else {
            let mut links: Vec<(ChildAssocRef, Option<QName>)> =
                parents.iter().cloned().map(|assoc| (assoc, None)).collect();
            links.extend(self.category_paths(node, &aspects, &properties)?);
            self.add_structure(&mut leaf, links);

            let primary = self.graph().primary_parent(node)?;
            if let Some(parent) = &primary.parent {
                leaf.keyword(fields::PRIMARYPARENT, parent.to_string());
            }
            leaf.keyword(fields::PRIMARYASSOCTYPEQNAME, primary.assoc_type.to_string());
            leaf.keyword(fields::ISROOT, fields::FALSE);
        }

        leaf.keyword(fields::TYPE, node_type.to_string());
        for aspect in &aspects {
            leaf.keyword(fields::ASPECT, aspect.to_string());
        }
        leaf.keyword(fields::ISNODE, fields::TRUE);

        let pending = !all_atomic && !options.index_all && options.fts_status.is_pending();
        let fts_status = if pending { options.fts_status } else { FtsStatus::Clean };
        leaf.keyword(fields::FTSSTATUS, fts_status.as_str());

        let mut documents = vec![leaf];
        if options.include_containers && !is_root {
            self.container_documents(node, &node_type, &aspects, scope, lookup, &mut documents)?;
        }
        if options.cascade {
            self.cascade_containers(node, node, scope, lookup, &mut documents, 0)?;
        }

        Ok(Generated { documents, all_atomic })
    }

    /// One `PARENT`/`QNAME`/`ASSOCTYPEQNAME`/`LINKASPECT` group per distinct association.
    fn add_structure(&self, leaf: &mut Document, links: Vec<(ChildAssocRef, Option<QName>)>) {
        let mut seen = HashSet::new();
        for (assoc, link_aspect) in links {
            let key = (assoc.parent.clone(), assoc.assoc_type.clone(), assoc.qname.clone(), link_aspect.clone());
            if !seen.insert(key) {
                continue;
            }
            if let Some(parent) = &assoc.parent {
                leaf.keyword(fields::PARENT, parent.to_string());
            }
            if let Some(qname) = &assoc.qname {
                leaf.keyword(fields::QNAME, qname.to_string());
            }
            leaf.keyword(fields::ASSOCTYPEQNAME, assoc.assoc_type.to_string());
            leaf.keyword(
                fields::LINKASPECT,
                link_aspect.map(|a| a.to_string()).unwrap_or_default(),
            );
        }
    }

    /// Virtual parent links through the categories a classifiable aspect refers to.
    pub fn category_paths(
        &self,
        node: &NodeRef,
        aspects: &BTreeSet<QName>,
        properties: &std::collections::BTreeMap<QName, PropertyValue>,
    ) -> Result<Vec<(ChildAssocRef, Option<QName>)>> {
        let mut links = Vec::new();
        for aspect in aspects {
            if !self.dictionary().is_classifiable(aspect) {
                continue;
            }
            let Some(def) = self.dictionary().aspect(aspect) else { continue };
            for property in def.properties.values().filter(|p| p.data_type == DataType::Category) {
                let Some(value) = properties.get(&property.name) else { continue };
                for category in value.values() {
                    let category = match category {
                        PropertyValue::NodeRef(category) => category.clone(),
                        PropertyValue::Text(text) => match text.parse::<NodeRef>() {
                            Ok(category) => category,
                            Err(_) => continue,
                        },
                        _ => continue,
                    };
                    let paths = match self.graph().paths(&category) {
                        Ok(paths) => paths,
                        Err(err) if err.is_not_found() => {
                            tracing::debug!(node = %node, category = %category, "category no longer exists");
                            continue;
                        }
                        Err(err) => return Err(err),
                    };
                    for path in paths {
                        let Some(last) = path.last() else { continue };
                        let assoc = ChildAssocRef {
                            assoc_type: last.assoc_type.clone(),
                            parent: Some(category.clone()),
                            qname: Some(model::category_member()),
                            child: node.clone(),
                            primary: false,
                        };
                        links.push((assoc, Some(aspect.clone())));
                    }
                }
            }
        }
        Ok(links)
    }

    /// Container documents of `node` and of any ancestor that lacks one.
    pub fn container_documents(
        &self,
        node: &NodeRef,
        node_type: &QName,
        aspects: &BTreeSet<QName>,
        scope: &mut FlushScope,
        lookup: Option<&dyn ContainerLookup>,
        out: &mut Vec<Document>,
    ) -> Result<()> {
        let paths = self.graph().paths(node)?;
        let qualifies = self.container_qualifies(node, node_type, aspects, scope)?;
        let is_category = self.dictionary().is_category(node_type);

        for path in &paths {
            let rendered = path.to_index_string();
            if scope.mark_processed(node, &rendered) && qualifies {
                out.push(container_doc(node, path, &rendered, is_category));
            }

            // Ancestors between the root element and the node itself
            for len in 2..path.len() {
                let ancestor = &path.elements[len - 1].child;
                let prefix = path.prefix(len);
                let rendered = prefix.to_index_string();
                if !scope.mark_processed(ancestor, &rendered) {
                    continue;
                }
                if lookup.is_some_and(|l| l.has_live_container(ancestor, &rendered)) {
                    continue;
                }
                let (ancestor_type, ancestor_aspects) = match self.class_of(ancestor) {
                    Ok(class) => class,
                    Err(err) if err.is_not_found() => continue,
                    Err(err) => return Err(err),
                };
                if self.container_qualifies(ancestor, &ancestor_type, &ancestor_aspects, scope)? {
                    let is_category = self.dictionary().is_category(&ancestor_type);
                    out.push(container_doc(ancestor, &prefix, &rendered, is_category));
                }
            }
        }
        Ok(())
    }

    /// Container documents of the descendants of `origin` that are not live.
    fn cascade_containers(
        &self,
        origin: &NodeRef,
        node: &NodeRef,
        scope: &mut FlushScope,
        lookup: Option<&dyn ContainerLookup>,
        out: &mut Vec<Document>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(Error::invalid_state(format!("hierarchy too deep below {}", origin)));
        }
        for assoc in self.graph().child_assocs(node)? {
            let child = &assoc.child;
            let (paths, class) = match self.graph().paths(child).and_then(|p| Ok((p, self.class_of(child)?))) {
                Ok(found) => found,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            let (child_type, child_aspects) = class;
            let qualifies = self.container_qualifies(child, &child_type, &child_aspects, scope)?;
            let is_category = self.dictionary().is_category(&child_type);

            let mut fresh = false;
            for path in &paths {
                let rendered = path.to_index_string();
                if !scope.mark_processed(child, &rendered) {
                    continue;
                }
                fresh = true;
                if qualifies && !lookup.is_some_and(|l| l.has_live_container(child, &rendered)) {
                    out.push(container_doc(child, path, &rendered, is_category));
                }
            }
            if fresh {
                self.cascade_containers(origin, child, scope, lookup, out, depth + 1)?;
            }
        }
        Ok(())
    }

    fn class_of(&self, node: &NodeRef) -> Result<(QName, BTreeSet<QName>)> {
        Ok((self.graph().node_type(node)?, self.graph().aspects(node)?))
    }

    /// Whether the node's type or any of its aspects declares child associations.
    pub fn may_have_children(&self, node_type: &QName, aspects: &BTreeSet<QName>) -> bool {
        let mut current = self.dictionary().type_def(node_type);
        while let Some(def) = current {
            if def.can_have_children() {
                return true;
            }
            current = def.parent.as_ref().and_then(|p| self.dictionary().type_def(p));
        }
        aspects
            .iter()
            .filter_map(|a| self.dictionary().aspect(a))
            .any(|def| def.can_have_children())
    }

    fn container_qualifies(
        &self,
        node: &NodeRef,
        node_type: &QName,
        aspects: &BTreeSet<QName>,
        scope: &mut FlushScope,
    ) -> Result<bool> {
        if !self.may_have_children(node_type, aspects) {
            return Ok(false);
        }
        if self.always_indexed.iter().any(|t| self.dictionary().is_subtype(node_type, t)) {
            return Ok(true);
        }
        if let Some(has_children) = scope.children.get(node) {
            return Ok(*has_children);
        }
        let has_children = !self.graph().child_assocs(node)?.is_empty();
        scope.children.put(node.clone(), has_children);
        Ok(has_children)
    }
}

const MAX_CASCADE_DEPTH: usize = 256;

fn container_doc(node: &NodeRef, path: &Path, rendered: &str, is_category: bool) -> Document {
    let mut doc = Document::of_type(DocType::Container, &node.to_string());
    doc.keyword(fields::PATH, rendered);
    for ancestor in path.nodes_self_first() {
        doc.keyword(fields::ANCESTOR, ancestor.to_string());
    }
    doc.keyword(fields::ISCONTAINER, fields::TRUE);
    if is_category {
        doc.keyword(fields::ISCATEGORY, fields::TRUE);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::memory::InMemoryContentStore;
    use crate::core::types::StoreRef;
    use crate::graph::memory::InMemoryGraph;
    use crate::schema::dictionary::PropertyDefinition;
    use crate::schema::memory::InMemoryDictionary;

    struct Fixture {
        graph: Arc<InMemoryGraph>,
        dictionary: Arc<InMemoryDictionary>,
        generator: DocumentGenerator,
        root: NodeRef,
    }

    fn fixture() -> Fixture {
        let graph = Arc::new(InMemoryGraph::new());
        let dictionary = Arc::new(InMemoryDictionary::with_defaults());
        let content = Arc::new(InMemoryContentStore::new());
        let root = graph.create_store(&StoreRef::new("workspace", "test"));
        let generator = DocumentGenerator::new(
            Collaborators {
                graph: graph.clone(),
                dictionary: dictionary.clone(),
                content,
            },
            &Config::default(),
        )
        .unwrap();
        Fixture { graph, dictionary, generator, root }
    }

    fn scope() -> FlushScope {
        FlushScope::new(NonZeroUsize::new(16).unwrap())
    }

    fn child(f: &Fixture, parent: &NodeRef, name: &str, node_type: QName) -> NodeRef {
        f.graph
            .create_node(parent, model::assoc_contains(), QName::new("cm", name), node_type)
            .unwrap()
            .child
    }

    fn containers(generated: &Generated) -> Vec<(String, String)> {
        generated
            .documents
            .iter()
            .filter(|d| d.doc_type() == Some(DocType::Container))
            .map(|d| (d.id().unwrap_or_default().to_string(), d.get(fields::PATH).unwrap_or_default().to_string()))
            .collect()
    }

    #[test]
    fn leaf_carries_structure_and_clean_status() {
        let f = fixture();
        let folder = child(&f, &f.root, "docs", model::type_folder());
        let file = child(&f, &folder, "a.txt", model::type_content());
        f.graph.set_property(&file, model::prop_name(), PropertyValue::text("a.txt")).unwrap();

        let generated = f.generator.generate(&file, &GenerateOptions::index(), &mut scope(), None).unwrap();
        let leaf = &generated.documents[0];

        assert!(generated.all_atomic);
        assert_eq!(leaf.get(fields::PARENT), Some(folder.to_string().as_str()));
        assert_eq!(leaf.get(fields::QNAME), Some("{cm}a.txt"));
        assert_eq!(leaf.get(fields::PRIMARYPARENT), Some(folder.to_string().as_str()));
        assert_eq!(leaf.get(fields::TYPE), Some("{cm}content"));
        assert_eq!(leaf.get(fields::ISROOT), Some("F"));
        assert_eq!(leaf.fts_status(), Some(FtsStatus::Clean));
        // Ancestor folder has a child, so it gets a container document
        assert_eq!(containers(&generated), vec![(folder.to_string(), "{cm}docs".to_string())]);
    }

    #[test]
    fn empty_folder_is_still_a_container() {
        let f = fixture();
        let folder = child(&f, &f.root, "empty", model::type_folder());
        let generated = f.generator.generate(&folder, &GenerateOptions::index(), &mut scope(), None).unwrap();
        assert_eq!(containers(&generated), vec![(folder.to_string(), "{cm}empty".to_string())]);
    }

    #[test]
    fn processed_paths_are_not_regenerated_within_a_flush() {
        let f = fixture();
        let folder = child(&f, &f.root, "docs", model::type_folder());
        let a = child(&f, &folder, "a", model::type_content());
        let b = child(&f, &folder, "b", model::type_content());
        let mut scope = scope();

        let first = f.generator.generate(&a, &GenerateOptions::index(), &mut scope, None).unwrap();
        let second = f.generator.generate(&b, &GenerateOptions::index(), &mut scope, None).unwrap();
        assert_eq!(containers(&first).len(), 1);
        assert!(containers(&second).is_empty());
    }

    #[test]
    fn non_atomic_property_marks_the_leaf_pending() {
        let f = fixture();
        let note = QName::new("cm", "note");
        f.dictionary.register_property(PropertyDefinition::new(note.clone(), DataType::Text).with_atomic(false));
        let file = child(&f, &f.root, "a", model::type_content());
        f.graph.set_property(&file, note, PropertyValue::text("deferred words")).unwrap();

        let generated = f.generator.generate(&file, &GenerateOptions::index(), &mut scope(), None).unwrap();
        assert!(!generated.all_atomic);
        assert_eq!(generated.documents[0].fts_status(), Some(FtsStatus::New));
        assert!(generated.documents[0].get("@{cm}note").is_none());

        let generated = f.generator.generate(&file, &GenerateOptions::backlog(), &mut scope(), None).unwrap();
        assert_eq!(generated.documents.len(), 1);
        assert_eq!(generated.documents[0].fts_status(), Some(FtsStatus::Clean));
        assert!(generated.documents[0].get("@{cm}note").is_some());
    }

    #[test]
    fn excluded_node_produces_nothing() {
        let f = fixture();
        let file = child(&f, &f.root, "secret", model::type_content());
        f.graph
            .set_property(&file, model::prop_exclude_from_index(), PropertyValue::Boolean(true))
            .unwrap();
        let generated = f.generator.generate(&file, &GenerateOptions::reindex(), &mut scope(), None).unwrap();
        assert!(generated.documents.is_empty());
    }

    #[test]
    fn missing_node_yields_marker_only_when_asked() {
        let f = fixture();
        let file = child(&f, &f.root, "gone", model::type_content());
        f.graph.delete_node(&file).unwrap();

        let err = f.generator.generate(&file, &GenerateOptions::reindex(), &mut scope(), None).unwrap_err();
        assert!(err.is_not_found());

        let options = GenerateOptions {
            marker_on_missing: true,
            ..GenerateOptions::cascade_reindex()
        };
        let generated = f.generator.generate(&file, &options, &mut scope(), None).unwrap();
        assert_eq!(generated.documents.len(), 1);
        assert_eq!(generated.documents[0].doc_type(), Some(DocType::Marker));
        assert_eq!(generated.documents[0].fts_status(), Some(FtsStatus::Dirty));
    }

    #[test]
    fn cascade_regenerates_descendant_containers_below_the_node() {
        let f = fixture();
        let top = child(&f, &f.root, "top", model::type_folder());
        let mid = child(&f, &top, "mid", model::type_folder());
        let low = child(&f, &mid, "low", model::type_folder());
        let other = child(&f, &f.root, "other", model::type_folder());
        f.graph.add_child(&other, &low, model::assoc_contains(), QName::new("cm", "alias")).unwrap();

        // The alias path below `other` is still live, so only paths through `top` come back
        let lookup = LiveContainers(vec![(low.clone(), "{cm}other/{cm}alias".to_string())]);
        let generated = f
            .generator
            .generate(&top, &GenerateOptions::cascade_reindex(), &mut scope(), Some(&lookup))
            .unwrap();
        let mut found = containers(&generated);
        found.sort();
        let mut expected = vec![
            (top.to_string(), "{cm}top".to_string()),
            (mid.to_string(), "{cm}top/{cm}mid".to_string()),
            (low.to_string(), "{cm}top/{cm}mid/{cm}low".to_string()),
        ];
        expected.sort();
        assert_eq!(found, expected);
    }

    struct LiveContainers(Vec<(NodeRef, String)>);

    impl ContainerLookup for LiveContainers {
        fn has_live_container(&self, node: &NodeRef, path: &str) -> bool {
            self.0.iter().any(|(n, p)| n == node && p == path)
        }
    }

    #[test]
    fn category_membership_adds_virtual_parent() {
        let f = fixture();
        let categories = child(&f, &f.root, "categories", model::type_category());
        let region = f
            .graph
            .create_node(&categories, model::assoc_subcategories(), QName::new("cm", "Europe"), model::type_category())
            .unwrap()
            .child;
        let file = child(&f, &f.root, "report", model::type_content());
        f.graph.add_aspect(&file, model::aspect_classifiable()).unwrap();
        f.graph
            .set_property(&file, model::prop_categories(), PropertyValue::List(vec![PropertyValue::NodeRef(region.clone())]))
            .unwrap();

        let generated = f.generator.generate(&file, &GenerateOptions::index(), &mut scope(), None).unwrap();
        let leaf = &generated.documents[0];
        let parents: Vec<&str> = leaf.get_all(fields::PARENT).collect();
        assert!(parents.contains(&region.to_string().as_str()));
        assert!(leaf.get_all(fields::LINKASPECT).any(|a| a == "{cm}classifiable"));
        assert!(leaf.get_all(fields::QNAME).any(|q| q == "{cm}member"));
    }

    #[test]
    fn root_leaf_is_flagged() {
        let f = fixture();
        let generated = f.generator.generate(&f.root, &GenerateOptions::index(), &mut scope(), None).unwrap();
        let leaf = &generated.documents[0];
        assert_eq!(leaf.get(fields::ISROOT), Some("T"));
        assert_eq!(leaf.get(fields::PATH), Some(""));
        assert_eq!(generated.documents.len(), 1);
    }
}
