use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use parking_lot::RwLock;
use uuid::Uuid;
use crate::core::error::{Error, Result};
use crate::core::types::{ChildAssocRef, NodeRef, Path, PropertyValue, QName, StoreRef};
use crate::graph::service::{NodeService, NodeStatus};
use crate::schema::model;

const MAX_PATH_DEPTH: usize = 256;

#[derive(Debug, Clone)]
struct NodeEntry {
    node_type: QName,
    aspects: BTreeSet<QName>,
    properties: BTreeMap<QName, PropertyValue>,
    parents: Vec<ChildAssocRef>,
    change_tx: String,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<NodeRef, NodeEntry>,
    deleted: HashMap<NodeRef, String>,
    roots: HashMap<StoreRef, NodeRef>,
    current_tx: String,
}

impl GraphState {
    fn entry(&self, node: &NodeRef) -> Result<&NodeEntry> {
        self.nodes
            .get(node)
            .ok_or_else(|| Error::consistency(format!("node does not exist: {}", node)))
    }

    fn entry_mut(&mut self, node: &NodeRef) -> Result<&mut NodeEntry> {
        self.nodes
            .get_mut(node)
            .ok_or_else(|| Error::consistency(format!("node does not exist: {}", node)))
    }

    fn touch(&mut self, node: &NodeRef) -> Result<()> {
        let tx = self.current_tx.clone();
        self.entry_mut(node)?.change_tx = tx;
        Ok(())
    }

    fn children_of(&self, node: &NodeRef) -> Vec<ChildAssocRef> {
        let mut children: Vec<ChildAssocRef> = self
            .nodes
            .values()
            .flat_map(|e| e.parents.iter())
            .filter(|a| a.parent.as_ref() == Some(node))
            .cloned()
            .collect();
        children.sort();
        children
    }

    fn paths_of(&self, node: &NodeRef, depth: usize) -> Result<Vec<Path>> {
        if depth > MAX_PATH_DEPTH {
            return Err(Error::invalid_state(format!("cyclic hierarchy at {}", node)));
        }
        let entry = self.entry(node)?;
        if entry.parents.is_empty() {
            if self.roots.get(&node.store) == Some(node) {
                return Ok(vec![Path::new(vec![ChildAssocRef::root(
                    node.clone(),
                    model::assoc_children(),
                )])]);
            }
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for assoc in &entry.parents {
            let Some(parent) = &assoc.parent else { continue };
            for mut path in self.paths_of(parent, depth + 1)? {
                path.append(assoc.clone());
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Thread-safe in-memory content graph.
///
/// Every mutation stamps the touched node with the current graph
/// transaction id (see [`InMemoryGraph::set_transaction`]).
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraph {
    pub fn new() -> Self {
        InMemoryGraph {
            state: RwLock::new(GraphState {
                current_tx: "1".to_string(),
                ..GraphState::default()
            }),
        }
    }

    /// Sets the transaction id stamped on subsequently changed nodes.
    pub fn set_transaction(&self, tx: impl Into<String>) {
        self.state.write().current_tx = tx.into();
    }

    /// Creates (or returns) the root node of a store.
    pub fn create_store(&self, store: &StoreRef) -> NodeRef {
        let mut state = self.state.write();
        if let Some(root) = state.roots.get(store) {
            return root.clone();
        }
        let root = NodeRef::new(store.clone(), "root");
        let entry = NodeEntry {
            node_type: model::type_store_root(),
            aspects: BTreeSet::new(),
            properties: BTreeMap::new(),
            parents: Vec::new(),
            change_tx: state.current_tx.clone(),
        };
        state.nodes.insert(root.clone(), entry);
        state.roots.insert(store.clone(), root.clone());
        root
    }

    pub fn create_node(
        &self,
        parent: &NodeRef,
        assoc_type: QName,
        qname: QName,
        node_type: QName,
    ) -> Result<ChildAssocRef> {
        let id = Uuid::new_v4().to_string();
        self.create_node_with_id(parent, &id, assoc_type, qname, node_type)
    }

    pub fn create_node_with_id(
        &self,
        parent: &NodeRef,
        id: &str,
        assoc_type: QName,
        qname: QName,
        node_type: QName,
    ) -> Result<ChildAssocRef> {
        let mut state = self.state.write();
        state.entry(parent)?;
        let child = NodeRef::new(parent.store.clone(), id);
        if state.nodes.contains_key(&child) {
            return Err(Error::invalid_argument(format!("node already exists: {}", child)));
        }
        let assoc = ChildAssocRef {
            assoc_type,
            parent: Some(parent.clone()),
            qname: Some(qname),
            child: child.clone(),
            primary: true,
        };
        let entry = NodeEntry {
            node_type,
            aspects: BTreeSet::new(),
            properties: BTreeMap::new(),
            parents: vec![assoc.clone()],
            change_tx: state.current_tx.clone(),
        };
        state.deleted.remove(&child);
        state.nodes.insert(child, entry);
        Ok(assoc)
    }

    /// Files an existing node under another parent (secondary association).
    pub fn add_child(
        &self,
        parent: &NodeRef,
        child: &NodeRef,
        assoc_type: QName,
        qname: QName,
    ) -> Result<ChildAssocRef> {
        let mut state = self.state.write();
        state.entry(parent)?;
        let assoc = ChildAssocRef {
            assoc_type,
            parent: Some(parent.clone()),
            qname: Some(qname),
            child: child.clone(),
            primary: false,
        };
        state.entry_mut(child)?.parents.push(assoc.clone());
        state.touch(child)?;
        Ok(assoc)
    }

    /// Removes a secondary association.
    pub fn remove_child_assoc(&self, assoc: &ChildAssocRef) -> Result<()> {
        if assoc.primary {
            return Err(Error::invalid_argument("primary associations are removed by deleting the node"));
        }
        let mut state = self.state.write();
        let entry = state.entry_mut(&assoc.child)?;
        let before = entry.parents.len();
        entry.parents.retain(|a| a != assoc);
        if entry.parents.len() == before {
            return Err(Error::invalid_argument(format!("no such association for {}", assoc.child)));
        }
        state.touch(&assoc.child)
    }

    /// Re-parents a node; returns the primary association before and after.
    pub fn move_node(
        &self,
        node: &NodeRef,
        new_parent: &NodeRef,
        qname: QName,
    ) -> Result<(ChildAssocRef, ChildAssocRef)> {
        let mut state = self.state.write();
        state.entry(new_parent)?;
        let entry = state.entry_mut(node)?;
        let index = entry
            .parents
            .iter()
            .position(|a| a.primary)
            .ok_or_else(|| Error::invalid_argument(format!("node has no primary parent: {}", node)))?;
        let before = entry.parents[index].clone();
        let after = ChildAssocRef {
            assoc_type: before.assoc_type.clone(),
            parent: Some(new_parent.clone()),
            qname: Some(qname),
            child: node.clone(),
            primary: true,
        };
        entry.parents[index] = after.clone();
        state.touch(node)?;
        Ok((before, after))
    }

    /// Deletes a node with its primary subtree; returns the removed primary association.
    pub fn delete_node(&self, node: &NodeRef) -> Result<ChildAssocRef> {
        let mut state = self.state.write();
        let primary = state
            .entry(node)?
            .parents
            .iter()
            .find(|a| a.primary)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("cannot delete a store root: {}", node)))?;

        let mut doomed: HashSet<NodeRef> = HashSet::new();
        let mut stack = vec![node.clone()];
        while let Some(current) = stack.pop() {
            if !doomed.insert(current.clone()) {
                continue;
            }
            for child in state.children_of(&current) {
                if child.primary {
                    stack.push(child.child);
                }
            }
        }

        let tx = state.current_tx.clone();
        for gone in &doomed {
            state.nodes.remove(gone);
            state.deleted.insert(gone.clone(), tx.clone());
        }
        let mut touched = Vec::new();
        for (survivor, entry) in state.nodes.iter_mut() {
            let before = entry.parents.len();
            entry
                .parents
                .retain(|a| a.parent.as_ref().map_or(true, |p| !doomed.contains(p)));
            if entry.parents.len() != before {
                touched.push(survivor.clone());
            }
        }
        for survivor in touched {
            state.touch(&survivor)?;
        }
        Ok(primary)
    }

    pub fn set_property(&self, node: &NodeRef, name: QName, value: PropertyValue) -> Result<()> {
        let mut state = self.state.write();
        state.entry_mut(node)?.properties.insert(name, value);
        state.touch(node)
    }

    pub fn remove_property(&self, node: &NodeRef, name: &QName) -> Result<()> {
        let mut state = self.state.write();
        state.entry_mut(node)?.properties.remove(name);
        state.touch(node)
    }

    pub fn add_aspect(&self, node: &NodeRef, aspect: QName) -> Result<()> {
        let mut state = self.state.write();
        state.entry_mut(node)?.aspects.insert(aspect);
        state.touch(node)
    }
}

impl NodeService for InMemoryGraph {
    fn root_node(&self, store: &StoreRef) -> Result<NodeRef> {
        self.state
            .read()
            .roots
            .get(store)
            .cloned()
            .ok_or_else(|| Error::consistency(format!("store does not exist: {}", store)))
    }

    fn node_status(&self, node: &NodeRef) -> Result<NodeStatus> {
        let state = self.state.read();
        if let Some(entry) = state.nodes.get(node) {
            return Ok(NodeStatus {
                exists: true,
                deleted: false,
                change_tx: Some(entry.change_tx.clone()),
            });
        }
        Ok(match state.deleted.get(node) {
            Some(tx) => NodeStatus { exists: false, deleted: true, change_tx: Some(tx.clone()) },
            None => NodeStatus { exists: false, deleted: false, change_tx: None },
        })
    }

    fn properties(&self, node: &NodeRef) -> Result<BTreeMap<QName, PropertyValue>> {
        Ok(self.state.read().entry(node)?.properties.clone())
    }

    fn node_type(&self, node: &NodeRef) -> Result<QName> {
        Ok(self.state.read().entry(node)?.node_type.clone())
    }

    fn aspects(&self, node: &NodeRef) -> Result<BTreeSet<QName>> {
        Ok(self.state.read().entry(node)?.aspects.clone())
    }

    fn parent_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssocRef>> {
        Ok(self.state.read().entry(node)?.parents.clone())
    }

    fn child_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssocRef>> {
        let state = self.state.read();
        state.entry(node)?;
        Ok(state.children_of(node))
    }

    fn paths(&self, node: &NodeRef) -> Result<Vec<Path>> {
        self.state.read().paths_of(node, 0)
    }

    fn primary_parent(&self, node: &NodeRef) -> Result<ChildAssocRef> {
        let state = self.state.read();
        let entry = state.entry(node)?;
        if let Some(primary) = entry.parents.iter().find(|a| a.primary) {
            return Ok(primary.clone());
        }
        Ok(ChildAssocRef::root(node.clone(), model::assoc_children()))
    }
}
