use std::collections::{BTreeMap, BTreeSet};
use crate::core::error::Result;
use crate::core::types::{ChildAssocRef, NodeRef, Path, PropertyValue, QName, StoreRef};

/// Existence and last-change information for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub exists: bool,
    pub deleted: bool,
    /// Id of the graph transaction that last changed (or deleted) the node
    pub change_tx: Option<String>,
}

/// Read access to the content graph.
///
/// Calls on a node that no longer exists return an error of kind
/// `Consistency`; `node_status` never fails for a missing node.
pub trait NodeService: Send + Sync {
    fn root_node(&self, store: &StoreRef) -> Result<NodeRef>;

    fn node_status(&self, node: &NodeRef) -> Result<NodeStatus>;

    fn exists(&self, node: &NodeRef) -> bool {
        self.node_status(node).map(|s| s.exists).unwrap_or(false)
    }

    fn properties(&self, node: &NodeRef) -> Result<BTreeMap<QName, PropertyValue>>;

    fn property(&self, node: &NodeRef, name: &QName) -> Result<Option<PropertyValue>> {
        Ok(self.properties(node)?.remove(name))
    }

    fn node_type(&self, node: &NodeRef) -> Result<QName>;

    fn aspects(&self, node: &NodeRef) -> Result<BTreeSet<QName>>;

    /// Every parent association, primary and secondary.
    fn parent_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssocRef>>;

    fn child_assocs(&self, node: &NodeRef) -> Result<Vec<ChildAssocRef>>;

    /// Every route from the store root to the node.
    fn paths(&self, node: &NodeRef) -> Result<Vec<Path>>;

    fn primary_parent(&self, node: &NodeRef) -> Result<ChildAssocRef>;
}
