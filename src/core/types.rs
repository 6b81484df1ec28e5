use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Ordinal of a document inside one segment or delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

/// Identifies one store (one main index).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreRef {
    pub protocol: String,
    pub identifier: String,
}

impl StoreRef {
    pub fn new(protocol: impl Into<String>, identifier: impl Into<String>) -> Self {
        StoreRef {
            protocol: protocol.into(),
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.identifier)
    }
}

/// Opaque reference to a content-graph node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub store: StoreRef,
    pub id: String,
}

impl NodeRef {
    pub fn new(store: StoreRef, id: impl Into<String>) -> Self {
        NodeRef { store, id: id.into() }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.id)
    }
}

impl FromStr for NodeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (protocol, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::invalid_argument(format!("malformed node reference: {}", s)))?;
        let (identifier, id) = rest
            .split_once('/')
            .ok_or_else(|| Error::invalid_argument(format!("malformed node reference: {}", s)))?;
        if protocol.is_empty() || identifier.is_empty() || id.is_empty() {
            return Err(Error::invalid_argument(format!("malformed node reference: {}", s)));
        }
        Ok(NodeRef::new(StoreRef::new(protocol, identifier), id))
    }
}

/// Namespace-qualified name, rendered as `{namespace}local`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

impl FromStr for QName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('{')
            .ok_or_else(|| Error::invalid_argument(format!("malformed qualified name: {}", s)))?;
        let (namespace, local) = rest
            .split_once('}')
            .ok_or_else(|| Error::invalid_argument(format!("malformed qualified name: {}", s)))?;
        Ok(QName::new(namespace, local))
    }
}

/// A parent/child association. The root association of a store has no parent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChildAssocRef {
    pub assoc_type: QName,
    pub parent: Option<NodeRef>,
    pub qname: Option<QName>,
    pub child: NodeRef,
    pub primary: bool,
}

impl ChildAssocRef {
    pub fn root(child: NodeRef, assoc_type: QName) -> Self {
        ChildAssocRef {
            assoc_type,
            parent: None,
            qname: None,
            child,
            primary: true,
        }
    }
}

/// One route from the store root down to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Path {
    pub elements: Vec<ChildAssocRef>,
}

impl Path {
    pub fn new(elements: Vec<ChildAssocRef>) -> Self {
        Path { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&ChildAssocRef> {
        self.elements.last()
    }

    pub fn append(&mut self, element: ChildAssocRef) {
        self.elements.push(element);
    }

    /// Path made of the first `len` elements.
    pub fn prefix(&self, len: usize) -> Path {
        Path::new(self.elements[..len.min(self.elements.len())].to_vec())
    }

    /// Nodes along the path, deepest first (the path's own node leads).
    pub fn nodes_self_first(&self) -> Vec<NodeRef> {
        self.elements.iter().rev().map(|e| e.child.clone()).collect()
    }

    /// Rendering used for `PATH` terms: no leading slash, root is the empty string.
    pub fn to_index_string(&self) -> String {
        self.elements
            .iter()
            .skip(1)
            .map(|e| e.qname.as_ref().map(|q| q.to_string()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.to_index_string())
    }
}

/// Metadata of a content property; the bytes live in the content service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentData {
    pub url: String,
    pub mimetype: Option<String>,
    pub encoding: String,
    pub size: u64,
    pub locale: Option<String>,
}

impl ContentData {
    pub fn new(url: impl Into<String>, mimetype: impl Into<String>, size: u64) -> Self {
        ContentData {
            url: url.into(),
            mimetype: Some(mimetype.into()),
            encoding: "UTF-8".to_string(),
            size,
            locale: None,
        }
    }
}

/// A node property value as supplied by the content graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Text(String),
    /// Locale → text
    MlText(BTreeMap<String, String>),
    DateTime(DateTime<Utc>),
    Number(f64),
    Boolean(bool),
    NodeRef(NodeRef),
    Content(ContentData),
    /// Opaque bytes with no string conversion
    Binary(Vec<u8>),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn text(value: impl Into<String>) -> Self {
        PropertyValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Flattens lists; scalars yield themselves.
    pub fn values(&self) -> Vec<&PropertyValue> {
        match self {
            PropertyValue::List(items) => items.iter().flat_map(|v| v.values()).collect(),
            other => vec![other],
        }
    }

    /// String form used for indexing. `Ok(None)` means nothing to index.
    pub fn to_index_string(&self) -> Result<Option<String>> {
        match self {
            PropertyValue::Null => Ok(None),
            PropertyValue::Text(s) => Ok(Some(s.clone())),
            PropertyValue::MlText(values) => Ok(values.values().next().cloned()),
            PropertyValue::DateTime(dt) => Ok(Some(dt.to_rfc3339())),
            PropertyValue::Number(n) => Ok(Some(n.to_string())),
            PropertyValue::Boolean(b) => Ok(Some(b.to_string())),
            PropertyValue::NodeRef(node) => Ok(Some(node.to_string())),
            PropertyValue::Content(data) => Ok(Some(data.url.clone())),
            PropertyValue::Binary(_) => Err(Error::schema("binary value has no string form")),
            PropertyValue::List(_) => Err(Error::schema("nested list has no string form")),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            PropertyValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}
