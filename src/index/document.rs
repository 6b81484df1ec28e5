use serde::{Deserialize, Serialize};

/// Well-known field names
pub mod fields {
    pub const ID: &str = "ID";
    pub const TX: &str = "TX";
    pub const DOCTYPE: &str = "DOCTYPE";
    pub const PARENT: &str = "PARENT";
    pub const QNAME: &str = "QNAME";
    pub const ASSOCTYPEQNAME: &str = "ASSOCTYPEQNAME";
    pub const LINKASPECT: &str = "LINKASPECT";
    pub const PRIMARYPARENT: &str = "PRIMARYPARENT";
    pub const PRIMARYASSOCTYPEQNAME: &str = "PRIMARYASSOCTYPEQNAME";
    pub const TYPE: &str = "TYPE";
    pub const ASPECT: &str = "ASPECT";
    pub const ISROOT: &str = "ISROOT";
    pub const ISNODE: &str = "ISNODE";
    pub const ISCONTAINER: &str = "ISCONTAINER";
    pub const ISCATEGORY: &str = "ISCATEGORY";
    pub const PATH: &str = "PATH";
    pub const ANCESTOR: &str = "ANCESTOR";
    pub const FTSSTATUS: &str = "FTSSTATUS";

    pub const TRUE: &str = "T";
    pub const FALSE: &str = "F";

    /// Field name for a property: `@{namespace}local`
    pub fn property(name: &crate::core::types::QName) -> String {
        format!("@{}", name)
    }
}

/// Marker terms recorded in place of a value that could not be indexed
pub mod not_indexed {
    pub const NO_TYPE_CONVERSION: &str = "__NOT_INDEXED_NO_TYPE_CONVERSION__";
    pub const NO_TRANSFORMATION: &str = "__NOT_INDEXED_NO_TRANSFORMATION__";
    pub const TRANSFORMATION_FAILED: &str = "__NOT_INDEXED_TRANSFORMATION_FAILED__";
    pub const CONTENT_MISSING: &str = "__NOT_INDEXED_CONTENT_MISSING__";
}

/// Kind of index document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    /// The leaf document of a node
    Node,
    /// A path document of a container node, one per path
    Container,
    /// Stand-in left for a deleted node with outstanding backlog work
    Marker,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Node => "node",
            DocType::Container => "container",
            DocType::Marker => "marker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "node" => Some(DocType::Node),
            "container" => Some(DocType::Container),
            "marker" => Some(DocType::Marker),
            _ => None,
        }
    }

    /// Leaf-scoped documents are masked by the leaf deletion set.
    pub fn is_leaf_scope(&self) -> bool {
        matches!(self, DocType::Node | DocType::Marker)
    }
}

/// Which of a node's documents a deletion masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionScope {
    /// Leaf document and deferred-indexing marker
    Leaf,
    /// Container/path documents
    Container,
}

impl DeletionScope {
    pub fn covers(&self, doc_type: DocType) -> bool {
        match self {
            DeletionScope::Leaf => doc_type.is_leaf_scope(),
            DeletionScope::Container => doc_type == DocType::Container,
        }
    }
}

/// Full-text indexing state of a leaf document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FtsStatus {
    Clean,
    New,
    Dirty,
}

impl FtsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FtsStatus::Clean => "Clean",
            FtsStatus::New => "New",
            FtsStatus::Dirty => "Dirty",
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, FtsStatus::Clean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldOptions {
    pub stored: bool,
    pub indexed: bool,
    pub tokenized: bool,
}

impl FieldOptions {
    /// Stored, indexed as a single exact term
    pub const KEYWORD: FieldOptions = FieldOptions { stored: true, indexed: true, tokenized: false };
    /// Indexed as a single exact term, not stored
    pub const UNSTORED_KEYWORD: FieldOptions = FieldOptions { stored: false, indexed: true, tokenized: false };
    /// Stored and analyzed
    pub const TEXT: FieldOptions = FieldOptions { stored: true, indexed: true, tokenized: true };
    pub const UNSTORED_TEXT: FieldOptions = FieldOptions { stored: false, indexed: true, tokenized: true };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub options: FieldOptions,
}

/// A flat list of fields; names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn of_type(doc_type: DocType, id: &str) -> Self {
        let mut doc = Document::new();
        doc.keyword(fields::ID, id);
        doc.keyword(fields::DOCTYPE, doc_type.as_str());
        doc
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>, options: FieldOptions) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            options,
        });
    }

    pub fn keyword(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.add(name, value, FieldOptions::KEYWORD);
    }

    /// First value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields.iter().filter(move |f| f.name == name).map(|f| f.value.as_str())
    }

    pub fn has(&self, name: &str, value: &str) -> bool {
        self.fields.iter().any(|f| f.name == name && f.value == value)
    }

    pub fn remove_fields(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    pub fn id(&self) -> Option<&str> {
        self.get(fields::ID)
    }

    pub fn doc_type(&self) -> Option<DocType> {
        self.get(fields::DOCTYPE).and_then(DocType::parse)
    }

    pub fn fts_status(&self) -> Option<FtsStatus> {
        match self.get(fields::FTSSTATUS)? {
            "Clean" => Some(FtsStatus::Clean),
            "New" => Some(FtsStatus::New),
            "Dirty" => Some(FtsStatus::Dirty),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_fields_are_kept_in_order() {
        let mut doc = Document::of_type(DocType::Container, "workspace://s/n1");
        doc.keyword(fields::ANCESTOR, "a");
        doc.keyword(fields::ANCESTOR, "b");
        assert_eq!(doc.get_all(fields::ANCESTOR).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.doc_type(), Some(DocType::Container));
        doc.remove_fields(fields::ANCESTOR);
        assert!(doc.get(fields::ANCESTOR).is_none());
    }
}
