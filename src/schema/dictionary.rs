use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::types::QName;

/// How an indexed property value is tokenized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokeniseMode {
    True,
    False,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Content,
    MlText,
    Text,
    DateTime,
    Category,
    NodeRef,
    Other,
}

/// Indexing rules for one property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: QName,
    pub data_type: DataType,
    pub indexed: bool,
    pub stored: bool,
    pub tokenise: TokeniseMode,
    pub atomic: bool,   // false defers the property to the full-text backlog
}

impl PropertyDefinition {
    pub fn new(name: QName, data_type: DataType) -> Self {
        PropertyDefinition {
            name,
            data_type,
            indexed: true,
            stored: true,
            tokenise: TokeniseMode::True,
            atomic: data_type != DataType::Content,
        }
    }

    pub fn with_tokenise(mut self, tokenise: TokeniseMode) -> Self {
        self.tokenise = tokenise;
        self
    }

    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn with_stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }
}

/// A node type or an aspect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: QName,
    pub parent: Option<QName>,
    pub child_associations: Vec<QName>,
    pub properties: BTreeMap<QName, PropertyDefinition>,
}

impl ClassDefinition {
    pub fn new(name: QName) -> Self {
        ClassDefinition {
            name,
            parent: None,
            child_associations: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: QName) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_child_association(mut self, assoc: QName) -> Self {
        self.child_associations.push(assoc);
        self
    }

    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn can_have_children(&self) -> bool {
        !self.child_associations.is_empty()
    }
}

pub type TypeDefinition = ClassDefinition;
pub type AspectDefinition = ClassDefinition;

/// Schema lookups used while generating documents.
pub trait DictionaryService: Send + Sync {
    fn property(&self, name: &QName) -> Option<PropertyDefinition>;

    fn type_def(&self, name: &QName) -> Option<TypeDefinition>;

    fn aspect(&self, name: &QName) -> Option<AspectDefinition>;

    /// Whether `type_name` is `ancestor` or inherits from it.
    fn is_subtype(&self, type_name: &QName, ancestor: &QName) -> bool {
        let mut current = self.type_def(type_name);
        while let Some(def) = current {
            if &def.name == ancestor {
                return true;
            }
            current = def.parent.as_ref().and_then(|p| self.type_def(p));
        }
        false
    }

    fn is_subaspect(&self, aspect_name: &QName, ancestor: &QName) -> bool {
        let mut current = self.aspect(aspect_name);
        while let Some(def) = current {
            if &def.name == ancestor {
                return true;
            }
            current = def.parent.as_ref().and_then(|p| self.aspect(p));
        }
        false
    }

    fn is_category(&self, type_name: &QName) -> bool {
        self.is_subtype(type_name, &crate::schema::model::type_category())
    }

    /// Aspects whose category properties file the node under virtual paths.
    fn is_classifiable(&self, aspect_name: &QName) -> bool {
        self.is_subaspect(aspect_name, &crate::schema::model::aspect_classifiable())
    }
}
