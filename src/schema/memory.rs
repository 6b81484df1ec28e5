use std::collections::HashMap;
use parking_lot::RwLock;
use crate::core::types::QName;
use crate::schema::dictionary::{
    AspectDefinition, ClassDefinition, DataType, DictionaryService, PropertyDefinition, TokeniseMode,
    TypeDefinition,
};
use crate::schema::model;

/// Dictionary backed by in-memory maps.
pub struct InMemoryDictionary {
    types: RwLock<HashMap<QName, TypeDefinition>>,
    aspects: RwLock<HashMap<QName, AspectDefinition>>,
    properties: RwLock<HashMap<QName, PropertyDefinition>>,
}

impl Default for InMemoryDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDictionary {
    pub fn new() -> Self {
        InMemoryDictionary {
            types: RwLock::new(HashMap::new()),
            aspects: RwLock::new(HashMap::new()),
            properties: RwLock::new(HashMap::new()),
        }
    }

    /// Dictionary preloaded with the built-in content model.
    pub fn with_defaults() -> Self {
        let dictionary = Self::new();
        dictionary.register_defaults();
        dictionary
    }

    fn register_defaults(&self) {
        self.register_type(ClassDefinition::new(model::type_base()));
        self.register_type(
            ClassDefinition::new(model::type_store_root())
                .with_parent(model::type_base())
                .with_child_association(model::assoc_children()),
        );
        self.register_type(
            ClassDefinition::new(QName::new(model::CM, "cmobject"))
                .with_parent(model::type_base())
                .with_property(PropertyDefinition::new(model::prop_name(), DataType::Text))
                .with_property(PropertyDefinition::new(model::prop_created(), DataType::DateTime)),
        );
        self.register_type(
            ClassDefinition::new(model::type_folder())
                .with_parent(QName::new(model::CM, "cmobject"))
                .with_child_association(model::assoc_contains()),
        );
        self.register_type(
            ClassDefinition::new(model::type_content())
                .with_parent(QName::new(model::CM, "cmobject"))
                .with_property(PropertyDefinition::new(model::prop_content(), DataType::Content)),
        );
        self.register_type(
            ClassDefinition::new(model::type_category())
                .with_parent(model::type_base())
                .with_child_association(model::assoc_subcategories()),
        );
        self.register_aspect(
            ClassDefinition::new(model::aspect_titled())
                .with_property(
                    PropertyDefinition::new(model::prop_title(), DataType::MlText)
                        .with_tokenise(TokeniseMode::Both),
                )
                .with_property(PropertyDefinition::new(model::prop_description(), DataType::Text)),
        );
        self.register_aspect(
            ClassDefinition::new(model::aspect_classifiable())
                .with_property(PropertyDefinition::new(model::prop_categories(), DataType::Category)),
        );
        self.register_property(
            PropertyDefinition::new(model::prop_locale(), DataType::Other)
                .with_tokenise(TokeniseMode::False),
        );
        self.register_property(
            PropertyDefinition::new(model::prop_exclude_from_index(), DataType::Other)
                .with_tokenise(TokeniseMode::False),
        );
    }

    /// Registers a type and the properties it declares.
    pub fn register_type(&self, def: TypeDefinition) {
        for property in def.properties.values() {
            self.register_property(property.clone());
        }
        self.types.write().insert(def.name.clone(), def);
    }

    pub fn register_aspect(&self, def: AspectDefinition) {
        for property in def.properties.values() {
            self.register_property(property.clone());
        }
        self.aspects.write().insert(def.name.clone(), def);
    }

    pub fn register_property(&self, def: PropertyDefinition) {
        self.properties.write().insert(def.name.clone(), def);
    }
}

impl DictionaryService for InMemoryDictionary {
    fn property(&self, name: &QName) -> Option<PropertyDefinition> {
        self.properties.read().get(name).cloned()
    }

    fn type_def(&self, name: &QName) -> Option<TypeDefinition> {
        self.types.read().get(name).cloned()
    }

    fn aspect(&self, name: &QName) -> Option<AspectDefinition> {
        self.aspects.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_containers_and_content() {
        let dictionary = InMemoryDictionary::with_defaults();
        assert!(dictionary.type_def(&model::type_folder()).unwrap().can_have_children());
        assert!(!dictionary.type_def(&model::type_content()).unwrap().can_have_children());
        assert!(!dictionary.property(&model::prop_content()).unwrap().atomic);
        assert!(dictionary.is_subtype(&model::type_folder(), &model::type_base()));
        assert!(!dictionary.is_subtype(&model::type_folder(), &model::type_category()));
    }

    #[test]
    fn subaspects_inherit_classification() {
        let dictionary = InMemoryDictionary::with_defaults();
        let tagged = QName::new("ex", "taggable");
        dictionary.register_aspect(ClassDefinition::new(tagged.clone()).with_parent(model::aspect_classifiable()));
        assert!(dictionary.is_subaspect(&tagged, &model::aspect_classifiable()));
    }
}
