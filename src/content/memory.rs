use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::content::service::{ContentReader, ContentService, ContentTransformer, MIMETYPE_TEXT_PLAIN};
use crate::core::error::Result;
use crate::core::types::{NodeRef, QName};

/// Content store keeping bytes in memory, keyed by node and property.
#[derive(Default)]
pub struct InMemoryContentStore {
    contents: RwLock<HashMap<(NodeRef, QName), ContentReader>>,
    transformers: RwLock<HashMap<String, Arc<dyn ContentTransformer>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, node: &NodeRef, property: &QName, reader: ContentReader) {
        self.contents.write().insert((node.clone(), property.clone()), reader);
    }

    pub fn remove(&self, node: &NodeRef, property: &QName) {
        self.contents.write().remove(&(node.clone(), property.clone()));
    }

    /// Registers a transformer from `source_mimetype` to plain text.
    pub fn register_transformer(&self, source_mimetype: &str, transformer: Arc<dyn ContentTransformer>) {
        self.transformers.write().insert(source_mimetype.to_string(), transformer);
    }
}

impl ContentService for InMemoryContentStore {
    fn reader(&self, node: &NodeRef, property: &QName) -> Result<Option<ContentReader>> {
        Ok(self.contents.read().get(&(node.clone(), property.clone())).cloned())
    }

    fn transformer(&self, source_mimetype: &str, target_mimetype: &str) -> Option<Arc<dyn ContentTransformer>> {
        if target_mimetype != MIMETYPE_TEXT_PLAIN {
            return None;
        }
        self.transformers.read().get(source_mimetype).cloned()
    }
}

/// Decodes bytes as (lossy) UTF-8 text at a fixed declared cost.
pub struct LossyTextTransformer {
    pub cost: u64,
}

impl ContentTransformer for LossyTextTransformer {
    fn cost(&self) -> u64 {
        self.cost
    }

    fn transform(&self, reader: &ContentReader) -> Result<String> {
        Ok(reader.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StoreRef;

    #[test]
    fn transformers_only_target_plain_text() {
        let store = InMemoryContentStore::new();
        store.register_transformer("text/html", Arc::new(LossyTextTransformer { cost: 3 }));
        assert_eq!(store.transformer("text/html", MIMETYPE_TEXT_PLAIN).unwrap().cost(), 3);
        assert!(store.transformer("text/html", "application/pdf").is_none());
        assert!(store.transformer("image/png", MIMETYPE_TEXT_PLAIN).is_none());
    }

    #[test]
    fn readers_are_keyed_by_node_and_property() {
        let store = InMemoryContentStore::new();
        let node = NodeRef::new(StoreRef::new("workspace", "s"), "n1");
        let prop = QName::new("cm", "content");
        store.put(&node, &prop, ContentReader::plain_text("hello"));
        assert!(store.reader(&node, &prop).unwrap().unwrap().is_plain_utf8());
        assert!(store.reader(&node, &QName::new("cm", "other")).unwrap().is_none());
    }
}
