use crate::core::types::{ChildAssocRef, NodeRef, StoreRef};

/// Maps caller-facing store and node names to the names indexed.
pub trait TenantTranslator: Send + Sync {
    fn store_name(&self, store: &StoreRef) -> StoreRef {
        store.clone()
    }

    fn node_name(&self, node: &NodeRef) -> NodeRef {
        NodeRef::new(self.store_name(&node.store), node.id.clone())
    }

    fn assoc_name(&self, assoc: &ChildAssocRef) -> ChildAssocRef {
        ChildAssocRef {
            assoc_type: assoc.assoc_type.clone(),
            parent: assoc.parent.as_ref().map(|p| self.node_name(p)),
            qname: assoc.qname.clone(),
            child: self.node_name(&assoc.child),
            primary: assoc.primary,
        }
    }
}

/// Leaves every name as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl TenantTranslator for IdentityTranslator {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::QName;

    struct Prefixed(&'static str);

    impl TenantTranslator for Prefixed {
        fn store_name(&self, store: &StoreRef) -> StoreRef {
            StoreRef::new(store.protocol.clone(), format!("{}@{}", self.0, store.identifier))
        }
    }

    #[test]
    fn assoc_translation_covers_parent_and_child() {
        let store = StoreRef::new("workspace", "spaces");
        let assoc = ChildAssocRef {
            assoc_type: QName::new("cm", "contains"),
            parent: Some(NodeRef::new(store.clone(), "p")),
            qname: Some(QName::new("cm", "c")),
            child: NodeRef::new(store.clone(), "c"),
            primary: true,
        };

        let translated = Prefixed("acme").assoc_name(&assoc);
        assert_eq!(translated.child.to_string(), "workspace://acme@spaces/c");
        assert_eq!(translated.parent.map(|p| p.store.identifier), Some("acme@spaces".to_string()));
        assert_eq!(IdentityTranslator.assoc_name(&assoc), assoc);
    }
}
