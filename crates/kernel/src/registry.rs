use std::collections::HashMap;

use docscene_common::{
    GenericNode, ModelDisplayNode, ModelNode, Node, SelectionNode, TransformNode,
};

/// Maps type tags to prototype nodes used as factories.
///
/// Populated once at startup; the scene never needs to know concrete types.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    prototypes: Vec<Box<dyn Node>>,
    by_tag: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in node type registered.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TransformNode::default()));
        registry.register(Box::new(ModelDisplayNode::default()));
        registry.register(Box::new(ModelNode::default()));
        registry.register(Box::new(SelectionNode::default()));
        registry
    }

    /// Register a prototype under its type tag. A later registration for the
    /// same tag replaces the earlier one.
    pub fn register(&mut self, prototype: Box<dyn Node>) {
        let tag = prototype.type_tag().to_owned();
        if let Some(&slot) = self.by_tag.get(&tag) {
            tracing::warn!(%tag, "node type registered twice, replacing prototype");
            self.prototypes[slot] = prototype;
            return;
        }
        tracing::debug!(%tag, "registered node type");
        self.by_tag.insert(tag, self.prototypes.len());
        self.prototypes.push(prototype);
    }

    /// Fresh instance of the registered type, or `None` for an unknown tag.
    pub fn create(&self, tag: &str) -> Option<Box<dyn Node>> {
        self.by_tag
            .get(tag)
            .map(|&slot| self.prototypes[slot].create_instance())
    }

    /// Fresh instance of a registered type, falling back to a [`GenericNode`].
    pub fn create_or_generic(&self, tag: &str, reference_fields: &[String]) -> Box<dyn Node> {
        self.create(tag).unwrap_or_else(|| {
            Box::new(GenericNode::new(
                tag,
                reference_fields.iter().cloned().collect(),
            ))
        })
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// Registered tags in registration order.
    pub fn tags(&self) -> Vec<&str> {
        self.prototypes.iter().map(|p| p.type_tag()).collect()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
