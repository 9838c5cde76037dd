use std::any::Any;
use std::fmt;

use crate::types::{Attributes, NodeHeader, NodeId};

/// Errors raised while reading a node from its serialized attributes.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("invalid value {value:?} for attribute {name:?}")]
    InvalidAttribute { name: String, value: String },
    #[error("missing required attribute {0:?}")]
    MissingAttribute(String),
}

/// A reference held by one of a node's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReference {
    /// Attribute name of the field holding the reference.
    pub field: String,
    pub target: NodeId,
}

impl NodeReference {
    pub fn new(field: impl Into<String>, target: NodeId) -> Self {
        Self {
            field: field.into(),
            target,
        }
    }
}

/// Capabilities the scene requires from every node type.
///
/// Type-specific payload stays opaque to the scene: it only ever clones,
/// copies, serializes and rewrites references through this trait. New node
/// types are added by registering a prototype with the registry.
pub trait Node: Any + fmt::Debug {
    fn header(&self) -> &NodeHeader;

    fn header_mut(&mut self) -> &mut NodeHeader;

    /// Tag used in documents and as the ID prefix for allocated IDs.
    fn type_tag(&self) -> &str;

    /// Deep copy, including the ID.
    fn clone_node(&self) -> Box<dyn Node>;

    /// A fresh default instance of the same type.
    fn create_instance(&self) -> Box<dyn Node>;

    /// Overwrite this node's content from `other` while keeping this node's ID.
    ///
    /// Returns false when `other` is not of a compatible type.
    fn copy_from(&mut self, other: &dyn Node) -> bool;

    fn reference_ids(&self) -> Vec<NodeReference> {
        Vec::new()
    }

    /// Replace every field referencing `old` with `new`. Returns whether any field changed.
    fn rewrite_reference(&mut self, _old: &NodeId, _new: &NodeId) -> bool {
        false
    }

    /// Serialize hook. Implementations call `self.header().write_attributes` first.
    fn write_attributes(&self, attrs: &mut Attributes);

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError>;

    /// Re-check cached reference resolution after nodes left the scene.
    fn refresh_references(&mut self, _is_live: &dyn Fn(&NodeId) -> bool) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn id(&self) -> &NodeId {
        &self.header().id
    }

    fn name(&self) -> Option<&str> {
        self.header().name.as_deref()
    }

    fn singleton_tag(&self) -> Option<&str> {
        self.header().singleton_tag()
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        self.write_attributes(&mut attrs);
        attrs
    }

    /// Same type and same serialized content, ignoring identity.
    fn content_eq(&self, other: &dyn Node) -> bool {
        if self.type_tag() != other.type_tag() {
            return false;
        }
        let mut mine = self.attributes();
        let mut theirs = other.attributes();
        mine.remove("id");
        theirs.remove("id");
        mine == theirs
    }
}

/// `copy_from` for node types that are `Clone`: downcast, clone, restore the ID.
pub fn copy_same_type<T: Node + Clone>(dst: &mut T, src: &dyn Node) -> bool {
    let Some(src) = src.as_any().downcast_ref::<T>() else {
        return false;
    };
    let id = dst.header().id.clone();
    *dst = src.clone();
    dst.header_mut().id = id;
    true
}

/// Rewrite a single optional reference field.
pub fn rewrite_field(field: &mut Option<NodeId>, old: &NodeId, new: &NodeId) -> bool {
    match field {
        Some(target) if target == old => {
            *target = new.clone();
            true
        }
        _ => false,
    }
}
