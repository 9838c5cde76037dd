//! Shared node model: identity, the node capability trait, shared handles,
//! and the built-in node types.
//!
//! # Invariants
//! - A node's ID is only changed by the scene that owns it.
//! - `copy_from` never changes the destination's ID.

pub mod handle;
pub mod node;
pub mod nodes;
pub mod types;

pub use handle::NodeHandle;
pub use node::{Node, NodeError, NodeReference, copy_same_type, rewrite_field};
pub use nodes::{GenericNode, ModelDisplayNode, ModelNode, SelectionNode, TransformNode};
pub use types::{Attributes, NodeHeader, NodeId};
