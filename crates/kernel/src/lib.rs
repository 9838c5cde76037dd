//! Scene kernel: node type registry, ID allocation, reference tracking and
//! the scene store that owns live nodes.
//!
//! # Invariants
//! - Live node IDs are unique within a scene.
//! - At most one live node carries a given singleton tag.
//! - Reference edges are ID-keyed and never own their targets.
//! - Notifications fire synchronously, before the mutating call returns.

pub mod events;
pub mod ids;
pub mod references;
pub mod registry;
pub mod scene;

pub use events::{ObserverId, SceneEvent};
pub use ids::IdAllocator;
pub use references::{ReferenceEdge, ReferenceRewrite, ReferenceTracker, RenameMap, RenameScope};
pub use registry::NodeRegistry;
pub use scene::{AddedNode, Scene, SceneError};
