//! Developer tooling: read-only scene inspection.
//!
//! # Invariants
//! - Inspection never mutates the scene or advances node revisions.

pub mod inspector;

pub use inspector::{NodeInfo, SceneInspector, SceneSummary, TypeCount};
