//! Document authoring: snapshot undo/redo, the document lifecycle and its
//! configuration.
//!
//! # Invariants
//! - Undo history is linear and bounded.
//! - Only nodes checkpointed before an edit get their content restored.
//! - Loading or closing a document drops its history.

pub mod config;
pub mod document;
pub mod history;
pub mod snapshot;

pub use config::{ConfigError, DocumentConfig};
pub use document::Document;
pub use history::{History, HistoryConfig, HistoryError, UndoOutcome};
pub use snapshot::{Snapshot, SnapshotEntry};
