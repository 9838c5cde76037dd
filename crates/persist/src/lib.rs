//! Document persistence: parser/writer contracts, the JSON document format,
//! bulk import into a scene and commit back out.
//!
//! # Invariants
//! - Parsing produces a staging list and never mutates a live scene.
//! - A failed load, import instantiation or commit leaves the scene unchanged.
//! - Commit preserves scene order and skips unpersisted nodes.

pub mod error;
pub mod format;
pub mod pipeline;
pub mod record;

pub use error::DocumentError;
pub use format::{DOCUMENT_VERSION, DocumentParser, DocumentWriter, JsonDocumentFormat};
pub use pipeline::{
    ImportConfig, ImportProgress, ImportReport, commit, commit_to_path, connect, export_records,
    import, import_with_hook, load_file,
};
pub use record::{NodeRecord, StagingList};
