//! Bulk import of staged records into a live scene, and commit back out.
//!
//! # Invariants
//! - Every staged record is instantiated before the scene is touched; a record
//!   that fails to instantiate leaves the scene as it was.
//! - Collision renames are resolved only among the nodes of one import.
//! - One `DocumentLoaded` event fires per distinct imported type tag.
//! - Commit never mutates the scene.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use docscene_common::{Node, NodeHandle, NodeId};
use docscene_kernel::{NodeRegistry, RenameScope, Scene, SceneEvent};

use crate::error::DocumentError;
use crate::format::{DocumentParser, DocumentWriter};
use crate::record::{NodeRecord, StagingList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Keep records of unregistered types as
    /// [`GenericNode`](docscene_common::GenericNode)s instead of
    /// skipping them.
    pub preserve_unknown_types: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            preserve_unknown_types: true,
        }
    }
}

/// What an import did to the scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Final IDs of inserted nodes, in document order.
    pub added: Vec<NodeId>,
    /// Live singletons that absorbed an imported node.
    pub merged: Vec<NodeId>,
    /// (declared, assigned) for every node whose declared ID was taken.
    pub renamed: Vec<(NodeId, NodeId)>,
    /// Type tags of skipped records.
    pub skipped: Vec<String>,
    /// Distinct imported type tags in first-seen order.
    pub type_tags: Vec<String>,
}

/// Passed to the per-node hook after each node is live and its references
/// are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    pub done: usize,
    pub total: usize,
}

/// Read and parse a document file into a staging list.
pub fn load_file(parser: &dyn DocumentParser, path: &Path) -> Result<StagingList, DocumentError> {
    let source = std::fs::read_to_string(path)?;
    let records = parser.parse(&source)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded document");
    Ok(records)
}

/// Import staged records at the end of the scene.
pub fn import(
    scene: &mut Scene,
    records: &[NodeRecord],
    config: &ImportConfig,
) -> Result<ImportReport, DocumentError> {
    import_with_hook(scene, records, config, |_, _| {})
}

/// [`import`] with a hook run once per imported node, after all renames are
/// resolved. The hook can finish per-node setup or pump host progress; it
/// never sees the scene.
pub fn import_with_hook(
    scene: &mut Scene,
    records: &[NodeRecord],
    config: &ImportConfig,
    hook: impl FnMut(&NodeHandle, ImportProgress),
) -> Result<ImportReport, DocumentError> {
    let staged = instantiate(scene.registry(), records, config)?;
    Ok(import_staged(scene, staged, hook))
}

/// Replace the document: clear every non-singleton node, then import.
/// Parsing and instantiation happen first, so a bad document leaves the
/// current one in place.
pub fn connect(
    scene: &mut Scene,
    records: &[NodeRecord],
    config: &ImportConfig,
) -> Result<ImportReport, DocumentError> {
    let staged = instantiate(scene.registry(), records, config)?;
    scene.clear(false);
    Ok(import_staged(scene, staged, |_, _| {}))
}

/// Records for every persisted node in scene order, with depths derived from
/// each node's indent delta. A negative delta closes groups before the node,
/// a positive one opens groups after it.
pub fn export_records(scene: &Scene) -> StagingList {
    let mut depth: i32 = 0;
    let mut records = Vec::with_capacity(scene.len());
    for handle in scene.iter() {
        let node = handle.borrow();
        if !node.header().persist {
            continue;
        }
        let indent = node.header().indent;
        if indent < 0 {
            depth = depth.saturating_add(indent).max(0);
        }
        records.push(NodeRecord::from_node(&*node, depth.unsigned_abs()));
        if indent > 0 {
            depth = depth.saturating_add(indent);
        }
    }
    records
}

/// Write the scene through `writer`. Returns the number of records written.
pub fn commit(
    scene: &Scene,
    writer: &dyn DocumentWriter,
    out: &mut dyn Write,
) -> Result<usize, DocumentError> {
    let records = export_records(scene);
    writer.write(&records, out)?;
    tracing::info!(records = records.len(), skipped = scene.len() - records.len(), "committed scene");
    Ok(records.len())
}

pub fn commit_to_path(
    scene: &Scene,
    writer: &dyn DocumentWriter,
    path: &Path,
) -> Result<usize, DocumentError> {
    let mut out = BufWriter::new(File::create(path)?);
    let written = commit(scene, writer, &mut out)?;
    out.flush()?;
    tracing::debug!(path = %path.display(), "wrote document");
    Ok(written)
}

struct Staged {
    nodes: Vec<Box<dyn Node>>,
    skipped: Vec<String>,
}

fn instantiate(
    registry: &NodeRegistry,
    records: &[NodeRecord],
    config: &ImportConfig,
) -> Result<Staged, DocumentError> {
    let indents = indent_deltas(records);
    let mut staged = Staged {
        nodes: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };
    for (index, (record, indent)) in records.iter().zip(indents).enumerate() {
        if record.tag.is_empty() {
            return Err(DocumentError::Malformed {
                index,
                reason: "empty type tag".into(),
            });
        }
        if !config.preserve_unknown_types && !registry.is_registered(&record.tag) {
            tracing::warn!(tag = %record.tag, index, "skipping record of unregistered type");
            staged.skipped.push(record.tag.clone());
            continue;
        }
        let mut node = registry.create_or_generic(&record.tag, &record.references);
        node.read_attributes(&record.attributes)
            .map_err(|source| DocumentError::Node {
                index,
                tag: record.tag.clone(),
                source,
            })?;
        node.header_mut().indent = indent;
        staged.nodes.push(node);
    }
    Ok(staged)
}

fn import_staged(
    scene: &mut Scene,
    staged: Staged,
    mut hook: impl FnMut(&NodeHandle, ImportProgress),
) -> ImportReport {
    let _span = tracing::info_span!("import", nodes = staged.nodes.len()).entered();
    let mut report = ImportReport {
        skipped: staged.skipped,
        ..ImportReport::default()
    };

    scene.clear_pending_renames();
    let mut handles: Vec<NodeHandle> = Vec::with_capacity(staged.nodes.len());
    // Type tag → last imported node of that type, in first-seen order.
    let mut loaded: Vec<(String, NodeId)> = Vec::new();
    for node in staged.nodes {
        let added = scene.add_node_without_notify(node);
        let id = added.handle.id();
        if let Some(declared) = added.renamed_from {
            report.renamed.push((declared, id.clone()));
        }
        if added.merged {
            report.merged.push(id.clone());
        } else {
            report.added.push(id.clone());
        }
        let tag = added.handle.type_tag();
        match loaded.iter_mut().find(|(t, _)| *t == tag) {
            Some(entry) => entry.1 = id,
            None => loaded.push((tag, id)),
        }
        if !handles.iter().any(|h| h.ptr_eq(&added.handle)) {
            handles.push(added.handle);
        }
    }

    let scope: Vec<NodeId> = handles.iter().map(NodeHandle::id).collect();
    scene.resolve_renames(RenameScope::Nodes(&scope));
    for id in &scope {
        scene.sync_references(id);
    }

    let total = handles.len();
    for (done, handle) in handles.iter().enumerate() {
        hook(handle, ImportProgress {
            done: done + 1,
            total,
        });
    }

    for (type_tag, node) in &loaded {
        scene.notify(SceneEvent::DocumentLoaded {
            type_tag: type_tag.clone(),
            node: node.clone(),
        });
    }
    report.type_tags = loaded.into_iter().map(|(tag, _)| tag).collect();
    tracing::info!(
        added = report.added.len(),
        merged = report.merged.len(),
        renamed = report.renamed.len(),
        skipped = report.skipped.len(),
        "import complete"
    );
    report
}

/// Per-record indent deltas reproducing the records' depths on export.
///
/// A depth drop is carried by the record itself; a depth rise is carried by
/// its predecessor. A record that both closes and opens groups keeps only the
/// closing delta.
fn indent_deltas(records: &[NodeRecord]) -> Vec<i32> {
    let mut deltas = vec![0i32; records.len()];
    let mut previous = 0i64;
    for (index, record) in records.iter().enumerate() {
        let depth = i64::from(record.depth);
        let delta = i32::try_from(depth - previous)
            .unwrap_or(if depth > previous { i32::MAX } else { i32::MIN });
        if delta < 0 {
            deltas[index] = delta;
        } else if delta > 0 {
            match index.checked_sub(1) {
                Some(prev) if deltas[prev] == 0 => deltas[prev] = delta,
                Some(prev) => {
                    tracing::debug!(index = prev, "record both closes and opens groups, keeping close");
                }
                None => tracing::debug!(depth, "first record is nested, depth not kept"),
            }
        }
        previous = depth;
    }
    deltas
}
