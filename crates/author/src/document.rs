use std::path::{Path, PathBuf};

use docscene_common::{Node, NodeHandle};
use docscene_kernel::{NodeRegistry, Scene};
use docscene_persist::{
    DocumentError, ImportProgress, ImportReport, JsonDocumentFormat, NodeRecord, commit_to_path,
    connect, import_with_hook, load_file,
};

use crate::config::DocumentConfig;
use crate::history::{History, HistoryError, UndoOutcome};

/// A scene together with its undo history and the file it came from.
///
/// Closing or replacing the document always drops the history.
#[derive(Debug)]
pub struct Document {
    scene: Scene,
    history: History,
    config: DocumentConfig,
    format: JsonDocumentFormat,
    path: Option<PathBuf>,
}

impl Document {
    /// Empty document with the built-in node types registered.
    pub fn new(config: DocumentConfig) -> Self {
        Self::with_registry(NodeRegistry::with_builtin_types(), config)
    }

    pub fn with_registry(registry: NodeRegistry, config: DocumentConfig) -> Self {
        Self {
            scene: Scene::with_registry(registry),
            history: History::new(config.history),
            config,
            format: JsonDocumentFormat::pretty(),
            path: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct scene access. Mutations made here are only undoable if they
    /// were preceded by [`Document::checkpoint`].
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn checkpoint(&mut self, ids: &[&str]) -> bool {
        self.history.checkpoint(&self.scene, ids)
    }

    pub fn checkpoint_all(&mut self) -> bool {
        self.history.checkpoint_all(&self.scene)
    }

    pub fn undo(&mut self) -> Result<UndoOutcome, HistoryError> {
        self.history.undo(&mut self.scene)
    }

    pub fn redo(&mut self) -> Result<UndoOutcome, HistoryError> {
        self.history.redo(&mut self.scene)
    }

    /// Checkpoint membership, then add a node.
    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeHandle {
        self.history.checkpoint(&self.scene, &[]);
        self.scene.add_node(node)
    }

    /// Checkpoint membership, then remove a node.
    pub fn remove_node(&mut self, id: &str) -> Option<NodeHandle> {
        if !self.scene.contains(id) {
            return None;
        }
        self.history.checkpoint(&self.scene, &[]);
        self.scene.remove_node(id)
    }

    /// Merge a document file into the scene.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportReport, DocumentError> {
        let records = load_file(&self.format, path)?;
        self.import_records(&records, |_, _| {})
    }

    /// Merge staged records into the scene. History tracking is off while
    /// the import runs.
    pub fn import_records(
        &mut self,
        records: &[NodeRecord],
        hook: impl FnMut(&NodeHandle, ImportProgress),
    ) -> Result<ImportReport, DocumentError> {
        let was_enabled = self.history.config().enabled;
        self.history.set_enabled(false);
        let result = import_with_hook(&mut self.scene, records, &self.config.import, hook);
        self.history.set_enabled(was_enabled);
        result
    }

    /// Replace the document with the one at `path`. A file that fails to
    /// load leaves the current document and its history untouched.
    pub fn load(&mut self, path: &Path) -> Result<ImportReport, DocumentError> {
        let records = load_file(&self.format, path)?;
        let report = connect(&mut self.scene, &records, &self.config.import)?;
        self.history.clear();
        self.path = Some(path.to_path_buf());
        Ok(report)
    }

    /// Write the document to `path` and remember it as the document's file.
    pub fn save_as(&mut self, path: &Path) -> Result<usize, DocumentError> {
        let written = commit_to_path(&self.scene, &self.format, path)?;
        self.path = Some(path.to_path_buf());
        Ok(written)
    }

    /// Write the document back to the file it was loaded from or last saved to.
    pub fn save(&self) -> Result<usize, DocumentError> {
        let Some(path) = &self.path else {
            return Err(DocumentError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "document has no file path",
            )));
        };
        commit_to_path(&self.scene, &self.format, path)
    }

    /// Close the document, keeping singleton nodes.
    pub fn close(&mut self) {
        self.clear(false);
        self.path = None;
    }

    pub fn clear(&mut self, remove_singletons: bool) {
        self.scene.clear(remove_singletons);
        self.history.clear();
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscene_common::{ModelDisplayNode, ModelNode, NodeId, SelectionNode};

    fn sample_records() -> Vec<NodeRecord> {
        vec![
            NodeRecord::new("ModelDisplay").with_attribute("id", "ModelDisplay1"),
            NodeRecord::new("Model")
                .with_attribute("id", "Model1")
                .with_reference("displayNodeRef", "ModelDisplay1"),
        ]
    }

    #[test]
    fn add_and_remove_are_undoable() {
        let mut doc = Document::default();
        doc.add_node(Box::new(ModelDisplayNode::default()));
        doc.add_node(Box::new(ModelNode::default()));
        assert!(doc.remove_node("ModelDisplay1").is_some());
        assert!(doc.remove_node("ModelDisplay1").is_none());
        assert_eq!(doc.history().undo_count(), 3);

        doc.undo().unwrap();
        assert_eq!(doc.scene().len(), 2);
        doc.undo().unwrap();
        doc.undo().unwrap();
        assert!(doc.scene().is_empty());
        doc.redo().unwrap();
        assert_eq!(doc.scene().ids(), vec![NodeId::from("ModelDisplay1")]);
    }

    #[test]
    fn import_does_not_record_history() {
        let mut doc = Document::default();
        doc.import_records(&sample_records(), |_, _| {}).unwrap();
        assert_eq!(doc.scene().len(), 2);
        assert_eq!(doc.history().undo_count(), 0);
        assert!(doc.history().is_enabled());
    }

    #[test]
    fn save_then_load_replaces_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");

        let mut doc = Document::default();
        doc.scene_mut().add_node(Box::new(SelectionNode::default()));
        doc.import_records(&sample_records(), |_, _| {}).unwrap();
        assert!(doc.save().is_err());
        assert_eq!(doc.save_as(&path).unwrap(), 3);
        assert_eq!(doc.path(), Some(path.as_path()));

        doc.checkpoint_all();
        doc.add_node(Box::new(ModelNode::default()));
        let report = doc.load(&path).unwrap();
        assert_eq!(report.merged, vec![NodeId::from("Selection1")]);
        assert_eq!(doc.scene().ids(), vec![
            NodeId::from("Selection1"),
            NodeId::from("ModelDisplay1"),
            NodeId::from("Model1")
        ]);
        assert!(!doc.history().can_undo());
    }

    #[test]
    fn failed_load_keeps_current_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{\"document\": ").unwrap();

        let mut doc = Document::default();
        doc.add_node(Box::new(ModelNode::default()));
        assert!(doc.load(&path).is_err());
        assert_eq!(doc.scene().len(), 1);
        assert!(doc.history().can_undo());
        assert!(doc.path().is_none());
    }

    #[test]
    fn import_file_merges_with_renames() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene.json");
        let mut doc = Document::default();
        doc.import_records(&sample_records(), |_, _| {}).unwrap();
        doc.save_as(&path).unwrap();

        let report = doc.import_file(&path).unwrap();
        assert_eq!(report.renamed.len(), 2);
        assert_eq!(doc.scene().len(), 4);
    }

    #[test]
    fn close_drops_history_and_path() {
        let mut doc = Document::default();
        doc.scene_mut().add_node(Box::new(SelectionNode::default()));
        doc.add_node(Box::new(ModelNode::default()));
        doc.close();
        assert_eq!(doc.scene().ids(), vec![NodeId::from("Selection1")]);
        assert_eq!(doc.history().undo_count(), 0);
        assert!(doc.path().is_none());
    }
}
