use docscene_common::{NodeHandle, NodeId};
use docscene_kernel::Scene;

/// One member of a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub id: NodeId,
    /// The live node, or a frozen clone when `frozen` is set.
    pub handle: NodeHandle,
    pub frozen: bool,
    /// Edit revision of the live node when the entry was taken.
    pub revision: u64,
}

/// Scene membership at a point in time, in scene order.
///
/// Entries share the live node until the node is frozen, so a snapshot only
/// preserves the content of nodes that were frozen before being edited.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Capture current membership with handles to the live nodes.
    pub fn capture(scene: &Scene) -> Self {
        let entries = scene
            .iter()
            .map(|handle| SnapshotEntry {
                id: handle.id(),
                handle: handle.clone(),
                frozen: false,
                revision: handle.revision(),
            })
            .collect();
        Self { entries }
    }

    /// Replace the entry for `id` with a frozen clone of the node it holds.
    /// Returns false when `id` is not a member. Freezing twice keeps the first
    /// clone.
    pub fn freeze(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id.as_str() == id) else {
            return false;
        };
        if !entry.frozen {
            entry.handle = entry.handle.freeze();
            entry.frozen = true;
        }
        true
    }

    pub fn freeze_all(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| !e.frozen) {
            entry.handle = entry.handle.freeze();
            entry.frozen = true;
        }
    }

    pub fn entry(&self, id: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.id.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn frozen_count(&self) -> usize {
        self.entries.iter().filter(|e| e.frozen).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscene_common::ModelDisplayNode;

    #[test]
    fn capture_shares_live_nodes() {
        let mut scene = Scene::with_builtin_types();
        let live = scene.add_node(Box::new(ModelDisplayNode::default()));
        let snapshot = Snapshot::capture(&scene);

        let entry = snapshot.entry("ModelDisplay1").unwrap();
        assert!(entry.handle.ptr_eq(&live));
        assert!(!entry.frozen);
        assert_eq!(snapshot.ids(), vec![NodeId::from("ModelDisplay1")]);
    }

    #[test]
    fn frozen_entry_is_detached() {
        let mut scene = Scene::with_builtin_types();
        let live = scene.add_node(Box::new(ModelDisplayNode::default()));
        let mut snapshot = Snapshot::capture(&scene);
        assert!(snapshot.freeze("ModelDisplay1"));
        assert!(!snapshot.freeze("Model1"));

        live.downcast_mut::<ModelDisplayNode>().unwrap().opacity = 0.25;
        let entry = snapshot.entry("ModelDisplay1").unwrap();
        assert!(entry.frozen);
        assert_eq!(entry.handle.downcast::<ModelDisplayNode>().unwrap().opacity, 1.0);
        assert_eq!(snapshot.frozen_count(), 1);
    }

    #[test]
    fn second_freeze_keeps_first_clone() {
        let mut scene = Scene::with_builtin_types();
        let live = scene.add_node(Box::new(ModelDisplayNode::default()));
        let mut snapshot = Snapshot::capture(&scene);
        snapshot.freeze("ModelDisplay1");
        live.downcast_mut::<ModelDisplayNode>().unwrap().visible = false;
        snapshot.freeze_all();
        let entry = snapshot.entry("ModelDisplay1").unwrap();
        assert!(entry.handle.downcast::<ModelDisplayNode>().unwrap().visible);
    }
}
