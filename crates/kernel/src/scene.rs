use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};

use docscene_common::{Node, NodeHandle, NodeId};

use crate::events::{ObserverId, Observers, SceneEvent};
use crate::ids::IdAllocator;
use crate::references::{ReferenceEdge, ReferenceTracker, RenameMap, RenameScope};
use crate::registry::NodeRegistry;

/// Errors from scene operations that are not plain lookups.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node type {0:?} is not registered")]
    UnknownNodeType(String),
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("node ID {0} is already live")]
    IdInUse(NodeId),
}

/// Outcome of adding a node.
#[derive(Debug, Clone)]
pub struct AddedNode {
    /// The node now live in the scene. For a singleton merge this is the
    /// node that was already there.
    pub handle: NodeHandle,
    pub merged: bool,
    /// ID the incoming node declared before it was reassigned.
    pub renamed_from: Option<NodeId>,
}

/// The node container.
///
/// Owns every live node in persistence order, indexes them by ID, and keeps
/// the reference edges between them. All mutation is single-threaded and
/// synchronous; observers run inline and only ever see the event.
///
/// Removing a node asks every remaining node to refresh its references,
/// which is O(n) in the scene size per removal.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: IndexMap<NodeId, NodeHandle>,
    /// Singleton tag → ID of the live node carrying it.
    singletons: HashMap<String, NodeId>,
    registry: NodeRegistry,
    ids: IdAllocator,
    references: ReferenceTracker,
    pending_renames: RenameMap,
    observers: Observers,
}

impl Scene {
    /// Empty scene with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: NodeRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn with_builtin_types() -> Self {
        Self::with_registry(NodeRegistry::with_builtin_types())
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn register_node_type(&mut self, prototype: Box<dyn Node>) {
        self.registry.register(prototype);
    }

    pub fn create_node(&self, tag: &str) -> Result<Box<dyn Node>, SceneError> {
        self.registry
            .create(tag)
            .ok_or_else(|| SceneError::UnknownNodeType(tag.to_owned()))
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&SceneEvent) + 'static) -> ObserverId {
        self.observers.subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn notify(&mut self, event: SceneEvent) {
        self.observers.notify(&event);
    }

    /// Add a node and fire `NodeAdded` (or `SceneModified` for a singleton merge).
    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeHandle {
        let added = self.add_node_without_notify(node);
        let event = if added.merged {
            SceneEvent::SceneModified
        } else {
            SceneEvent::NodeAdded {
                id: added.handle.id(),
                type_tag: added.handle.type_tag(),
            }
        };
        self.notify(event);
        added.handle
    }

    /// Add a node without firing notifications.
    ///
    /// A node whose singleton tag is already live is merged into the live
    /// node and discarded. Otherwise a missing or colliding ID is replaced by
    /// a freshly allocated one and the old → new mapping is kept for
    /// [`Scene::resolve_renames`].
    pub fn add_node_without_notify(&mut self, mut node: Box<dyn Node>) -> AddedNode {
        if let Some(tag) = node.singleton_tag().map(str::to_owned) {
            let existing = self
                .singletons
                .get(&tag)
                .and_then(|id| self.nodes.get(id.as_str()))
                .cloned();
            if let Some(existing) = existing {
                let renamed_from = self.merge_singleton(&existing, node.as_ref());
                return AddedNode {
                    handle: existing,
                    merged: true,
                    renamed_from,
                };
            }
        }

        let requested = node.id().clone();
        let mut renamed_from = None;
        if requested.is_empty() || self.nodes.contains_key(requested.as_str()) {
            let fresh = self.allocate_id(node.type_tag());
            tracing::debug!(%requested, assigned = %fresh, "assigned node ID");
            if !requested.is_empty() {
                self.pending_renames
                    .record_collision(requested.clone(), fresh.clone());
                renamed_from = Some(requested);
            }
            node.header_mut().id = fresh;
        }
        if node.name().is_none_or(str::is_empty) {
            let name = node.id().to_string();
            node.header_mut().name = Some(name);
        }

        let id = node.id().clone();
        if let Some(tag) = node.singleton_tag() {
            self.singletons.insert(tag.to_owned(), id.clone());
        }
        let references = node.reference_ids();
        let handle = NodeHandle::new(node);
        self.nodes.insert(id.clone(), handle.clone());
        for reference in references {
            self.references.record(id.clone(), reference.target);
        }
        AddedNode {
            handle,
            merged: false,
            renamed_from,
        }
    }

    /// Clone `source` and add the clone under a fresh ID.
    pub fn copy_node(&mut self, source: &NodeHandle) -> NodeHandle {
        let mut node = source.borrow().clone_node();
        node.header_mut().id = NodeId::default();
        self.add_node(node)
    }

    /// Remove a node, drop the edges it holds, fire `NodeRemoved`, then let
    /// the remaining nodes refresh their references.
    ///
    /// Edges pointing at the removed node are left dangling.
    pub fn remove_node(&mut self, id: &str) -> Option<NodeHandle> {
        let handle = self.detach(id)?;
        self.notify(SceneEvent::NodeRemoved {
            id: handle.id(),
            type_tag: handle.type_tag(),
        });
        self.refresh_references();
        Some(handle)
    }

    pub fn remove_node_without_notify(&mut self, id: &str) -> Option<NodeHandle> {
        let handle = self.detach(id)?;
        self.refresh_references();
        Some(handle)
    }

    /// Put a node back under its own ID. Used by undo/redo; no renaming, no
    /// singleton merge and no notification.
    pub fn restore_node(&mut self, handle: NodeHandle) -> Result<(), SceneError> {
        let id = handle.id();
        if self.nodes.contains_key(id.as_str()) {
            return Err(SceneError::IdInUse(id));
        }
        let (singleton_tag, references) = {
            let node = handle.borrow();
            (
                node.singleton_tag().map(str::to_owned),
                node.reference_ids(),
            )
        };
        if let Some(tag) = singleton_tag {
            if let Some(live) = self.singletons.get(&tag) {
                tracing::warn!(%tag, %live, restored = %id, "restoring over a live singleton");
            }
            self.singletons.insert(tag, id.clone());
        }
        self.nodes.insert(id.clone(), handle);
        for reference in references {
            self.references.record(id.clone(), reference.target);
        }
        Ok(())
    }

    /// Reorder the collection to follow `order`. IDs not in `order` keep their
    /// relative order after the listed ones.
    pub fn restore_order(&mut self, order: &[NodeId]) {
        let rank: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let rank_of = |id: &NodeId| rank.get(id.as_str()).copied().unwrap_or(usize::MAX);
        self.nodes.sort_by(|a, _, b, _| rank_of(a).cmp(&rank_of(b)));
    }

    /// Give a live node a new ID. `requested` is used when free, otherwise an
    /// ID is allocated for the node's type. Edges held by the node follow it and
    /// the rename is queued for [`Scene::update_node_references`].
    pub fn rename_node(&mut self, id: &str, requested: &str) -> Option<NodeId> {
        let index = self.nodes.get_index_of(id)?;
        if id == requested {
            return Some(NodeId::from(id));
        }
        let new_id = if !requested.is_empty() && !self.nodes.contains_key(requested) {
            NodeId::from(requested)
        } else {
            let tag = self.nodes[index].type_tag();
            self.allocate_id(&tag)
        };
        let (old_id, handle) = self.nodes.shift_remove_index(index)?;
        handle.borrow_mut().header_mut().id = new_id.clone();
        self.nodes.shift_insert(index, new_id.clone(), handle.clone());

        if let Some(tag) = handle.borrow().singleton_tag() {
            self.singletons.insert(tag.to_owned(), new_id.clone());
        }
        self.references.rename_source(&old_id, &new_id);
        self.pending_renames
            .record_rename(old_id.clone(), new_id.clone());
        tracing::info!(old = %old_id, new = %new_id, "renamed node");
        self.notify(SceneEvent::SceneModified);
        Some(new_id)
    }

    /// Close the scene.
    ///
    /// With `remove_singletons` false every node without a singleton tag is
    /// removed and singletons stay untouched; with true the scene is emptied.
    /// ID hints and pending renames are always reset.
    pub fn clear(&mut self, remove_singletons: bool) {
        let _span = tracing::info_span!("scene_clear", remove_singletons).entered();
        self.notify(SceneEvent::SceneClosing);

        if remove_singletons {
            self.nodes.clear();
            self.singletons.clear();
            self.references.clear();
        } else {
            self.nodes
                .retain(|_, handle| handle.borrow().singleton_tag().is_some());
            let nodes = &self.nodes;
            self.references
                .retain_sources(|source| nodes.contains_key(source.as_str()));
        }
        self.ids.reset();
        self.pending_renames.clear();
        tracing::debug!(remaining = self.nodes.len(), "scene cleared");

        self.notify(SceneEvent::SceneClosed);
    }

    pub fn get(&self, id: &str) -> Option<NodeHandle> {
        self.nodes.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Live nodes in persistence order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeHandle> {
        self.nodes.values()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn nth_node(&self, n: usize) -> Option<NodeHandle> {
        self.nodes.get_index(n).map(|(_, handle)| handle.clone())
    }

    pub fn nodes_by_type(&self, tag: &str) -> Vec<NodeHandle> {
        self.filter(|node| node.type_tag() == tag)
    }

    pub fn nth_node_by_type(&self, n: usize, tag: &str) -> Option<NodeHandle> {
        self.nodes
            .values()
            .filter(|handle| handle.borrow().type_tag() == tag)
            .nth(n)
            .cloned()
    }

    pub fn count_by_type(&self, tag: &str) -> usize {
        self.nodes
            .values()
            .filter(|handle| handle.borrow().type_tag() == tag)
            .count()
    }

    pub fn nodes_by_name(&self, name: &str) -> Vec<NodeHandle> {
        self.filter(|node| node.name() == Some(name))
    }

    pub fn nodes_by_type_and_name(&self, tag: &str, name: &str) -> Vec<NodeHandle> {
        self.filter(|node| node.type_tag() == tag && node.name() == Some(name))
    }

    /// Distinct type tags of live nodes, sorted.
    pub fn type_tags(&self) -> Vec<String> {
        self.nodes
            .values()
            .map(|handle| handle.type_tag())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn singleton(&self, tag: &str) -> Option<NodeHandle> {
        self.singletons
            .get(tag)
            .and_then(|id| self.nodes.get(id.as_str()))
            .cloned()
    }

    pub fn references(&self) -> &ReferenceTracker {
        &self.references
    }

    /// Record an edge held by a live node. Returns false if `source` is not live.
    pub fn record_reference(&mut self, source: &str, target: NodeId) -> bool {
        if !self.nodes.contains_key(source) {
            return false;
        }
        self.references.record(NodeId::from(source), target);
        true
    }

    pub fn drop_reference(&mut self, source: &str, target: &str) -> usize {
        self.references.drop_reference(source, target)
    }

    /// Re-derive a node's outgoing edges from its reference fields.
    pub fn sync_references(&mut self, id: &str) -> bool {
        let Some(handle) = self.nodes.get(id) else {
            return false;
        };
        let references = handle.borrow().reference_ids();
        self.references.drop_from(id);
        for reference in references {
            self.references.record(NodeId::from(id), reference.target);
        }
        true
    }

    /// The node itself followed by every live node reachable through its edges.
    pub fn referenced_nodes(&self, id: &str) -> Vec<NodeHandle> {
        let Some(start) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut visited: HashSet<NodeId> = HashSet::from([NodeId::from(id)]);
        let mut found = vec![start.clone()];
        let mut stack = vec![NodeId::from(id)];
        while let Some(current) = stack.pop() {
            for target in self.references.references_from(&current) {
                let Some(handle) = self.nodes.get(target.as_str()) else {
                    continue;
                };
                if visited.insert(target.clone()) {
                    found.push(handle.clone());
                    stack.push(target.clone());
                }
            }
        }
        found
    }

    /// Edges whose target is no longer live.
    pub fn dangling_references(&self) -> Vec<ReferenceEdge> {
        self.references
            .dangling(|target| self.nodes.contains_key(target.as_str()))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn pending_renames(&self) -> &RenameMap {
        &self.pending_renames
    }

    pub fn clear_pending_renames(&mut self) {
        self.pending_renames.clear();
    }

    /// Apply pending renames to the reference fields of nodes in `scope`.
    /// Returns the number of field rewrites issued.
    pub fn resolve_renames(&mut self, scope: RenameScope<'_>) -> usize {
        let rewrites = self
            .references
            .resolve_renames(&mut self.pending_renames, scope);
        for rewrite in &rewrites {
            let Some(handle) = self.nodes.get(rewrite.source.as_str()) else {
                continue;
            };
            if !handle
                .borrow_mut_untracked()
                .rewrite_reference(&rewrite.from, &rewrite.to)
            {
                tracing::debug!(
                    source = %rewrite.source,
                    from = %rewrite.from,
                    "edge had no matching reference field"
                );
            }
        }
        if !rewrites.is_empty() {
            tracing::debug!(count = rewrites.len(), "resolved reference renames");
        }
        rewrites.len()
    }

    /// Scene-wide [`Scene::resolve_renames`].
    pub fn update_node_references(&mut self) -> usize {
        self.resolve_renames(RenameScope::Scene)
    }

    /// Let every node re-check its cached reference resolution.
    pub fn refresh_references(&self) {
        let nodes = &self.nodes;
        let is_live = |id: &NodeId| nodes.contains_key(id.as_str());
        for handle in nodes.values() {
            handle.borrow_mut_untracked().refresh_references(&is_live);
        }
    }

    fn filter(&self, pred: impl Fn(&dyn Node) -> bool) -> Vec<NodeHandle> {
        self.nodes
            .values()
            .filter(|handle| pred(&*handle.borrow()))
            .cloned()
            .collect()
    }

    fn allocate_id(&mut self, tag: &str) -> NodeId {
        loop {
            let nodes = &self.nodes;
            let candidate = self.ids.allocate(tag, |c| nodes.contains_key(c));
            // Re-check before committing; the hint may predate bulk changes.
            if !self.nodes.contains_key(candidate.as_str()) {
                return candidate;
            }
            tracing::debug!(%candidate, "allocated ID already live, probing on");
        }
    }

    /// Returns the incoming node's declared ID when it differs from the live
    /// singleton's, so references to it can be redirected.
    fn merge_singleton(&mut self, existing: &NodeHandle, incoming: &dyn Node) -> Option<NodeId> {
        let id = existing.id();
        if !existing.borrow_mut().copy_from(incoming) {
            let mut attrs = incoming.attributes();
            attrs.remove("id");
            if let Err(err) = existing.borrow_mut().read_attributes(&attrs) {
                tracing::warn!(%id, %err, "singleton merge from a different type failed");
            }
        }
        tracing::debug!(%id, tag = ?incoming.singleton_tag(), "merged into live singleton");
        self.sync_references(&id);

        let declared = incoming.id();
        if declared.is_empty() || *declared == id {
            return None;
        }
        self.pending_renames
            .record_collision(declared.clone(), id.clone());
        Some(declared.clone())
    }

    fn detach(&mut self, id: &str) -> Option<NodeHandle> {
        let (id, handle) = self.nodes.shift_remove_entry(id)?;
        let singleton_tag = handle.borrow().singleton_tag().map(str::to_owned);
        if let Some(tag) = singleton_tag {
            if self.singletons.get(&tag) == Some(&id) {
                self.singletons.remove(&tag);
            }
        }
        let dropped = self.references.drop_from(&id);
        tracing::debug!(%id, dropped, "detached node");
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscene_common::{ModelDisplayNode, ModelNode, NodeHeader, SelectionNode, TransformNode};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record_events(scene: &mut Scene) -> Rc<RefCell<Vec<SceneEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        scene.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn model(id: &str, display: Option<&str>) -> Box<dyn Node> {
        let mut node = ModelNode::default();
        node.header.id = id.into();
        node.display = display.map(NodeId::from);
        Box::new(node)
    }

    fn display(id: &str) -> Box<dyn Node> {
        Box::new(ModelDisplayNode {
            header: NodeHeader {
                id: id.into(),
                ..NodeHeader::default()
            },
            ..ModelDisplayNode::default()
        })
    }

    #[test]
    fn add_assigns_id_and_name() {
        let mut scene = Scene::with_builtin_types();
        let events = record_events(&mut scene);
        let handle = scene.add_node(Box::new(ModelNode::default()));

        assert_eq!(handle.id(), NodeId::from("Model1"));
        assert_eq!(handle.borrow().name(), Some("Model1"));
        assert!(scene.get("Model1").unwrap().ptr_eq(&handle));
        assert_eq!(events.borrow().as_slice(), &[SceneEvent::NodeAdded {
            id: "Model1".into(),
            type_tag: "Model".into(),
        }]);
    }

    #[test]
    fn colliding_id_is_reassigned_and_recorded() {
        let mut scene = Scene::new();
        scene.add_node(model("Model1", None));
        let added = scene.add_node_without_notify(model("Model1", None));

        assert_eq!(added.handle.id(), NodeId::from("Model2"));
        assert_eq!(added.renamed_from, Some(NodeId::from("Model1")));
        assert_eq!(scene.pending_renames().get("Model1"), Some(&NodeId::from("Model2")));
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn declared_free_id_is_kept() {
        let mut scene = Scene::new();
        let handle = scene.add_node(model("Model7", None));
        assert_eq!(handle.id(), NodeId::from("Model7"));
        assert!(scene.pending_renames().is_empty());
    }

    #[test]
    fn singleton_merges_into_live_node() {
        let mut scene = Scene::with_builtin_types();
        let first = scene.add_node(Box::new(SelectionNode::default()));
        let events = record_events(&mut scene);

        let incoming = SelectionNode {
            active_model: Some("Model3".into()),
            ..SelectionNode::default()
        };
        let merged = scene.add_node(Box::new(incoming.clone()));

        assert_eq!(scene.len(), 1);
        assert!(merged.ptr_eq(&first));
        assert!(merged.borrow().content_eq(&incoming));
        assert_eq!(events.borrow().as_slice(), &[SceneEvent::SceneModified]);
        assert_eq!(
            scene.references().references_from("Selection1").next(),
            Some(&NodeId::from("Model3"))
        );
    }

    #[test]
    fn singleton_merge_redirects_declared_id() {
        let mut scene = Scene::with_builtin_types();
        scene.add_node(Box::new(SelectionNode::default()));
        let mut incoming = SelectionNode::default();
        incoming.header.id = "Selection4".into();
        let added = scene.add_node_without_notify(Box::new(incoming));

        assert!(added.merged);
        assert_eq!(added.renamed_from, Some(NodeId::from("Selection4")));
        assert_eq!(scene.pending_renames().get("Selection4"), Some(&NodeId::from("Selection1")));
        assert_eq!(scene.singleton("Selection").unwrap().id(), NodeId::from("Selection1"));
    }

    #[test]
    fn remove_drops_outgoing_edges_and_leaves_incoming_dangling() {
        let mut scene = Scene::new();
        scene.add_node(display("ModelDisplay1"));
        scene.add_node(model("Model1", Some("ModelDisplay1")));
        let events = record_events(&mut scene);

        scene.remove_node("ModelDisplay1").unwrap();
        assert_eq!(scene.references().len(), 1);
        assert_eq!(scene.dangling_references(), vec![ReferenceEdge {
            source: "Model1".into(),
            target: "ModelDisplay1".into(),
        }]);
        assert_eq!(events.borrow().as_slice(), &[SceneEvent::NodeRemoved {
            id: "ModelDisplay1".into(),
            type_tag: "ModelDisplay".into(),
        }]);
        // The remaining model was asked to refresh and now reports the gap.
        let model = scene.get("Model1").unwrap();
        assert_eq!(
            model.downcast::<ModelNode>().unwrap().missing_references(),
            &[NodeId::from("ModelDisplay1")]
        );

        scene.remove_node("Model1").unwrap();
        assert!(scene.references().is_empty());
    }

    #[test]
    fn remove_missing_node_is_absent() {
        let mut scene = Scene::new();
        assert!(scene.remove_node("Model1").is_none());
    }

    #[test]
    fn clear_keeps_only_singletons() {
        let mut scene = Scene::with_builtin_types();
        scene.add_node(Box::new(SelectionNode {
            active_model: Some("Model1".into()),
            ..SelectionNode::default()
        }));
        scene.add_node(model("", Some("ModelDisplay1")));
        scene.add_node(display(""));
        let events = record_events(&mut scene);

        scene.clear(false);
        assert_eq!(scene.ids(), vec![NodeId::from("Selection1")]);
        assert_eq!(scene.references().len(), 1);
        assert!(scene.pending_renames().is_empty());
        assert_eq!(events.borrow().as_slice(), &[
            SceneEvent::SceneClosing,
            SceneEvent::SceneClosed
        ]);

        // ID hints were reset.
        assert_eq!(scene.add_node(model("", None)).id(), NodeId::from("Model1"));

        scene.clear(true);
        assert!(scene.is_empty());
        assert!(scene.references().is_empty());
        assert!(scene.singleton("Selection").is_none());
    }

    #[test]
    fn queries_by_type_name_and_position() {
        let mut scene = Scene::new();
        scene.add_node(model("", None));
        scene.add_node(display(""));
        let named = scene.add_node(model("", None));
        named.borrow_mut().header_mut().name = Some("skull".into());

        assert_eq!(scene.nodes_by_type("Model").len(), 2);
        assert_eq!(scene.count_by_type("ModelDisplay"), 1);
        assert_eq!(scene.nth_node(1).unwrap().id(), NodeId::from("ModelDisplay1"));
        assert!(scene.nth_node(3).is_none());
        assert_eq!(scene.nth_node_by_type(1, "Model").unwrap().id(), NodeId::from("Model2"));
        assert_eq!(scene.nodes_by_name("skull").len(), 1);
        assert!(scene.nodes_by_type_and_name("ModelDisplay", "skull").is_empty());
        assert_eq!(scene.type_tags(), vec!["Model".to_owned(), "ModelDisplay".to_owned()]);
        assert!(scene.get("Volume1").is_none());
        assert!(scene.nodes_by_type("Volume").is_empty());
    }

    #[test]
    fn create_node_by_type() {
        let scene = Scene::with_builtin_types();
        assert_eq!(scene.create_node("LinearTransform").unwrap().type_tag(), "LinearTransform");
        assert!(matches!(
            scene.create_node("Volume"),
            Err(SceneError::UnknownNodeType(tag)) if tag == "Volume"
        ));
    }

    #[test]
    fn rename_keeps_position_and_edges() {
        let mut scene = Scene::new();
        scene.add_node(display("ModelDisplay1"));
        scene.add_node(model("Model1", Some("ModelDisplay1")));
        scene.add_node(Box::new(SelectionNode {
            header: NodeHeader {
                id: "Selection1".into(),
                ..SelectionNode::default().header
            },
            active_model: Some("Model1".into()),
        }));

        let model = scene.get("Model1").unwrap();
        let revision = model.revision();
        let new_id = scene.rename_node("Model1", "Skull").unwrap();
        assert_eq!(new_id, NodeId::from("Skull"));
        assert_eq!(scene.position("Skull"), Some(1));
        assert!(model.revision() > revision);
        assert!(scene.get("Model1").is_none());
        assert_eq!(
            scene.references().references_from("Skull").next(),
            Some(&NodeId::from("ModelDisplay1"))
        );

        assert_eq!(scene.update_node_references(), 1);
        let selection = scene.singleton("Selection").unwrap();
        assert_eq!(
            selection.downcast::<SelectionNode>().unwrap().active_model,
            Some(NodeId::from("Skull"))
        );
    }

    #[test]
    fn rename_to_taken_id_allocates() {
        let mut scene = Scene::new();
        scene.add_node(model("Model1", None));
        scene.add_node(model("Model2", None));
        assert_eq!(scene.rename_node("Model1", "Model2"), Some(NodeId::from("Model3")));
        assert!(scene.rename_node("Model9", "X").is_none());
    }

    #[test]
    fn copy_node_gets_fresh_id_without_rename() {
        let mut scene = Scene::new();
        let original = scene.add_node(model("Model1", Some("ModelDisplay1")));
        let copy = scene.copy_node(&original);
        assert_eq!(copy.id(), NodeId::from("Model2"));
        assert!(scene.pending_renames().is_empty());
        assert_eq!(scene.references().references_to("ModelDisplay1").count(), 2);
    }

    #[test]
    fn restore_and_reorder() {
        let mut scene = Scene::new();
        scene.add_node(model("Model1", None));
        scene.add_node(model("Model2", None));
        scene.add_node(model("Model3", None));
        let removed = scene.remove_node_without_notify("Model1").unwrap();

        scene.restore_node(removed.clone()).unwrap();
        assert_eq!(scene.position("Model1"), Some(2));
        assert!(matches!(scene.restore_node(removed), Err(SceneError::IdInUse(_))));

        scene.restore_order(&["Model1".into(), "Model2".into(), "Model3".into()]);
        assert_eq!(scene.ids(), vec![
            NodeId::from("Model1"),
            NodeId::from("Model2"),
            NodeId::from("Model3")
        ]);
    }

    #[test]
    fn referenced_nodes_follow_edges_transitively() {
        let mut scene = Scene::new();
        scene.add_node(Box::new(TransformNode {
            header: NodeHeader {
                id: "LinearTransform1".into(),
                ..NodeHeader::default()
            },
            ..TransformNode::default()
        }));
        scene.add_node(Box::new(TransformNode {
            header: NodeHeader {
                id: "LinearTransform2".into(),
                ..NodeHeader::default()
            },
            parent: Some("LinearTransform1".into()),
            ..TransformNode::default()
        }));
        let mut m = ModelNode::default();
        m.header.id = "Model1".into();
        m.transform = Some("LinearTransform2".into());
        m.display = Some("ModelDisplay9".into());
        scene.add_node(Box::new(m));

        let ids: Vec<NodeId> = scene.referenced_nodes("Model1").iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![
            NodeId::from("Model1"),
            NodeId::from("LinearTransform2"),
            NodeId::from("LinearTransform1")
        ]);
        assert!(scene.referenced_nodes("Missing").is_empty());
    }

    #[test]
    fn scoped_resolution_leaves_other_nodes_alone() {
        let mut scene = Scene::new();
        scene.add_node(display("ModelDisplay1"));
        scene.add_node(model("Model1", Some("ModelDisplay1")));

        // Simulate a second batch whose display collides.
        let added_display = scene.add_node_without_notify(display("ModelDisplay1"));
        let added_model = scene.add_node_without_notify(model("Model1", Some("ModelDisplay1")));
        let scope = [added_display.handle.id(), added_model.handle.id()];
        assert_eq!(scene.resolve_renames(RenameScope::Nodes(&scope)), 1);

        let new_model = scene.get("Model2").unwrap();
        assert_eq!(
            new_model.downcast::<ModelNode>().unwrap().display,
            Some(NodeId::from("ModelDisplay2"))
        );
        let old_model = scene.get("Model1").unwrap();
        assert_eq!(
            old_model.downcast::<ModelNode>().unwrap().display,
            Some(NodeId::from("ModelDisplay1"))
        );
    }

    #[test]
    fn record_reference_requires_live_source() {
        let mut scene = Scene::new();
        assert!(!scene.record_reference("Model1", "ModelDisplay1".into()));
        scene.add_node(model("Model1", None));
        assert!(scene.record_reference("Model1", "ModelDisplay1".into()));
        assert_eq!(scene.drop_reference("Model1", "ModelDisplay1"), 1);
    }

    #[test]
    fn sync_references_follows_field_edits() {
        let mut scene = Scene::new();
        let handle = scene.add_node(model("Model1", Some("ModelDisplay1")));
        handle.downcast_mut::<ModelNode>().unwrap().display = Some("ModelDisplay5".into());
        assert!(scene.sync_references("Model1"));
        let targets: Vec<&NodeId> = scene.references().references_from("Model1").collect();
        assert_eq!(targets, vec![&NodeId::from("ModelDisplay5")]);
    }
}
