//! ID-keyed reference edges between nodes.
//!
//! Edges never own anything. They are keyed by ID rather than by node
//! identity, so cyclic references cannot form ownership cycles and a node can
//! be renamed without losing its edges. Removing a target leaves the edges that
//! point at it dangling.

use std::collections::{BTreeMap, HashSet};

use docscene_common::NodeId;

/// A reference held by a field of `source` pointing at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceEdge {
    pub source: NodeId,
    pub target: NodeId,
}

/// Pending old-ID → new-ID renames awaiting reference fix-up.
///
/// Renames of the same node are compressed on insert: when a node renamed
/// `A → B` is later renamed `B → C`, the map holds `A → C` and `B → C`, so
/// every entry already points at its fixed point and resolution never has to
/// walk a chain. Collision renames of *different* nodes are never chained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    renames: BTreeMap<NodeId, NodeId>,
    /// (source, target) pairs whose target was produced by a resolution.
    applied: HashSet<(NodeId, NodeId)>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A newly added node declared `old` but received `new`.
    pub fn record_collision(&mut self, old: NodeId, new: NodeId) {
        if old != new && !old.is_empty() {
            self.renames.insert(old, new);
        }
    }

    /// A live node previously known as `old` is now `new`.
    pub fn record_rename(&mut self, old: NodeId, new: NodeId) {
        if old == new || old.is_empty() {
            return;
        }
        for target in self.renames.values_mut() {
            if *target == old {
                *target = new.clone();
            }
        }
        self.applied.retain(|(_, target)| *target != old);
        self.renames.insert(old, new);
    }

    pub fn get(&self, old: &str) -> Option<&NodeId> {
        self.renames.get(old)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.renames.iter()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn clear(&mut self) {
        self.renames.clear();
        self.applied.clear();
    }
}

/// Which referencing nodes a rename resolution may rewrite.
#[derive(Debug, Clone, Copy)]
pub enum RenameScope<'a> {
    Scene,
    Nodes(&'a [NodeId]),
}

/// A field rewrite the owner of `source` has to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRewrite {
    pub source: NodeId,
    pub from: NodeId,
    pub to: NodeId,
}

/// Many-to-many edge table. Duplicate edges are allowed and kept.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTracker {
    edges: Vec<ReferenceEdge>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: NodeId, target: NodeId) {
        self.edges.push(ReferenceEdge { source, target });
    }

    /// Remove every edge held by `source`. Returns how many were removed.
    pub fn drop_from(&mut self, source: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| e.source.as_str() != source);
        before - self.edges.len()
    }

    /// Remove every edge pointing at `target`.
    pub fn drop_to(&mut self, target: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| e.target.as_str() != target);
        before - self.edges.len()
    }

    /// Remove exactly the edges from `source` to `target`, compared by ID only.
    pub fn drop_reference(&mut self, source: &str, target: &str) -> usize {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.source.as_str() == source && e.target.as_str() == target));
        before - self.edges.len()
    }

    /// Keep only edges whose source passes `keep`.
    pub fn retain_sources(&mut self, keep: impl Fn(&NodeId) -> bool) {
        self.edges.retain(|e| keep(&e.source));
    }

    /// Re-key edges held by a renamed node.
    pub fn rename_source(&mut self, old: &str, new: &NodeId) {
        for edge in self.edges.iter_mut().filter(|e| e.source.as_str() == old) {
            edge.source = new.clone();
        }
    }

    /// Retarget edges whose target is a key of `renames` and whose source is in
    /// `scope`.
    ///
    /// Returns one rewrite per (source, old target) pair for the owner of the
    /// source node to apply to its fields, ordered so that applying them one
    /// after another never re-rewrites a field another rewrite just produced.
    /// An edge whose current target came out of an earlier resolution is left
    /// alone, so each rename reaches each referencing node once.
    pub fn resolve_renames(
        &mut self,
        renames: &mut RenameMap,
        scope: RenameScope<'_>,
    ) -> Vec<ReferenceRewrite> {
        let in_scope: Option<HashSet<&str>> = match scope {
            RenameScope::Scene => None,
            RenameScope::Nodes(ids) => Some(ids.iter().map(|id| id.as_str()).collect()),
        };
        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut produced = Vec::new();
        let mut rewrites = Vec::new();
        for edge in &mut self.edges {
            let Some(new) = renames.renames.get(edge.target.as_str()) else {
                continue;
            };
            if let Some(scope) = &in_scope {
                if !scope.contains(edge.source.as_str()) {
                    continue;
                }
            }
            if renames
                .applied
                .contains(&(edge.source.clone(), edge.target.clone()))
            {
                continue;
            }
            if seen.insert((edge.source.clone(), edge.target.clone())) {
                rewrites.push(ReferenceRewrite {
                    source: edge.source.clone(),
                    from: edge.target.clone(),
                    to: new.clone(),
                });
            }
            produced.push((edge.source.clone(), new.clone()));
            edge.target = new.clone();
        }
        renames.applied.extend(produced);
        order_rewrites(rewrites)
    }

    pub fn references_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source.as_str() == source)
            .map(|e| &e.target)
    }

    pub fn references_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.target.as_str() == target)
            .map(|e| &e.source)
    }

    /// Edges whose target is not live.
    pub fn dangling(&self, is_live: impl Fn(&NodeId) -> bool) -> Vec<&ReferenceEdge> {
        self.edges.iter().filter(|e| !is_live(&e.target)).collect()
    }

    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

/// Order rewrites so a rewrite producing `X` runs after any rewrite of the
/// same source that consumes `X`.
fn order_rewrites(mut pending: Vec<ReferenceRewrite>) -> Vec<ReferenceRewrite> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|r| {
            !pending
                .iter()
                .any(|other| other.source == r.source && other.from == r.to)
        });
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                tracing::warn!(
                    count = pending.len(),
                    "cyclic reference renames, applying in recorded order"
                );
                ordered.append(&mut pending);
            }
        }
    }
    ordered
}
