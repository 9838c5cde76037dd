use std::collections::BTreeMap;
use std::fmt;

use docscene_common::{NodeId, TransformNode};
use docscene_kernel::{ReferenceEdge, Scene};

/// Scene inspector for developer tooling.
///
/// Provides read-only queries against a scene for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &Scene) -> SceneSummary {
        SceneSummary {
            node_count: scene.len(),
            type_count: scene.type_tags().len(),
            edge_count: scene.references().len(),
            dangling_count: scene.dangling_references().len(),
            pending_renames: scene.pending_renames().len(),
        }
    }

    /// Live node count per type tag, sorted by tag.
    pub fn type_counts(scene: &Scene) -> Vec<TypeCount> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for handle in scene.iter() {
            *counts.entry(handle.type_tag()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(type_tag, count)| TypeCount { type_tag, count })
            .collect()
    }

    /// Edges whose target is no longer in the scene.
    pub fn dangling(scene: &Scene) -> Vec<ReferenceEdge> {
        scene.dangling_references()
    }

    pub fn inspect_node(scene: &Scene, id: &str) -> Option<NodeInfo> {
        let handle = scene.get(id)?;
        let node = handle.borrow();
        let translation = handle.downcast::<TransformNode>().map(|t| {
            let (_, _, translation) = t.matrix.to_scale_rotation_translation();
            translation.to_array()
        });
        Some(NodeInfo {
            id: node.id().clone(),
            type_tag: node.type_tag().to_owned(),
            name: node.name().map(str::to_owned),
            singleton_tag: node.singleton_tag().map(str::to_owned),
            persist: node.header().persist,
            position: scene.position(id).unwrap_or_default(),
            revision: handle.revision(),
            references: scene.references().references_from(id).cloned().collect(),
            referenced_by: scene.references().references_to(id).cloned().collect(),
            translation,
        })
    }
}

/// Summary of scene state for the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub node_count: usize,
    pub type_count: usize,
    pub edge_count: usize,
    pub dangling_count: usize,
    pub pending_renames: usize,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scene: nodes={} types={} edges={} dangling={} pending_renames={}",
            self.node_count,
            self.type_count,
            self.edge_count,
            self.dangling_count,
            self.pending_renames
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCount {
    pub type_tag: String,
    pub count: usize,
}

impl fmt::Display for TypeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20} {}", self.type_tag, self.count)
    }
}

/// Detailed info about a single node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub type_tag: String,
    pub name: Option<String>,
    pub singleton_tag: Option<String>,
    pub persist: bool,
    /// Index in scene order.
    pub position: usize,
    pub revision: u64,
    pub references: Vec<NodeId>,
    pub referenced_by: Vec<NodeId>,
    /// Set for transform nodes.
    pub translation: Option<[f32; 3]>,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] #{} name={:?}",
            self.id,
            self.type_tag,
            self.position,
            self.name.as_deref().unwrap_or("")
        )?;
        if let Some(tag) = &self.singleton_tag {
            write!(f, " singleton={tag}")?;
        }
        if !self.persist {
            f.write_str(" (not persisted)")?;
        }
        if let Some([x, y, z]) = self.translation {
            write!(f, " translation=({x:.2}, {y:.2}, {z:.2})")?;
        }
        for target in &self.references {
            write!(f, "\n  -> {target}")?;
        }
        for source in &self.referenced_by {
            write!(f, "\n  <- {source}")?;
        }
        Ok(())
    }
}
