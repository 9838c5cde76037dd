use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use docscene_common::{Attributes, Node};

/// One parsed node, not yet live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub tag: String,
    /// Nesting depth in the flat node list.
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub attributes: Attributes,
    /// Attribute keys whose values are node IDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// Ordered parse result handed to import.
pub type StagingList = Vec<NodeRecord>;

impl NodeRecord {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub fn with_reference(mut self, key: &str, target: impl Into<String>) -> Self {
        self.attributes.insert(key.to_owned(), target.into());
        if !self.references.iter().any(|r| r == key) {
            self.references.push(key.to_owned());
        }
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Serialize a live node at the given depth.
    pub fn from_node(node: &dyn Node, depth: u32) -> Self {
        let references: BTreeSet<String> = node
            .reference_ids()
            .into_iter()
            .map(|r| r.field)
            .collect();
        Self {
            tag: node.type_tag().to_owned(),
            depth,
            attributes: node.attributes(),
            references: references.into_iter().collect(),
        }
    }

    pub fn declared_id(&self) -> Option<&str> {
        self.attributes.get("id").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscene_common::{ModelNode, NodeId};

    #[test]
    fn from_node_lists_reference_fields() {
        let mut model = ModelNode::default();
        model.header.id = "Model1".into();
        model.display = Some(NodeId::from("ModelDisplay1"));
        model.transform = Some(NodeId::from("LinearTransform1"));

        let record = NodeRecord::from_node(&model, 2);
        assert_eq!(record.tag, "Model");
        assert_eq!(record.depth, 2);
        assert_eq!(record.declared_id(), Some("Model1"));
        assert_eq!(record.references, vec![
            "displayNodeRef".to_owned(),
            "transformNodeRef".to_owned()
        ]);
    }

    #[test]
    fn builder_does_not_duplicate_reference_keys() {
        let record = NodeRecord::new("Volume")
            .with_reference("storageNodeRef", "Storage1")
            .with_reference("storageNodeRef", "Storage2");
        assert_eq!(record.references.len(), 1);
        assert_eq!(record.attributes["storageNodeRef"], "Storage2");
    }
}
