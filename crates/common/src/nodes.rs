//! Built-in node types.
//!
//! These cover the shapes the scene has to cope with: plain data nodes,
//! nodes referencing other nodes, a singleton, and a catch-all for tags no
//! registered type claims.

use glam::Mat4;
use std::any::Any;
use std::collections::BTreeSet;

use crate::node::{Node, NodeError, NodeReference, copy_same_type, rewrite_field};
use crate::types::{
    Attributes, NodeHeader, NodeId, format_floats, parse_attr, parse_floats, parse_reference,
};

const TRANSFORM_REF: &str = "transformNodeRef";
const DISPLAY_REF: &str = "displayNodeRef";
const ACTIVE_MODEL_REF: &str = "activeModelID";

/// Linear transform with an optional parent transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    pub header: NodeHeader,
    pub matrix: Mat4,
    pub parent: Option<NodeId>,
}

impl Default for TransformNode {
    fn default() -> Self {
        Self {
            header: NodeHeader::default(),
            matrix: Mat4::IDENTITY,
            parent: None,
        }
    }
}

impl Node for TransformNode {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn type_tag(&self) -> &str {
        "LinearTransform"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn create_instance(&self) -> Box<dyn Node> {
        Box::new(Self::default())
    }

    fn copy_from(&mut self, other: &dyn Node) -> bool {
        copy_same_type(self, other)
    }

    fn reference_ids(&self) -> Vec<NodeReference> {
        self.parent
            .iter()
            .map(|p| NodeReference::new(TRANSFORM_REF, p.clone()))
            .collect()
    }

    fn rewrite_reference(&mut self, old: &NodeId, new: &NodeId) -> bool {
        rewrite_field(&mut self.parent, old, new)
    }

    fn write_attributes(&self, attrs: &mut Attributes) {
        self.header.write_attributes(attrs);
        attrs.insert(
            "matrixTransformToParent".into(),
            format_floats(&self.matrix.to_cols_array()),
        );
        if let Some(parent) = &self.parent {
            attrs.insert(TRANSFORM_REF.into(), parent.to_string());
        }
    }

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError> {
        self.header.read_attributes(attrs);
        if let Some(cols) = parse_floats::<16>(attrs, "matrixTransformToParent")? {
            self.matrix = Mat4::from_cols_array(&cols);
        }
        self.parent = parse_reference(attrs, TRANSFORM_REF);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Display properties for a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDisplayNode {
    pub header: NodeHeader,
    pub color: [f32; 3],
    pub opacity: f32,
    pub visible: bool,
}

impl Default for ModelDisplayNode {
    fn default() -> Self {
        Self {
            header: NodeHeader::default(),
            color: [0.5, 0.5, 0.5],
            opacity: 1.0,
            visible: true,
        }
    }
}

impl Node for ModelDisplayNode {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn type_tag(&self) -> &str {
        "ModelDisplay"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn create_instance(&self) -> Box<dyn Node> {
        Box::new(Self::default())
    }

    fn copy_from(&mut self, other: &dyn Node) -> bool {
        copy_same_type(self, other)
    }

    fn write_attributes(&self, attrs: &mut Attributes) {
        self.header.write_attributes(attrs);
        attrs.insert("color".into(), format_floats(&self.color));
        attrs.insert("opacity".into(), self.opacity.to_string());
        attrs.insert("visibility".into(), self.visible.to_string());
    }

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError> {
        self.header.read_attributes(attrs);
        if let Some(color) = parse_floats::<3>(attrs, "color")? {
            self.color = color;
        }
        if let Some(opacity) = parse_attr(attrs, "opacity")? {
            self.opacity = opacity;
        }
        if let Some(visible) = parse_attr(attrs, "visibility")? {
            self.visible = visible;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Surface model referencing its display and transform nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelNode {
    pub header: NodeHeader,
    pub file_name: Option<String>,
    pub display: Option<NodeId>,
    pub transform: Option<NodeId>,
    /// References whose target was not live at the last refresh. Not serialized.
    missing: Vec<NodeId>,
}

impl ModelNode {
    pub fn missing_references(&self) -> &[NodeId] {
        &self.missing
    }
}

impl Node for ModelNode {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn type_tag(&self) -> &str {
        "Model"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn create_instance(&self) -> Box<dyn Node> {
        Box::new(Self::default())
    }

    fn copy_from(&mut self, other: &dyn Node) -> bool {
        copy_same_type(self, other)
    }

    fn reference_ids(&self) -> Vec<NodeReference> {
        let mut refs = Vec::new();
        if let Some(display) = &self.display {
            refs.push(NodeReference::new(DISPLAY_REF, display.clone()));
        }
        if let Some(transform) = &self.transform {
            refs.push(NodeReference::new(TRANSFORM_REF, transform.clone()));
        }
        refs
    }

    fn rewrite_reference(&mut self, old: &NodeId, new: &NodeId) -> bool {
        let display = rewrite_field(&mut self.display, old, new);
        let transform = rewrite_field(&mut self.transform, old, new);
        display || transform
    }

    fn write_attributes(&self, attrs: &mut Attributes) {
        self.header.write_attributes(attrs);
        if let Some(file) = &self.file_name {
            attrs.insert("fileName".into(), file.clone());
        }
        if let Some(display) = &self.display {
            attrs.insert(DISPLAY_REF.into(), display.to_string());
        }
        if let Some(transform) = &self.transform {
            attrs.insert(TRANSFORM_REF.into(), transform.to_string());
        }
    }

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError> {
        self.header.read_attributes(attrs);
        self.file_name = attrs.get("fileName").cloned();
        self.display = parse_reference(attrs, DISPLAY_REF);
        self.transform = parse_reference(attrs, TRANSFORM_REF);
        Ok(())
    }

    fn refresh_references(&mut self, is_live: &dyn Fn(&NodeId) -> bool) {
        self.missing = self
            .reference_ids()
            .into_iter()
            .map(|r| r.target)
            .filter(|target| !is_live(target))
            .collect();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Application selection state. One per scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionNode {
    pub header: NodeHeader,
    pub active_model: Option<NodeId>,
}

impl SelectionNode {
    pub const SINGLETON_TAG: &'static str = "Selection";
}

impl Default for SelectionNode {
    fn default() -> Self {
        Self {
            header: NodeHeader::singleton(Self::SINGLETON_TAG),
            active_model: None,
        }
    }
}

impl Node for SelectionNode {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn type_tag(&self) -> &str {
        "Selection"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn create_instance(&self) -> Box<dyn Node> {
        Box::new(Self::default())
    }

    fn copy_from(&mut self, other: &dyn Node) -> bool {
        copy_same_type(self, other)
    }

    fn reference_ids(&self) -> Vec<NodeReference> {
        self.active_model
            .iter()
            .map(|m| NodeReference::new(ACTIVE_MODEL_REF, m.clone()))
            .collect()
    }

    fn rewrite_reference(&mut self, old: &NodeId, new: &NodeId) -> bool {
        rewrite_field(&mut self.active_model, old, new)
    }

    fn write_attributes(&self, attrs: &mut Attributes) {
        self.header.write_attributes(attrs);
        if let Some(model) = &self.active_model {
            attrs.insert(ACTIVE_MODEL_REF.into(), model.to_string());
        }
    }

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError> {
        self.header.read_attributes(attrs);
        self.active_model = parse_reference(attrs, ACTIVE_MODEL_REF);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Node of a type no registered prototype claims.
///
/// Keeps the raw attributes and the declared reference attributes so the
/// node survives a load/commit round trip and takes part in rename fix-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericNode {
    pub header: NodeHeader,
    pub tag: String,
    pub attributes: Attributes,
    pub reference_fields: BTreeSet<String>,
}

impl GenericNode {
    pub fn new(tag: impl Into<String>, reference_fields: BTreeSet<String>) -> Self {
        Self {
            tag: tag.into(),
            reference_fields,
            ..Self::default()
        }
    }
}

impl Node for GenericNode {
    fn header(&self) -> &NodeHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        &mut self.header
    }

    fn type_tag(&self) -> &str {
        &self.tag
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(self.clone())
    }

    fn create_instance(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.tag.clone(), self.reference_fields.clone()))
    }

    fn copy_from(&mut self, other: &dyn Node) -> bool {
        copy_same_type(self, other)
    }

    fn reference_ids(&self) -> Vec<NodeReference> {
        self.reference_fields
            .iter()
            .filter_map(|field| {
                self.attributes
                    .get(field)
                    .filter(|v| !v.is_empty())
                    .map(|v| NodeReference::new(field.clone(), NodeId::new(v.clone())))
            })
            .collect()
    }

    fn rewrite_reference(&mut self, old: &NodeId, new: &NodeId) -> bool {
        let mut changed = false;
        for field in &self.reference_fields {
            if let Some(value) = self.attributes.get_mut(field) {
                if value.as_str() == old.as_str() {
                    *value = new.to_string();
                    changed = true;
                }
            }
        }
        changed
    }

    fn write_attributes(&self, attrs: &mut Attributes) {
        attrs.extend(self.attributes.clone());
        self.header.write_attributes(attrs);
    }

    fn read_attributes(&mut self, attrs: &Attributes) -> Result<(), NodeError> {
        self.header.read_attributes(attrs);
        self.attributes = attrs
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "name" | "singletonTag"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
