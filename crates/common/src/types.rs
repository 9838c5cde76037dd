use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::node::NodeError;

/// Stable identifier of a node within a scene.
///
/// IDs are plain strings (`"Model1"`, `"Selection1"`) so that references
/// read from a document can be matched against live nodes by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized field mapping of a node. BTreeMap keeps written documents stable.
pub type Attributes = BTreeMap<String, String>;

/// Fields every node carries regardless of its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHeader {
    pub id: NodeId,
    pub name: Option<String>,
    /// At most one live node per scene may carry a given tag.
    pub singleton_tag: Option<String>,
    /// Whether the node is written when the scene is committed.
    pub persist: bool,
    /// Requested indent delta relative to the previous node on export.
    pub indent: i32,
}

impl Default for NodeHeader {
    fn default() -> Self {
        Self {
            id: NodeId::default(),
            name: None,
            singleton_tag: None,
            persist: true,
            indent: 0,
        }
    }
}

impl NodeHeader {
    pub fn singleton(tag: impl Into<String>) -> Self {
        Self {
            singleton_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Singleton tag, treating an empty string as absent.
    pub fn singleton_tag(&self) -> Option<&str> {
        self.singleton_tag.as_deref().filter(|t| !t.is_empty())
    }

    pub fn write_attributes(&self, attrs: &mut Attributes) {
        attrs.insert("id".into(), self.id.0.clone());
        if let Some(name) = &self.name {
            attrs.insert("name".into(), name.clone());
        }
        if let Some(tag) = self.singleton_tag() {
            attrs.insert("singletonTag".into(), tag.to_owned());
        }
    }

    pub fn read_attributes(&mut self, attrs: &Attributes) {
        if let Some(id) = attrs.get("id") {
            self.id = NodeId::new(id.clone());
        }
        if let Some(name) = attrs.get("name") {
            self.name = Some(name.clone());
        }
        if let Some(tag) = attrs.get("singletonTag") {
            self.singleton_tag = Some(tag.clone());
        }
    }
}

/// Parse an optional scalar attribute.
pub fn parse_attr<T: FromStr>(attrs: &Attributes, key: &str) -> Result<Option<T>, NodeError> {
    match attrs.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NodeError::InvalidAttribute {
                name: key.to_owned(),
                value: raw.clone(),
            }),
    }
}

/// Parse a whitespace separated list of exactly `N` floats.
pub fn parse_floats<const N: usize>(
    attrs: &Attributes,
    key: &str,
) -> Result<Option<[f32; N]>, NodeError> {
    let Some(raw) = attrs.get(key) else {
        return Ok(None);
    };
    let invalid = || NodeError::InvalidAttribute {
        name: key.to_owned(),
        value: raw.clone(),
    };
    let values: Vec<f32> = raw
        .split_whitespace()
        .map(|v| v.parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    let array: [f32; N] = values.try_into().map_err(|_| invalid())?;
    Ok(Some(array))
}

pub fn format_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reference attributes hold a node ID; an empty value means "no reference".
pub fn parse_reference(attrs: &Attributes, key: &str) -> Option<NodeId> {
    attrs
        .get(key)
        .filter(|v| !v.is_empty())
        .map(|v| NodeId::new(v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_borrows_as_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(NodeId::from("Model1"), 1);
        assert_eq!(map.get("Model1"), Some(&1));
        assert_eq!(NodeId::from("Model1").to_string(), "Model1");
    }

    #[test]
    fn header_default_persists() {
        let h = NodeHeader::default();
        assert!(h.persist);
        assert!(h.id.is_empty());
        assert_eq!(h.singleton_tag(), None);
    }

    #[test]
    fn empty_singleton_tag_is_absent() {
        let mut h = NodeHeader::singleton("");
        assert_eq!(h.singleton_tag(), None);
        h.singleton_tag = Some("Selection".into());
        assert_eq!(h.singleton_tag(), Some("Selection"));
    }

    #[test]
    fn header_attribute_roundtrip() {
        let header = NodeHeader {
            id: "Model3".into(),
            name: Some("skull".into()),
            singleton_tag: Some("Main".into()),
            ..NodeHeader::default()
        };
        let mut attrs = Attributes::new();
        header.write_attributes(&mut attrs);

        let mut read = NodeHeader::default();
        read.read_attributes(&attrs);
        assert_eq!(read, header);
    }

    #[test]
    fn parse_floats_rejects_wrong_arity() {
        let mut attrs = Attributes::new();
        attrs.insert("color".into(), "1 0.5".into());
        assert!(parse_floats::<3>(&attrs, "color").is_err());
        attrs.insert("color".into(), "1 0.5 0".into());
        assert_eq!(
            parse_floats::<3>(&attrs, "color").unwrap(),
            Some([1.0, 0.5, 0.0])
        );
        assert_eq!(parse_floats::<3>(&attrs, "missing").unwrap(), None);
    }

    #[test]
    fn parse_attr_reports_bad_value() {
        let mut attrs = Attributes::new();
        attrs.insert("opacity".into(), "opaque".into());
        let err = parse_attr::<f32>(&attrs, "opacity").unwrap_err();
        assert!(err.to_string().contains("opacity"));
    }
}
