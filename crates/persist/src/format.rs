//! Document parser/writer contracts and the JSON document format.
//!
//! ```text
//! {"document": {"version": 1, "nodes": [
//!     {"tag": "Model", "depth": 0, "attributes": {...}, "references": [...]}
//! ]}}
//! ```

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::DocumentError;
use crate::record::{NodeRecord, StagingList};

/// Current document schema version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Turns persisted text into a staging list. Never touches a scene.
pub trait DocumentParser {
    fn parse(&self, source: &str) -> Result<StagingList, DocumentError>;
}

/// Writes one container wrapping one element per record, in order.
pub trait DocumentWriter {
    fn write(&self, records: &[NodeRecord], out: &mut dyn Write) -> Result<(), DocumentError>;
}

#[derive(Deserialize)]
struct Envelope {
    document: Body,
}

#[derive(Deserialize)]
struct Body {
    version: u32,
    #[serde(default)]
    nodes: Vec<NodeRecord>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    document: BodyRef<'a>,
}

#[derive(Serialize)]
struct BodyRef<'a> {
    version: u32,
    nodes: &'a [NodeRecord],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentFormat {
    pub pretty: bool,
}

impl JsonDocumentFormat {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl DocumentParser for JsonDocumentFormat {
    fn parse(&self, source: &str) -> Result<StagingList, DocumentError> {
        let envelope: Envelope = serde_json::from_str(source)?;
        let body = envelope.document;
        if body.version != DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: body.version,
                expected: DOCUMENT_VERSION,
            });
        }
        for (index, record) in body.nodes.iter().enumerate() {
            if record.tag.is_empty() {
                return Err(DocumentError::Malformed {
                    index,
                    reason: "empty type tag".into(),
                });
            }
            if let Some(key) = record
                .references
                .iter()
                .find(|key| key.as_str() == "id")
            {
                return Err(DocumentError::Malformed {
                    index,
                    reason: format!("{key:?} cannot be a reference attribute"),
                });
            }
        }
        tracing::debug!(nodes = body.nodes.len(), "parsed document");
        Ok(body.nodes)
    }
}

impl DocumentWriter for JsonDocumentFormat {
    fn write(&self, records: &[NodeRecord], out: &mut dyn Write) -> Result<(), DocumentError> {
        let envelope = EnvelopeRef {
            document: BodyRef {
                version: DOCUMENT_VERSION,
                nodes: records,
            },
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &envelope)?;
        } else {
            serde_json::to_writer(&mut *out, &envelope)?;
        }
        out.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"document": {"version": 1, "nodes": [
        {"tag": "ModelDisplay", "attributes": {"id": "ModelDisplay1", "opacity": "0.5"}},
        {"tag": "Model", "depth": 1,
         "attributes": {"id": "Model1", "displayNodeRef": "ModelDisplay1"},
         "references": ["displayNodeRef"]}
    ]}}"#;

    #[test]
    fn parse_keeps_order_and_references() {
        let records = JsonDocumentFormat::default().parse(DOC).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, "ModelDisplay");
        assert_eq!(records[0].depth, 0);
        assert!(records[0].references.is_empty());
        assert_eq!(records[1].depth, 1);
        assert_eq!(records[1].references, vec!["displayNodeRef".to_owned()]);
    }

    #[test]
    fn written_document_parses_back() {
        let format = JsonDocumentFormat::pretty();
        let records = format.parse(DOC).unwrap();
        let mut out = Vec::new();
        format.write(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"version\": 1"));
        assert_eq!(format.parse(&text).unwrap(), records);
    }

    #[test]
    fn rejects_other_versions() {
        let err = JsonDocumentFormat::default()
            .parse(r#"{"document": {"version": 7, "nodes": []}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnsupportedVersion { found: 7, expected: 1 }
        ));
    }

    #[test]
    fn rejects_empty_tag() {
        let err = JsonDocumentFormat::default()
            .parse(r#"{"document": {"version": 1, "nodes": [{"tag": ""}]}}"#)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { index: 0, .. }));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = JsonDocumentFormat::default().parse("{\"document\":").unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }
}
