use docscene_common::NodeError;

/// Errors from loading, importing or committing a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document version: file has v{found}, expected v{expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("malformed record {index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("record {index} ({tag}): {source}")]
    Node {
        index: usize,
        tag: String,
        #[source]
        source: NodeError,
    },
}
