use serde::{Deserialize, Serialize};
use std::path::Path;

use docscene_persist::ImportConfig;

use crate::history::HistoryConfig;

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Document-level settings. Missing keys fall back to their defaults.
///
/// ```yaml
/// history:
///   max_depth: 50
///   enabled: true
/// import:
///   preserve_unknown_types: false
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub history: HistoryConfig,
    pub import: ImportConfig,
}

impl DocumentConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded document config");
        Ok(config)
    }
}
