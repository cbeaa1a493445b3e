//! Hierarchy configuration
//!
//! `HierarchyConfig` carries the tunables of the tree engine. Every field has
//! a serde default so partial JSON files (or none at all) deserialize without
//! error.

use crate::services::error::HierarchyError;
use crate::services::resolver::{ChildrenSource, CountSource};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default soft cap on nodes marked by `mark_partial_tree`
pub const DEFAULT_NODE_COUNT_THRESHOLD: usize = 30;

/// Default bound on ancestor walks
pub const DEFAULT_MAX_DEPTH: usize = 1000;

fn default_node_count_threshold() -> usize {
    DEFAULT_NODE_COUNT_THRESHOLD
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_breadcrumb_separator() -> String {
    " » ".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfig {
    /// Soft cap used when no explicit threshold is passed (0 = unbounded)
    #[serde(default = "default_node_count_threshold")]
    pub node_count_threshold: usize,

    /// Maximum number of parent hops any ancestor walk may take
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_breadcrumb_separator")]
    pub breadcrumb_separator: String,

    /// Children accessor used for partial trees
    #[serde(default)]
    pub default_children: ChildrenSource,

    /// Count accessor used for partial trees
    #[serde(default)]
    pub default_count: CountSource,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            node_count_threshold: DEFAULT_NODE_COUNT_THRESHOLD,
            max_depth: DEFAULT_MAX_DEPTH,
            breadcrumb_separator: default_breadcrumb_separator(),
            default_children: ChildrenSource::default(),
            default_count: CountSource::default(),
        }
    }
}

impl HierarchyConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, HierarchyError> {
        let config: HierarchyConfig = serde_json::from_str(json)
            .map_err(|e| HierarchyError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a JSON file
    ///
    /// # Returns
    /// * `Ok(HierarchyConfig)` - Loaded config, or defaults if the file doesn't exist
    /// * `Err(HierarchyError::Config)` - The file exists but cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HierarchyError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| HierarchyError::config(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), HierarchyError> {
        if self.max_depth == 0 {
            return Err(HierarchyError::config("maxDepth must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = HierarchyConfig::from_json_str(r#"{"nodeCountThreshold": 5}"#).unwrap();
        assert_eq!(config.node_count_threshold, 5);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.breadcrumb_separator, " » ");
        assert_eq!(config.default_children, ChildrenSource::AllChildrenIncludingDeleted);
    }

    #[test]
    fn test_rejects_zero_depth() {
        let err = HierarchyConfig::from_json_str(r#"{"maxDepth": 0}"#).unwrap_err();
        assert!(matches!(err, HierarchyError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HierarchyConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, HierarchyConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"breadcrumbSeparator": " / ", "defaultChildren": "liveChildren"}}"#
        )
        .unwrap();

        let config = HierarchyConfig::load(file.path()).unwrap();
        assert_eq!(config.breadcrumb_separator, " / ");
        assert_eq!(config.default_children, ChildrenSource::LiveChildren);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(HierarchyConfig::load(file.path()).is_err());
    }
}
