//! # Loader Configuration
//!
//! Runtime knobs for the loader, read from YAML. Every field has a default so an
//! empty document (or no file at all) yields a working configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a [`LoaderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Configuration for a [`LoaderSystem`](crate::lifecycle::LoaderSystem).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Path prefix every routable identifier must start with (e.g. `/chase/df`).
    pub path_prefix: String,
    /// File backing the durable last-attempted identifier.
    pub state_file: PathBuf,
    /// Capacity of the controller's request channel.
    pub command_buffer: usize,
    /// Capacity of the one-shot confirmation request channel.
    pub confirmation_buffer: usize,
    /// Capacity of each monitoring event stream.
    pub monitor_buffer: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/chase/df".to_string(),
            state_file: PathBuf::from("feature_loader_state.json"),
            command_buffer: 32,
            confirmation_buffer: 8,
            monitor_buffer: 16,
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    /// Reads and parses a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LoaderConfig::from_yaml_str("").unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.path_prefix, "/chase/df");
    }

    #[test]
    fn test_partial_document_overrides_fields() {
        let config = LoaderConfig::from_yaml_str("path_prefix: /apps/mods\nmonitor_buffer: 4\n").unwrap();
        assert_eq!(config.path_prefix, "/apps/mods");
        assert_eq!(config.monitor_buffer, 4);
        assert_eq!(config.command_buffer, 32);
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let result = LoaderConfig::from_yaml_str("command_buffer: [not, a, number]");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
