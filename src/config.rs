//! Configuration Management
//!
//! Handles persistent configuration storage for cloudmodels.

use crate::model::{Registry, RegistryError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Extra descriptor files or directories layered over the embedded set
    #[serde(default)]
    pub descriptor_dirs: Vec<PathBuf>,
    /// Service endpoint used by `fetch`
    #[serde(default)]
    pub base_url: Option<String>,
    /// Log enum and discriminator fallbacks through tracing
    #[serde(default)]
    pub warn_on_fallback: bool,
    /// Last model decoded or fetched
    #[serde(default)]
    pub last_model: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudmodels").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path; missing or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))?;

        Ok(())
    }

    /// Remember the last model and save
    pub fn set_last_model(&mut self, model: &str) -> Result<()> {
        self.last_model = Some(model.to_string());
        self.save()
    }

    /// Configured descriptor sources followed by `extra`, without repeats
    pub fn descriptor_sources(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = Vec::with_capacity(self.descriptor_dirs.len() + extra.len());
        for source in self.descriptor_dirs.iter().chain(extra) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }

    /// Embedded descriptors plus every configured extra source
    pub fn registry(&self) -> Result<Registry, RegistryError> {
        self.registry_with(&[])
    }

    /// Like [`Config::registry`] with one-off sources that are never saved
    pub fn registry_with(&self, extra: &[PathBuf]) -> Result<Registry, RegistryError> {
        let mut builder = Registry::builder();
        builder.add_embedded()?;
        for source in self.descriptor_sources(extra) {
            if source.is_dir() {
                builder.add_dir(&source)?;
            } else {
                builder.add_path(&source)?;
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("config.json")), Config::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            descriptor_dirs: vec![PathBuf::from("/opt/descriptors")],
            base_url: Some("http://localhost:9000".to_string()),
            warn_on_fallback: true,
            last_model: Some("LogGroup".to_string()),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"warn_on_fallback": true}"#).unwrap();
        let config = Config::load_from(&path);
        assert!(config.warn_on_fallback);
        assert!(config.descriptor_dirs.is_empty());
    }

    #[test]
    fn test_registry_with_extra_descriptors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "models:\n  Widget:\n    fields:\n      - name: widget_id\n        type: String\n        required: true\n",
        )
        .unwrap();

        let config = Config {
            descriptor_dirs: vec![dir.path().to_path_buf()],
            ..Config::default()
        };
        let registry = config.registry().unwrap();
        assert!(registry.model("Widget").is_some());
        assert!(registry.model("WebAppFirewallPolicy").is_some());
    }

    #[test]
    fn test_registry_reports_bad_descriptors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"models": {"Vcn": {"fields": []}}}"#).unwrap();

        let config = Config {
            descriptor_dirs: vec![path],
            ..Config::default()
        };
        assert!(matches!(config.registry(), Err(RegistryError::DuplicateModel(_))));
    }

    #[test]
    fn test_descriptor_sources_skip_repeats() {
        let config = Config {
            descriptor_dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            ..Config::default()
        };
        let sources = config.descriptor_sources(&[PathBuf::from("/b"), PathBuf::from("/c")]);
        assert_eq!(
            sources,
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
        );
    }

    #[test]
    fn test_extra_sources_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("widget.yaml");
        std::fs::write(
            &descriptor,
            "models:\n  Widget:\n    fields:\n      - name: widget_id\n        type: String\n",
        )
        .unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        let extra = vec![descriptor.clone()];
        assert!(config.registry_with(&extra).unwrap().model("Widget").is_some());
        config.last_model = Some("Widget".to_string());
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path);
        assert!(reloaded.descriptor_dirs.is_empty());
        assert!(reloaded.registry_with(&extra).unwrap().model("Widget").is_some());
    }

    #[test]
    fn test_source_in_config_and_extra_loads_once() {
        let dir = TempDir::new().unwrap();
        let descriptor = dir.path().join("widget.yaml");
        std::fs::write(
            &descriptor,
            "models:\n  Widget:\n    fields:\n      - name: widget_id\n        type: String\n",
        )
        .unwrap();

        let config = Config {
            descriptor_dirs: vec![descriptor.clone()],
            ..Config::default()
        };
        let registry = config.registry_with(&[descriptor]).unwrap();
        assert!(registry.model("Widget").is_some());
    }
}
