//! Configuration Management
//!
//! Handles persistent defaults for the cloudiot CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOCATION: &str = "us-central1";

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default cloud region
    #[serde(default)]
    pub location: Option<String>,
    /// Default registry ID
    #[serde(default)]
    pub registry: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudiot").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
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
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing config {:?}", path))?;

        Ok(())
    }

    /// Overwrite the fields that are set in `other`
    pub fn merge(&mut self, other: Config) {
        if other.project_id.is_some() {
            self.project_id = other.project_id;
        }
        if other.location.is_some() {
            self.location = other.location;
        }
        if other.registry.is_some() {
            self.registry = other.registry;
        }
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(cloudiot::gcp::auth::get_default_project)
            .filter(|p| !p.is_empty())
    }

    /// Get effective location (CLI > config > us-central1)
    pub fn effective_location(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.location.clone())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
    }

    /// Get effective registry (CLI > config)
    pub fn effective_registry(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let config = Config {
            project_id: Some("from-config".into()),
            location: None,
            registry: Some("reg".into()),
        };
        assert_eq!(config.effective_project(Some("from-cli")).as_deref(), Some("from-cli"));
        assert_eq!(config.effective_project(None).as_deref(), Some("from-config"));
        assert_eq!(config.effective_location(None), DEFAULT_LOCATION);
        assert_eq!(config.effective_location(Some("europe-west1")), "europe-west1");
        assert_eq!(config.effective_registry(None).as_deref(), Some("reg"));
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut config = Config {
            project_id: Some("p0".into()),
            location: Some("us-central1".into()),
            registry: None,
        };
        config.merge(Config {
            registry: Some("r0".into()),
            ..Default::default()
        });
        assert_eq!(config.project_id.as_deref(), Some("p0"));
        assert_eq!(config.registry.as_deref(), Some("r0"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("cloudiot-config-test-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = Config {
            project_id: Some("p0".into()),
            location: Some("asia-east1".into()),
            registry: None,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
