use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AzError, Result};

/// Environment variable overriding the container runtime binary.
pub const RUNTIME_ENV: &str = "AZPUSH_RUNTIME";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Container runtime CLI (docker, podman)
    pub runtime: String,

    /// Image providing the Azure CLI
    pub azure_cli_image: String,

    /// General-purpose image for debug commands and the push example
    pub helper_image: String,

    /// Where the Azure credential directory is mounted inside containers
    pub credentials_mount_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            azure_cli_image: "mcr.microsoft.com/azure-cli:latest".to_string(),
            helper_image: "ubuntu:latest".to_string(),
            credentials_mount_path: "/root/.azure".to_string(),
        }
    }
}

impl EngineConfig {
    /// Default config file location (`~/.azpush/config.yaml`).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".azpush"))
            .unwrap_or_else(|| PathBuf::from(".azpush"))
            .join("config.yaml")
    }

    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            AzError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&data).map_err(|e| {
            AzError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AZPUSH_RUNTIME` if set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(runtime) = std::env::var(RUNTIME_ENV) {
            if !runtime.trim().is_empty() {
                self.runtime = runtime.trim().to_string();
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.trim().is_empty() {
            return Err(AzError::ConfigError("runtime must not be empty".to_string()));
        }
        if !self.credentials_mount_path.starts_with('/') {
            return Err(AzError::ConfigError(format!(
                "credentials_mount_path must be absolute, got '{}'",
                self.credentials_mount_path
            )));
        }
        Ok(())
    }
}
