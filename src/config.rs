//! Configuration Management
//!
//! Handles persistent configuration storage for datahub-provider. Access key
//! secrets are never written to disk; they only come from the environment.

use crate::datahub::client::{default_endpoint, DEFAULT_REGION};
use crate::datahub::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the endpoint
pub const ENDPOINT_ENV: &str = "DATAHUB_ENDPOINT";

/// Environment variable overriding the region
pub const REGION_ENV: &str = "ALICLOUD_REGION";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Datahub endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Region used to derive the endpoint
    #[serde(default)]
    pub region: Option<String>,
    /// Access key id used when the environment does not set one
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Worker tasks serving queued calls
    #[serde(default)]
    pub pool_workers: Option<usize>,
    /// Pending queued calls before new ones are rejected
    #[serde(default)]
    pub pool_queue: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("datahub-provider").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file; missing or unreadable files
    /// yield the defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed config {:?}: {}", path, e);
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

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective region (CLI > env > config > default)
    pub fn effective_region(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| env_var(REGION_ENV))
            .or_else(|| self.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Get effective endpoint (CLI > env > config > region default)
    pub fn effective_endpoint(&self, cli_endpoint: Option<&str>, cli_region: Option<&str>) -> String {
        cli_endpoint
            .map(str::to_string)
            .or_else(|| env_var(ENDPOINT_ENV))
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| default_endpoint(&self.effective_region(cli_region)))
    }

    pub fn effective_pool_workers(&self) -> usize {
        self.pool_workers.filter(|n| *n > 0).unwrap_or(DEFAULT_WORKERS)
    }

    pub fn effective_pool_queue(&self) -> usize {
        self.pool_queue.filter(|n| *n > 0).unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_wins() {
        let config = Config {
            endpoint: Some("https://from-config".into()),
            region: Some("cn-shanghai".into()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_endpoint(Some("https://from-cli"), None),
            "https://from-cli"
        );
        assert_eq!(config.effective_region(Some("cn-beijing")), "cn-beijing");
    }

    #[test]
    fn test_pool_defaults() {
        let config = Config {
            pool_workers: Some(0),
            ..Config::default()
        };
        assert_eq!(config.effective_pool_workers(), DEFAULT_WORKERS);
        assert_eq!(config.effective_pool_queue(), DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("datahub-provider-config-{}", std::process::id()));
        let path = dir.join("config.json");

        let config = Config {
            region: Some("cn-beijing".into()),
            access_key_id: Some("LTAI-example".into()),
            pool_workers: Some(2),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());

        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
