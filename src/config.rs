//! Configuration for evidence-registry

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::DEFAULT_CACHE_CAPACITY;
use crate::error::RegistryError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("evidence-registry")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage directory for the registry database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Address the HTTP API binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Domain separation constant mixed into every main identifier.
    /// Changing it for an existing database breaks identifier reproducibility.
    #[serde(default = "default_domain_id")]
    pub domain_id: String,

    /// Buffered events per subscriber before slow subscribers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// sled page cache size in bytes
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity_bytes: u64,
}

fn default_http_port() -> u16 {
    8095
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_domain_id() -> String {
    "evidence-registry".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            domain_id: default_domain_id(),
            event_capacity: default_event_capacity(),
            cache_capacity_bytes: default_cache_capacity(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegistryError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RegistryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the registry cannot run with
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.domain_id.is_empty() {
            return Err(RegistryError::Config("domain_id must not be empty".into()));
        }
        if self.event_capacity == 0 {
            return Err(RegistryError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Get registry database path
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join("registry.sled")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
