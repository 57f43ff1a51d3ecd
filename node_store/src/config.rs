//! Configuration for node store backends.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::Result;

/// Which container implementation backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// `DashMap` with shard-level locking
    #[default]
    Sharded,

    /// Fixed array of `RwLock<HashMap>` stripes
    Striped,
}

/// Configuration used to build a [`Backend`](crate::Backend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Container implementation
    pub backend: BackendKind,

    /// Number of entries to pre-allocate
    pub initial_capacity: usize,

    /// Number of shards (or stripes). Derived from the CPU count when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shards: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sharded,
            initial_capacity: 0,
            shards: None,
        }
    }
}

impl StoreConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Shard count after applying the default.
    pub fn resolved_shards(&self) -> usize {
        self.shards.unwrap_or_else(default_shards)
    }

    /// Check that the configuration describes a buildable backend.
    pub fn validate(&self) -> Result<()> {
        let shards = self.resolved_shards();
        match self.backend {
            BackendKind::Sharded if shards <= 1 || !shards.is_power_of_two() => {
                Err(StoreError::InvalidConfig(format!(
                    "shards must be a power of two greater than 1 for the sharded backend, got {}",
                    shards
                )))
            }
            BackendKind::Striped if shards == 0 => Err(StoreError::InvalidConfig(
                "shards must be at least 1 for the striped backend".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Four shards per CPU, rounded up to a power of two.
pub(crate) fn default_shards() -> usize {
    (num_cpus::get().max(1) * 4).next_power_of_two()
}
