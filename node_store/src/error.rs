//! Error types for the node store.
//!
//! Store operations themselves never fail: "not found" and "nothing changed"
//! are expressed as `None`. Errors only arise while building a store from
//! configuration.

use thiserror::Error;

/// Errors that can occur while configuring a store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
