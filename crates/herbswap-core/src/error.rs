//! Core error types

use thiserror::Error;

/// Errors raised while loading a formula database.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database file could not be read.
    #[error("failed to read database file: {0}")]
    Io(#[from] std::io::Error),

    /// Database file is not valid YAML or does not match the record schema.
    #[error("failed to parse database file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
