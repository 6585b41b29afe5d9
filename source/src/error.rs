//! Error types for migration source loading.
//!
//! Covers file access, bundle parsing, file naming and list validation.

use std::path::PathBuf;

use sqlmigrate_core::ValidationError;
use thiserror::Error;

/// Errors that can occur while loading migrations or configuration.
#[derive(Debug, Error)]
pub enum SourceError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A `.sql` file whose name does not start with a version number.
    #[error("invalid migration file name '{}': expected <version>_<name>.sql", .0.display())]
    InvalidFileName(PathBuf),

    /// The loaded list violates a structural rule.
    #[error("invalid migrations: {0}")]
    Validation(#[from] ValidationError),

    /// All configured loader sources failed.
    #[error("no migration sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`SourceError`].
pub type Result<T> = std::result::Result<T, SourceError>;
