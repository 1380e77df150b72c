//! Error types for configuration loading.

use std::path::PathBuf;

use mixcrit_alloc::ModelError;
use thiserror::Error;

/// Failure to read, parse or validate a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but describes an invalid model.
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
