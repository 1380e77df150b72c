//! Error types for mixcritctl

use mixcrit_alloc::AllocError;
use mixcrit_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error("Verification failed: {0} violation(s)")]
    Verification(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(ConfigError::Io { .. }) => 1,
            CliError::Config(_) | CliError::Alloc(AllocError::Model(_)) => 2,
            CliError::Alloc(e) if e.is_capacity_failure() => 3,
            CliError::Alloc(_) | CliError::Verification(_) => 4,
            CliError::Io(_) | CliError::Json(_) | CliError::Yaml(_) => 1,
        }
    }

    /// Short machine-readable name used in JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Config(_) => "config",
            CliError::Alloc(AllocError::Model(_)) => "model",
            CliError::Alloc(e) if e.is_capacity_failure() => "infeasible",
            CliError::Alloc(_) => "invariant",
            CliError::Verification(_) => "verification",
            CliError::Io(_) => "io",
            CliError::Json(_) | CliError::Yaml(_) => "serialization",
        }
    }
}
