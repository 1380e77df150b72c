//! Reading documents from strings and files.

use std::path::Path;

use mixcrit_alloc::{AllocatorConfig, CriticalityOrdering, Task};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::system::SystemConfig;
use crate::taskset::TaskSet;

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML (also accepts JSON, which is a subset)
    Yaml,
    /// Strict JSON
    Json,
}

impl Format {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Parse a document of type `T` from `text`.
///
/// # Errors
///
/// [`ConfigError::Yaml`] or [`ConfigError::Json`] on malformed input.
pub fn parse_str<T: DeserializeOwned>(text: &str, format: Format) -> ConfigResult<T> {
    match format {
        Format::Yaml => Ok(serde_yaml::from_str(text)?),
        Format::Json => Ok(serde_json::from_str(text)?),
    }
}

/// Read and parse a document, choosing the format from the extension.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file cannot be read, otherwise as
/// [`parse_str`].
pub fn parse_file<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "read configuration document");
    parse_str(&text, Format::from_path(path))
}

/// Load a system description.
///
/// # Errors
///
/// See [`parse_file`].
pub fn load_system(path: &Path) -> ConfigResult<SystemConfig> {
    parse_file(path)
}

/// Load a task catalog.
///
/// # Errors
///
/// See [`parse_file`].
pub fn load_tasks(path: &Path) -> ConfigResult<TaskSet> {
    parse_file(path)
}

/// Everything the allocator needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct AllocationInput {
    /// Allocator configuration
    pub config: AllocatorConfig,
    /// Criticality ordering
    pub ordering: CriticalityOrdering,
    /// Resolved catalog in document order
    pub tasks: Vec<Task>,
}

impl AllocationInput {
    /// Resolve parsed documents into allocator inputs.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Model`] when the ordering, a task or the system
    /// limits are invalid.
    pub fn from_documents(system: &SystemConfig, tasks: &TaskSet) -> ConfigResult<Self> {
        let config = system.allocator_config();
        config.validate()?;
        let ordering = system.ordering()?;
        let tasks = tasks.resolve(&ordering)?;
        debug!(
            tasks = tasks.len(),
            levels = ordering.levels(),
            processors = config.num_processors,
            "resolved allocation input"
        );
        Ok(Self {
            config,
            ordering,
            tasks,
        })
    }

    /// Load and resolve both documents.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(system: &Path, tasks: &Path) -> ConfigResult<Self> {
        Self::from_documents(&load_system(system)?, &load_tasks(tasks)?)
    }
}
