//! Command implementations for mixcritctl

pub mod allocate;
pub mod estimate;
pub mod report;
pub mod verify;

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use mixcrit_config::AllocationInput;
use tracing::info;

use crate::error::CliError;

/// The two input documents every command reads.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// System description (processors, cores, criticality levels)
    #[arg(short, long, value_name = "FILE")]
    pub system: PathBuf,

    /// Task catalog
    #[arg(short, long, value_name = "FILE")]
    pub tasks: PathBuf,
}

impl InputArgs {
    pub fn load(&self) -> Result<AllocationInput, CliError> {
        let input = AllocationInput::load(&self.system, &self.tasks)?;
        info!(
            system = %self.system.display(),
            tasks = input.tasks.len(),
            "loaded allocation input"
        );
        Ok(input)
    }
}

/// Serialization format for the allocation document.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Write `text` to `path`, or to stdout when no path is given.
pub fn emit(text: &str, path: Option<&Path>) -> Result<(), CliError> {
    match path {
        Some(path) => {
            std::fs::write(path, text)?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}
