//! `allocate`: run the allocator and emit the allocation document.

use std::path::PathBuf;

use clap::Args;
use mixcrit_alloc::allocate;

use super::{InputArgs, OutputFormat, emit};
use crate::error::CliError;

#[derive(Args, Debug, Clone)]
pub struct AllocateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Document format (defaults to JSON with --json, YAML otherwise)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write the document here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: &AllocateArgs, json: bool) -> Result<(), CliError> {
    let input = args.input.load()?;
    let allocation = allocate(input.config, input.ordering, input.tasks)?;

    let format = args.format.unwrap_or(if json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    });
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&allocation)?,
        OutputFormat::Yaml => serde_yaml::to_string(&allocation)?,
    };
    emit(text.trim_end(), args.output.as_deref())
}
