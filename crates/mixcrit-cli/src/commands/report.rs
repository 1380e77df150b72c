//! `report`: human-readable allocation report.

use std::path::PathBuf;

use clap::Args;
use mixcrit_alloc::allocate;

use super::{InputArgs, emit};
use crate::error::CliError;
use crate::output::{Summary, print_json_success, render_report};

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: &ReportArgs, json: bool) -> Result<(), CliError> {
    let input = args.input.load()?;
    let allocation = allocate(input.config, input.ordering, input.tasks)?;

    if json {
        return print_json_success("summary", &Summary::of(&allocation));
    }
    emit(&render_report(&allocation), args.output.as_deref())
}
