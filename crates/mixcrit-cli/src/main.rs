//! mixcritctl - mixed-criticality task allocation CLI
//!
//! Reads a system description and a task catalog, places every task instance
//! on a processor core, and reports, exports or re-checks the result.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::InputArgs;
use crate::commands::allocate::AllocateArgs;
use crate::commands::report::ReportArgs;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "mixcritctl")]
#[command(about = "Mixed-criticality task allocation - place replicated tasks on multicore processors")]
#[command(version)]
#[command(long_about = "
mixcritctl allocates a catalog of periodic mixed-criticality tasks, each with
one WCET per criticality level and an optional number of replicas, onto the
cores of a pool of processors. Every core passes a demand-bound schedulability
test with tuned virtual deadlines, and replicas never share a processor with
their primary.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(long, global = true, help = "Output in JSON format for machine parsing")]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate the catalog and write the allocation document
    Allocate(AllocateArgs),

    /// Allocate the catalog and print a text report
    Report(ReportArgs),

    /// Print the initial processor estimate
    Estimate(InputArgs),

    /// Allocate the catalog and re-check every allocation property
    Verify(InputArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mixcritctl={log_level},mixcrit_alloc={log_level},mixcrit_config={log_level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cli_error = e.downcast_ref::<CliError>();
            // Verification already reported its findings in JSON.
            let reported = cli.json && matches!(cli_error, Some(CliError::Verification(_)));
            if !reported {
                if cli.json {
                    output::print_error_json(&e);
                } else {
                    output::print_error_human(&e);
                }
            }
            ExitCode::from(cli_error.map_or(1, CliError::exit_code))
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Allocate(args) => commands::allocate::execute(args, cli.json)?,
        Commands::Report(args) => commands::report::execute(args, cli.json)?,
        Commands::Estimate(input) => commands::estimate::execute(input, cli.json)?,
        Commands::Verify(input) => commands::verify::execute(input, cli.json)?,
    }
    Ok(())
}
