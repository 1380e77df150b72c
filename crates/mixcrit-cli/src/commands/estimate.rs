//! `estimate`: initial processor estimate without allocating.

use mixcrit_alloc::estimate_processors;
use serde::Serialize;

use super::InputArgs;
use crate::error::CliError;
use crate::output::print_json_success;

#[derive(Debug, Serialize)]
struct Estimate {
    estimate: usize,
    ceiling: usize,
    cores_per_processor: usize,
    feasible: bool,
}

pub fn execute(input: &InputArgs, json: bool) -> Result<(), CliError> {
    let input = input.load()?;
    let estimate = estimate_processors(&input.tasks, input.config.cores_per_processor);
    let result = Estimate {
        estimate,
        ceiling: input.config.num_processors,
        cores_per_processor: input.config.cores_per_processor,
        feasible: estimate <= input.config.num_processors,
    };

    if json {
        return print_json_success("estimate", &result);
    }
    println!(
        "Initial processor estimate: {} of {} available ({} cores each)",
        result.estimate, result.ceiling, result.cores_per_processor
    );
    if !result.feasible {
        println!("The catalog cannot fit: the estimate already exceeds the ceiling");
    }
    Ok(())
}
