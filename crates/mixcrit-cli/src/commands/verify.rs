//! `verify`: allocate, then re-check the result independently.

use mixcrit_alloc::{DiversityScope, allocate, verify_allocation};
use serde_json::json;
use tracing::warn;

use super::InputArgs;
use crate::error::CliError;
use crate::output::print_violations_human;

pub fn execute(input: &InputArgs, json: bool) -> Result<(), CliError> {
    let input = input.load()?;
    let allocation = allocate(input.config.clone(), input.ordering.clone(), input.tasks.clone())?;
    let violations = verify_allocation(&allocation, &input.ordering, &input.tasks, &input.config);

    for violation in &violations {
        warn!(%violation, "allocation property violated");
    }

    if json {
        let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
        let output = json!({
            "success": violations.is_empty(),
            "instances": allocation.instance_count(),
            "mirror_check": input.config.diversity_scope == DiversityScope::Processor,
            "violations": messages,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_violations_human(
            &violations,
            allocation.instance_count(),
            input.config.diversity_scope,
        );
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(CliError::Verification(violations.len()))
    }
}
