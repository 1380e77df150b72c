//! Output formatting for CLI responses

use anyhow::Error;
use colored::Colorize;
use mixcrit_alloc::{Allocation, DiversityScope, Role, Violation};
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let kind = error.downcast_ref::<CliError>().map_or("other", CliError::kind);
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": kind,
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print a success envelope around `payload`.
pub fn print_json_success<T: Serialize>(key: &str, payload: &T) -> Result<(), CliError> {
    let mut output = json!({ "success": true });
    if let Some(map) = output.as_object_mut() {
        map.insert(key.to_owned(), serde_json::to_value(payload)?);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Summary counts shown at the top of the text report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub tasks: usize,
    pub instances: usize,
    pub processors_used: usize,
    pub num_processors: usize,
    pub cores_used: usize,
    pub num_procs_estimate: usize,
}

impl Summary {
    pub fn of(allocation: &Allocation) -> Self {
        Self {
            tasks: allocation.task_count(),
            instances: allocation.instance_count(),
            processors_used: allocation.processors_used(),
            num_processors: allocation.num_processors,
            cores_used: allocation.cores_used(),
            num_procs_estimate: allocation.num_procs_estimate,
        }
    }
}

/// Render the plain-text allocation report.
///
/// Every processor of the pool is listed. Unused processors show
/// `<Unused>`, empty cores `<Empty>`, and utilization is printed per level
/// from the highest rank down.
pub fn render_report(allocation: &Allocation) -> String {
    let rule = "=".repeat(50);
    let summary = Summary::of(allocation);
    let mut lines = vec![
        rule.clone(),
        "--- Final Allocation Report ---".to_owned(),
        rule,
        "\n[Summary]".to_owned(),
        format!("  - Total Unique Tasks: {}", summary.tasks),
        format!("  - Total Instances (Primaries + Replicas): {}", summary.instances),
        format!(
            "  - Processors Used: {} / {}",
            summary.processors_used, summary.num_processors
        ),
        format!("  - Cores Used: {}", summary.cores_used),
        "-".repeat(50),
    ];

    for proc in 0..allocation.num_processors {
        lines.push(format!("\nProcessor {proc}:"));
        if allocation.cores_of(proc).all(|core| core.is_empty()) {
            lines.push("  <Unused>".to_owned());
            continue;
        }

        for core in allocation.cores_of(proc) {
            lines.push(format!("\n  Core {}:", core.core_id));
            if core.is_empty() {
                lines.push("    <Empty>".to_owned());
                continue;
            }

            let util: Vec<String> = allocation
                .levels
                .iter()
                .zip(&core.utilization)
                .rev()
                .map(|(name, value)| format!("{name}: {value:.2}"))
                .collect();
            lines.push(format!("    Util:      | {}", util.join(" | ")));

            let (primaries, replicas): (Vec<_>, Vec<_>) = allocation
                .placements_on(core.processor_id, core.core_id)
                .partition(|p| p.role == Role::Primary);
            if !primaries.is_empty() {
                let names: Vec<&str> = primaries.iter().map(|p| p.task_name.as_str()).collect();
                lines.push(format!("    Primaries: | {}", names.join(", ")));
            }
            if !replicas.is_empty() {
                let names: Vec<String> =
                    replicas.iter().map(|p| format!("{}(R)", p.task_name)).collect();
                lines.push(format!("    Replicas:  | {}", names.join(", ")));
            }
        }
    }

    lines.join("\n")
}

/// Summary line for an allocation that passed verification.
///
/// Processor-level mirror freedom is only checked under
/// [`DiversityScope::Processor`], so the core scope says so.
pub fn verified_message(instances: usize, scope: DiversityScope) -> String {
    match scope {
        DiversityScope::Processor => {
            format!("{instances} instance(s) satisfy every allocation property")
        }
        DiversityScope::Core => format!(
            "{instances} instance(s) pass the utilization, deadline, demand and placement checks \
             (mirror check skipped under core diversity scope)"
        ),
    }
}

/// Print verification results in human format.
pub fn print_violations_human(violations: &[Violation], instances: usize, scope: DiversityScope) {
    if violations.is_empty() {
        println!("{} {}", "OK:".green().bold(), verified_message(instances, scope));
        return;
    }
    println!("{}", "Allocation violates:".red().bold());
    for violation in violations {
        println!("  {} {violation}", "✗".red());
    }
}
