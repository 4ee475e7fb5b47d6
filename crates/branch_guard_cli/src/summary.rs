//! End-of-run summary rendering.

use branch_guard_core::{RepositoryOutcome, RepositoryReport, RunSummary};
use colored::Colorize;

use crate::errors::{EXIT_OK, EXIT_REPOSITORY_FAILED};

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;

/// Process exit status for a completed run.
///
/// Partial failures are reported but do not change the exit status.
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.is_success() {
        EXIT_OK
    } else {
        EXIT_REPOSITORY_FAILED
    }
}

/// Formats the outcome of every repository followed by the totals.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut output = format!("\n{}\n", "Summary".bold());

    if summary.outcomes.is_empty() {
        output.push_str(&format!("  {}\n", "No repositories processed".dimmed()));
        return output;
    }

    for outcome in &summary.outcomes {
        match outcome {
            RepositoryOutcome::Success(report) => {
                output.push_str(&format!(
                    "  {} {} {}\n",
                    "✓".green(),
                    report.repository.bold(),
                    counts(report).dimmed()
                ));
            }
            RepositoryOutcome::Partial(report) => {
                output.push_str(&format!(
                    "  {} {} {}\n",
                    "⚠".yellow(),
                    report.repository.bold(),
                    counts(report).dimmed()
                ));
                for failure in &report.failures {
                    output.push_str(&format!(
                        "      {} {}: {}\n",
                        "✗".red(),
                        failure.operation,
                        failure.source
                    ));
                }
            }
            RepositoryOutcome::Failed(error) => {
                output.push_str(&format!(
                    "  {} {} {}\n",
                    "✗".red(),
                    error.repository.bold(),
                    error.source.to_string().red()
                ));
            }
        }
    }

    output.push_str(&format!(
        "\n{} succeeded, {} partially applied, {} failed\n",
        summary.succeeded().to_string().green(),
        summary.partial().to_string().yellow(),
        summary.failed().to_string().red()
    ));
    output
}

fn counts(report: &RepositoryReport) -> String {
    let mut parts = vec![
        format!("{} deleted", report.deleted),
        format!("{} created", report.created),
    ];
    if report.updated > 0 {
        parts.push(format!("{} updated", report.updated));
    }
    if report.skipped > 0 {
        parts.push(format!("{} already present", report.skipped));
    }
    if report.granted > 0 {
        parts.push(format!("{} group grants", report.granted));
    }
    format!("({})", parts.join(", "))
}
