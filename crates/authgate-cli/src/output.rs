//! Formatted output helpers for CLI commands.

use authgate_harness::ScenarioReport;
use serde::Serialize;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Formats milliseconds as seconds with one decimal, or whole milliseconds below one second.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_millis(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

/// Renders a step's exit code.
#[must_use]
pub fn format_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| c.to_string())
}

/// Prints a human-readable summary of a passing scenario to stderr.
#[allow(clippy::print_stderr)]
pub fn print_report(report: &ScenarioReport) {
    eprintln!();
    eprintln!(
        "  {GREEN}{BOLD}PASS{RESET} logout scenario {DIM}[{}]{RESET} against {BOLD}{}{RESET}",
        report.id.short(),
        report.endpoint
    );
    for step in &report.steps {
        eprintln!(
            "    {GREEN}●{RESET} {:<14} exit {:<6} {DIM}{:>8}  {}{RESET}",
            step.phase.to_string(),
            format_exit(step.exit_code),
            format_millis(step.elapsed_ms),
            step.command
        );
    }
    let total = (report.finished_at - report.started_at)
        .num_milliseconds()
        .unsigned_abs();
    eprintln!("  {DIM}total {}{RESET}", format_millis(total));
}

/// Prints a confirmation of a purge to stderr.
#[allow(clippy::print_stderr)]
pub fn print_purged(program: &str) {
    eprintln!(
        "  {GREEN}●{RESET} removed all containers and images managed by {BOLD}{program}{RESET}"
    );
}

/// Prints `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
