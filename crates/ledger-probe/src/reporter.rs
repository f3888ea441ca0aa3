//! Result aggregation and reporting.
//!
//! - [`summarize`] folds per-probe results into a [`RunSummary`]
//! - [`render`] produces the plain-text summary (no colour, no timestamps)
//! - [`render_json`] produces the machine-readable summary
//! - [`exit_code`] derives the process exit status
//! - [`TerminalReporter`] prints live progress lines and a coloured summary
//!
//! # Example
//!
//! ```no_run
//! use ledger_probe::{ProgressEvent, TerminalReporter, exit_code, render, summarize};
//!
//! let mut reporter = TerminalReporter::new();
//! reporter.handle_progress(ProgressEvent::RunStarted { total_probes: 17 });
//!
//! let summary = summarize(Vec::new());
//! print!("{}", render(&summary));
//! std::process::exit(exit_code(&summary));
//! ```

use crate::models::{ProbeResult, Verdict, duration_serde};
use crate::runner::{ProgressCallback, ProgressEvent};
use crate::state::RunState;
use colored::Colorize;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

const RULE_WIDTH: usize = 60;

/// Transaction ids listed in the footer before eliding the rest.
const LISTED_TRANSACTIONS: usize = 3;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// Failed to serialize the summary to JSON.
    #[error("failed to serialize report: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Aggregate over every probe result of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    /// Sum of per-probe durations.
    #[serde(rename = "total_duration_secs", with = "duration_serde")]
    pub total_duration: Duration,
    /// Percentage of passing probes, rounded to one decimal; 0 for an empty run.
    pub success_rate: f64,
    /// True when the run was cancelled before every probe executed.
    pub interrupted: bool,
    /// Results in execution order.
    pub results: Vec<ProbeResult>,
    pub created_accounts: Vec<String>,
    pub created_transactions: Vec<String>,
}

impl RunSummary {
    /// Copies the identifiers created during the run.
    pub fn with_state(mut self, state: &RunState) -> Self {
        self.created_accounts = state.accounts().to_vec();
        self.created_transactions = state.transactions().to_vec();
        self
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Returns results grouped by probe group, in order of first appearance.
    pub fn by_group(&self) -> Vec<(&str, Vec<&ProbeResult>)> {
        let mut groups: Vec<(&str, Vec<&ProbeResult>)> = Vec::new();
        for result in &self.results {
            match groups.iter_mut().find(|(group, _)| *group == result.group) {
                Some((_, members)) => members.push(result),
                None => groups.push((result.group.as_str(), vec![result])),
            }
        }
        groups
    }

    pub fn failures(&self) -> Vec<&ProbeResult> {
        self.results.iter().filter(|r| r.is_fail()).collect()
    }

    pub fn skips(&self) -> Vec<&ProbeResult> {
        self.results.iter().filter(|r| r.is_skip()).collect()
    }

    /// Passing results that carry soft-match notes.
    pub fn noted(&self) -> Vec<&ProbeResult> {
        self.results
            .iter()
            .filter(|r| r.is_pass() && !r.notes.is_empty())
            .collect()
    }
}

/// Folds results into a summary.
pub fn summarize(results: Vec<ProbeResult>) -> RunSummary {
    let passed = results.iter().filter(|r| r.is_pass()).count();
    let failed = results.iter().filter(|r| r.is_fail()).count();
    let skipped = results.iter().filter(|r| r.is_skip()).count();
    let total = results.len();
    let total_duration = results.iter().map(|r| r.duration).sum();

    RunSummary {
        passed,
        failed,
        skipped,
        total,
        total_duration,
        success_rate: success_rate(passed, total),
        interrupted: false,
        results,
        created_accounts: Vec::new(),
        created_transactions: Vec::new(),
    }
}

fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (passed as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Process exit status: 1 if any probe failed, else 0.
pub fn exit_code(summary: &RunSummary) -> i32 {
    i32::from(summary.failed > 0)
}

/// Renders the plain-text summary.
pub fn render(summary: &RunSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&format!("{rule}\nTEST SUMMARY\n{rule}\n"));
    out.push_str(&format!("Total Tests: {}\n", summary.total));
    out.push_str(&format!("Passed: {}\n", summary.passed));
    out.push_str(&format!("Failed: {}\n", summary.failed));
    out.push_str(&format!("Skipped: {}\n", summary.skipped));
    out.push_str(&format!("Success Rate: {:.1}%\n", summary.success_rate));
    out.push_str(&format!(
        "Total Duration: {:.3}s\n",
        summary.total_duration.as_secs_f64()
    ));
    if summary.interrupted {
        out.push_str("INTERRUPTED: run stopped before all probes executed\n");
    }

    let groups = summary.by_group();
    if !groups.is_empty() {
        out.push_str("\nBy group:\n");
        for (group, members) in groups {
            let passed = members.iter().filter(|r| r.is_pass()).count();
            out.push_str(&format!("  {group}: {passed}/{} passed\n", members.len()));
        }
    }

    push_section(&mut out, "FAILED TESTS:", &summary.failures(), |r| {
        r.message.clone()
    });
    push_section(&mut out, "SKIPPED TESTS:", &summary.skips(), |r| {
        r.message.clone()
    });
    push_section(&mut out, "NOTES:", &summary.noted(), |r| r.notes.join("; "));

    out.push('\n');
    out.push_str(&format!(
        "Created test accounts: {}\n",
        summary.created_accounts.len()
    ));
    out.push_str(&format!(
        "Created test transactions: {}\n",
        summary.created_transactions.len()
    ));
    if !summary.created_accounts.is_empty() {
        out.push_str(&format!(
            "Account IDs: {}\n",
            summary.created_accounts.join(", ")
        ));
    }
    if !summary.created_transactions.is_empty() {
        let listed: Vec<&str> = summary
            .created_transactions
            .iter()
            .take(LISTED_TRANSACTIONS)
            .map(String::as_str)
            .collect();
        let more = if summary.created_transactions.len() > LISTED_TRANSACTIONS {
            "..."
        } else {
            ""
        };
        out.push_str(&format!("Transaction IDs: {}{more}\n", listed.join(", ")));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

fn push_section(
    out: &mut String,
    title: &str,
    results: &[&ProbeResult],
    detail: impl Fn(&ProbeResult) -> String,
) {
    if results.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    for result in results {
        out.push_str(&format!("  - {}: {}\n", result.name, detail(result)));
    }
}

/// Renders the summary as pretty-printed JSON.
pub fn render_json(summary: &RunSummary) -> Result<String, ReporterError> {
    serde_json::to_string_pretty(summary).map_err(ReporterError::from)
}

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// No live progress; only the final summary.
    Quiet,
    /// One line per probe.
    #[default]
    Normal,
    /// Probe start lines, status codes and notes.
    Verbose,
}

/// Terminal reporter for live progress.
#[derive(Debug)]
pub struct TerminalReporter {
    verbosity: Verbosity,

    /// Group of the last printed probe, for section headers.
    current_group: Option<String>,
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalReporter {
    /// Creates a new terminal reporter with normal verbosity.
    pub fn new() -> Self {
        Self::with_verbosity(Verbosity::Normal)
    }

    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            current_group: None,
        }
    }

    /// Handles a progress event, printing appropriate output.
    pub fn handle_progress(&mut self, event: ProgressEvent) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }

        match event {
            ProgressEvent::RunStarted { total_probes } => {
                println!(
                    "\n{}\n",
                    format!(
                        "Running {} probe{}...",
                        total_probes,
                        if total_probes == 1 { "" } else { "s" }
                    )
                    .bold()
                );
            }
            ProgressEvent::ProbeStarted { name, group } => {
                if self.current_group.as_deref() != Some(group.as_str()) {
                    println!("{}", group.bold().underline());
                    self.current_group = Some(group);
                }
                if self.verbosity == Verbosity::Verbose {
                    println!("  {} {}", "→".dimmed(), name.dimmed());
                }
            }
            ProgressEvent::ProbeCompleted { result } => self.print_result(&result),
            ProgressEvent::RunInterrupted { completed } => {
                println!(
                    "\n{}",
                    format!("Interrupted after {completed} result(s); stopping.").yellow()
                );
            }
            // The summary is printed separately via print_summary.
            ProgressEvent::RunCompleted { .. } => {}
        }
    }

    fn print_result(&self, result: &ProbeResult) {
        let line = format!(
            "  {} {}: {} {}",
            result.verdict.emoji(),
            result.name,
            result.message,
            format!("({:.3}s)", result.duration.as_secs_f64()).dimmed()
        );
        match result.verdict {
            Verdict::Pass => println!("{line}"),
            Verdict::Fail => println!("{}", line.red()),
            Verdict::Skip => println!("{}", line.dimmed()),
        }

        if self.verbosity == Verbosity::Verbose {
            if let Some(status) = result.status_code {
                println!("     {} HTTP {}", "└─".dimmed(), status);
            }
            for note in &result.notes {
                println!("     {} {}", "└─".dimmed(), note.yellow());
            }
        }
    }

    /// Prints the rendered summary with colour applied per line.
    pub fn print_summary(&self, summary: &RunSummary) {
        let mut section = "";
        for line in render(summary).lines() {
            if !line.starts_with("  ") {
                section = line;
            }
            println!("{}", colorize_line(line, section, summary));
        }
    }
}

fn colorize_line(line: &str, section: &str, summary: &RunSummary) -> String {
    if line.starts_with('=') || line == "TEST SUMMARY" {
        return line.bold().to_string();
    }
    if line.starts_with("Passed:") {
        return line.green().to_string();
    }
    if line.starts_with("Failed:") && summary.failed > 0 {
        return line.red().bold().to_string();
    }
    if line.starts_with("INTERRUPTED") {
        return line.yellow().bold().to_string();
    }
    if line.starts_with("  - ") {
        return match section {
            "FAILED TESTS:" => line.red().to_string(),
            "NOTES:" => line.yellow().to_string(),
            _ => line.dimmed().to_string(),
        };
    }
    line.to_string()
}

/// Creates a progress callback for use with [`crate::ProbeRunner`].
pub fn create_progress_callback(verbosity: Verbosity) -> ProgressCallback {
    let reporter = Arc::new(Mutex::new(TerminalReporter::with_verbosity(verbosity)));

    Box::new(move |event| {
        if let Ok(mut r) = reporter.lock() {
            r.handle_progress(event);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(name: &str, group: &str, verdict: Verdict, message: &str) -> ProbeResult {
        ProbeResult::new(name, group, verdict, message).with_duration(Duration::from_millis(250))
    }

    fn mixed_summary() -> RunSummary {
        summarize(vec![
            result("Service Health Check", "Health", Verdict::Pass, "HTTP 200 as expected"),
            result("Account Creation - Success", "Accounts", Verdict::Pass, "HTTP 200 as expected")
                .with_notes(vec!["optional field 'initial_balance' absent".to_string()]),
            result(
                "Account Creation - Zero Balance",
                "Accounts",
                Verdict::Fail,
                "expected 400, got 200",
            ),
            result(
                "Transaction Retrieval - Success",
                "Transactions",
                Verdict::Skip,
                "requires transaction #1 but only 0 recorded",
            )
            .with_duration(Duration::ZERO),
        ])
    }

    #[test]
    fn test_summarize_counts() {
        let summary = mixed_summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(750));
        assert_eq!(summary.success_rate, 50.0);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_counts_add_up() {
        let summary = mixed_summary();
        assert_eq!(
            summary.passed + summary.failed + summary.skipped,
            summary.total
        );
    }

    #[test]
    fn test_success_rate_rounding() {
        assert_eq!(success_rate(2, 3), 66.7);
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(17, 17), 100.0);
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(&summarize(Vec::new())), 0);
        assert_eq!(exit_code(&mixed_summary()), 1);

        let skipped_only = summarize(vec![result("a", "Accounts", Verdict::Skip, "unmet")]);
        assert_eq!(exit_code(&skipped_only), 0);
    }

    #[test]
    fn test_by_group_keeps_first_appearance_order() {
        let summary = summarize(vec![
            result("a", "Accounts", Verdict::Pass, ""),
            result("b", "Health", Verdict::Pass, ""),
            result("c", "Accounts", Verdict::Fail, ""),
        ]);
        let groups: Vec<(&str, usize)> = summary
            .by_group()
            .into_iter()
            .map(|(g, members)| (g, members.len()))
            .collect();
        assert_eq!(groups, [("Accounts", 2), ("Health", 1)]);
    }

    #[test]
    fn test_render_layout() {
        let mut state = RunState::new();
        state.record_account("A1");
        state.record_account("A2");
        for id in ["T1", "T2", "T3", "T4"] {
            state.record_transaction(id);
        }
        let summary = mixed_summary().with_state(&state);

        let expected = [
            "=".repeat(60).as_str(),
            "TEST SUMMARY",
            "=".repeat(60).as_str(),
            "Total Tests: 4",
            "Passed: 2",
            "Failed: 1",
            "Skipped: 1",
            "Success Rate: 50.0%",
            "Total Duration: 0.750s",
            "",
            "By group:",
            "  Health: 1/1 passed",
            "  Accounts: 1/2 passed",
            "  Transactions: 0/1 passed",
            "",
            "FAILED TESTS:",
            "  - Account Creation - Zero Balance: expected 400, got 200",
            "",
            "SKIPPED TESTS:",
            "  - Transaction Retrieval - Success: requires transaction #1 but only 0 recorded",
            "",
            "NOTES:",
            "  - Account Creation - Success: optional field 'initial_balance' absent",
            "",
            "Created test accounts: 2",
            "Created test transactions: 4",
            "Account IDs: A1, A2",
            "Transaction IDs: T1, T2, T3...",
            "=".repeat(60).as_str(),
        ]
        .join("\n")
            + "\n";

        assert_eq!(render(&summary), expected);
    }

    #[test]
    fn test_render_empty_summary() {
        let text = render(&summarize(Vec::new()));
        assert!(text.contains("Total Tests: 0"));
        assert!(text.contains("Success Rate: 0.0%"));
        assert!(!text.contains("By group:"));
        assert!(!text.contains("Account IDs"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let summary = mixed_summary();
        assert_eq!(render(&summary), render(&summary.clone()));
    }

    #[test]
    fn test_render_interrupted() {
        let mut summary = mixed_summary();
        summary.interrupted = true;
        assert!(render(&summary).contains("INTERRUPTED"));
        assert_eq!(exit_code(&summary), 1);
    }

    #[test]
    fn test_render_json() {
        let summary = summarize(vec![
            result("Service Health Check", "Health", Verdict::Pass, "HTTP 200 as expected")
                .with_response(200, None),
        ]);
        let value: serde_json::Value = serde_json::from_str(&render_json(&summary).unwrap()).unwrap();

        assert_eq!(value["passed"], json!(1));
        assert_eq!(value["success_rate"], json!(100.0));
        assert_eq!(value["total_duration_secs"], json!(0.25));
        assert_eq!(value["interrupted"], json!(false));
        assert_eq!(value["results"][0]["verdict"], json!("PASS"));
        assert_eq!(value["results"][0]["status_code"], json!(200));
    }

    #[test]
    fn test_reporter_default() {
        let reporter = TerminalReporter::default();
        assert_eq!(reporter.verbosity, Verbosity::Normal);
        assert!(reporter.current_group.is_none());
    }

    #[test]
    fn test_handle_progress_tracks_group() {
        let mut reporter = TerminalReporter::with_verbosity(Verbosity::Verbose);
        reporter.handle_progress(ProgressEvent::RunStarted { total_probes: 2 });
        reporter.handle_progress(ProgressEvent::ProbeStarted {
            name: "Service Health Check".to_string(),
            group: "Health".to_string(),
        });
        reporter.handle_progress(ProgressEvent::ProbeCompleted {
            result: result("Service Health Check", "Health", Verdict::Pass, "ok")
                .with_response(200, None),
        });
        assert_eq!(reporter.current_group.as_deref(), Some("Health"));
    }

    #[test]
    fn test_handle_progress_quiet_mode() {
        let mut reporter = TerminalReporter::with_verbosity(Verbosity::Quiet);
        reporter.handle_progress(ProgressEvent::ProbeStarted {
            name: "probe".to_string(),
            group: "Accounts".to_string(),
        });
        assert!(reporter.current_group.is_none());
    }

    #[test]
    fn test_colorize_keeps_text() {
        colored::control::set_override(false);
        let summary = mixed_summary();
        let line = "  - Account Creation - Zero Balance: expected 400, got 200";
        assert_eq!(colorize_line(line, "FAILED TESTS:", &summary), line);
    }

    #[test]
    fn test_print_summary_smoke() {
        let reporter = TerminalReporter::new();
        reporter.print_summary(&mixed_summary());
    }

    #[test]
    fn test_create_progress_callback() {
        let callback = create_progress_callback(Verbosity::Quiet);
        callback(ProgressEvent::RunStarted { total_probes: 1 });
    }
}
