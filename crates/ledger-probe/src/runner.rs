//! Probe sequence runner.
//!
//! The [`ProbeRunner`] executes probes strictly in order, one at a time,
//! threading a single [`RunState`] through the run so later probes can refer
//! to identifiers created by earlier ones.
//!
//! # Example
//!
//! ```no_run
//! use ledger_probe::{HarnessConfig, HttpProbeClient, ProbeRunner, RunConfig, ledger_suite};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = HarnessConfig::new("http://localhost:8080").unwrap();
//!     let client = HttpProbeClient::new(&config).unwrap();
//!
//!     let runner = ProbeRunner::new(Box::new(client), ledger_suite());
//!     let summary = runner.run(&RunConfig::default()).await.unwrap();
//!
//!     println!("Passed: {}", summary.passed);
//! }
//! ```

use crate::client::ProbeTransport;
use crate::grader;
use crate::models::{ProbeResult, Verdict};
use crate::probe::{ProbeSpec, ResolveError, ResolvedProbe};
use crate::reporter::{RunSummary, summarize};
use crate::state::RunState;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that abort a run before any probe executes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// No probes matched the filter.
    #[error("no probes matched filter: {0}")]
    NoMatchingProbes(String),
}

/// Configuration for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Run only probes whose name or group contains this pattern.
    pub filter: Option<String>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Progress callback for run updates.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A run has started.
    RunStarted { total_probes: usize },

    /// A probe (or a prerequisite it triggered) is about to execute.
    ProbeStarted { name: String, group: String },

    /// A probe has produced its result.
    ProbeCompleted { result: ProbeResult },

    /// Cancellation was observed; no further probes will start.
    RunInterrupted { completed: usize },

    /// The run has finished, normally or after interruption.
    RunCompleted { summary: RunSummary },
}

/// Executes an ordered probe sequence against a transport.
pub struct ProbeRunner {
    transport: Box<dyn ProbeTransport>,
    probes: Vec<ProbeSpec>,
    on_progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl ProbeRunner {
    /// Creates a runner over the given probes.
    pub fn new(transport: Box<dyn ProbeTransport>, probes: Vec<ProbeSpec>) -> Self {
        Self {
            transport,
            probes,
            on_progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets a callback for progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns a handle that stops the run after the current probe.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Returns probes matching the given config, in sequence order.
    pub fn matching_probes(&self, config: &RunConfig) -> Vec<&ProbeSpec> {
        self.probes
            .iter()
            .filter(|p| config.filter.as_deref().is_none_or(|f| p.matches_filter(f)))
            .collect()
    }

    /// Runs every matching probe in order and returns the summary.
    ///
    /// Cancellation is checked before each probe; a cancelled run returns
    /// the results collected so far with `interrupted` set.
    pub async fn run(&self, config: &RunConfig) -> Result<RunSummary, RunnerError> {
        let matching = self.matching_probes(config);

        if matching.is_empty()
            && let Some(filter) = &config.filter
        {
            return Err(RunnerError::NoMatchingProbes(filter.clone()));
        }

        self.emit_progress(ProgressEvent::RunStarted {
            total_probes: matching.len(),
        });

        let mut state = RunState::new();
        let mut results = Vec::new();
        let mut interrupted = false;

        for probe in matching {
            if self.cancel.is_cancelled() {
                warn!(completed = results.len(), "run interrupted");
                self.emit_progress(ProgressEvent::RunInterrupted {
                    completed: results.len(),
                });
                interrupted = true;
                break;
            }
            self.run_probe(probe, &mut state, &mut results).await;
        }

        let mut summary = summarize(results).with_state(&state);
        summary.interrupted = interrupted;

        self.emit_progress(ProgressEvent::RunCompleted {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    /// Runs one probe, first running its prerequisite if its dependencies
    /// are unmet. Every result produced is appended to `results`.
    async fn run_probe(
        &self,
        probe: &ProbeSpec,
        state: &mut RunState,
        results: &mut Vec<ProbeResult>,
    ) {
        let resolved = match probe.resolve(state) {
            Ok(resolved) => resolved,
            Err(err) => match &probe.prerequisite {
                Some(prerequisite) if err.is_unmet_dependency() => {
                    info!(
                        probe = %probe.name,
                        prerequisite = %prerequisite.name,
                        reason = %err,
                        "running prerequisite"
                    );
                    self.start(prerequisite);
                    let result = match prerequisite.resolve(state) {
                        Ok(resolved) => self.execute(prerequisite, &resolved, state).await,
                        Err(err) => unresolved(prerequisite, &err),
                    };
                    self.finish(result, results);

                    match probe.resolve(state) {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            self.start(probe);
                            self.finish(unresolved(probe, &err), results);
                            return;
                        }
                    }
                }
                _ => {
                    self.start(probe);
                    self.finish(unresolved(probe, &err), results);
                    return;
                }
            },
        };

        self.start(probe);
        let result = self.execute(probe, &resolved, state).await;
        self.finish(result, results);
    }

    /// Sends every request of a resolved probe and grades the responses.
    async fn execute(
        &self,
        probe: &ProbeSpec,
        resolved: &ResolvedProbe,
        state: &mut RunState,
    ) -> ProbeResult {
        let start = Instant::now();
        let total = resolved.requests.len();
        let mut passed = 0;
        let mut notes = Vec::new();
        let mut first_failure: Option<String> = None;
        let mut last_message = String::new();
        let mut transport_failed = false;
        let mut last_response = None;

        for request in &resolved.requests {
            let outcome = self
                .transport
                .send(request.method, &request.path, request.body.as_ref())
                .await;
            let grade = grader::grade(outcome.as_ref(), &resolved.expectations);

            match &outcome {
                Ok(response) => {
                    for (kind, id) in probe.captured_ids(request, response) {
                        debug!(probe = %probe.name, %kind, %id, "captured identifier");
                        state.record(kind, id);
                    }
                    last_response = Some((response.status, response.body_value()));
                }
                Err(_) => transport_failed = true,
            }

            if grade.passed() {
                passed += 1;
                notes.extend(grade.notes);
            } else if first_failure.is_none() {
                first_failure = Some(grade.message.clone());
            }
            last_message = grade.message;

            if transport_failed {
                break;
            }
        }

        let (verdict, message) = if total == 1 {
            let verdict = if passed == 1 { Verdict::Pass } else { Verdict::Fail };
            (verdict, first_failure.unwrap_or(last_message))
        } else if !transport_failed && probe.quorum.is_met(passed, total) {
            let message = grader::annotate(format!("{passed}/{total} requests passed"), &notes);
            (Verdict::Pass, message)
        } else {
            let reason = first_failure.unwrap_or(last_message);
            (
                Verdict::Fail,
                format!("{passed}/{total} requests passed: {reason}"),
            )
        };

        let mut result = ProbeResult::new(&probe.name, &probe.group, verdict, message)
            .with_notes(notes)
            .with_duration(start.elapsed());
        if let Some((status, body)) = last_response {
            result = result.with_response(status, body);
        }
        result
    }

    fn start(&self, probe: &ProbeSpec) {
        self.emit_progress(ProgressEvent::ProbeStarted {
            name: probe.name.clone(),
            group: probe.group.clone(),
        });
    }

    fn finish(&self, result: ProbeResult, results: &mut Vec<ProbeResult>) {
        match result.verdict {
            Verdict::Pass if !result.notes.is_empty() => {
                warn!(probe = %result.name, notes = ?result.notes, "passed with soft mismatches");
            }
            Verdict::Pass => info!(probe = %result.name, "probe passed"),
            Verdict::Fail => info!(probe = %result.name, message = %result.message, "probe failed"),
            Verdict::Skip => {
                warn!(probe = %result.name, reason = %result.message, "probe skipped");
            }
        }

        self.emit_progress(ProgressEvent::ProbeCompleted {
            result: result.clone(),
        });
        results.push(result);
    }

    /// Emits a progress event if a callback is registered.
    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }
}

/// An unmet dependency skips the probe; any other resolution error fails it.
fn unresolved(probe: &ProbeSpec, err: &ResolveError) -> ProbeResult {
    if err.is_unmet_dependency() {
        ProbeResult::skipped(&probe.name, &probe.group, err.to_string())
    } else {
        ProbeResult::new(&probe.name, &probe.group, Verdict::Fail, err.to_string())
    }
}
