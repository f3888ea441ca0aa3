//! # ledger-probe
//!
//! Black-box business-rule conformance harness for an HTTP ledger service.
//!
//! The harness issues a fixed sequence of probes against the account and
//! transaction endpoints, grades each response with tolerant matching, and
//! summarises the run for humans and CI (via the process exit status).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ProbeRunner │────▶│  ProbeSpec  │────▶│  Transport  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!   │        │                                   │
//!   │        ▼                                   ▼
//!   │  ┌─────────────┐                    ┌─────────────┐
//!   │  │  RunState   │                    │   Grader    │
//!   │  └─────────────┘                    └─────────────┘
//!   ▼
//! ┌─────────────┐
//! │  Reporter   │
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - `client`: `ProbeTransport` seam and the `reqwest`-backed client
//! - `body`: generic JSON body with absence-returning accessors
//! - `grader`: expectation descriptors and the grading algorithm
//! - `state`: identifiers created during a run
//! - `probe`: probe definitions, placeholders and captures
//! - `runner`: sequential execution, prerequisites and cancellation
//! - `reporter`: summary, text and JSON rendering, exit code
//! - `suite`: the ledger probe sequence
//! - `testing`: scripted transport for tests

pub use crate::body::ResponseBody;
pub use crate::client::{HttpProbeClient, ProbeTransport, RawResponse, TransportError};
pub use crate::config::{ConfigError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, HarnessConfig};
pub use crate::grader::{ExpectationDescriptor, Grade, MatchMode, grade};
pub use crate::models::{Method, ProbeResult, Verdict};
pub use crate::probe::{
    Capture, CaptureSource, ProbeSpec, Quorum, RequestTemplate, ResolveError, ResolvedProbe,
    ResolvedRequest,
};
pub use crate::reporter::{
    ReporterError, RunSummary, TerminalReporter, Verbosity, create_progress_callback, exit_code,
    render, render_json, summarize,
};
pub use crate::runner::{ProbeRunner, ProgressCallback, ProgressEvent, RunConfig, RunnerError};
pub use crate::state::{IdKind, RunState};
pub use crate::suite::ledger_suite;

pub mod body;
pub mod client;
pub mod config;
pub mod grader;
mod models;
pub mod probe;
pub mod reporter;
pub mod runner;
pub mod state;
pub mod suite;
pub mod testing;

/// Library version, matching the crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
