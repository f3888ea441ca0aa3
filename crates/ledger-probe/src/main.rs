//! # ledger-probe
//!
//! Business-rule conformance harness for an HTTP ledger service.
//!
//! Runs the ledger probe sequence against a live service and exits with 1
//! if any probe failed, 0 otherwise.
//!
//! ## Usage
//!
//! ```bash
//! # Probe a local service
//! ledger-probe
//!
//! # Probe another deployment with a shorter timeout
//! ledger-probe --url https://ledger.staging.internal --timeout 5
//!
//! # Only transaction probes, machine-readable summary
//! ledger-probe --filter transaction --report json
//!
//! # List the probe sequence
//! ledger-probe --list
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use ledger_probe::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, HarnessConfig, HttpProbeClient, ProbeRunner, RunConfig,
    TerminalReporter, Verbosity, create_progress_callback, exit_code, ledger_suite, render_json,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Conformance probes for a ledger service.
///
/// Creates accounts and transactions through the service's HTTP API and
/// checks that business rules (balances, validation, not-found handling)
/// are enforced.
#[derive(Parser, Debug)]
#[command(name = "ledger-probe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base address of the ledger service
    #[arg(long, env = "LEDGER_PROBE_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "LEDGER_PROBE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Run only probes whose name or group contains this pattern
    #[arg(long)]
    pub filter: Option<String>,

    /// List the probe sequence without running it
    #[arg(long)]
    pub list: bool,

    /// Summary format written to stdout
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    /// Show detailed output during the run
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show the final summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Summary output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON (machine-readable); suppresses live progress
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match try_main(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default = if verbose { "ledger_probe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn try_main(cli: &Cli) -> anyhow::Result<i32> {
    if cli.list {
        list_probes();
        return Ok(0);
    }

    let config = HarnessConfig::new(&cli.url)
        .and_then(|c| c.with_timeout(Duration::from_secs(cli.timeout)))
        .context("invalid configuration")?;
    let client = HttpProbeClient::new(&config).context("invalid configuration")?;

    let rt = tokio::runtime::Runtime::new().context("failed to create Tokio runtime")?;
    rt.block_on(run_probes(cli, &config, client))
}

fn verbosity(cli: &Cli) -> Verbosity {
    if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

fn list_probes() {
    let probes = ledger_suite();
    println!("{}\n", "Probe sequence:".bold());

    let mut current_group = "";
    for (index, probe) in probes.iter().enumerate() {
        if probe.group != current_group {
            current_group = probe.group.as_str();
            println!("  {}", current_group.bold().underline());
        }
        let target = probe
            .requests
            .first()
            .map(|r| format!("{} {}", r.method, r.path))
            .unwrap_or_default();
        println!(
            "    {:>2}. {}  {}",
            index + 1,
            probe.name.cyan(),
            target.dimmed()
        );
    }

    println!("\n  {}", format!("Total: {} probes", probes.len()).dimmed());
}

async fn run_probes(
    cli: &Cli,
    config: &HarnessConfig,
    client: HttpProbeClient,
) -> anyhow::Result<i32> {
    let verbosity = verbosity(cli);
    let text = cli.report == ReportFormat::Text;

    if text && verbosity != Verbosity::Quiet {
        println!(
            "\n{} {}",
            "🏦 Ledger Conformance Probe".bold(),
            format!("v{}", ledger_probe::VERSION).dimmed()
        );
        println!("{}", "=".repeat(60).dimmed());
        println!(
            "Started at: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("Target service: {}", config.base_url());
    }
    info!(url = %config.base_url(), timeout = ?config.timeout(), "starting probe run");

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl+C, stopping after the current probe...");
            on_interrupt.cancel();
        }
    });

    let mut runner = ProbeRunner::new(Box::new(client), ledger_suite()).with_cancellation(token);
    if text {
        runner = runner.on_progress(create_progress_callback(verbosity));
    }

    let mut run_config = RunConfig::new();
    if let Some(filter) = &cli.filter {
        run_config = run_config.with_filter(filter);
    }

    let summary = runner.run(&run_config).await?;

    match cli.report {
        ReportFormat::Text => TerminalReporter::with_verbosity(verbosity).print_summary(&summary),
        ReportFormat::Json => println!("{}", render_json(&summary)?),
    }

    Ok(exit_code(&summary))
}
