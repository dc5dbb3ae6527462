//! Command-line front end
//!
//! Turns arguments into a [`RunConfig`], prints a status line per task while the
//! dispatcher runs, and maps the result to a process exit code:
//!
//! - `0` once every task is terminal, whatever the individual outcomes
//! - `1` with `--fail-on-error` when any task did not succeed, or on a runtime error
//! - `2` for configuration errors (nothing was dispatched)

use crate::config::RunConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::registry::{HTTPX, ToolRegistry, WAYBACK};
use crate::tools::{PathToolLocator, ToolLocator};
use crate::types::{Event, Outcome, RunReport};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Exit code when `--fail-on-error` is set and a tool did not succeed
pub const EXIT_TASK_FAILED: u8 = 1;

/// Exit code for configuration errors
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// madrecon - automated recon pipeline
///
/// Runs waybackurls and httpx (plus any tools from the config file) against a
/// target in parallel, writing each tool's output to <OUTPUT>/<tool>_<target>.txt.
#[derive(Parser, Debug)]
#[command(name = "madrecon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target domain
    #[arg(value_name = "TARGET", required_unless_present = "list_tools")]
    pub target: Option<String>,

    /// Custom header, repeatable (e.g. -H 'X-Test: value')
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Output directory (default: recon_output)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Run only the wayback URL collector
    #[arg(long, conflicts_with_all = ["httpx_only", "only"])]
    pub wayback_only: bool,

    /// Run only the httpx probe
    #[arg(long, conflicts_with = "only")]
    pub httpx_only: bool,

    /// Run only the named tool, repeatable
    #[arg(long, value_name = "TOOL")]
    pub only: Vec<String>,

    /// Maximum number of tools running at once (default: 10)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// JSON configuration file; command-line flags take priority
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Exit with status 1 if any tool did not succeed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Spawn tools without checking that their binaries exist first
    #[arg(long)]
    pub no_precheck: bool,

    /// List registered tools and whether their binaries were found, then exit
    #[arg(long)]
    pub list_tools: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Merge the arguments over the config file (if any) into a run configuration
    ///
    /// The result is not validated yet.
    pub fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(target) = self.target {
            config.target = target;
        }
        if !self.headers.is_empty() {
            config.headers = self.headers;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(threads) = self.threads {
            config.thread_count = threads;
        }

        if self.wayback_only {
            config.selected_tasks = vec![WAYBACK.to_string()];
        } else if self.httpx_only {
            config.selected_tasks = vec![HTTPX.to_string()];
        } else if !self.only.is_empty() {
            config.selected_tasks = self.only;
        }

        config.fail_on_task_error |= self.fail_on_error;
        if self.no_precheck {
            config.precheck_tools = false;
        }

        Ok(config)
    }

    /// Default log filter for the chosen verbosity
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "madrecon=warn",
            (false, 0) => "madrecon=info",
            (false, 1) => "madrecon=debug",
            (false, _) => "madrecon=trace",
        }
    }
}

/// Initialize logging to stderr
///
/// `RUST_LOG` takes priority over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse arguments, run, and return the process exit code
pub async fn main_entry() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_directive());

    match execute(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if e.is_config() {
                tracing::error!(error = %e, "invalid configuration, nothing was run");
            } else {
                tracing::error!(error = %e, "recon run failed");
            }
            eprintln!("[!] {e}");
            ExitCode::from(error_exit_code(&e))
        }
    }
}

/// Exit code for an error that stopped the run
pub fn error_exit_code(err: &Error) -> u8 {
    if err.is_config() {
        EXIT_CONFIG_ERROR
    } else {
        1
    }
}

/// Execute a parsed command line, returning the exit status
pub async fn execute(cli: Cli) -> Result<u8> {
    let list_tools = cli.list_tools;
    let report_path = cli.report.clone();
    let config = cli.into_config()?;
    let registry = ToolRegistry::from_config(&config.tools);

    if list_tools {
        list_registered_tools(&registry, &config).await;
        return Ok(0);
    }

    let dispatcher = Dispatcher::for_config(&config);
    let printer = tokio::spawn(print_status_lines(dispatcher.subscribe()));

    let result = crate::run_with(&config, &registry, &dispatcher).await;
    drop(dispatcher);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "status printer stopped early");
    }
    let report = result?;

    if let Some(path) = report_path {
        write_report(&report, &path).await?;
        println!("[*] Report written to {}", path.display());
    }

    println!(
        "Recon complete. {}/{} tools succeeded. Output saved in: {}/",
        report.succeeded(),
        report.tasks.len(),
        config.output_dir.display()
    );

    if config.fail_on_task_error && !report.all_succeeded() {
        return Ok(EXIT_TASK_FAILED);
    }
    Ok(0)
}

/// Print one line when a task starts and one when it finishes
async fn print_status_lines(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event::TaskStarted { name, command }) => {
                tracing::debug!(task = %name, "task started");
                println!("{}", start_line(&command));
            }
            Ok(Event::TaskFinished {
                name,
                outcome,
                output_path,
                completed,
                total,
            }) => {
                println!(
                    "{}",
                    status_line(&name, &outcome, &output_path, completed, total)
                );
            }
            Ok(Event::RunComplete { .. }) | Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "status printer lagged behind, events dropped");
                println!("{}", skipped_line(skipped));
            }
        }
    }
}

/// Status line for a task that is about to run
pub fn start_line(command: &str) -> String {
    format!("[+] Running: {command}")
}

/// Status line shown when the printer fell behind and lost events
pub fn skipped_line(skipped: u64) -> String {
    format!("[*] {skipped} status lines skipped")
}

/// Status line for a finished task
pub fn status_line(
    name: &str,
    outcome: &Outcome,
    output_path: &std::path::Path,
    completed: usize,
    total: usize,
) -> String {
    let progress = format!("[{completed}/{total}]");
    match outcome {
        Outcome::Success => format!(
            "[✓] {progress} {name} succeeded -> {}",
            output_path.display()
        ),
        Outcome::ToolNotFound => {
            format!("[?] {progress} {name} not found (is it installed and on PATH?)")
        }
        Outcome::Failed { reason } => format!(
            "[!] {progress} {name} failed: {reason} -> {}",
            output_path.display()
        ),
    }
}

async fn list_registered_tools(registry: &ToolRegistry, config: &RunConfig) {
    let locator = PathToolLocator::new();
    for spec in registry.iter() {
        let program = config
            .tools
            .paths
            .get(spec.name())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| spec.program().to_string());

        let status = match locator.locate(&program).await {
            Some(path) => format!("found at {}", path.display()),
            None => "missing".to_string(),
        };
        let headers = if spec.accepts_headers() {
            "headers"
        } else {
            "no headers"
        };
        println!("{:<12} {:<20} {:<11} {}", spec.name(), program, headers, status);
    }
}

async fn write_report(report: &RunReport, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| Error::Other(format!("failed to write report {}: {e}", path.display())))
}
