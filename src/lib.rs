//! # madrecon
//!
//! Runs external reconnaissance tools concurrently against a target domain and
//! streams each tool's output into its own file as it is produced.
//!
//! ## Design
//!
//! - **Task units** - every tool run is a [`TaskUnit`]: a command line plus the
//!   output file it exclusively owns
//! - **Bounded dispatch** - the [`Dispatcher`] runs task units on a worker pool
//!   limited to `thread_count` concurrent processes
//! - **Failure isolation** - a missing binary or a failing tool becomes that task's
//!   [`Outcome`]; it never stops the other tasks
//! - **Registry of tools** - tools are named constructors in a [`ToolRegistry`];
//!   adding one never touches the dispatcher
//!
//! ## Quick Start
//!
//! ```no_run
//! use madrecon::{RunConfig, run};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig {
//!         headers: vec!["X-Bug-Bounty: researcher".to_string()],
//!         ..RunConfig::new("example.com")
//!     };
//!
//!     let report = run(&config).await?;
//!     for (name, task) in &report.tasks {
//!         println!("{name}: {} -> {}", task.outcome.label(), task.output_path.display());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line front end
pub mod cli;
/// Configuration types
pub mod config;
/// Bounded-concurrency task dispatcher
pub mod dispatcher;
/// Error types
pub mod error;
/// Output directory and file naming
pub mod output;
/// Tool registry
pub mod registry;
/// Task units
pub mod task;
/// External tool lookup
pub mod tools;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{RunConfig, ToolDefinition, ToolsConfig};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result, TaskError};
pub use registry::{ToolRegistry, ToolSpec};
pub use task::{Execution, TaskUnit};
pub use tools::{PathToolLocator, ToolLocator};
pub use types::{Event, Outcome, RunReport, TaskReport, TaskState};

/// Run every selected tool for a configuration
///
/// Uses the built-in tools plus any custom tools from the configuration, and a
/// dispatcher that pre-checks binaries when `precheck_tools` is set.
pub async fn run(config: &RunConfig) -> Result<RunReport> {
    let registry = ToolRegistry::from_config(&config.tools);
    let dispatcher = Dispatcher::for_config(config);
    run_with(config, &registry, &dispatcher).await
}

/// Run a configuration with an explicit registry and dispatcher
///
/// Validation, task selection and output directory setup all happen before the
/// first task starts; any failure there is returned as an [`Error`] and no task
/// runs.
pub async fn run_with(
    config: &RunConfig,
    registry: &ToolRegistry,
    dispatcher: &Dispatcher,
) -> Result<RunReport> {
    config.validate()?;
    let tasks = registry.build_tasks(config)?;
    output::ensure_output_dir(&config.output_dir).await?;

    tracing::info!(
        target_domain = %config.target,
        output_dir = ?config.output_dir,
        tasks = ?tasks.iter().map(TaskUnit::name).collect::<Vec<_>>(),
        "starting recon run"
    );

    dispatcher.run(tasks, config.thread_count).await
}
