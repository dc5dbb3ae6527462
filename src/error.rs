//! Error types for madrecon
//!
//! Two layers of errors exist:
//! - [`Error`] is fatal to a run and is only produced before any task is dispatched
//!   (invalid configuration, unusable output directory, unreadable config file).
//! - [`TaskError`] describes why a single task did not succeed. It never escapes the
//!   task boundary; the dispatcher converts it into an [`Outcome`](crate::types::Outcome).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for madrecon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for madrecon
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "thread_count")
        key: Option<String>,
    },

    /// The task filter matched no registered tool
    #[error("configuration error: no tasks selected")]
    NoTasksSelected,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error was raised by configuration validation
    ///
    /// Configuration errors are reported before any task starts.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::NoTasksSelected)
    }
}

/// Per-task failure, captured at the task boundary
#[derive(Debug, Error)]
pub enum TaskError {
    /// The external binary could not be located
    #[error("tool not found: {program}")]
    ToolNotFound {
        /// The program that was looked up
        program: String,
    },

    /// The process exited with a non-zero status code
    #[error("process exited with status {code}")]
    ExecutionFailed {
        /// Exit code reported by the process
        code: i32,
        /// Trailing stderr output, if any
        stderr: Option<String>,
    },

    /// The process was terminated without an exit code (e.g., killed by a signal)
    #[error("process terminated abnormally{}", .signal.map(|s| format!(" by signal {s}")).unwrap_or_default())]
    Terminated {
        /// Signal number, when the platform reports one
        signal: Option<i32>,
    },

    /// The output file could not be created or written
    #[error("failed to write output file {}: {source}", .path.display())]
    OutputWrite {
        /// Destination path owned by the task
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process's stdout could not be read
    #[error("failed to read process output: {0}")]
    OutputRead(#[source] std::io::Error),

    /// The process could not be started or awaited for a reason other than a missing binary
    #[error("failed to run process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker running the task panicked or was aborted
    #[error("worker failed: {0}")]
    Worker(String),
}
