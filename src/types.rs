//! Core types for madrecon

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::TaskError;

/// Terminal result of a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Process exited with code 0 and its output file was written (possibly empty)
    Success,
    /// The external binary could not be located
    ToolNotFound,
    /// Non-zero exit, abnormal termination, or an output write failure
    Failed {
        /// Human-readable failure reason
        reason: String,
    },
}

impl Outcome {
    /// Whether the task succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Short label used in status lines
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "succeeded",
            Outcome::ToolNotFound => "not found",
            Outcome::Failed { .. } => "failed",
        }
    }
}

impl From<TaskError> for Outcome {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::ToolNotFound { .. } => Outcome::ToolNotFound,
            other => Outcome::Failed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<Result<(), TaskError>> for Outcome {
    fn from(result: Result<(), TaskError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) => e.into(),
        }
    }
}

/// Lifecycle state of a task as observed by the dispatcher
///
/// `Pending -> Running -> {Succeeded, Failed, NotFound}`. The right-hand states
/// are terminal and a task never re-enters `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting for a free worker slot
    Pending,
    /// Process spawned, output streaming
    Running,
    /// Terminal: process exited with code 0
    Succeeded,
    /// Terminal: process or output write failed
    Failed,
    /// Terminal: binary missing
    NotFound,
}

impl TaskState {
    /// Whether the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::NotFound
        )
    }
}

impl From<&Outcome> for TaskState {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success => TaskState::Succeeded,
            Outcome::ToolNotFound => TaskState::NotFound,
            Outcome::Failed { .. } => TaskState::Failed,
        }
    }
}

/// Per-task entry in a [`RunReport`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskReport {
    /// Terminal outcome
    pub outcome: Outcome,
    /// File the task's stdout was streamed to
    pub output_path: PathBuf,
    /// Number of stdout bytes written to `output_path`
    pub bytes_written: u64,
    /// Wall-clock time spent in `Running`, in milliseconds (0 when never spawned)
    pub duration_ms: u64,
}

/// Result of a full dispatch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// When dispatch started
    pub started_at: DateTime<Utc>,
    /// When the last task reached a terminal state
    pub finished_at: DateTime<Utc>,
    /// Highest number of tasks observed in `Running` at the same time
    pub peak_concurrency: usize,
    /// Outcome per task, keyed by task name
    pub tasks: BTreeMap<String, TaskReport>,
}

impl RunReport {
    /// Outcome of a single task, if it was part of the run
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.tasks.get(name).map(|r| &r.outcome)
    }

    /// Whether every task succeeded
    pub fn all_succeeded(&self) -> bool {
        self.tasks.values().all(|r| r.outcome.is_success())
    }

    /// Tasks whose outcome is not `Success`
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TaskReport)> {
        self.tasks
            .iter()
            .filter(|(_, r)| !r.outcome.is_success())
            .map(|(name, r)| (name.as_str(), r))
    }

    /// Number of tasks that succeeded
    pub fn succeeded(&self) -> usize {
        self.tasks
            .values()
            .filter(|r| r.outcome.is_success())
            .count()
    }
}

/// Event emitted by the dispatcher
///
/// Subscribe via [`Dispatcher::subscribe`](crate::Dispatcher::subscribe). Events are
/// for reporting only; the dispatcher never reads them back.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task acquired a worker slot and is about to spawn its process
    TaskStarted {
        /// Task name
        name: String,
        /// Rendered command line
        command: String,
    },

    /// A task reached a terminal state
    TaskFinished {
        /// Task name
        name: String,
        /// Terminal outcome
        outcome: Outcome,
        /// Output file of the task
        output_path: PathBuf,
        /// Number of tasks finished so far, including this one
        completed: usize,
        /// Number of tasks in the run
        total: usize,
    },

    /// Every task is terminal
    RunComplete {
        /// Number of tasks in the run
        total: usize,
        /// Number of tasks that succeeded
        succeeded: usize,
    },
}
