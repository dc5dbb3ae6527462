//! Task Dispatcher: bounded-concurrency runner for task units
//!
//! [`Dispatcher::run`] spawns one worker per task on a [`JoinSet`]. Each worker
//! acquires a permit from a semaphore sized to `thread_count` before its task enters
//! `Running`, so at most `thread_count` processes run at once; the remaining tasks
//! wait for a permit in no particular order. `run` returns only once every task has
//! a terminal outcome.
//!
//! Failures stay inside the worker that produced them. A task that fails, cannot
//! find its binary, or even panics gets an outcome recorded for it and the other
//! workers carry on untouched.

use crate::config::RunConfig;
use crate::error::{Error, Result, TaskError};
use crate::task::TaskUnit;
use crate::tools::{PathToolLocator, ToolLocator};
use crate::types::{Event, Outcome, RunReport, TaskReport};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio::task::JoinSet;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Runs task units concurrently and collects their outcomes
pub struct Dispatcher {
    event_tx: broadcast::Sender<Event>,
    locator: Option<Arc<dyn ToolLocator>>,
}

/// State shared by the workers of one run
///
/// Only `reports` is read back, and only after every worker has finished.
/// The counters feed events and the report.
struct RunState {
    reports: Mutex<HashMap<String, TaskReport>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
    total: usize,
}

impl RunState {
    fn new(total: usize) -> Self {
        Self {
            reports: Mutex::new(HashMap::with_capacity(total)),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            total,
        }
    }

    fn enter_running(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave_running(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Dispatcher that spawns every task without checking for its binary first
    pub fn new() -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            event_tx,
            locator: None,
        }
    }

    /// Dispatcher that consults `locator` before spawning
    ///
    /// Tasks whose program cannot be located resolve to [`Outcome::ToolNotFound`]
    /// without creating their output file or taking a worker slot.
    pub fn with_locator(locator: Arc<dyn ToolLocator>) -> Self {
        Self {
            locator: Some(locator),
            ..Self::new()
        }
    }

    /// Dispatcher matching the pre-check setting of a run configuration
    pub fn for_config(config: &RunConfig) -> Self {
        if config.precheck_tools {
            Self::with_locator(Arc::new(PathToolLocator::new()))
        } else {
            Self::new()
        }
    }

    /// Subscribe to dispatch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run every task, at most `thread_count` at a time
    ///
    /// Fails only on invalid input (no tasks, `thread_count == 0`, duplicate task
    /// names or output paths), and then before any task starts. Otherwise returns a
    /// report with exactly one entry per task.
    pub async fn run(&self, tasks: Vec<TaskUnit>, thread_count: usize) -> Result<RunReport> {
        validate_tasks(&tasks, thread_count)?;

        let started_at = chrono::Utc::now();
        let names: Vec<(String, std::path::PathBuf)> = tasks
            .iter()
            .map(|t| (t.name().to_string(), t.output_path().to_path_buf()))
            .collect();

        tracing::info!(
            tasks = tasks.len(),
            thread_count,
            precheck = self.locator.as_ref().map(|l| l.name()),
            "dispatching tasks"
        );

        let limit = Arc::new(Semaphore::new(thread_count.min(Semaphore::MAX_PERMITS)));
        let state = Arc::new(RunState::new(tasks.len()));
        let mut workers = JoinSet::new();

        for task in tasks {
            let limit = Arc::clone(&limit);
            let state = Arc::clone(&state);
            let locator = self.locator.clone();
            let event_tx = self.event_tx.clone();

            workers.spawn(async move {
                let report = run_one(&task, limit, locator, &state, &event_tx).await;
                record(&state, &event_tx, task.name(), report).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "task worker did not finish");
            }
        }

        let mut reports = std::mem::take(&mut *state.reports.lock().await);

        // A worker that panicked never recorded its task
        for (name, output_path) in names {
            if !reports.contains_key(&name) {
                let outcome: Outcome =
                    TaskError::Worker(format!("worker for task '{name}' panicked")).into();
                tracing::warn!(task = %name, "recording failed outcome for lost worker");
                reports.insert(
                    name,
                    TaskReport {
                        outcome,
                        output_path,
                        bytes_written: 0,
                        duration_ms: 0,
                    },
                );
            }
        }

        let report = RunReport {
            started_at,
            finished_at: chrono::Utc::now(),
            peak_concurrency: state.peak.load(Ordering::SeqCst),
            tasks: reports.into_iter().collect::<BTreeMap<_, _>>(),
        };

        let succeeded = report.succeeded();
        tracing::info!(
            total = report.tasks.len(),
            succeeded,
            peak_concurrency = report.peak_concurrency,
            "all tasks finished"
        );
        self.event_tx
            .send(Event::RunComplete {
                total: report.tasks.len(),
                succeeded,
            })
            .ok();

        Ok(report)
    }
}

/// Drive one task from `Pending` to a terminal state
async fn run_one(
    task: &TaskUnit,
    limit: Arc<Semaphore>,
    locator: Option<Arc<dyn ToolLocator>>,
    state: &RunState,
    event_tx: &broadcast::Sender<Event>,
) -> TaskReport {
    if let Some(locator) = locator
        && locator.locate(task.program()).await.is_none()
    {
        tracing::warn!(
            task = %task.name(),
            program = %task.program(),
            "tool not available, skipping"
        );
        return TaskReport {
            outcome: Outcome::ToolNotFound,
            output_path: task.output_path().to_path_buf(),
            bytes_written: 0,
            duration_ms: 0,
        };
    }

    let _permit = match limit.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return TaskReport {
                outcome: TaskError::Worker(e.to_string()).into(),
                output_path: task.output_path().to_path_buf(),
                bytes_written: 0,
                duration_ms: 0,
            };
        }
    };

    state.enter_running();
    tracing::info!(task = %task.name(), command = %task.command_line(), "task started");
    event_tx
        .send(Event::TaskStarted {
            name: task.name().to_string(),
            command: task.command_line(),
        })
        .ok();

    let start = Instant::now();
    let execution = task.execute().await;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    state.leave_running();

    TaskReport {
        outcome: execution.outcome,
        output_path: task.output_path().to_path_buf(),
        bytes_written: execution.bytes_written,
        duration_ms,
    }
}

/// Store a task's terminal outcome and announce it
async fn record(
    state: &RunState,
    event_tx: &broadcast::Sender<Event>,
    name: &str,
    report: TaskReport,
) {
    let completed = state.completed.fetch_add(1, Ordering::SeqCst) + 1;

    match &report.outcome {
        Outcome::Success => tracing::info!(
            task = %name,
            bytes = report.bytes_written,
            duration_ms = report.duration_ms,
            path = ?report.output_path,
            progress = %format!("{}/{}", completed, state.total),
            "task succeeded"
        ),
        outcome => tracing::warn!(
            task = %name,
            outcome = outcome.label(),
            progress = %format!("{}/{}", completed, state.total),
            "task did not succeed"
        ),
    }

    event_tx
        .send(Event::TaskFinished {
            name: name.to_string(),
            outcome: report.outcome.clone(),
            output_path: report.output_path.clone(),
            completed,
            total: state.total,
        })
        .ok();

    state.reports.lock().await.insert(name.to_string(), report);
}

fn validate_tasks(tasks: &[TaskUnit], thread_count: usize) -> Result<()> {
    if tasks.is_empty() {
        return Err(Error::NoTasksSelected);
    }

    if thread_count < 1 {
        return Err(Error::config(
            "thread_count",
            format!("thread_count must be at least 1 (got {thread_count})"),
        ));
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for task in tasks {
        if !names.insert(task.name()) {
            return Err(Error::config(
                "selected_tasks",
                format!("task '{}' is scheduled more than once", task.name()),
            ));
        }
        if !paths.insert(task.output_path()) {
            return Err(Error::config(
                "output_dir",
                format!(
                    "output file {} is shared by more than one task",
                    task.output_path().display()
                ),
            ));
        }
    }

    Ok(())
}
