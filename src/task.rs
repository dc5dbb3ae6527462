//! Task Unit: one external recon command and the file that captures its output
//!
//! A [`TaskUnit`] is fully configured at construction. [`TaskUnit::execute`] spawns
//! the process, streams its stdout into `output_path` chunk by chunk (flushing each
//! chunk, so partial output is visible while the tool is still running) and turns
//! every failure into an [`Outcome`] instead of returning an error.

use crate::error::TaskError;
use crate::types::Outcome;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Size of the read buffer used when streaming stdout
const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// Maximum amount of stderr kept for failure reports
const STDERR_TAIL_LIMIT: usize = 2 * 1024;

/// One unit of recon work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUnit {
    name: String,
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    output_path: PathBuf,
}

/// What happened when a task ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Terminal outcome
    pub outcome: Outcome,
    /// Number of stdout bytes written to the output file
    pub bytes_written: u64,
}

impl TaskUnit {
    /// Create a task with no arguments
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            output_path: output_path.into(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program that will be executed
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Process arguments
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// File this task writes its output to
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Command line for display purposes
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command and capture its output
    ///
    /// Creates or truncates `output_path` as soon as the process has spawned, before
    /// any of its output is read. Never panics or returns an error: a missing binary
    /// yields [`Outcome::ToolNotFound`] (even when `output_path` is unusable), anything
    /// else that goes wrong (non-zero exit, signal, read or write failure) yields
    /// [`Outcome::Failed`].
    pub async fn execute(&self) -> Execution {
        let mut bytes_written = 0;
        let result = self.run(&mut bytes_written).await;

        match &result {
            Ok(()) => tracing::debug!(
                task = %self.name,
                bytes = bytes_written,
                path = ?self.output_path,
                "task process exited successfully"
            ),
            Err(TaskError::ToolNotFound { program }) => {
                tracing::warn!(task = %self.name, program = %program, "tool not found")
            }
            Err(TaskError::ExecutionFailed {
                code,
                stderr: Some(stderr),
            }) => tracing::warn!(
                task = %self.name,
                code = code,
                stderr = %stderr,
                "task process failed"
            ),
            Err(e) => tracing::warn!(task = %self.name, error = %e, "task failed"),
        }

        Execution {
            outcome: result.into(),
            bytes_written,
        }
    }

    async fn run(&self, bytes_written: &mut u64) -> Result<(), TaskError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TaskError::ToolNotFound {
                    program: self.program.clone(),
                },
                _ => TaskError::Spawn(e),
            })?;

        tracing::debug!(task = %self.name, pid = ?child.id(), "spawned task process");

        // Stdout is piped, so nothing is lost between the spawn and the create
        let mut file = match File::create(&self.output_path).await {
            Ok(file) => file,
            Err(source) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(task = %self.name, error = %e, "failed to kill task process");
                }
                return Err(TaskError::OutputWrite {
                    path: self.output_path.clone(),
                    source,
                });
            }
        };

        let stdout = child.stdout.take().ok_or_else(|| {
            TaskError::Spawn(std::io::Error::other("stdout was not captured"))
        })?;
        let stderr = child.stderr.take();

        let (streamed, stderr_tail) =
            tokio::join!(stream_to_file(stdout, &mut file), read_stderr_tail(stderr));
        *bytes_written = streamed.bytes;

        let status = child.wait().await.map_err(TaskError::Spawn)?;

        match streamed.error {
            Some(StreamError::Read(source)) => return Err(TaskError::OutputRead(source)),
            Some(StreamError::Write(source)) => {
                return Err(TaskError::OutputWrite {
                    path: self.output_path.clone(),
                    source,
                });
            }
            None => {}
        }

        if status.success() {
            return Ok(());
        }

        match status.code() {
            Some(code) => Err(TaskError::ExecutionFailed {
                code,
                stderr: stderr_tail,
            }),
            None => Err(TaskError::Terminated {
                signal: exit_signal(&status),
            }),
        }
    }
}

struct StreamResult {
    bytes: u64,
    error: Option<StreamError>,
}

#[derive(Debug)]
enum StreamError {
    /// Reading the process's stdout failed
    Read(std::io::Error),
    /// Writing the output file failed
    Write(std::io::Error),
}

/// Copy `reader` into `file`, flushing after every chunk
///
/// On a write failure the rest of the stream is drained and discarded so the
/// child never blocks on a full pipe.
async fn stream_to_file<R>(mut reader: R, file: &mut File) -> StreamResult
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut bytes = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                return StreamResult {
                    bytes,
                    error: Some(StreamError::Read(e)),
                };
            }
        };

        let written = match file.write_all(&buf[..n]).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            tokio::io::copy(&mut reader, &mut tokio::io::sink())
                .await
                .ok();
            return StreamResult {
                bytes,
                error: Some(StreamError::Write(e)),
            };
        }
        bytes += n as u64;
    }

    let error = file.flush().await.err().map(StreamError::Write);
    StreamResult { bytes, error }
}

/// Read stderr to the end, keeping only its tail
async fn read_stderr_tail<R>(stderr: Option<R>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut stderr = stderr?;
    let mut tail = Vec::new();
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_LIMIT {
                    tail.drain(..tail.len() - STDERR_TAIL_LIMIT);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "stopped reading stderr");
                break;
            }
        }
    }

    let text = String::from_utf8_lossy(&tail).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

fn quote_for_display(part: &str) -> String {
    if !part.is_empty() && !part.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}
