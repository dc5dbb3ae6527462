//! Configuration types for madrecon

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, path::PathBuf};

/// Placeholder substituted with the target in [`ToolDefinition::args`]
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// External tool settings (binary paths, user-defined tools)
///
/// Tools without an explicit path are resolved through PATH.
/// Used as a nested sub-config within [`RunConfig`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit binary path per tool name (e.g. `"httpx" -> "/opt/pd/httpx"`)
    #[serde(default)]
    pub paths: HashMap<String, PathBuf>,

    /// Additional tools registered alongside the built-ins
    ///
    /// A custom tool with the same name as a built-in replaces it.
    #[serde(default)]
    pub custom: Vec<ToolDefinition>,
}

/// User-defined tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, used for selection and the output file name
    pub name: String,

    /// Program to execute (bare name resolved through PATH, or a path)
    pub program: String,

    /// Arguments; every `{target}` is replaced by the run target
    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,

    /// Flag placed before each custom header (e.g. `"-H"`); `None` = headers not supported
    #[serde(default)]
    pub header_flag: Option<String>,
}

/// Main configuration for a recon run
///
/// All fields have sensible defaults except `target`, which must be set before
/// calling [`RunConfig::validate`].
///
/// # Example
///
/// ```
/// use madrecon::RunConfig;
///
/// let config = RunConfig {
///     headers: vec!["X-Test: 1".to_string()],
///     ..RunConfig::new("example.com")
/// };
/// assert_eq!(config.thread_count, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target domain
    #[serde(default)]
    pub target: String,

    /// Custom headers, applied in order to every tool that accepts headers
    #[serde(default)]
    pub headers: Vec<String>,

    /// Maximum number of tasks running at once (default: 10)
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Names of the tools to run (empty = every registered tool)
    #[serde(default)]
    pub selected_tasks: Vec<String>,

    /// Directory holding the per-task output files (default: "./recon_output")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Exit non-zero when any task outcome is not `Success` (default: false)
    #[serde(default)]
    pub fail_on_task_error: bool,

    /// Look tools up before spawning and skip missing ones (default: true)
    #[serde(default = "default_true")]
    pub precheck_tools: bool,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            headers: Vec::new(),
            thread_count: default_thread_count(),
            selected_tasks: Vec::new(),
            output_dir: default_output_dir(),
            fail_on_task_error: false,
            precheck_tools: true,
            tools: ToolsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Default configuration for the given target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Load a configuration file (JSON)
    ///
    /// Missing fields take their defaults; the target may be left empty and
    /// supplied later (e.g. from the command line). An unreadable or malformed
    /// file is a configuration error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                "config",
                format!("failed to read config file {}: {e}", path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::config(
                "config",
                format!("invalid config file {}: {e}", path.display()),
            )
        })
    }

    /// Validate the configuration
    ///
    /// Selected task names are checked later against the tool registry.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::config("target", "target must not be empty"));
        }

        // The target is passed as a positional argument
        if self.target.starts_with('-') {
            return Err(Error::config(
                "target",
                format!("target '{}' must not start with '-'", self.target),
            ));
        }
        if self
            .target
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::config(
                "target",
                format!(
                    "target {:?} must not contain whitespace or control characters",
                    self.target
                ),
            ));
        }

        if self.thread_count < 1 {
            return Err(Error::config(
                "thread_count",
                format!("thread_count must be at least 1 (got {})", self.thread_count),
            ));
        }

        if let Some(pos) = self.headers.iter().position(|h| h.trim().is_empty()) {
            return Err(Error::config(
                "headers",
                format!("header #{} is empty", pos + 1),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools.custom {
            if !is_valid_tool_name(&tool.name) {
                return Err(Error::config(
                    "tools.custom",
                    format!(
                        "invalid tool name '{}': use letters, digits, '-' or '_'",
                        tool.name
                    ),
                ));
            }
            if tool.program.trim().is_empty() {
                return Err(Error::config(
                    "tools.custom",
                    format!("tool '{}' has an empty program", tool.name),
                ));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::config(
                    "tools.custom",
                    format!("tool '{}' is defined more than once", tool.name),
                ));
            }
        }

        Ok(())
    }
}

/// Tool names end up in file names, so keep them to a safe alphabet
pub(crate) fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn default_true() -> bool {
    true
}

fn default_thread_count() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./recon_output")
}

fn default_tool_args() -> Vec<String> {
    vec![TARGET_PLACEHOLDER.to_string()]
}
