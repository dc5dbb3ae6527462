//! Registry of tools that can be turned into task units
//!
//! Each [`ToolSpec`] is a named constructor: a command template plus the rule that
//! names its output file. The dispatcher never looks at the registry; callers build
//! [`TaskUnit`]s from it and hand those over.

use crate::config::{RunConfig, TARGET_PLACEHOLDER, ToolDefinition, ToolsConfig};
use crate::error::{Error, Result};
use crate::output;
use crate::task::TaskUnit;
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable carrying the target
pub const ENV_TARGET: &str = "MADRECON_TARGET";
/// Environment variable carrying the task name
pub const ENV_TASK: &str = "MADRECON_TASK";
/// Environment variable carrying the custom headers, one per line
pub const ENV_HEADERS: &str = "MADRECON_HEADERS";

/// Name of the built-in historical URL collector
pub const WAYBACK: &str = "wayback";
/// Name of the built-in HTTP probe
pub const HTTPX: &str = "httpx";

/// Command template for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    name: String,
    program: String,
    args: Vec<String>,
    header_flag: Option<String>,
}

impl ToolSpec {
    /// New tool with a `{target}`-only argument list
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: vec![TARGET_PLACEHOLDER.to_string()],
            header_flag: None,
        }
    }

    /// Replace the argument template
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Accept custom headers, each passed as `<flag> <header>`
    pub fn with_header_flag(mut self, flag: impl Into<String>) -> Self {
        self.header_flag = Some(flag.into());
        self
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default program
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the tool receives custom headers as arguments
    pub fn accepts_headers(&self) -> bool {
        self.header_flag.is_some()
    }

    /// Build the task unit for one run
    ///
    /// `program_override` replaces the default program (e.g. an explicit binary path).
    pub fn build(
        &self,
        target: &str,
        headers: &[String],
        output_dir: &Path,
        program_override: Option<&Path>,
    ) -> TaskUnit {
        let program = program_override
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.program.clone());

        let mut task = TaskUnit::new(
            &self.name,
            program,
            output::output_path(output_dir, &self.name, target),
        )
        .args(
            self.args
                .iter()
                .map(|arg| arg.replace(TARGET_PLACEHOLDER, target)),
        )
        .env(ENV_TARGET, target)
        .env(ENV_TASK, &self.name);

        if let Some(flag) = &self.header_flag {
            for header in headers {
                task = task.arg(flag).arg(header);
            }
        }

        if !headers.is_empty() {
            task = task.env(ENV_HEADERS, headers.join("\n"));
        }

        task
    }
}

impl From<&ToolDefinition> for ToolSpec {
    fn from(def: &ToolDefinition) -> Self {
        let spec = ToolSpec::new(&def.name, &def.program).with_args(def.args.iter().cloned());
        match &def.header_flag {
            Some(flag) => spec.with_header_flag(flag),
            None => spec,
        }
    }
}

/// Named tool constructors
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools (`wayback`, `httpx`)
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ToolSpec::new(WAYBACK, "waybackurls"));
        registry.register(
            ToolSpec::new(HTTPX, "httpx")
                .with_args([
                    "-u",
                    TARGET_PLACEHOLDER,
                    "-silent",
                    "-status-code",
                    "-follow-redirects",
                ])
                .with_header_flag("-H"),
        );
        registry
    }

    /// Built-in tools plus the user-defined ones from the config
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let mut registry = Self::builtin();
        for def in &tools.custom {
            if let Some(previous) = registry.register(ToolSpec::from(def)) {
                tracing::debug!(tool = %previous.name, "custom tool replaces built-in");
            }
        }
        registry
    }

    /// Register a tool, returning the one it replaced
    pub fn register(&mut self, spec: ToolSpec) -> Option<ToolSpec> {
        self.tools.insert(spec.name.clone(), spec)
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Registered tools, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve a selection to tool specs
    ///
    /// An empty selection means every registered tool. Unknown names are a
    /// configuration error; duplicates are collapsed.
    pub fn select(&self, names: &[String]) -> Result<Vec<&ToolSpec>> {
        if names.is_empty() {
            if self.tools.is_empty() {
                return Err(Error::NoTasksSelected);
            }
            return Ok(self.tools.values().collect());
        }

        let mut selected: Vec<&ToolSpec> = Vec::with_capacity(names.len());
        for name in names {
            let spec = self.get(name).ok_or_else(|| {
                Error::config(
                    "selected_tasks",
                    format!(
                        "unknown tool '{}' (available: {})",
                        name,
                        self.names().collect::<Vec<_>>().join(", ")
                    ),
                )
            })?;
            if !selected.iter().any(|s| s.name == spec.name) {
                selected.push(spec);
            }
        }

        Ok(selected)
    }

    /// Build the task units for a validated run configuration
    pub fn build_tasks(&self, config: &RunConfig) -> Result<Vec<TaskUnit>> {
        let tasks: Vec<TaskUnit> = self
            .select(&config.selected_tasks)?
            .into_iter()
            .map(|spec| {
                spec.build(
                    &config.target,
                    &config.headers,
                    &config.output_dir,
                    config.tools.paths.get(spec.name()).map(|p| p.as_path()),
                )
            })
            .collect();

        if tasks.is_empty() {
            return Err(Error::NoTasksSelected);
        }
        Ok(tasks)
    }
}
