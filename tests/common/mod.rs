//! Common test utilities for madrecon integration tests
//!
//! The real recon tools are replaced by `sh -c` stand-ins registered under the
//! same names, so scenarios run anywhere a POSIX shell exists.

#![allow(dead_code)]

use madrecon::{RunConfig, ToolDefinition, ToolsConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Target used across scenarios
pub const TARGET: &str = "example.com";

/// Program name guaranteed not to exist
pub const MISSING_PROGRAM: &str = "nonexistent-madrecon-binary-xyz";

/// A tool that runs `script` through `sh -c`
///
/// `{target}` inside the script is replaced with the run target.
pub fn stand_in(name: &str, script: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        header_flag: None,
    }
}

/// A tool whose binary does not exist
pub fn missing_tool(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        program: MISSING_PROGRAM.to_string(),
        args: vec!["{target}".to_string()],
        header_flag: None,
    }
}

/// Run configuration writing into `output_dir` with the given tools registered
pub fn config_with_tools(output_dir: &Path, tools: Vec<ToolDefinition>) -> RunConfig {
    RunConfig {
        output_dir: output_dir.to_path_buf(),
        tools: ToolsConfig {
            custom: tools,
            ..Default::default()
        },
        ..RunConfig::new(TARGET)
    }
}

/// Read a file that must exist
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

/// Names of the files in a directory, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Write an executable shell script named `name` into `dir`
#[cfg(unix)]
pub fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Prepends a directory to `PATH`, restoring the previous value on drop
///
/// Only use from `#[serial]` tests: every test in the binary that spawns a
/// process reads `PATH`.
pub struct PathGuard {
    previous: Option<OsString>,
}

impl PathGuard {
    pub fn prepend(dir: &Path) -> Self {
        let previous = std::env::var_os("PATH");
        let mut entries = vec![dir.to_path_buf()];
        if let Some(prev) = &previous {
            entries.extend(std::env::split_paths(prev));
        }
        let joined = std::env::join_paths(entries).unwrap();
        // SAFETY: callers are #[serial], so no other test thread touches the environment
        unsafe { std::env::set_var("PATH", joined) };
        Self { previous }
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        // SAFETY: see PathGuard::prepend
        unsafe {
            match &self.previous {
                Some(prev) => std::env::set_var("PATH", prev),
                None => std::env::remove_var("PATH"),
            }
        }
    }
}
