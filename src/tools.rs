//! External tool availability checks
//!
//! The dispatcher can consult a [`ToolLocator`] before spawning a task so that
//! tasks whose binary is missing resolve to `ToolNotFound` without a process
//! being started. This is an optimisation only: [`TaskUnit::execute`](crate::TaskUnit::execute)
//! detects a missing binary on its own.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Locates external tool binaries
#[async_trait]
pub trait ToolLocator: Send + Sync {
    /// Resolve `program` to an executable path, or `None` when it is unavailable
    ///
    /// `program` is either a bare name (looked up in the search path) or a path
    /// containing a separator (checked directly).
    async fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Name of this locator (used in logging)
    fn name(&self) -> &'static str;
}

/// Locator backed by the `which` crate
///
/// Uses the process `PATH` by default, or an explicit search path when built
/// with [`PathToolLocator::with_search_path`].
#[derive(Debug, Clone, Default)]
pub struct PathToolLocator {
    search_path: Option<OsString>,
}

impl PathToolLocator {
    /// Locator using the process `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator using an explicit search path (same syntax as `PATH`)
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    fn locate_blocking(search_path: Option<&OsString>, program: &str) -> Option<PathBuf> {
        if is_explicit_path(program) {
            return which::which(Path::new(program)).ok();
        }

        match search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(program, Some(paths), cwd).ok()
            }
            None => which::which(program).ok(),
        }
    }
}

#[async_trait]
impl ToolLocator for PathToolLocator {
    async fn locate(&self, program: &str) -> Option<PathBuf> {
        let search_path = self.search_path.clone();
        let program_owned = program.to_string();

        // which touches the filesystem for every PATH entry
        match tokio::task::spawn_blocking(move || {
            Self::locate_blocking(search_path.as_ref(), &program_owned)
        })
        .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(program = %program, error = %e, "tool lookup task failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "which"
    }
}

/// Whether `program` names a path rather than a bare command
pub(crate) fn is_explicit_path(program: &str) -> bool {
    program.contains('/') || program.contains(std::path::MAIN_SEPARATOR)
}
