//! Output directory management and per-task file naming

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Reduce a target to something usable inside a file name
///
/// Drops a leading `scheme://`, trailing slashes, and replaces every character
/// outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_target(target: &str) -> String {
    let trimmed = target.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let without_slash = without_scheme.trim_end_matches('/');

    without_slash
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name for a task's output: `{task}_{target}.txt`
pub fn output_file_name(task: &str, target: &str) -> String {
    format!("{}_{}.txt", task, sanitize_target(target))
}

/// Full output path for a task inside `dir`
pub fn output_path(dir: &Path, task: &str, target: &str) -> PathBuf {
    dir.join(output_file_name(task, target))
}

/// Make sure the output directory exists and is a directory
pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let metadata = tokio::fs::metadata(dir).await?;
    if !metadata.is_dir() {
        return Err(Error::config(
            "output_dir",
            format!("{} is not a directory", dir.display()),
        ));
    }

    tracing::debug!(dir = ?dir, "output directory ready");
    Ok(())
}
