use std::path::Path;
use std::process::Stdio;

use git2::{Repository, Status, StatusOptions};
use tokio::process::Command;

use crate::error::{AppError, Result};

/// List tracked files, in index order (the order `git ls-files` prints).
pub async fn list_tracked_files(dir: &Path) -> Result<Vec<String>> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let index = repo.index()?;
        let files = index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        Ok(files)
    })
    .await
    .map_err(|e| AppError::Git(format!("List-files task panicked: {e}")))?
}

/// Paths that `git status --porcelain` would report.
pub async fn changed_files(dir: &Path) -> Result<Vec<String>> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&dir)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let files = statuses
            .iter()
            .filter(|entry| {
                let status = entry.status();
                status != Status::CURRENT && !status.contains(Status::IGNORED)
            })
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();
        Ok(files)
    })
    .await
    .map_err(|e| AppError::Git(format!("Status task panicked: {e}")))?
}

/// Validate a patch without touching the working tree.
pub async fn apply_check(dir: &Path, patch_path: &Path) -> Result<()> {
    run_git_apply(dir, &["--check", "--3way"], patch_path).await
}

/// Apply a patch with a three-way fallback, fixing whitespace errors.
pub async fn apply(dir: &Path, patch_path: &Path) -> Result<()> {
    run_git_apply(dir, &["--3way", "--whitespace=fix"], patch_path).await
}

async fn run_git_apply(dir: &Path, flags: &[&str], patch_path: &Path) -> Result<()> {
    let output = Command::new("git")
        .arg("apply")
        .args(flags)
        .arg(patch_path)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AppError::Git(format!("Failed to spawn git apply: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(AppError::Git(format!(
        "git apply {} failed: {}",
        flags.join(" "),
        stderr.trim()
    )))
}
