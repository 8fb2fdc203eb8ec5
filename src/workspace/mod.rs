pub mod git;
pub mod patch;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// The version-controlled working tree a run operates on.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Repository root; file reads for the context are relative to it.
    fn root(&self) -> &Path;

    /// Tracked paths in index order.
    async fn tracked_files(&self) -> Result<Vec<String>>;

    /// Dry-run: fail with the tool's diagnostics if the patch would not apply.
    async fn check_patch(&self, patch_path: &Path) -> Result<()>;

    /// Apply the patch to the working tree.
    async fn apply_patch(&self, patch_path: &Path) -> Result<()>;

    /// Paths with staged, unstaged or untracked changes.
    async fn changed_files(&self) -> Result<Vec<String>>;
}

/// A local git checkout.
pub struct GitWorkspace {
    root: PathBuf,
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Workspace for GitWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn tracked_files(&self) -> Result<Vec<String>> {
        git::list_tracked_files(&self.root).await
    }

    async fn check_patch(&self, patch_path: &Path) -> Result<()> {
        git::apply_check(&self.root, patch_path).await
    }

    async fn apply_patch(&self, patch_path: &Path) -> Result<()> {
        git::apply(&self.root, patch_path).await
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        git::changed_files(&self.root).await
    }
}
