pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Read-only view of the issue tracker needed for one run.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch a single issue's metadata.
    async fn get_issue(&self, issue_number: u64) -> Result<Issue>;
}
