use std::time::Duration;

use async_trait::async_trait;
use octocrab::Octocrab;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::Platform;

use super::mapper;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitHubPlatform {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let (owner, repo) = Self::parse_repo(&config.repository)?;

        let client = Octocrab::builder()
            .personal_token(config.token.clone())
            .base_uri(config.api_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid GitHub API URL: {e}")))?
            .set_connect_timeout(Some(REQUEST_TIMEOUT))
            .set_read_timeout(Some(REQUEST_TIMEOUT))
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn parse_repo(repo_full_name: &str) -> Result<(&str, &str)> {
        let parts: Vec<&str> = repo_full_name.splitn(2, '/').collect();
        if parts.len() != 2 {
            return Err(AppError::GitHubApi(format!(
                "Invalid repo name: {repo_full_name}"
            )));
        }
        Ok((parts[0], parts[1]))
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    async fn get_issue(&self, issue_number: u64) -> Result<Issue> {
        tracing::debug!(
            owner = %self.owner,
            repo = %self.repo,
            issue = issue_number,
            "Fetching issue"
        );

        let issue = self
            .client
            .issues(&self.owner, &self.repo)
            .get(issue_number)
            .await?;

        Ok(mapper::map_issue(&issue))
    }
}
