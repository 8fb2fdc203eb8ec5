use std::sync::LazyLock;

use regex::Regex;

use crate::agent::prompt;
use crate::agent::CompletionProvider;
use crate::config::AppConfig;
use crate::context::RepositoryContext;
use crate::error::{AppError, Result};
use crate::platform::Platform;
use crate::report::{OutputSink, RunOutputs};
use crate::workflow::types::{Attempt, PatchOutcome};
use crate::workspace::patch::{strip_fences, PatchFile};
use crate::workspace::Workspace;

pub const SUB_ISSUE_REASON: &str =
    "Sub-issues are not allowed. Please submit one standalone change request per issue.";
pub const EMPTY_PATCH_REASON: &str = "Model returned an empty patch.";
pub const NO_CHANGES_REASON: &str = "Patch applied but produced no file changes.";

static TASK_ISSUE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\n)\s*-\s*\[[ xX]\]\s*#\d+\b").expect("TASK_ISSUE_REF_RE regex should compile")
});

static TASK_ISSUE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|\n)\s*-\s*\[[ x]\]\s*https://github\.com/[^/\s]+/[^/\s]+/issues/\d+\b")
        .expect("TASK_ISSUE_URL_RE regex should compile")
});

static SUB_ISSUE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsub-issues?\b").expect("SUB_ISSUE_WORD_RE regex should compile")
});

/// Task-list references to other issues mark a request that bundles
/// several changes.
pub fn has_sub_issue_syntax(text: &str) -> bool {
    !text.is_empty()
        && (TASK_ISSUE_REF_RE.is_match(text)
            || TASK_ISSUE_URL_RE.is_match(text)
            || SUB_ISSUE_WORD_RE.is_match(text))
}

/// Resolve the configured issue and write the outcome to `sink`.
///
/// Outputs are only written once the run has reached a terminal outcome;
/// a fatal error leaves the sink untouched.
pub async fn run(
    config: &AppConfig,
    platform: &dyn Platform,
    provider: &dyn CompletionProvider,
    workspace: &dyn Workspace,
    sink: &mut dyn OutputSink,
) -> Result<RunOutputs> {
    let outputs = resolve_issue(config, platform, provider, workspace).await?;
    outputs.emit(sink)?;
    Ok(outputs)
}

pub async fn resolve_issue(
    config: &AppConfig,
    platform: &dyn Platform,
    provider: &dyn CompletionProvider,
    workspace: &dyn Workspace,
) -> Result<RunOutputs> {
    let issue_number = config.issue_number;

    let issue = platform.get_issue(issue_number).await?;
    if issue.is_pull_request {
        return Err(AppError::IssueShape(format!(
            "Issue #{issue_number} is a pull request"
        )));
    }

    if has_sub_issue_syntax(&issue.body) {
        tracing::info!(issue = issue_number, "Issue references sub-issues, skipping");
        return Ok(RunOutputs::unchanged(SUB_ISSUE_REASON));
    }

    let tracked = match workspace.tracked_files().await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list tracked files, continuing without them");
            Vec::new()
        }
    };
    let context = RepositoryContext::build(workspace.root(), tracked, &config.context).await;

    let system = prompt::system_prompt();
    let base_prompt = prompt::user_prompt_for_issue(&issue, &context);

    let change = match draft_and_apply(provider, workspace, &system, &base_prompt).await? {
        PatchOutcome::Applied(change) => change,
        PatchOutcome::Empty(change) => {
            tracing::info!(issue = issue_number, "Model returned an empty patch");
            let reason = change
                .pr_body
                .unwrap_or_else(|| EMPTY_PATCH_REASON.to_string());
            return Ok(RunOutputs::unchanged(reason));
        }
    };

    let changed = match workspace.changed_files().await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read working tree status");
            Vec::new()
        }
    };

    if changed.is_empty() {
        tracing::info!(issue = issue_number, "Patch applied without changing any file");
        return Ok(RunOutputs::unchanged(NO_CHANGES_REASON));
    }

    tracing::info!(issue = issue_number, files = changed.len(), "Patch applied");

    Ok(RunOutputs::changed(&issue, &change))
}

/// Ask for a patch and apply it, re-prompting with the apply diagnostics
/// until the attempt budget runs out.
async fn draft_and_apply(
    provider: &dyn CompletionProvider,
    workspace: &dyn Workspace,
    system_prompt: &str,
    base_prompt: &str,
) -> Result<PatchOutcome> {
    let mut attempt = Attempt::first();

    loop {
        tracing::info!(attempt = attempt.number, "Drafting patch");

        let change = provider
            .generate(system_prompt, &attempt.user_prompt(base_prompt))
            .await?;

        let patch = strip_fences(change.patch.as_deref().unwrap_or(""));
        if patch.trim().is_empty() {
            return Ok(PatchOutcome::Empty(change));
        }

        let staged = PatchFile::write(patch)?;
        let applied = apply_staged(workspace, &staged).await;
        drop(staged);

        let error = match applied {
            Ok(()) => return Ok(PatchOutcome::Applied(change)),
            Err(e) => e.to_string(),
        };

        tracing::warn!(attempt = attempt.number, error = %error, "Patch failed to apply");

        attempt = match attempt.next(&error) {
            Some(next) => next,
            None => {
                return Err(AppError::PatchApply {
                    attempts: attempt.number,
                    last_error: error,
                })
            }
        };
    }
}

async fn apply_staged(workspace: &dyn Workspace, staged: &PatchFile) -> Result<()> {
    workspace.check_patch(staged.path()).await?;
    workspace.apply_patch(staged.path()).await
}
