use crate::context::RepositoryContext;
use crate::platform::types::Issue;

pub fn system_prompt() -> String {
    [
        "You are a senior engineer creating minimal, correct git patches.",
        "Return ONLY JSON with keys: patch, pr_title, pr_body, commit_message, branch_suffix.",
        "patch must be a valid unified diff that applies to the provided repository snapshot.",
        "Do not include markdown fences.",
        "Prefer small, targeted edits and preserve existing style.",
        "If no code/content change is possible, return an empty patch and explain in pr_body.",
    ]
    .join(" ")
}

/// The user prompt shared by every attempt.
pub fn user_prompt_for_issue(issue: &Issue, context: &RepositoryContext) -> String {
    let body = if issue.body.is_empty() {
        "(empty)"
    } else {
        issue.body.as_str()
    };
    let guidance = if context.guidance.is_empty() {
        "(none)"
    } else {
        context.guidance.as_str()
    };

    format!(
        r#"Issue #{number}: {title}

Issue body:
{body}

Project guidance (AGENTS.md excerpt):
{guidance}

Repository files:
{files}

Repository content excerpt:
{blocks}

Generate the patch now."#,
        number = issue.number,
        title = issue.title,
        files = context.files.join("\n"),
        blocks = context.joined_blocks(),
    )
}

/// Appended to the user prompt after a patch failed to apply.
pub fn retry_notice(apply_error: &str) -> String {
    format!(
        "\nPrevious patch failed to apply: {apply_error}\n\
         Generate a corrected unified diff with proper file headers and hunk markers.\n\
         Do not include explanations or prose."
    )
}
