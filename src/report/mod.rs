pub mod sink;

use std::sync::LazyLock;

use regex::Regex;

use crate::agent::parse::truncate_chars;
use crate::agent::GeneratedChange;
use crate::error::Result;
use crate::platform::types::Issue;

pub use sink::{GithubOutputFile, OutputSink, StdoutSink};

pub const BRANCH_PREFIX: &str = "codex/issue-";

const MAX_SLUG_CHARS: usize = 40;
const MAX_TITLE_CHARS: usize = 240;
const MAX_COMMIT_CHARS: usize = 240;

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("NON_ALNUM_RE regex should compile"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE regex should compile"));

static CLOSING_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(closes|fixes|resolves)\s+#\d+\b")
        .expect("CLOSING_REF_RE regex should compile")
});

/// The single terminal outcome of a run, with the derivations that produce
/// its descriptive fields below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutputs {
    Changed {
        branch_name: String,
        pr_title: String,
        pr_body: String,
        commit_message: String,
    },
    Unchanged {
        reason: String,
    },
}

impl RunOutputs {
    pub fn unchanged(reason: impl Into<String>) -> Self {
        RunOutputs::Unchanged {
            reason: reason.into(),
        }
    }

    /// Derive the descriptive outputs for an applied change.
    pub fn changed(issue: &Issue, change: &GeneratedChange) -> Self {
        RunOutputs::Changed {
            branch_name: branch_name(issue, change),
            pr_title: pr_title(issue.number, change),
            pr_body: pr_body(issue.number, change),
            commit_message: commit_message(issue.number, change),
        }
    }

    /// Output keys in emission order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            RunOutputs::Changed {
                branch_name,
                pr_title,
                pr_body,
                commit_message,
            } => vec![
                ("changed", "true"),
                ("branch_name", branch_name.as_str()),
                ("pr_title", pr_title.as_str()),
                ("pr_body", pr_body.as_str()),
                ("commit_message", commit_message.as_str()),
            ],
            RunOutputs::Unchanged { reason } => {
                vec![("changed", "false"), ("no_change_reason", reason.as_str())]
            }
        }
    }

    pub fn emit(&self, sink: &mut dyn OutputSink) -> Result<()> {
        for (name, value) in self.pairs() {
            sink.set_output(name, value)?;
        }
        Ok(())
    }
}

/// Lower-case, collapse non-alphanumeric runs to `-`, trim `-`, cap length.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let dashed = NON_ALNUM_RE.replace_all(&lowered, "-");
    let trimmed = dashed.trim_matches('-');
    truncate_chars(trimmed, MAX_SLUG_CHARS).to_string()
}

pub fn branch_name(issue: &Issue, change: &GeneratedChange) -> String {
    let source = change
        .branch_suffix
        .as_deref()
        .or(Some(issue.title.as_str()).filter(|t| !t.is_empty()))
        .unwrap_or("update");

    let slug = slugify(source);
    let slug = if slug.is_empty() { "update".to_string() } else { slug };

    format!("{BRANCH_PREFIX}{}-{slug}", issue.number)
}

pub fn pr_title(issue_number: u64, change: &GeneratedChange) -> String {
    let fallback = || format!("AI: Resolve #{issue_number}");
    let title = match change.pr_title.as_deref() {
        Some(raw) => truncate_chars(raw, MAX_TITLE_CHARS).trim().to_string(),
        None => return fallback(),
    };

    if title.is_empty() {
        fallback()
    } else {
        title
    }
}

pub fn pr_body(issue_number: u64, change: &GeneratedChange) -> String {
    let closing = format!("Closes #{issue_number}");
    let body = change.pr_body.as_deref().unwrap_or("").trim();

    let body = if CLOSING_REF_RE.is_match(body) {
        body.to_string()
    } else {
        format!("{body}\n\n{closing}").trim().to_string()
    };

    if body.is_empty() {
        closing
    } else {
        body
    }
}

pub fn commit_message(issue_number: u64, change: &GeneratedChange) -> String {
    let fallback = || format!("feat: address issue #{issue_number}");
    let message = match change.commit_message.as_deref() {
        Some(raw) => {
            let collapsed = WHITESPACE_RE.replace_all(raw, " ");
            truncate_chars(collapsed.trim(), MAX_COMMIT_CHARS).to_string()
        }
        None => return fallback(),
    };

    if message.is_empty() {
        fallback()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(number: u64, title: &str) -> Issue {
        Issue {
            number,
            title: title.to_string(),
            body: String::new(),
            labels: vec![],
            is_pull_request: false,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fix the Footer Link!"), "fix-the-footer-link");
        assert_eq!(slugify("--Already--dashed--"), "already-dashed");
        assert_eq!(slugify("Ünïcode & stuff"), "n-code-stuff");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(&"a".repeat(60)).len(), 40);
    }

    #[test]
    fn test_slug_cap_can_leave_trailing_dash() {
        let input = format!("{}-tail", "a".repeat(39));
        assert_eq!(slugify(&input), format!("{}-", "a".repeat(39)));
    }

    #[test]
    fn test_branch_name_prefers_model_suffix() {
        let change = GeneratedChange {
            branch_suffix: Some("Update Schedule".to_string()),
            ..Default::default()
        };
        assert_eq!(
            branch_name(&issue(12, "Something else"), &change),
            "codex/issue-12-update-schedule"
        );
    }

    #[test]
    fn test_branch_name_falls_back_to_title_then_update() {
        let none = GeneratedChange::default();
        assert_eq!(branch_name(&issue(3, "Typo in README"), &none), "codex/issue-3-typo-in-readme");
        assert_eq!(branch_name(&issue(3, ""), &none), "codex/issue-3-update");
        assert_eq!(branch_name(&issue(3, "???"), &none), "codex/issue-3-update");
    }

    #[test]
    fn test_pr_title_truncated_and_defaulted() {
        let long = GeneratedChange {
            pr_title: Some(format!("  {}", "t".repeat(300))),
            ..Default::default()
        };
        assert_eq!(pr_title(5, &long).chars().count(), 238);

        assert_eq!(pr_title(5, &GeneratedChange::default()), "AI: Resolve #5");

        let blank = GeneratedChange {
            pr_title: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(pr_title(5, &blank), "AI: Resolve #5");
    }

    #[test]
    fn test_pr_body_appends_closing_reference() {
        let change = GeneratedChange {
            pr_body: Some("Updates the footer.\n".to_string()),
            ..Default::default()
        };
        assert_eq!(pr_body(9, &change), "Updates the footer.\n\nCloses #9");
    }

    #[test]
    fn test_pr_body_keeps_existing_closing_reference() {
        let change = GeneratedChange {
            pr_body: Some("Small fix.\n\nFixes #17".to_string()),
            ..Default::default()
        };
        assert_eq!(pr_body(17, &change), "Small fix.\n\nFixes #17");

        let shouting = GeneratedChange {
            pr_body: Some("RESOLVES #17".to_string()),
            ..Default::default()
        };
        assert_eq!(pr_body(17, &shouting), "RESOLVES #17");
    }

    #[test]
    fn test_pr_body_defaults_to_closing_line() {
        assert_eq!(pr_body(4, &GeneratedChange::default()), "Closes #4");
    }

    #[test]
    fn test_commit_message_collapses_whitespace() {
        let change = GeneratedChange {
            commit_message: Some("  fix:\n  update\tfooter  link ".to_string()),
            ..Default::default()
        };
        assert_eq!(commit_message(1, &change), "fix: update footer link");
        assert_eq!(commit_message(1, &GeneratedChange::default()), "feat: address issue #1");

        let long = GeneratedChange {
            commit_message: Some("c".repeat(500)),
            ..Default::default()
        };
        assert_eq!(commit_message(1, &long).len(), 240);
    }

    #[test]
    fn test_derivations_are_deterministic() {
        let issue = issue(8, "Add RSS feed");
        let change = GeneratedChange {
            pr_title: Some("Add RSS".to_string()),
            pr_body: Some("Adds a feed".to_string()),
            commit_message: Some("feat: rss".to_string()),
            branch_suffix: Some("rss".to_string()),
            ..Default::default()
        };
        assert_eq!(RunOutputs::changed(&issue, &change), RunOutputs::changed(&issue, &change));
    }

    #[test]
    fn test_pairs_order() {
        let outputs = RunOutputs::unchanged("nothing to do");
        assert_eq!(
            outputs.pairs(),
            vec![("changed", "false"), ("no_change_reason", "nothing to do")]
        );
    }
}
