pub mod client;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use client::ChatCompletionsClient;

/// A chat-completion backend that answers one system+user prompt pair with
/// a structured change proposal.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<GeneratedChange>;
}

/// The model's proposal. Every field is optional; callers apply defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedChange {
    pub patch: Option<String>,
    pub pr_title: Option<String>,
    pub pr_body: Option<String>,
    pub commit_message: Option<String>,
    pub branch_suffix: Option<String>,
}

impl GeneratedChange {
    /// Build from decoded model output. Numbers and `true` are stringified;
    /// empty strings, `null`, `false` and nested values count as absent.
    /// A non-object document carries no fields, so it reads as an empty
    /// proposal.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            tracing::warn!(kind = kind_of(value), "Model output is not a JSON object");
            return Self::default();
        };

        let field = |name: &str| object.get(name).and_then(loose_string);

        Self {
            patch: field("patch"),
            pr_title: field("pr_title"),
            pr_body: field("pr_body"),
            commit_message: field("commit_message"),
            branch_suffix: field("branch_suffix"),
        }
    }
}

fn loose_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_reads_all_fields() {
        let change = GeneratedChange::from_value(&json!({
            "patch": "--- a/x\n+++ b/x\n",
            "pr_title": "Fix typo",
            "pr_body": "Fixes the typo",
            "commit_message": "fix: typo",
            "branch_suffix": "typo"
        }));
        assert_eq!(change.pr_title.as_deref(), Some("Fix typo"));
        assert_eq!(change.branch_suffix.as_deref(), Some("typo"));
        assert!(change.patch.is_some());
    }

    #[test]
    fn test_from_value_treats_falsy_as_absent() {
        let change = GeneratedChange::from_value(&json!({
            "patch": "",
            "pr_title": null,
            "pr_body": false,
            "commit_message": 0
        }));
        assert_eq!(change, GeneratedChange::default());
    }

    #[test]
    fn test_from_value_stringifies_numbers() {
        let change = GeneratedChange::from_value(&json!({ "branch_suffix": 404 }));
        assert_eq!(change.branch_suffix.as_deref(), Some("404"));
    }

    #[test]
    fn test_from_value_non_object_is_empty_proposal() {
        for value in [json!("no change"), json!(["patch"]), json!(null), json!(7)] {
            assert_eq!(GeneratedChange::from_value(&value), GeneratedChange::default());
        }
    }
}
