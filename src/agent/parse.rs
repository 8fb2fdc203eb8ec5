use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{AppError, Result};

static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^```(?:json)?\s*(.*?)\s*```$").expect("JSON_FENCE_RE regex should compile")
});

/// Maximum characters of a raw payload quoted back in error messages.
pub const PAYLOAD_EXCERPT_CHARS: usize = 1000;

type Strategy = fn(&str) -> Option<Value>;

/// Tried in order; the first success wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("unfenced", parse_unfenced),
    ("brace_span", parse_brace_span),
];

/// Decode model output that should be a JSON document but may be wrapped in
/// a code fence or surrounded by prose. Strategies run in order and the
/// first that yields JSON wins.
///
/// The brace-span strategy takes everything between the first `{` and the
/// last `}`, so prose that itself contains braces can defeat it.
pub fn parse_json_loose(input: &str) -> Result<Value> {
    let trimmed = input.trim();

    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(trimmed) {
            tracing::debug!(strategy = *name, "Decoded model output");
            return Ok(value);
        }
    }

    Err(AppError::MalformedOutput(
        "No JSON object found in model output.".to_string(),
    ))
}

fn parse_direct(input: &str) -> Option<Value> {
    serde_json::from_str(input).ok()
}

fn parse_unfenced(input: &str) -> Option<Value> {
    let inner = unfence_json(input)?;
    serde_json::from_str(inner).ok()
}

fn parse_brace_span(input: &str) -> Option<Value> {
    let text = unfence_json(input).unwrap_or(input);
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last <= first {
        return None;
    }
    serde_json::from_str(&text[first..=last]).ok()
}

fn unfence_json(input: &str) -> Option<&str> {
    JSON_FENCE_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pull the text of the first choice out of a chat-completion payload.
///
/// `message.content` may be a plain string or a list of parts; parts are
/// strings or objects carrying `text` or `content`. Legacy completions put
/// the text directly on the choice.
pub fn extract_message_content(payload: &Value) -> String {
    let Some(choice) = payload.get("choices").and_then(|c| c.get(0)) else {
        return String::new();
    };

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .filter(|c| !c.is_null())
        .or_else(|| choice.get("text").filter(|t| !t.is_null()));

    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|part| match part {
                Value::String(s) => s.as_str(),
                Value::Object(obj) => obj
                    .get("text")
                    .and_then(Value::as_str)
                    .or_else(|| obj.get("content").and_then(Value::as_str))
                    .unwrap_or(""),
                _ => "",
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
