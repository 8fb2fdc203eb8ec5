use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::agent::parse::{
    extract_message_content, parse_json_loose, truncate_chars, PAYLOAD_EXCERPT_CHARS,
};
use crate::agent::{CompletionProvider, GeneratedChange};
use crate::config::LlmConfig;
use crate::error::{AppError, Result};

/// Near-deterministic sampling for patch generation.
const TEMPERATURE: f32 = 0.2;

pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    http_referer: String,
    title: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            http_referer: config.http_referer.clone(),
            title: config.title.clone(),
        })
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            max_tokens: self.max_tokens,
            include_reasoning: false,
            reasoning: ReasoningOptions {
                effort: "none",
                exclude: true,
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        }
    }

    /// Send one prompt pair and return the raw text of the first choice.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = self.build_request(system_prompt, user_prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.http_referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "API returned {status}: {}",
                truncate_chars(&body, PAYLOAD_EXCERPT_CHARS)
            )));
        }

        let payload: serde_json::Value = serde_json::from_str(&body)?;
        let content = extract_message_content(&payload);

        if content.is_empty() {
            return Err(AppError::Provider(format!(
                "API returned no content: {}",
                truncate_chars(&payload.to_string(), PAYLOAD_EXCERPT_CHARS)
            )));
        }

        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsClient {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<GeneratedChange> {
        tracing::info!(
            model = %self.model,
            prompt_chars = user_prompt.chars().count(),
            "Requesting completion"
        );

        let content = self.complete(system_prompt, user_prompt).await?;

        tracing::debug!(response_chars = content.chars().count(), "Completion received");

        let value = parse_json_loose(&content)?;
        Ok(GeneratedChange::from_value(&value))
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub include_reasoning: bool,
    pub reasoning: ReasoningOptions,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ReasoningOptions {
    pub effort: &'static str,
    pub exclude: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_config() -> LlmConfig {
        config_for("https://llm.example.com/v1")
    }

    fn config_for(base_url: &str) -> LlmConfig {
        LlmConfig {
            api_key: "sk-test".to_string(),
            base_url: base_url.to_string(),
            completions_path: "/chat/completions".to_string(),
            model: "test/model".to_string(),
            max_tokens: 1234,
            timeout_secs: 5,
            http_referer: "https://github.com/acme/site".to_string(),
            title: "acme/site ai issue bot".to_string(),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = ChatCompletionsClient::new(&test_config()).unwrap();
        let request = client.build_request("sys", "usr");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "test/model");
        assert_eq!(body["max_tokens"], 1234);
        assert_eq!(body["include_reasoning"], false);
        assert_eq!(body["reasoning"]["effort"], "none");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert!(body["temperature"].as_f64().unwrap() < 0.5);
    }

    #[test]
    fn test_endpoint_joined_from_config() {
        let client = ChatCompletionsClient::new(&test_config()).unwrap();
        assert_eq!(client.endpoint, "https://llm.example.com/v1/chat/completions");
    }

    fn client_for(server: &MockServer) -> ChatCompletionsClient {
        ChatCompletionsClient::new(&config_for(&server.url("/v1"))).unwrap()
    }

    fn reply(content: serde_json::Value) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_reply() {
        let server = MockServer::start_async().await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .body_contains("\"include_reasoning\":false");
                then.status(200).json_body(reply(json!(
                    "```json\n{\"patch\": \"--- a/x\\n+++ b/x\\n\", \"pr_title\": \"Fix x\"}\n```"
                )));
            })
            .await;

        let change = client_for(&server).generate("sys", "usr").await.unwrap();

        completion.assert_async().await;
        assert_eq!(change.pr_title.as_deref(), Some("Fix x"));
        assert_eq!(change.patch.as_deref(), Some("--- a/x\n+++ b/x\n"));
    }

    #[tokio::test]
    async fn test_generate_non_object_reply_is_empty_proposal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(reply(json!("\"no change\"")));
            })
            .await;

        let change = client_for(&server).generate("sys", "usr").await.unwrap();

        assert_eq!(change, GeneratedChange::default());
    }

    #[tokio::test]
    async fn test_generate_unreadable_reply_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(reply(json!("I could not do it.")));
            })
            .await;

        let err = client_for(&server).generate("sys", "usr").await.unwrap_err();

        assert!(matches!(err, AppError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_complete_error_status_is_provider_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("<html>boom</html>");
            })
            .await;

        let err = client_for(&server).complete("sys", "usr").await.unwrap_err();

        match err {
            AppError::Provider(message) => {
                assert!(message.contains("500"), "{message}");
                assert!(message.ends_with("<html>boom</html>"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_error_payload_is_truncated() {
        let server = MockServer::start_async().await;
        let payload = format!("{}{}", "e".repeat(PAYLOAD_EXCERPT_CHARS), "TAIL");
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body(payload.as_str());
            })
            .await;

        let err = client_for(&server).complete("sys", "usr").await.unwrap_err();

        let AppError::Provider(message) = err else {
            panic!("expected a provider error");
        };
        assert!(message.contains("429"), "{message}");
        assert!(!message.contains("TAIL"));
        assert!(message.ends_with(&"e".repeat(PAYLOAD_EXCERPT_CHARS)));
    }

    #[tokio::test]
    async fn test_complete_empty_content_is_provider_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(reply(json!(null)));
            })
            .await;

        let err = client_for(&server).complete("sys", "usr").await.unwrap_err();

        match err {
            AppError::Provider(message) => {
                assert!(message.starts_with("API returned no content"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
