//! LLM client: the single point of entry for text-generation calls.
//!
//! ARCHITECTURAL RULE: agents never talk to a provider directly. They go through
//! `TextProvider`, so the Agent Caller can own timeout, retry and metrics.
//!
//! `LlmClient` makes exactly one HTTP attempt per call. `OfflineProvider` stands in
//! when no API key is configured.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::enhancement::AgentRole;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all agent calls.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 1024;

/// Characters of the prompt echoed back by the offline provider.
pub const ECHO_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// A text-generation backend. Returns the response body as untrusted text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn complete(&self, prompt: &str, role: AgentRole) -> Result<String, LlmError>;

    /// Label for logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }

    /// Makes one call to the Messages API and returns the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl TextProvider for LlmClient {
    async fn complete(&self, prompt: &str, role: AgentRole) -> Result<String, LlmError> {
        let system = prompts::system_prompt(role);
        let response = self.call(prompt, &system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(strip_json_fences(text).to_string())
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

/// Development provider: echoes the head of the prompt in the expected JSON shape.
#[derive(Clone, Default)]
pub struct OfflineProvider;

#[async_trait]
impl TextProvider for OfflineProvider {
    async fn complete(&self, prompt: &str, _role: AgentRole) -> Result<String, LlmError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let echoed: String = prompt.chars().take(ECHO_CHARS).collect();
        Ok(serde_json::json!({
            "text": echoed,
            "suggestions": [],
            "confidence": 0.5,
        })
        .to_string())
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let json = serde_json::json!({
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "{\"text\": \"hi\"}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let response: LlmResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.text(), Some("{\"text\": \"hi\"}"));
    }

    #[test]
    fn test_system_prompt_is_role_specific() {
        let writer = prompts::system_prompt(AgentRole::Writer);
        let ats = prompts::system_prompt(AgentRole::AtsOptimizer);
        assert_ne!(writer, ats);
        assert!(writer.contains("valid JSON only"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_provider_echoes_prompt_head() {
        let prompt = "x".repeat(1500);
        let body = OfflineProvider
            .complete(&prompt, AgentRole::Writer)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["text"].as_str().unwrap().len(), ECHO_CHARS);
        assert_eq!(value["confidence"], 0.5);
    }
}
