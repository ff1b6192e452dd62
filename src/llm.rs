//! Language model collaborator.
//!
//! Defines the [`LanguageModel`] trait and the [`OllamaChat`] client that
//! talks to a locally hosted Ollama daemon. One synchronous (blocking from
//! the caller's perspective) request per answer, no streaming, no retry;
//! the answerer surfaces a failure to the caller untouched.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::LlmConfig;

/// One chat turn in the wire format the model expects.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the ordered message sequence and return the complete answer.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat client backed by a local Ollama daemon.
///
/// Calls `POST {endpoint}/api/chat` with `stream: false`.
pub struct OllamaChat {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat() {
        let json = serde_json::json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": "The invoice is due Friday." },
            "done": true
        });
        assert_eq!(
            parse_chat_response(&json).unwrap(),
            "The invoice is due Friday."
        );
    }

    #[test]
    fn parse_chat_rejects_missing_content() {
        let json = serde_json::json!({ "error": "model not loaded" });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn message_constructors() {
        let sys = ChatMessage::system("be brief");
        let user = ChatMessage::user("hello");
        assert_eq!(sys.role, "system");
        assert_eq!(user.role, "user");
        assert_eq!(user.content, "hello");
    }
}
