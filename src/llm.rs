//! Chat-completion client.
//!
//! One blocking request per question: no streaming, no conversation memory.
//! The reply text is returned verbatim.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::LlmConfig;
use crate::credential::Credential;
use crate::error::{QaError, Service};
use crate::http;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
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
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the messages and return the assistant's reply.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat provider using `POST {base_url}/chat/completions`.
pub struct OpenAIChat {
    client: reqwest::Client,
    credential: Credential,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig, credential: Credential) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            credential,
            model: config.model.clone(),
            url: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        tracing::debug!(model = %self.model, messages = messages.len(), "chat request");
        let json = http::post_json(
            &self.client,
            &self.url,
            &self.credential,
            &body,
            self.max_retries,
            Service::Chat,
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            QaError::service(Service::Chat, "invalid response: missing choices[0].message.content")
        })?;
    Ok(content.to_string())
}
