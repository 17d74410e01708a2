//! Chat-completion collaborator used by the query parser and the classifier.
//!
//! `ChatClient` is the seam; `OpenAiChat` talks to any OpenAI-compatible
//! `/chat/completions` endpoint and `DisabledChat` always errors so callers
//! take their deterministic fallbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::llm::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is disabled")]
    Disabled,
    #[error("network error: {0}")]
    Network(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Optional image attached to a user turn.
    pub image_url: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            image_url: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<ChatReply, LlmError>;
    fn name(&self) -> &'static str;
}

pub type DynChatClient = Arc<dyn ChatClient>;

/// Build a client from config. Disabled config or a missing key yields
/// `DisabledChat`.
pub fn build_chat_client(cfg: &LlmConfig) -> DynChatClient {
    if !cfg.enabled || cfg.api_key.trim().is_empty() {
        tracing::warn!(target: "llm", "language model disabled; parser and classifier use fallbacks");
        return Arc::new(DisabledChat);
    }
    match OpenAiChat::new(cfg) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(target: "llm", error = %e, "failed to build chat client");
            Arc::new(DisabledChat)
        }
    }
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(cfg: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent("manufacturer-sourcing/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

fn wire_message(m: &ChatMessage) -> serde_json::Value {
    match &m.image_url {
        // Vision-style multi-part content
        Some(url) => serde_json::json!({
            "role": m.role,
            "content": [
                { "type": "text", "text": m.content },
                { "type": "image_url", "image_url": { "url": url } }
            ]
        }),
        None => serde_json::json!({ "role": m.role, "content": m.content }),
    }
}

#[async_trait]
impl ChatClient for OpenAiChat {
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<ChatReply, LlmError> {
        let req = Req {
            model: &self.model,
            messages: messages.iter().map(wire_message).collect(),
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::Parse("empty completion".into()));
        }
        Ok(ChatReply { content })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails with `LlmError::Disabled`.
pub struct DisabledChat;

#[async_trait]
impl ChatClient for DisabledChat {
    async fn chat(&self, _messages: &[ChatMessage], _opts: ChatOptions) -> Result<ChatReply, LlmError> {
        Err(LlmError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(s: &str) -> &str {
    static RE_FENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").unwrap());
    match RE_FENCE.captures(s).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => s.trim(),
    }
}
