//! OpenAI Chat Completions adapter.
//!
//! Also serves Google Gemini through its OpenAI-compatible endpoint; the
//! only differences are the base URL and the name used in errors.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::agent::error::LlmError;
use crate::agent::message::{Message, Role, ToolCall};
use crate::agent::provider::{
    Completion, FinishReason, ProviderAdapter, RequestOptions, ToolDefinition, map_http_error,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Versioned API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    /// Label for logs and errors.
    pub label: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.into(),
            model: model.into(),
            label: "openai".into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Gemini via `generativelanguage.googleapis.com/v1beta/openai`.
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(api_key, model)
            .with_base_url(GEMINI_BASE_URL)
            .with_label("gemini")
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Build the request body for `/chat/completions`.
pub fn build_completions_request(
    model: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
    options: &RequestOptions,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages.iter().map(message_to_openai).collect::<Vec<_>>(),
    });
    if let Some(obj) = body.as_object_mut() {
        if let Some(temp) = options.temperature {
            obj.insert("temperature".into(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".into(), serde_json::json!(max_tokens));
        }
        if !tools.is_empty() {
            let tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), serde_json::Value::Array(tools));
            obj.insert("tool_choice".into(), serde_json::json!("auto"));
        }
    }
    body
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    if msg.role == Role::Tool {
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.content,
        });
    }
    let mut obj = serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    });
    if !msg.tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = msg
            .tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments },
                })
            })
            .collect();
        obj["tool_calls"] = serde_json::Value::Array(calls);
    }
    obj
}

// ── Response ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Parse a `/chat/completions` response body.
pub fn parse_completion(label: &str, body: &str) -> Result<Completion, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Provider(format!("{label} returned an unreadable response: {e}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Provider(format!("{label} returned no choices")))?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(i, tc)| ToolCall {
            id: tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{i}")),
            name: tc.function.name,
            arguments: match tc.function.arguments {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "{}".to_owned(),
                other => other.to_string(),
            },
        })
        .collect();

    let finish_reason = match choice.finish_reason.as_deref() {
        _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
        Some("stop") | None => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some(_) => FinishReason::Other,
    };

    Ok(Completion {
        text: choice.message.content.filter(|t| !t.trim().is_empty()),
        tool_calls,
        finish_reason,
    })
}

// ── Adapter ───────────────────────────────────────────────────

pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("label", &self.config.label)
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config(format!("{} API key is empty", config.label)));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.config.label
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = build_completions_request(&self.config.model, messages, tools, options);
        debug!(provider = %self.config.label, model = %self.config.model, messages = messages.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&self.config.label, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(&self.config.label, &e))?;
        if !status.is_success() {
            return Err(map_http_error(&self.config.label, status, &text));
        }
        parse_completion(&self.config.label, &text)
    }
}
