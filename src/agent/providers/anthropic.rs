//! Anthropic Messages API adapter.
//!
//! The system prompt moves to the top-level `system` field, tool calls
//! become `tool_use` blocks and tool results go back as `tool_result`
//! blocks inside a user turn.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::agent::error::LlmError;
use crate::agent::message::{Message, Role, ToolCall};
use crate::agent::provider::{
    Completion, FinishReason, ProviderAdapter, RequestOptions, ToolDefinition, map_http_error,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.into(),
            model: model.into(),
            api_version: ANTHROPIC_VERSION.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn build_messages_request(
    model: &str,
    messages: &[Message],
    tools: &[ToolDefinition],
    options: &RequestOptions,
) -> serde_json::Value {
    let (system, converted) = convert_messages(messages);
    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": options.max_tokens.unwrap_or(2048),
        "messages": converted,
    });
    if let Some(system) = system {
        body["system"] = serde_json::Value::String(system);
    }
    if let Some(temp) = options.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if !tools.is_empty() {
        body["tools"] = serde_json::Value::Array(
            tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect(),
        );
    }
    body
}

/// Split out the system text and convert the rest to Anthropic turns.
///
/// Consecutive tool results are merged into one user turn, which the API
/// requires when the assistant made several calls at once.
pub fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<serde_json::Value>) {
    let mut system: Option<String> = None;
    let mut out: Vec<serde_json::Value> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                system = Some(match system.take() {
                    Some(prev) => format!("{prev}\n\n{}", msg.content),
                    None => msg.content.clone(),
                });
            }
            Role::User => out.push(serde_json::json!({
                "role": "user",
                "content": [{"type": "text", "text": msg.content}],
            })),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(serde_json::json!({"type": "text", "text": msg.content}));
                }
                for tc in &msg.tool_calls {
                    let input: serde_json::Value =
                        serde_json::from_str(&tc.arguments).unwrap_or_else(|_| serde_json::json!({}));
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": input,
                    }));
                }
                if !blocks.is_empty() {
                    out.push(serde_json::json!({"role": "assistant", "content": blocks}));
                }
            }
            Role::Tool => {
                let block = serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                    "content": msg.content,
                });
                match out
                    .last_mut()
                    .filter(|last| is_tool_result_turn(last))
                    .and_then(|last| last["content"].as_array_mut())
                {
                    Some(content) => content.push(block),
                    None => out.push(serde_json::json!({"role": "user", "content": [block]})),
                }
            }
        }
    }
    (system, out)
}

fn is_tool_result_turn(turn: &serde_json::Value) -> bool {
    turn["role"] == "user"
        && turn["content"]
            .as_array()
            .is_some_and(|c| c.iter().all(|b| b["type"] == "tool_result"))
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

pub fn parse_messages_response(body: &str) -> Result<Completion, LlmError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Provider(format!("anthropic returned an unreadable response: {e}")))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in parsed.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(&t),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input.to_string(),
            }),
            ContentBlock::Other => {}
        }
    }

    let finish_reason = match parsed.stop_reason.as_deref() {
        Some("tool_use") => FinishReason::ToolCalls,
        Some("end_turn") | Some("stop_sequence") | None => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some(_) => FinishReason::Other,
    };

    Ok(Completion {
        text: (!text.trim().is_empty()).then_some(text),
        tool_calls,
        finish_reason,
    })
}

pub struct AnthropicAdapter {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("anthropic API key is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<Completion, LlmError> {
        let body = build_messages_request(&self.config.model, messages, tools, options);
        let url = format!("{}/v1/messages", self.config.base_url);
        debug!(model = %self.config.model, messages = messages.len(), "sending anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest("anthropic", &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest("anthropic", &e))?;
        if !status.is_success() {
            return Err(map_http_error("anthropic", status, &text));
        }
        parse_messages_response(&text)
    }
}
