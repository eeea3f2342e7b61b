//! Provider adapter trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::message::{Message, ToolCall};

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Sampling options for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: Some(2048),
        }
    }
}

impl RequestOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other,
}

/// One model turn: optional text and any tool calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: None,
            tool_calls: calls,
            finish_reason: FinishReason::ToolCalls,
        }
    }
}

/// A hosted chat model with function calling.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logs and error messages (`"openai"`, `"gemini"`).
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &RequestOptions,
    ) -> Result<Completion, LlmError>;
}

/// Pull a human-readable message out of a JSON error body.
///
/// Handles `{"error": {"message": ..}}` (OpenAI, Anthropic) and the
/// array-wrapped variant some Google endpoints return.
pub(crate) fn extract_error_message(body: &str) -> String {
    let value = serde_json::from_str::<serde_json::Value>(body).ok();
    let error = value.as_ref().and_then(|v| match v {
        serde_json::Value::Array(items) => items.first().and_then(|i| i.get("error")),
        other => other.get("error"),
    });
    error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| body.trim().to_owned())
}

/// Map a non-success status to an [`LlmError`].
pub(crate) fn map_http_error(provider: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => LlmError::Auth(format!("{provider} authentication failed: {message}")),
        429 => LlmError::Quota(format!("{provider} quota exceeded (429): {message}")),
        code => LlmError::Provider(format!("{provider} HTTP {code}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_openai_body() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "Incorrect API key");
    }

    #[test]
    fn error_message_from_array_body() {
        let body = r#"[{"error":{"code":429,"message":"Resource has been exhausted"}}]"#;
        assert_eq!(extract_error_message(body), "Resource has been exhausted");
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(extract_error_message(" upstream down \n"), "upstream down");
    }

    #[test]
    fn http_status_mapping() {
        let err = map_http_error("openai", reqwest::StatusCode::UNAUTHORIZED, "{}");
        assert!(matches!(err, LlmError::Auth(_)));
        let err = map_http_error("gemini", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, LlmError::Quota(ref m) if m.contains("gemini") && m.contains("429")));
        let err = map_http_error("openai", reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(matches!(err, LlmError::Provider(ref m) if m.contains("502")));
    }
}
