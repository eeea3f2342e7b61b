//! Errors raised by LLM providers and agent tools.
//!
//! Every variant carries a stable code that prefixes its Display output
//! (`[AUTH_FAILED] ...`) and is available through [`LlmError::code`].

pub mod codes {
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const QUOTA_EXCEEDED: &str = "QUOTA_EXCEEDED";
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
    pub const TOOL_INVALID_ARGS: &str = "TOOL_INVALID_ARGS";
    pub const TOOL_FAILED: &str = "TOOL_FAILED";
    pub const MAX_ITERATIONS: &str = "MAX_ITERATIONS";
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    /// Missing credential or unusable provider settings.
    #[error("[{}] {}", codes::CONFIG_INVALID, .0)]
    Config(String),

    /// The provider rejected the API key.
    #[error("[{}] {}", codes::AUTH_FAILED, .0)]
    Auth(String),

    /// Rate limit or exhausted quota (HTTP 429).
    #[error("[{}] {}", codes::QUOTA_EXCEEDED, .0)]
    Quota(String),

    /// Transport failure before a response arrived.
    #[error("[{}] {}", codes::REQUEST_FAILED, .0)]
    Request(String),

    #[error("[{}] {}", codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    /// Any other non-success response or malformed body.
    #[error("[{}] {}", codes::PROVIDER_ERROR, .0)]
    Provider(String),

    /// The model called a tool with arguments that failed validation.
    #[error("[{}] {}", codes::TOOL_INVALID_ARGS, .0)]
    ToolArgs(String),

    /// A tool ran but its operation failed.
    #[error("[{}] {}", codes::TOOL_FAILED, .0)]
    Tool(String),

    /// The model kept calling tools without producing an answer.
    #[error("[{}] {}", codes::MAX_ITERATIONS, .0)]
    MaxIterations(String),
}

impl LlmError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => codes::CONFIG_INVALID,
            Self::Auth(_) => codes::AUTH_FAILED,
            Self::Quota(_) => codes::QUOTA_EXCEEDED,
            Self::Request(_) => codes::REQUEST_FAILED,
            Self::Timeout(_) => codes::TIMEOUT_ERROR,
            Self::Provider(_) => codes::PROVIDER_ERROR,
            Self::ToolArgs(_) => codes::TOOL_INVALID_ARGS,
            Self::Tool(_) => codes::TOOL_FAILED,
            Self::MaxIterations(_) => codes::MAX_ITERATIONS,
        }
    }

    /// The message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Auth(m)
            | Self::Quota(m)
            | Self::Request(m)
            | Self::Timeout(m)
            | Self::Provider(m)
            | Self::ToolArgs(m)
            | Self::Tool(m)
            | Self::MaxIterations(m) => m,
        }
    }

    /// `true` when another provider might succeed where this one failed.
    ///
    /// Quota and transport failures are worth handing to the next provider
    /// in a chain; auth and config problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Quota(_) | Self::Request(_) | Self::Timeout(_) | Self::Provider(_)
        )
    }

    pub(crate) fn from_reqwest(provider: &str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(format!("{provider} request timed out: {e}"))
        } else {
            Self::Request(format!("{provider} request failed: {e}"))
        }
    }
}
