//! Turn provider failures into something a user can act on.

use super::error::LlmError;

/// What went wrong, for the `error` field and the chat `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendlyError {
    pub error: String,
    pub output: String,
}

/// Classify by substring of the rendered error.
///
/// Quota markers win over everything else since a 429 body often also
/// mentions the API key.
pub fn classify(err: &LlmError) -> FriendlyError {
    let raw = err.to_string();
    let lower = raw.to_lowercase();

    let is_quota = matches!(err, LlmError::Quota(_))
        || ["429", "quota", "insufficient_quota", "resource_exhausted"]
            .iter()
            .any(|m| lower.contains(m));
    if is_quota {
        let (provider, url) = if lower.contains("gemini") || lower.contains("google") {
            ("Google Gemini", "https://aistudio.google.com/apikey")
        } else if lower.contains("anthropic") || lower.contains("claude") {
            ("Anthropic Claude", "https://console.anthropic.com/settings/keys")
        } else {
            ("OpenAI", "https://platform.openai.com/usage")
        };
        return FriendlyError {
            error: format!(
                "{provider} API quota exceeded. Please check your account billing and usage limits."
            ),
            output: format!(
                "{provider} API quota exceeded.\n\n\
                 Your {provider} API key has reached its usage limit. To resolve this:\n\n\
                 1. Check your usage: {url}\n\
                 2. Check your account billing settings\n\
                 3. Upgrade your plan if needed\n\
                 4. Wait for the quota to reset\n\n\
                 You can still create tasks directly through the task endpoints."
            ),
        };
    }

    if matches!(err, LlmError::Auth(_) | LlmError::Config(_))
        || lower.contains("api key")
        || lower.contains("authentication")
    {
        let msg = "API key error. Please check your API key configuration in the .env file.";
        return FriendlyError {
            error: msg.to_owned(),
            output: msg.to_owned(),
        };
    }

    if lower.contains("tool") {
        let msg = format!(
            "Tool execution error: {raw}. The task may still have been created - please check the task list."
        );
        return FriendlyError {
            error: msg.clone(),
            output: msg,
        };
    }

    FriendlyError {
        error: raw.clone(),
        output: format!("I encountered an error: {raw}. Please try again or check the server logs."),
    }
}
