//! The chat loop: model turn, tool calls, repeat until the model answers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::classify::classify;
use super::error::LlmError;
use super::message::{ChatExchange, Message};
use super::prompt::{self, NEXT_TASK_PROMPT, SUMMARY_PROMPT};
use super::provider::{ProviderAdapter, RequestOptions, ToolDefinition};
use super::tools::ToolName;
use crate::domain::{self, ValidationError};
use crate::error::Result;
use crate::service::Services;
use crate::service::reminders::confirmation_message;

/// Model turns allowed per request.
pub const MAX_ITERATIONS: usize = 15;

/// Prior exchanges forwarded to the model.
pub const HISTORY_EXCHANGES: usize = 3;

/// How far back a bare "yes" looks for a task creation.
const CONFIRMATION_LOOKBACK: usize = 5;

const DETAILS_SUFFIX: &str = " - show me the full details of the tasks from the previous search results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Success,
    Error,
}

/// Reply to one chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub status: ChatStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    fn success(output: impl Into<String>) -> Self {
        Self {
            status: ChatStatus::Success,
            output: output.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    fn failure(err: &LlmError) -> Self {
        let friendly = classify(err);
        Self {
            status: ChatStatus::Error,
            output: friendly.output,
            error: Some(friendly.error),
            timestamp: Utc::now(),
        }
    }
}

/// Natural-language front end over the task services.
pub struct TaskAgent {
    provider: Arc<dyn ProviderAdapter>,
    services: Services,
    tools: Vec<ToolDefinition>,
    options: RequestOptions,
    max_iterations: usize,
}

impl std::fmt::Debug for TaskAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskAgent")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.len())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

impl TaskAgent {
    pub fn new(provider: Arc<dyn ProviderAdapter>, services: Services) -> Self {
        Self {
            provider,
            services,
            tools: ToolName::definitions(),
            options: RequestOptions::default(),
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n.max(1);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Handle one user message.
    ///
    /// Only an empty message is an `Err`; provider failures come back as a
    /// response with `status: error` and guidance in `output`.
    pub async fn chat(&self, message: &str, history: &[ChatExchange]) -> Result<ChatResponse> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::Invalid("Message cannot be empty".into()).into());
        }
        info!(provider = self.provider.name(), chars = message.len(), "processing chat input");

        let lower = message.to_lowercase();
        let mut input = message.to_owned();
        if matches!(lower.as_str(), "yes" | "y") {
            if let Some(task_id) = recently_created_task(history) {
                return Ok(self.remind_in_an_hour(task_id).await);
            }
            input.push_str(DETAILS_SUFFIX);
        } else if matches!(lower.as_str(), "show me" | "details" | "show details") {
            input.push_str(DETAILS_SUFFIX);
        }

        let mut messages = vec![Message::system(prompt::system_prompt(Utc::now()))];
        let skip = history.len().saturating_sub(HISTORY_EXCHANGES);
        for exchange in &history[skip..] {
            if !exchange.user.trim().is_empty() {
                messages.push(Message::user(exchange.user.clone()));
            }
            if !exchange.assistant.trim().is_empty() {
                messages.push(Message::assistant(exchange.assistant.clone()));
            }
        }
        messages.push(Message::user(input));

        Ok(match self.run(messages).await {
            Ok(output) => ChatResponse::success(fallback_output(output, &lower)),
            Err(e) => {
                warn!(error = %e, "chat request failed");
                ChatResponse::failure(&e)
            }
        })
    }

    /// Model-written overview of the current tasks.
    pub async fn summary(&self) -> Result<ChatResponse> {
        self.chat(SUMMARY_PROMPT, &[]).await
    }

    /// Model recommendation for what to work on next.
    pub async fn next_task(&self) -> Result<ChatResponse> {
        self.chat(NEXT_TASK_PROMPT, &[]).await
    }

    async fn remind_in_an_hour(&self, task_id: uuid::Uuid) -> ChatResponse {
        info!(task_id = %task_id, "confirmation after task creation, scheduling reminder");
        match self
            .services
            .reminders
            .create(task_id, None, None, Utc::now())
            .await
        {
            Ok(reminder) => ChatResponse::success(confirmation_message(&reminder)),
            Err(e) => ChatResponse::failure(&LlmError::Tool(e.to_string())),
        }
    }

    /// Drive the model until it answers in text.
    ///
    /// Returns the final text, or the collected tool outputs when the
    /// model ends without text of its own.
    async fn run(&self, mut messages: Vec<Message>) -> std::result::Result<String, LlmError> {
        let mut tool_outputs: Vec<String> = Vec::new();

        for iteration in 0..self.max_iterations {
            let completion = self
                .provider
                .complete(&messages, &self.tools, &self.options)
                .await?;

            if completion.tool_calls.is_empty() {
                let text = completion.text.unwrap_or_default();
                if text.trim().is_empty() {
                    return Ok(tool_outputs.join("\n\n"));
                }
                return Ok(text);
            }

            let calls = completion.tool_calls;
            messages.push(Message::assistant_with_tool_calls(completion.text, calls.clone()));
            for call in calls {
                let result = match call.name.parse::<ToolName>() {
                    Ok(tool) => tool.dispatch(&self.services, &call.arguments).await,
                    Err(e) => Err(e),
                };
                let content = match result {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tool = %call.name, iteration, error = %e, "tool call failed");
                        format!("Error: {}", e.message())
                    }
                };
                tool_outputs.push(content.clone());
                messages.push(Message::tool_result(call.id, content));
            }
        }

        if tool_outputs.is_empty() {
            Err(LlmError::MaxIterations(format!(
                "no answer after {} model turns",
                self.max_iterations
            )))
        } else {
            warn!(max = self.max_iterations, "iteration limit reached, returning tool output");
            Ok(tool_outputs.join("\n\n"))
        }
    }
}

/// The task id announced by the most recent "created successfully" reply.
fn recently_created_task(history: &[ChatExchange]) -> Option<uuid::Uuid> {
    history
        .iter()
        .rev()
        .take(CONFIRMATION_LOOKBACK)
        .find_map(|ex| {
            let lower = ex.assistant.to_lowercase();
            if lower.contains("created successfully") && lower.contains("id:") {
                domain::find_ids(&ex.assistant).into_iter().next()
            } else {
                None
            }
        })
}

fn fallback_output(output: String, lower_input: &str) -> String {
    if !output.trim().is_empty() {
        return output;
    }
    if ["list", "show", "display", "get all", "find"]
        .iter()
        .any(|w| lower_input.contains(w))
    {
        "I couldn't retrieve the tasks. Please try again or check if there are any tasks in the system.".into()
    } else if ["create", "add", "new"].iter().any(|w| lower_input.contains(w)) {
        "I couldn't create the task. Please check the details and try again.".into()
    } else {
        "I've processed your request. If you expected a specific action, please try rephrasing your request.".into()
    }
}
