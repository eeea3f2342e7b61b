//! Natural-language task agent.
//!
//! A hosted chat model with function calling picks one of the operations
//! in [`tools::ToolName`]; the application validates the arguments, runs
//! the operation against the services and feeds the result back until the
//! model answers in text.

pub mod classify;
pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod runner;
pub mod tools;

pub use error::LlmError;
pub use message::{ChatExchange, Message, Role, ToolCall};
pub use provider::{Completion, ProviderAdapter, RequestOptions, ToolDefinition};
pub use runner::{ChatResponse, ChatStatus, TaskAgent};
pub use tools::ToolName;

use crate::config::LlmConfig;
use crate::service::Services;

/// Build an agent from config.
///
/// Fails when no provider has a credential.
pub fn build(config: &LlmConfig, services: Services) -> Result<TaskAgent, LlmError> {
    let provider = providers::from_config(config)?;
    let options = RequestOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens.max(1)),
    };
    Ok(TaskAgent::new(provider, services).with_options(options))
}
