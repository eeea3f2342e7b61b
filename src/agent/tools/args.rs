//! Typed arguments for each tool, validated before anything runs.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::agent::error::LlmError;
use crate::domain::{self, TaskPatch};

/// Decode the model's JSON argument string into `T`.
///
/// An empty string is treated as `{}`.
pub fn parse<T: DeserializeOwned>(tool: &str, raw: &str) -> Result<T, LlmError> {
    let raw = raw.trim();
    let raw = if raw.is_empty() { "{}" } else { raw };
    serde_json::from_str(raw)
        .map_err(|e| LlmError::ToolArgs(format!("invalid arguments for {tool}: {e}")))
}

/// Accepts a bare UUID or a labelled form such as `[task_id: ...]`.
pub fn task_id(raw: &str) -> Result<Uuid, LlmError> {
    domain::extract_id("task", raw).map_err(|e| LlmError::ToolArgs(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct TaskIdArgs {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskArgs {
    pub task_id: String,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReminderArgs {
    pub task_id: String,
    #[serde(default)]
    pub reminder_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRemindersArgs {
    #[serde(default)]
    pub task_id: Option<String>,
}
