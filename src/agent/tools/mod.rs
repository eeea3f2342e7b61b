//! The closed set of operations the agent may perform.
//!
//! [`ToolName`] is the dispatch table: each variant owns its schema and
//! its execution, and arguments are decoded into typed structs before any
//! service is called. Unknown tool names never reach a service.

pub mod args;
pub mod render;

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::error::LlmError;
use super::provider::ToolDefinition;
use crate::domain::{NewTask, TaskPriority, TaskStatus};
use crate::error::AppError;
use crate::service::reminders::confirmation_message;
use crate::service::tasks::DEFAULT_SEARCH_RESULTS;
use crate::service::{Services, TaskFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    CreateTask,
    ListTasks,
    GetTask,
    UpdateTask,
    DeleteTask,
    SearchTasks,
    CreateReminder,
    ListReminders,
}

impl ToolName {
    pub const ALL: [Self; 8] = [
        Self::CreateTask,
        Self::ListTasks,
        Self::GetTask,
        Self::UpdateTask,
        Self::DeleteTask,
        Self::SearchTasks,
        Self::CreateReminder,
        Self::ListReminders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::ListTasks => "list_tasks",
            Self::GetTask => "get_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::SearchTasks => "search_tasks",
            Self::CreateReminder => "create_reminder",
            Self::ListReminders => "list_reminders",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::CreateTask => {
                "Create a new task. Provide title (required), description, priority \
                 (low/medium/high/urgent), due_date (ISO 8601 or 'today', 'tomorrow', \
                 'evening', 'morning', optionally with a time such as 'tomorrow 18:00'), \
                 estimated_hours (0-24) and tags."
            }
            Self::ListTasks => {
                "List existing tasks, newest first, optionally filtered by status and \
                 priority. Use for 'list', 'show', 'display' requests. Never creates tasks."
            }
            Self::GetTask => "Get one task by its ID.",
            Self::UpdateTask => {
                "Update fields of an existing task. Only the fields provided are changed."
            }
            Self::DeleteTask => "Delete a task and its reminders.",
            Self::SearchTasks => {
                "Search tasks by meaning, e.g. 'tasks about code review'. Falls back to \
                 text matching when nothing similar is found."
            }
            Self::CreateReminder => {
                "Create a reminder for a task. reminder_time may be 'in 30 minutes', \
                 'in 2 hours', 'in 1 day', 'tomorrow at 9am' or ISO 8601 (IST). \
                 Defaults to one hour from now."
            }
            Self::ListReminders => "List reminders, optionally for one task.",
        }
    }

    fn parameters(self) -> serde_json::Value {
        let task_id = json!({
            "type": "string",
            "description": "Task UUID, e.g. 46d6dfae-b367-40ec-b3b8-77246979a72b"
        });
        let priority = json!({
            "type": "string",
            "enum": TaskPriority::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>()
        });
        let status = json!({
            "type": "string",
            "enum": TaskStatus::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>()
        });
        let due_date = json!({
            "type": "string",
            "description": "ISO 8601 date-time or a relative phrase"
        });

        match self {
            Self::CreateTask => json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Task title" },
                    "description": { "type": "string" },
                    "priority": priority,
                    "due_date": due_date,
                    "estimated_hours": { "type": "number", "minimum": 0, "maximum": 24 },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["title"]
            }),
            Self::ListTasks => json!({
                "type": "object",
                "properties": {
                    "status": status,
                    "priority": priority,
                    "limit": { "type": "integer", "minimum": 1, "maximum": 100 }
                }
            }),
            Self::GetTask | Self::DeleteTask => json!({
                "type": "object",
                "properties": { "task_id": task_id },
                "required": ["task_id"]
            }),
            Self::UpdateTask => json!({
                "type": "object",
                "properties": {
                    "task_id": task_id,
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "status": status,
                    "priority": priority,
                    "due_date": due_date,
                    "estimated_hours": { "type": "number", "minimum": 0, "maximum": 24 },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["task_id"]
            }),
            Self::SearchTasks => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "max_results": { "type": "integer", "minimum": 1, "maximum": 50 }
                },
                "required": ["query"]
            }),
            Self::CreateReminder => json!({
                "type": "object",
                "properties": {
                    "task_id": task_id,
                    "reminder_time": { "type": "string" }
                },
                "required": ["task_id"]
            }),
            Self::ListReminders => json!({
                "type": "object",
                "properties": { "task_id": task_id }
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(self.as_str(), self.description(), self.parameters())
    }

    /// Definitions for every tool, in a stable order.
    pub fn definitions() -> Vec<ToolDefinition> {
        Self::ALL.iter().map(|t| t.definition()).collect()
    }

    /// Decode `raw_args` and run the operation.
    ///
    /// Returns the text handed back to the model.
    pub async fn dispatch(self, services: &Services, raw_args: &str) -> Result<String, LlmError> {
        debug!(tool = self.as_str(), "dispatching tool call");
        let name = self.as_str();
        match self {
            Self::CreateTask => {
                let new_task: NewTask = args::parse(name, raw_args)?;
                let task = services.tasks.create(new_task).await.map_err(tool_error)?;
                Ok(format!(
                    "Task '{}' created successfully! ID: {}. Status: {}, Priority: {}",
                    task.title, task.id, task.status, task.priority
                ))
            }
            Self::ListTasks => {
                let filter: TaskFilter = args::parse(name, raw_args)?;
                let tasks = services.tasks.list(&filter).await.map_err(tool_error)?;
                Ok(render::task_list(&tasks))
            }
            Self::GetTask => {
                let a: args::TaskIdArgs = args::parse(name, raw_args)?;
                let task = services
                    .tasks
                    .get(args::task_id(&a.task_id)?)
                    .await
                    .map_err(tool_error)?;
                Ok(render::task_block(&task))
            }
            Self::UpdateTask => {
                let a: args::UpdateTaskArgs = args::parse(name, raw_args)?;
                let task = services
                    .tasks
                    .update(args::task_id(&a.task_id)?, a.patch)
                    .await
                    .map_err(tool_error)?;
                Ok(format!(
                    "Task updated successfully.\n\n{}",
                    render::task_block(&task)
                ))
            }
            Self::DeleteTask => {
                let a: args::TaskIdArgs = args::parse(name, raw_args)?;
                let id = args::task_id(&a.task_id)?;
                services.tasks.delete(id).await.map_err(tool_error)?;
                Ok(format!("Task {id} deleted successfully."))
            }
            Self::SearchTasks => {
                let a: args::SearchArgs = args::parse(name, raw_args)?;
                let hits = services
                    .tasks
                    .search(&a.query, a.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS))
                    .await
                    .map_err(tool_error)?;
                Ok(render::search_results(a.query.trim(), &hits))
            }
            Self::CreateReminder => {
                let a: args::CreateReminderArgs = args::parse(name, raw_args)?;
                let reminder = services
                    .reminders
                    .create(
                        args::task_id(&a.task_id)?,
                        a.reminder_time.as_deref(),
                        None,
                        Utc::now(),
                    )
                    .await
                    .map_err(tool_error)?;
                Ok(format!(
                    "{} Reminder ID: {}",
                    confirmation_message(&reminder),
                    reminder.id
                ))
            }
            Self::ListReminders => {
                let a: args::ListRemindersArgs = args::parse(name, raw_args)?;
                let task_id = a
                    .task_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(args::task_id)
                    .transpose()?;
                let reminders = services.reminders.list(task_id).await.map_err(tool_error)?;
                Ok(render::reminder_list(&reminders))
            }
        }
    }
}

fn tool_error(e: AppError) -> LlmError {
    match e {
        AppError::Validation(v) => LlmError::ToolArgs(v.to_string()),
        AppError::NotFound(what) => LlmError::Tool(format!(
            "{what}. Please verify the ID; list tasks to see available IDs."
        )),
        other => LlmError::Tool(other.to_string()),
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| LlmError::ToolArgs(format!("unknown tool '{s}'")))
    }
}
