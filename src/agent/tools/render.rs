//! Plain-text rendering of tool results.
//!
//! The text goes back to the model and, when the model adds nothing of its
//! own, straight to the user, so every task shows its ID.

use crate::clock;
use crate::domain::{Reminder, Task};
use crate::service::SearchHit;

/// Tasks shown per listing.
pub const MAX_LISTED_TASKS: usize = 20;

/// Reminders shown per listing.
pub const MAX_LISTED_REMINDERS: usize = 10;

pub fn task_block(task: &Task) -> String {
    let description = task
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("No description");
    let due = task
        .due_date
        .map(clock::format_ist)
        .unwrap_or_else(|| "No due date".to_owned());
    let tags = if task.tags.is_empty() {
        "None".to_owned()
    } else {
        task.tags.join(", ")
    };
    format!(
        "Task ID: {}\nTitle: {}\nDescription: {description}\nPriority: {}\nStatus: {}\nDue Date: {due}\nTags: {tags}",
        task.id, task.title, task.priority, task.status
    )
}

pub fn task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_owned();
    }
    let shown: Vec<String> = tasks.iter().take(MAX_LISTED_TASKS).map(task_block).collect();
    let mut out = format!("Found {} task(s):\n\n{}", tasks.len(), shown.join("\n\n"));
    if tasks.len() > MAX_LISTED_TASKS {
        out.push_str(&format!(
            "\n\n... and {} more task(s)",
            tasks.len() - MAX_LISTED_TASKS
        ));
    }
    out
}

pub fn search_results(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No tasks found matching '{query}'.");
    }
    let tasks: Vec<Task> = hits.iter().map(|h| h.task.clone()).collect();
    task_list(&tasks)
}

pub fn reminder_list(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "No reminders found.".to_owned();
    }
    let lines: Vec<String> = reminders
        .iter()
        .take(MAX_LISTED_REMINDERS)
        .map(|r| {
            format!(
                "- Reminder {} for task {} at {} (IST), {}",
                r.id,
                r.task_id,
                clock::format_ist(r.reminder_time),
                r.status
            )
        })
        .collect();
    format!("Found {} reminder(s):\n{}", reminders.len(), lines.join("\n"))
}
