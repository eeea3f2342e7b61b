//! Core records: tasks, reminders and notifications.
//!
//! These types are shared by the store adapters, the services, the HTTP
//! layer and the agent tools. Input types (`NewTask`, `TaskPatch`,
//! `NewReminder`) carry their own validation so every entry point enforces
//! the same field limits.

pub mod notification;
pub mod reminder;
pub mod task;

pub use notification::{NewNotification, Notification, NotificationCategory};
pub use reminder::{NewReminder, Reminder, ReminderStatus};
pub use task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

/// Maximum title length after trimming.
pub const MAX_TITLE_CHARS: usize = 255;

/// Maximum description length.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Upper bound for `estimated_hours`.
pub const MAX_ESTIMATED_HOURS: f64 = 24.0;

/// Field-level validation failures.
///
/// Always surfaced to callers as client errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title must be at most {MAX_TITLE_CHARS} characters")]
    TitleTooLong,

    #[error("description must be at most {MAX_DESCRIPTION_CHARS} characters")]
    DescriptionTooLong,

    #[error("estimated_hours must be between 0 and 24, got {0}")]
    EstimatedHoursOutOfRange(f64),

    #[error("invalid priority '{0}' (expected low, medium, high or urgent)")]
    InvalidPriority(String),

    #[error("invalid status '{0}' (expected pending, in_progress, completed or archived)")]
    InvalidStatus(String),

    #[error("Invalid {kind} ID format")]
    InvalidId { kind: &'static str, value: String },

    #[error("could not understand date/time '{0}'")]
    InvalidDateTime(String),

    #[error("{0}")]
    Invalid(String),
}

/// Parse a record ID: a version-4 UUID in canonical hyphenated form.
///
/// The simple, braced and URN forms are rejected, as is surrounding
/// whitespace. `kind` names the record in the error message (`"task"`
/// gives `Invalid task ID format`).
pub fn parse_id(kind: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    let invalid = || ValidationError::InvalidId {
        kind,
        value: raw.to_owned(),
    };
    if raw.len() != HYPHENATED_LEN {
        return Err(invalid());
    }
    let id = Uuid::try_parse(raw).map_err(|_| invalid())?;
    if id.get_version_num() != 4 {
        return Err(invalid());
    }
    Ok(id)
}

const HYPHENATED_LEN: usize = 36;

static UUID_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").ok()
});

/// Find the first UUID inside free text such as `"[task_id: 46d6...]"`.
pub fn extract_id(kind: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    if let Ok(id) = parse_id(kind, raw) {
        return Ok(id);
    }
    UUID_PATTERN
        .as_ref()
        .and_then(|re| re.find(raw))
        .and_then(|m| parse_id(kind, m.as_str()).ok())
        .ok_or_else(|| ValidationError::InvalidId {
            kind,
            value: raw.to_owned(),
        })
}

/// All UUIDs mentioned in `text`, in order of appearance.
pub fn find_ids(text: &str) -> Vec<Uuid> {
    let Some(re) = UUID_PATTERN.as_ref() else {
        return Vec::new();
    };
    re.find_iter(text)
        .filter_map(|m| Uuid::parse_str(m.as_str()).ok())
        .collect()
}
