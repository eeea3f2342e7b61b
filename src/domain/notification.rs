//! Notification records written by the poller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reminder::CHANNEL_IN_APP;
use super::{Reminder, Task};

/// What produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// A reminder fired.
    Reminder,
    /// An in-progress task ran past its estimated duration.
    EstimatedTime,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::EstimatedTime => "estimated_time",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reminder" => Some(Self::Reminder),
            "estimated_time" => Some(Self::EstimatedTime),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub reminder_id: Option<Uuid>,
    pub category: NotificationCategory,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub task_id: Option<Uuid>,
    pub reminder_id: Option<Uuid>,
    pub category: NotificationCategory,
    pub notification_type: String,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    /// The notification emitted when `reminder` fires for `task`.
    pub fn reminder(reminder: &Reminder, task: &Task) -> Self {
        Self {
            task_id: Some(task.id),
            reminder_id: Some(reminder.id),
            category: NotificationCategory::Reminder,
            notification_type: reminder.notification_type.clone(),
            title: format!("Reminder: {}", task.title),
            message: format!("Time to work on: {}", task.title),
        }
    }

    /// The notification emitted once `task` has been in progress for its
    /// whole estimated duration.
    pub fn estimated_time(task: &Task) -> Self {
        let hours = task.estimated_hours.unwrap_or(0.0);
        Self {
            task_id: Some(task.id),
            reminder_id: None,
            category: NotificationCategory::EstimatedTime,
            notification_type: CHANNEL_IN_APP.to_owned(),
            title: format!("Estimated Time Complete: {}", task.title),
            message: format!(
                "The estimated time ({}) for '{}' has been reached.",
                format_hours(hours),
                task.title
            ),
        }
    }

    pub fn into_notification(self, now: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            task_id: self.task_id,
            reminder_id: self.reminder_id,
            category: self.category,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            is_read: false,
            created_at: now,
        }
    }
}

/// `1 hour`, `2 hours`, `1.5 hours`.
fn format_hours(hours: f64) -> String {
    let amount = if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{hours}")
    };
    let unit = if hours == 1.0 { "hour" } else { "hours" };
    format!("{amount} {unit}")
}
