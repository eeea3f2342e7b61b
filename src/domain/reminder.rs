//! Reminder records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Delivery channel for reminders created through the agent or the API.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Default delivery channel when none is given.
pub const CHANNEL_EMAIL: &str = "email";

/// Reminder delivery status.
///
/// Moves from `Pending` to either `Sent` or `Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::Invalid(format!(
                "invalid reminder status '{other}'"
            ))),
        }
    }
}

/// A stored reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub reminder_time: DateTime<Utc>,
    pub notification_type: String,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// `true` when the reminder should fire at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.reminder_time <= now
    }
}

/// Payload for creating a reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReminder {
    pub task_id: Uuid,
    pub reminder_time: DateTime<Utc>,
    #[serde(default = "default_channel")]
    pub notification_type: String,
}

fn default_channel() -> String {
    CHANNEL_EMAIL.to_owned()
}

impl NewReminder {
    /// An in-app reminder for `task_id` at `at`.
    pub fn in_app(task_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            reminder_time: at,
            notification_type: CHANNEL_IN_APP.to_owned(),
        }
    }

    pub fn into_reminder(self, now: DateTime<Utc>) -> Reminder {
        Reminder {
            id: Uuid::new_v4(),
            task_id: self.task_id,
            reminder_time: self.reminder_time,
            notification_type: self.notification_type,
            status: ReminderStatus::Pending,
            created_at: now,
        }
    }
}
