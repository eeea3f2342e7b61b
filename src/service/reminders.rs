//! Reminder creation and listing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::clock;
use crate::domain::{NewReminder, Reminder};
use crate::domain::reminder::CHANNEL_IN_APP;
use crate::error::{AppError, Result};
use crate::store::TaskStore;

/// Creates and lists reminders. Delivery is the poller's job.
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn TaskStore>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Schedule a reminder for `task_id`.
    ///
    /// `when` is a phrase understood by [`clock::parse_reminder_time`];
    /// `None` means one hour from `now`. The channel defaults to `in_app`.
    pub async fn create(
        &self,
        task_id: Uuid,
        when: Option<&str>,
        channel: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Reminder> {
        if self.store.get_task(task_id).await?.is_none() {
            return Err(AppError::task_not_found());
        }
        let at = clock::parse_reminder_time(when, now);
        let mut new_reminder = NewReminder::in_app(task_id, at);
        if let Some(channel) = channel.map(str::trim).filter(|c| !c.is_empty()) {
            new_reminder.notification_type = channel.to_owned();
        }
        let reminder = self
            .store
            .insert_reminder(&new_reminder.into_reminder(now))
            .await?;
        info!(
            reminder_id = %reminder.id,
            task_id = %task_id,
            at = %clock::format_ist(reminder.reminder_time),
            "scheduled reminder"
        );
        Ok(reminder)
    }

    /// Reminders ordered by fire time, optionally for one task.
    pub async fn list(&self, task_id: Option<Uuid>) -> Result<Vec<Reminder>> {
        Ok(self.store.list_reminders(task_id).await?)
    }
}

/// User-facing confirmation for a new reminder.
pub fn confirmation_message(reminder: &Reminder) -> String {
    let channel = if reminder.notification_type == CHANNEL_IN_APP {
        String::new()
    } else {
        format!(" via {}", reminder.notification_type)
    };
    format!(
        "Reminder created! You'll be reminded at {} (IST){channel}",
        clock::format_ist(reminder.reminder_time)
    )
}
