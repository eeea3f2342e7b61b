//! Persistence for tasks, reminders and notifications.
//!
//! [`TaskStore`] is the seam between the services and the relational
//! backend. Two adapters are provided:
//!
//! - [`SqliteStore`]: embedded SQLite file (default).
//! - [`PostgrestStore`]: a managed Postgres behind a PostgREST API.

pub mod error;
pub mod postgrest;
pub mod schema;
pub mod sqlite;

pub use error::StoreError;
pub use postgrest::{PostgrestConfig, PostgrestStore};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Notification, NotificationCategory, Reminder, ReminderStatus, Task, TaskPatch, TaskPriority,
    TaskStatus,
};

/// Default page size for task listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Filter and page for [`TaskStore::list_tasks`].
///
/// Results are always ordered by `created_at` descending.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl TaskQuery {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Filter and page for [`TaskStore::list_notifications`].
///
/// Results are ordered by `created_at` descending.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationQuery {
    pub is_read: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            is_read: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Relational backend for all records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    // ── Tasks ─────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> Result<Task, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    /// Merge `patch` into the stored task, setting `updated_at = now`.
    ///
    /// Returns `None` when the task does not exist.
    async fn update_task(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError>;

    /// Delete a task and its reminders. Returns `false` when nothing matched.
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    // ── Reminders ─────────────────────────────────────────────

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<Reminder, StoreError>;

    /// Reminders ordered by fire time, optionally for one task.
    async fn list_reminders(&self, task_id: Option<Uuid>) -> Result<Vec<Reminder>, StoreError>;

    /// Pending reminders with `reminder_time <= now`, oldest first.
    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StoreError>;

    /// Move a reminder out of `pending` into `status`.
    ///
    /// Conditional on the row still being `pending`; returns `false` when
    /// another poll already moved it.
    async fn claim_reminder(&self, id: Uuid, status: ReminderStatus) -> Result<bool, StoreError>;

    /// Unconditionally set a reminder's status.
    async fn set_reminder_status(&self, id: Uuid, status: ReminderStatus)
    -> Result<(), StoreError>;

    // ── Notifications ─────────────────────────────────────────

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Notification, StoreError>;

    async fn list_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn count_unread_notifications(&self) -> Result<u64, StoreError>;

    /// `true` if an unread notification of `category` exists for `task_id`.
    async fn has_unread_notification(
        &self,
        task_id: Uuid,
        category: NotificationCategory,
    ) -> Result<bool, StoreError>;

    /// Set `is_read = true`. Returns `None` when the notification does not exist.
    async fn mark_notification_read(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    async fn delete_notification(&self, id: Uuid) -> Result<bool, StoreError>;
}
