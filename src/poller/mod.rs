//! Reminder and estimated-time poller.
//!
//! [`ReminderPoller::poll_once`] does a single pass:
//!
//! 1. Fire due reminders. Each reminder is claimed with a conditional
//!    status change before its notification is written, so two overlapping
//!    passes never deliver the same reminder twice.
//! 2. Emit one `estimated_time` notification per in-progress task whose
//!    estimate has elapsed, unless an unread one already exists. The store
//!    enforces that with a unique index, so a lost race surfaces as
//!    [`StoreError::Duplicate`].
//!
//! [`runner::spawn`] drives it on a fixed interval.

pub mod runner;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock;
use crate::domain::{NewNotification, NotificationCategory, Reminder, ReminderStatus, TaskStatus};
use crate::store::{MAX_PAGE_SIZE, StoreError, TaskQuery, TaskStore};

/// Reminders handled per pass; the rest wait for the next tick.
pub const MAX_REMINDERS_PER_POLL: usize = 100;

/// Estimated-time notifications fire this much before the exact deadline.
pub const ESTIMATE_GRACE: Duration = Duration::minutes(1);

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub reminders_sent: usize,
    pub reminders_failed: usize,
    /// Claimed by a concurrent pass before this one got to it, or left
    /// pending because the store could not be updated.
    pub reminders_skipped: usize,
    pub estimated_created: usize,
    pub estimated_duplicates: usize,
}

impl PollReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// One-shot poller over a [`TaskStore`].
#[derive(Clone)]
pub struct ReminderPoller {
    store: Arc<dyn TaskStore>,
}

impl ReminderPoller {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Run one pass at `now`.
    ///
    /// Errors reading the due list or the in-progress tasks abort the
    /// pass; per-record failures are counted and logged.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<PollReport, StoreError> {
        let mut report = PollReport::default();
        debug!(at = %clock::format_ist(now), "polling reminders");

        let due = self
            .store
            .due_reminders(now, MAX_REMINDERS_PER_POLL)
            .await?;
        for reminder in due {
            self.fire(&reminder, now, &mut report).await;
        }

        self.check_estimates(now, &mut report).await?;
        Ok(report)
    }

    async fn fire(&self, reminder: &Reminder, now: DateTime<Utc>, report: &mut PollReport) {
        let task = match self.store.get_task(reminder.task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(reminder_id = %reminder.id, task_id = %reminder.task_id, "reminder task missing");
                self.fail(reminder, report).await;
                return;
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "could not load reminder task");
                self.fail(reminder, report).await;
                return;
            }
        };

        match self.store.claim_reminder(reminder.id, ReminderStatus::Sent).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(reminder_id = %reminder.id, "reminder already claimed");
                report.reminders_skipped += 1;
                return;
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "could not claim reminder");
                self.fail(reminder, report).await;
                return;
            }
        }

        let notification = NewNotification::reminder(reminder, &task).into_notification(now);
        match self.store.insert_notification(&notification).await {
            Ok(_) => {
                info!(
                    reminder_id = %reminder.id,
                    task_id = %task.id,
                    channel = %reminder.notification_type,
                    "reminder sent"
                );
                report.reminders_sent += 1;
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "failed to write reminder notification");
                if let Err(e) = self
                    .store
                    .set_reminder_status(reminder.id, ReminderStatus::Failed)
                    .await
                {
                    warn!(reminder_id = %reminder.id, error = %e, "could not mark reminder failed");
                }
                report.reminders_failed += 1;
            }
        }
    }

    async fn fail(&self, reminder: &Reminder, report: &mut PollReport) {
        match self
            .store
            .claim_reminder(reminder.id, ReminderStatus::Failed)
            .await
        {
            Ok(true) => report.reminders_failed += 1,
            Ok(false) => report.reminders_skipped += 1,
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "could not mark reminder failed, left pending");
                report.reminders_skipped += 1;
            }
        }
    }

    async fn check_estimates(
        &self,
        now: DateTime<Utc>,
        report: &mut PollReport,
    ) -> Result<(), StoreError> {
        let mut offset = 0;
        loop {
            let mut query = TaskQuery::default()
                .with_status(TaskStatus::InProgress)
                .with_limit(MAX_PAGE_SIZE);
            query.offset = offset;
            let page = self.store.list_tasks(&query).await?;
            let page_len = page.len();

            for task in page {
                let Some(deadline) = task.estimated_completion() else {
                    continue;
                };
                if clock::to_ist(now) < clock::to_ist(deadline - ESTIMATE_GRACE) {
                    continue;
                }
                match self
                    .store
                    .has_unread_notification(task.id, NotificationCategory::EstimatedTime)
                    .await
                {
                    Ok(true) => {
                        report.estimated_duplicates += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "could not check estimated-time notifications");
                        continue;
                    }
                }
                let notification = NewNotification::estimated_time(&task).into_notification(now);
                match self.store.insert_notification(&notification).await {
                    Ok(_) => {
                        info!(task_id = %task.id, deadline = %clock::format_ist(deadline), "estimated time reached");
                        report.estimated_created += 1;
                    }
                    // A concurrent pass inserted it first.
                    Err(StoreError::Duplicate(_)) => report.estimated_duplicates += 1,
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "failed to write estimated-time notification");
                    }
                }
            }

            if page_len < MAX_PAGE_SIZE {
                return Ok(());
            }
            offset += page_len;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::domain::{NewReminder, NewTask, Notification, Task, TaskPatch};
    use crate::store::{NotificationQuery, SqliteStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use uuid::Uuid;

    /// SQLite store with switchable faults.
    #[derive(Default)]
    struct Faults {
        hide_tasks: bool,
        refuse_notifications: bool,
        refuse_send_claims: bool,
    }

    struct FaultyStore {
        inner: SqliteStore,
        faults: Faults,
    }

    impl FaultyStore {
        fn new(faults: Faults) -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteStore::open_in_memory().unwrap(),
                faults,
            })
        }
    }

    #[async_trait]
    impl TaskStore for FaultyStore {
        fn name(&self) -> &str {
            "faulty"
        }
        async fn insert_task(&self, task: &Task) -> Result<Task, StoreError> {
            self.inner.insert_task(task).await
        }
        async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
            if self.faults.hide_tasks {
                return Ok(None);
            }
            self.inner.get_task(id).await
        }
        async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks(query).await
        }
        async fn update_task(
            &self,
            id: Uuid,
            patch: &TaskPatch,
            now: DateTime<Utc>,
        ) -> Result<Option<Task>, StoreError> {
            self.inner.update_task(id, patch, now).await
        }
        async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_task(id).await
        }
        async fn insert_reminder(&self, reminder: &Reminder) -> Result<Reminder, StoreError> {
            self.inner.insert_reminder(reminder).await
        }
        async fn list_reminders(
            &self,
            task_id: Option<Uuid>,
        ) -> Result<Vec<Reminder>, StoreError> {
            self.inner.list_reminders(task_id).await
        }
        async fn due_reminders(
            &self,
            now: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<Reminder>, StoreError> {
            self.inner.due_reminders(now, limit).await
        }
        async fn claim_reminder(
            &self,
            id: Uuid,
            status: ReminderStatus,
        ) -> Result<bool, StoreError> {
            if self.faults.refuse_send_claims && status == ReminderStatus::Sent {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.claim_reminder(id, status).await
        }
        async fn set_reminder_status(
            &self,
            id: Uuid,
            status: ReminderStatus,
        ) -> Result<(), StoreError> {
            self.inner.set_reminder_status(id, status).await
        }
        async fn insert_notification(
            &self,
            notification: &Notification,
        ) -> Result<Notification, StoreError> {
            if self.faults.refuse_notifications {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.insert_notification(notification).await
        }
        async fn list_notifications(
            &self,
            query: &NotificationQuery,
        ) -> Result<Vec<Notification>, StoreError> {
            self.inner.list_notifications(query).await
        }
        async fn count_unread_notifications(&self) -> Result<u64, StoreError> {
            self.inner.count_unread_notifications().await
        }
        async fn has_unread_notification(
            &self,
            task_id: Uuid,
            category: NotificationCategory,
        ) -> Result<bool, StoreError> {
            self.inner.has_unread_notification(task_id, category).await
        }
        async fn mark_notification_read(
            &self,
            id: Uuid,
        ) -> Result<Option<Notification>, StoreError> {
            self.inner.mark_notification_read(id).await
        }
        async fn delete_notification(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_notification(id).await
        }
    }

    /// One task with one reminder due five minutes before noon.
    async fn due_fixture(faults: Faults) -> (Arc<dyn TaskStore>, Uuid) {
        let store: Arc<dyn TaskStore> = FaultyStore::new(faults);
        let t = task(&store, "Call the bank", noon()).await;
        reminder(&store, t.id, noon() - Duration::minutes(5)).await;
        (store, t.id)
    }

    async fn assert_failed_without_notification(store: &Arc<dyn TaskStore>, task_id: Uuid) {
        let reminders = store.list_reminders(Some(task_id)).await.unwrap();
        assert_eq!(reminders[0].status, ReminderStatus::Failed);
        let notes = store
            .list_notifications(&NotificationQuery::default())
            .await
            .unwrap();
        assert!(notes.is_empty());
    }

    fn store() -> Arc<dyn TaskStore> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    async fn task(store: &Arc<dyn TaskStore>, title: &str, at: DateTime<Utc>) -> Task {
        let t = NewTask::new(title).validate().unwrap().into_task(at);
        store.insert_task(&t).await.unwrap()
    }

    async fn reminder(store: &Arc<dyn TaskStore>, task_id: Uuid, at: DateTime<Utc>) -> Reminder {
        let r = NewReminder::in_app(task_id, at).into_reminder(at - Duration::hours(1));
        store.insert_reminder(&r).await.unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn due_reminder_is_sent_once() {
        let store = store();
        let t = task(&store, "Write tests", noon()).await;
        reminder(&store, t.id, noon() - Duration::minutes(5)).await;
        let poller = ReminderPoller::new(Arc::clone(&store));

        let first = poller.poll_once(noon()).await.unwrap();
        assert_eq!(first.reminders_sent, 1);

        let second = poller.poll_once(noon() + Duration::minutes(5)).await.unwrap();
        assert_eq!(second.reminders_sent, 0);

        let notes = store
            .list_notifications(&NotificationQuery::default())
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Reminder: Write tests");
        assert_eq!(notes[0].message, "Time to work on: Write tests");
        assert_eq!(notes[0].notification_type, "in_app");
        let reminders = store.list_reminders(Some(t.id)).await.unwrap();
        assert_eq!(reminders[0].status, ReminderStatus::Sent);
    }

    #[tokio::test]
    async fn future_reminder_is_left_pending() {
        let store = store();
        let t = task(&store, "Later", noon()).await;
        reminder(&store, t.id, noon() + Duration::minutes(10)).await;
        let report = ReminderPoller::new(Arc::clone(&store))
            .poll_once(noon())
            .await
            .unwrap();
        assert!(report.is_idle());
        let reminders = store.list_reminders(Some(t.id)).await.unwrap();
        assert_eq!(reminders[0].status, ReminderStatus::Pending);
    }

    #[tokio::test]
    async fn overlapping_polls_deliver_at_most_once() {
        let store = store();
        let t = task(&store, "Race", noon()).await;
        for minutes in 1..=5 {
            reminder(&store, t.id, noon() - Duration::minutes(minutes)).await;
        }
        let a = ReminderPoller::new(Arc::clone(&store));
        let b = ReminderPoller::new(Arc::clone(&store));
        let (ra, rb) = tokio::join!(a.poll_once(noon()), b.poll_once(noon()));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_eq!(ra.reminders_sent + rb.reminders_sent, 5);

        let notes = store
            .list_notifications(&NotificationQuery::default())
            .await
            .unwrap();
        assert_eq!(notes.len(), 5);
    }

    #[tokio::test]
    async fn estimated_time_notification_is_deduplicated() {
        let store = store();
        let start = noon() - Duration::hours(3);
        let t = task(&store, "Refactor", start).await;
        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            estimated_hours: Some(2.0),
            ..TaskPatch::default()
        };
        store.update_task(t.id, &patch, start).await.unwrap();
        let poller = ReminderPoller::new(Arc::clone(&store));

        let first = poller.poll_once(noon()).await.unwrap();
        assert_eq!(first.estimated_created, 1);
        let second = poller.poll_once(noon()).await.unwrap();
        assert_eq!(second.estimated_created, 0);
        assert_eq!(second.estimated_duplicates, 1);

        let notes = store
            .list_notifications(&NotificationQuery::default())
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Estimated Time Complete: Refactor");
        assert_eq!(
            notes[0].message,
            "The estimated time (2 hours) for 'Refactor' has been reached."
        );

        // Once read, a later pass may notify again.
        store.mark_notification_read(notes[0].id).await.unwrap();
        let third = poller.poll_once(noon()).await.unwrap();
        assert_eq!(third.estimated_created, 1);
    }

    #[tokio::test]
    async fn estimate_fires_within_grace_window() {
        let store = store();
        let start = noon() - Duration::minutes(60) + Duration::seconds(30);
        let t = task(&store, "Almost", start).await;
        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            estimated_hours: Some(1.0),
            ..TaskPatch::default()
        };
        store.update_task(t.id, &patch, start).await.unwrap();

        let report = ReminderPoller::new(Arc::clone(&store))
            .poll_once(noon())
            .await
            .unwrap();
        assert_eq!(report.estimated_created, 1);
    }

    #[tokio::test]
    async fn estimate_not_reached_creates_nothing() {
        let store = store();
        let t = task(&store, "Long haul", noon()).await;
        let patch = TaskPatch {
            status: Some(TaskStatus::InProgress),
            estimated_hours: Some(4.0),
            ..TaskPatch::default()
        };
        store.update_task(t.id, &patch, noon()).await.unwrap();

        let report = ReminderPoller::new(Arc::clone(&store))
            .poll_once(noon() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(report.estimated_created, 0);
    }

    #[tokio::test]
    async fn unwritable_notification_marks_reminder_failed() {
        let (store, task_id) = due_fixture(Faults {
            refuse_notifications: true,
            ..Faults::default()
        })
        .await;
        let poller = ReminderPoller::new(Arc::clone(&store));

        let report = poller.poll_once(noon()).await.unwrap();
        assert_eq!(report.reminders_failed, 1);
        assert_eq!(report.reminders_sent, 0);
        assert_failed_without_notification(&store, task_id).await;

        // Failed reminders are not retried.
        let again = poller.poll_once(noon() + Duration::minutes(5)).await.unwrap();
        assert!(again.is_idle());
    }

    #[tokio::test]
    async fn missing_task_marks_reminder_failed() {
        let (store, task_id) = due_fixture(Faults {
            hide_tasks: true,
            ..Faults::default()
        })
        .await;
        let report = ReminderPoller::new(Arc::clone(&store))
            .poll_once(noon())
            .await
            .unwrap();
        assert_eq!(report.reminders_failed, 1);
        assert_failed_without_notification(&store, task_id).await;
    }

    #[tokio::test]
    async fn claim_error_marks_reminder_failed() {
        let (store, task_id) = due_fixture(Faults {
            refuse_send_claims: true,
            ..Faults::default()
        })
        .await;
        let report = ReminderPoller::new(Arc::clone(&store))
            .poll_once(noon())
            .await
            .unwrap();
        assert_eq!(report.reminders_failed, 1);
        assert_eq!(report.reminders_skipped, 0);
        assert_failed_without_notification(&store, task_id).await;
    }
}
