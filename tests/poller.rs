//! Poller tests against an on-disk SQLite database.
//!
//! Two store handles on the same file stand in for two server processes
//! polling the same database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use taskpilot::domain::{NewReminder, NewTask, ReminderStatus, TaskPatch, TaskStatus};
use taskpilot::poller::ReminderPoller;
use taskpilot::store::{NotificationQuery, SqliteStore, TaskStore};

fn open_pair(dir: &tempfile::TempDir) -> (Arc<dyn TaskStore>, Arc<dyn TaskStore>) {
    let path = dir.path().join("tasks.db");
    let a: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let b: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
    (a, b)
}

#[tokio::test]
async fn two_processes_deliver_each_reminder_once() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = open_pair(&dir);
    let now = Utc::now();

    let task = NewTask::new("Water plants").validate().unwrap().into_task(now);
    a.insert_task(&task).await.unwrap();
    for minutes in 1..=5 {
        let r = NewReminder::in_app(task.id, now - Duration::minutes(minutes)).into_reminder(now);
        a.insert_reminder(&r).await.unwrap();
    }

    let poller_a = ReminderPoller::new(Arc::clone(&a));
    let poller_b = ReminderPoller::new(Arc::clone(&b));
    let (ra, rb) = tokio::join!(poller_a.poll_once(now), poller_b.poll_once(now));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_eq!(ra.reminders_sent + rb.reminders_sent, 5);

    let notes = a
        .list_notifications(&NotificationQuery::default())
        .await
        .unwrap();
    assert_eq!(notes.len(), 5);
    let reminders = b.list_reminders(Some(task.id)).await.unwrap();
    assert!(reminders.iter().all(|r| r.status == ReminderStatus::Sent));
}

#[tokio::test]
async fn deleting_a_task_drops_its_pending_reminders() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = open_pair(&dir);
    let now = Utc::now();

    let task = NewTask::new("Temporary").validate().unwrap().into_task(now);
    store.insert_task(&task).await.unwrap();
    let reminder = NewReminder::in_app(task.id, now - Duration::minutes(1)).into_reminder(now);
    store.insert_reminder(&reminder).await.unwrap();

    // Reminders cascade with their task.
    store.delete_task(task.id).await.unwrap();
    let report = ReminderPoller::new(Arc::clone(&store))
        .poll_once(now)
        .await
        .unwrap();
    assert_eq!(report.reminders_sent, 0);
    assert!(store.due_reminders(now, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn estimate_notification_survives_reopen_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let started = Utc::now() - Duration::hours(3);

    {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let task = NewTask::new("Write tests")
            .with_estimated_hours(2.0)
            .validate()
            .unwrap()
            .into_task(started);
        store.insert_task(&task).await.unwrap();
        store
            .update_task(
                task.id,
                &TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..TaskPatch::default()
                },
                started,
            )
            .await
            .unwrap();
        let report = ReminderPoller::new(store).poll_once(Utc::now()).await.unwrap();
        assert_eq!(report.estimated_created, 1);
    }

    let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let report = ReminderPoller::new(Arc::clone(&store))
        .poll_once(Utc::now())
        .await
        .unwrap();
    assert_eq!(report.estimated_created, 0);
    assert_eq!(report.estimated_duplicates, 1);
    assert_eq!(store.count_unread_notifications().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_create_one_estimate_notification_per_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let stores: Vec<Arc<dyn TaskStore>> = (0..4)
        .map(|_| Arc::new(SqliteStore::open(&path).unwrap()) as Arc<dyn TaskStore>)
        .collect();
    let started = Utc::now() - Duration::hours(3);

    for i in 0..30 {
        let task = NewTask::new(format!("Overrun {i}"))
            .with_estimated_hours(1.0)
            .validate()
            .unwrap()
            .into_task(started);
        stores[0].insert_task(&task).await.unwrap();
        stores[0]
            .update_task(
                task.id,
                &TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..TaskPatch::default()
                },
                started,
            )
            .await
            .unwrap();
    }

    let now = Utc::now();
    let handles: Vec<_> = stores
        .iter()
        .map(|store| {
            let poller = ReminderPoller::new(Arc::clone(store));
            tokio::spawn(async move { poller.poll_once(now).await })
        })
        .collect();
    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        created += report.estimated_created;
        duplicates += report.estimated_duplicates;
    }

    assert_eq!(created, 30);
    assert_eq!(duplicates, 90);
    assert_eq!(stores[1].count_unread_notifications().await.unwrap(), 30);
}
