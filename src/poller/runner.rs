//! Background loop for the poller.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::ReminderPoller;

/// Spawn the poll loop. The first pass runs immediately.
///
/// The loop exits when `cancel` fires. Ticks missed while a slow pass is
/// running are skipped rather than bunched up.
pub fn spawn(
    poller: ReminderPoller,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = every.as_secs(), "reminder poller started");
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reminder poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match poller.poll_once(Utc::now()).await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => info!(?report, "poll finished"),
                        Err(e) => error!(error = %e, "poll failed"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::domain::{NewReminder, NewTask};
    use crate::store::{NotificationQuery, SqliteStore, TaskStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn runner_fires_due_reminders_and_stops_on_cancel() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let now = Utc::now();
        let task = NewTask::new("Stretch").validate().unwrap().into_task(now);
        store.insert_task(&task).await.unwrap();
        let reminder = NewReminder::in_app(task.id, now - chrono::Duration::minutes(1))
            .into_reminder(now);
        store.insert_reminder(&reminder).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn(
            ReminderPoller::new(Arc::clone(&store)),
            Duration::from_millis(20),
            cancel.clone(),
        );

        let mut delivered = 0;
        for _ in 0..50 {
            delivered = store.count_unread_notifications().await.unwrap();
            if delivered > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(delivered, 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runner should stop")
            .unwrap();

        let notes = store
            .list_notifications(&NotificationQuery::default())
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
    }
}
