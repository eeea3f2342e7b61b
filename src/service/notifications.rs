//! Read-side operations on notifications.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::Notification;
use crate::error::{AppError, Result};
use crate::store::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, NotificationQuery, TaskStore};

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn TaskStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Newest first, optionally filtered by read flag.
    pub async fn list(
        &self,
        is_read: Option<bool>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Notification>> {
        let query = NotificationQuery {
            is_read,
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        };
        Ok(self.store.list_notifications(&query).await?)
    }

    pub async fn unread_count(&self) -> Result<u64> {
        Ok(self.store.count_unread_notifications().await?)
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<Notification> {
        self.store
            .mark_notification_read(id)
            .await?
            .ok_or_else(AppError::notification_not_found)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.delete_notification(id).await? {
            Ok(())
        } else {
            Err(AppError::notification_not_found())
        }
    }
}
