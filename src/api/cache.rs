//! Short-lived cache for task list responses.
//!
//! Entries are keyed by the normalized list query and expire after
//! [`TTL`]. Any task write clears the whole cache, so a stale read is at
//! most one TTL old and only when the write happened in another process.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::domain::{Task, TaskPriority, TaskStatus};
use crate::store::TaskQuery;

pub const TTL: Duration = Duration::from_secs(5);

/// Maximum number of cached list pages.
const MAX_ENTRIES: u64 = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    limit: usize,
    offset: usize,
}

impl From<&TaskQuery> for CacheKey {
    fn from(q: &TaskQuery) -> Self {
        Self {
            status: q.status,
            priority: q.priority,
            limit: q.limit,
            offset: q.offset,
        }
    }
}

#[derive(Clone)]
pub struct TaskListCache {
    inner: Cache<CacheKey, Arc<Vec<Task>>>,
}

impl Default for TaskListCache {
    fn default() -> Self {
        Self::with_ttl(TTL)
    }
}

impl std::fmt::Debug for TaskListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskListCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl TaskListCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Task>>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, tasks: Arc<Vec<Task>>) {
        self.inner.insert(key, tasks).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn hit_then_invalidate() {
        let cache = TaskListCache::default();
        let key = CacheKey::from(&TaskQuery::default());
        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), Arc::new(Vec::new())).await;
        assert!(cache.get(&key).await.is_some());

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = TaskListCache::with_ttl(Duration::from_millis(30));
        let key = CacheKey::from(&TaskQuery::default());
        cache.insert(key.clone(), Arc::new(Vec::new())).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn keys_differ_by_filter() {
        let all = CacheKey::from(&TaskQuery::default());
        let pending = CacheKey::from(&TaskQuery::default().with_status(TaskStatus::Pending));
        assert_ne!(all, pending);
    }
}
