//! SQLite-backed task store.
//!
//! A single database file holds tasks, reminders and notifications.
//! Thread-safe via an internal `Mutex<Connection>`; the lock is never held
//! across an `.await`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::schema::{apply_schema, read_schema_version};
use super::{NotificationQuery, StoreError, TaskQuery, TaskStore};
use crate::domain::{
    Notification, NotificationCategory, Reminder, ReminderStatus, Task, TaskPatch,
};

const TASK_COLUMNS: &str = "id, title, description, priority, status, due_date, estimated_hours, \
                            tags, assigned_to, created_by, created_at, updated_at";

const REMINDER_COLUMNS: &str = "id, task_id, reminder_time, notification_type, status, created_at";

const NOTIFICATION_COLUMNS: &str = "id, task_id, reminder_id, category, notification_type, \
                                    title, message, is_read, created_at";

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// SQLite task store.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, applying the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        tracing::info!(path = %path.display(), "opened sqlite task store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(conn),
        })
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

// ── Row mapping ───────────────────────────────────────────────

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let tags_json: String = row.get(7)?;
    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| conversion_error(7, e))?;
    Ok(Task {
        id: get_uuid(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        priority: get_parsed(row, 3)?,
        status: get_parsed(row, 4)?,
        due_date: get_opt_ts(row, 5)?,
        estimated_hours: row.get(6)?,
        tags,
        assigned_to: row.get(8)?,
        created_by: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
    })
}

fn row_to_reminder(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: get_uuid(row, 0)?,
        task_id: get_uuid(row, 1)?,
        reminder_time: get_ts(row, 2)?,
        notification_type: row.get(3)?,
        status: get_parsed(row, 4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let category_raw: String = row.get(3)?;
    let category = NotificationCategory::parse(&category_raw).ok_or_else(|| {
        conversion_error(
            3,
            StoreError::Decode(format!("unknown notification category '{category_raw}'")),
        )
    })?;
    Ok(Notification {
        id: get_uuid(row, 0)?,
        task_id: get_opt_uuid(row, 1)?,
        reminder_id: get_opt_uuid(row, 2)?,
        category,
        notification_type: row.get(4)?,
        title: row.get(5)?,
        message: row.get(6)?,
        is_read: row.get(7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn select_task(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id.to_string()],
        row_to_task,
    )
    .optional()
}

fn select_reminder(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Reminder>> {
    conn.query_row(
        &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
        params![id.to_string()],
        row_to_reminder,
    )
    .optional()
}

fn select_notification(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Notification>> {
    conn.query_row(
        &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
        params![id.to_string()],
        row_to_notification,
    )
    .optional()
}

fn write_task(conn: &Connection, task: &Task, replace: bool) -> Result<(), StoreError> {
    let verb = if replace {
        "INSERT OR REPLACE"
    } else {
        "INSERT"
    };
    let tags = serde_json::to_string(&task.tags)?;
    conn.execute(
        &format!(
            "{verb} INTO tasks ({TASK_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            task.id.to_string(),
            task.title,
            task.description,
            task.priority.as_str(),
            task.status.as_str(),
            task.due_date.as_ref().map(ts),
            task.estimated_hours,
            tags,
            task.assigned_to,
            task.created_by,
            ts(&task.created_at),
            ts(&task.updated_at),
        ],
    )?;
    Ok(())
}

fn missing_after_write(kind: &str, id: Uuid) -> StoreError {
    StoreError::Backend(format!("{kind} {id} was written but could not be read back"))
}

// ── TaskStore ─────────────────────────────────────────────────

#[async_trait]
impl TaskStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, StoreError> {
        let conn = self.lock()?;
        write_task(&conn, task, false)?;
        select_task(&conn, task.id)?.ok_or_else(|| missing_after_write("task", task.id))
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        Ok(select_task(&conn, id)?)
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR priority = ?2) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt.query_map(
            params![
                query.status.map(|s| s.as_str()),
                query.priority.map(|p| p.as_str()),
                query.limit as i64,
                query.offset as i64,
            ],
            row_to_task,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        let Some(mut task) = select_task(&conn, id)? else {
            return Ok(None);
        };
        patch.apply_to(&mut task, now);
        conn.execute(
            "UPDATE tasks SET title = ?2, description = ?3, priority = ?4, status = ?5, \
             due_date = ?6, estimated_hours = ?7, tags = ?8, assigned_to = ?9, updated_at = ?10 \
             WHERE id = ?1",
            params![
                id.to_string(),
                task.title,
                task.description,
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date.as_ref().map(ts),
                task.estimated_hours,
                serde_json::to_string(&task.tags)?,
                task.assigned_to,
                ts(&task.updated_at),
            ],
        )?;
        Ok(select_task(&conn, id)?)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<Reminder, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO reminders ({REMINDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                reminder.id.to_string(),
                reminder.task_id.to_string(),
                ts(&reminder.reminder_time),
                reminder.notification_type,
                reminder.status.as_str(),
                ts(&reminder.created_at),
            ],
        )?;
        select_reminder(&conn, reminder.id)?.ok_or_else(|| missing_after_write("reminder", reminder.id))
    }

    async fn list_reminders(&self, task_id: Option<Uuid>) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE (?1 IS NULL OR task_id = ?1) ORDER BY reminder_time ASC"
        ))?;
        let rows = stmt.query_map(params![task_id.map(|id| id.to_string())], row_to_reminder)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE status = 'pending' AND reminder_time <= ?1 \
             ORDER BY reminder_time ASC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![ts(&now), limit as i64], row_to_reminder)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn claim_reminder(&self, id: Uuid, status: ReminderStatus) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE reminders SET status = ?2 WHERE id = ?1 AND status = 'pending'",
            params![id.to_string(), status.as_str()],
        )?;
        Ok(changed == 1)
    }

    async fn set_reminder_status(
        &self,
        id: Uuid,
        status: ReminderStatus,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE reminders SET status = ?2 WHERE id = ?1",
            params![id.to_string(), status.as_str()],
        )?;
        Ok(())
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Notification, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                notification.id.to_string(),
                notification.task_id.map(|id| id.to_string()),
                notification.reminder_id.map(|id| id.to_string()),
                notification.category.as_str(),
                notification.notification_type,
                notification.title,
                notification.message,
                notification.is_read,
                ts(&notification.created_at),
            ],
        )?;
        select_notification(&conn, notification.id)?
            .ok_or_else(|| missing_after_write("notification", notification.id))
    }

    async fn list_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE (?1 IS NULL OR is_read = ?1) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![query.is_read, query.limit as i64, query.offset as i64],
            row_to_notification,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn count_unread_notifications(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE is_read = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    async fn has_unread_notification(
        &self,
        task_id: Uuid,
        category: NotificationCategory,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notifications \
             WHERE task_id = ?1 AND category = ?2 AND is_read = 0)",
            params![task_id.to_string(), category.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn mark_notification_read(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(select_notification(&conn, id)?)
    }

    async fn delete_notification(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::domain::{NewNotification, NewReminder, NewTask, TaskPriority, TaskStatus};
    use chrono::Duration;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open store")
    }

    fn task(title: &str) -> Task {
        NewTask::new(title).validate().unwrap().into_task(Utc::now())
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let s = store();
        let mut t = task("Draft report");
        t.tags = vec!["work".into(), "q1".into()];
        t.due_date = Some(Utc::now() + Duration::days(1));
        let stored = s.insert_task(&t).await.unwrap();
        let fetched = s.get_task(t.id).await.unwrap().unwrap();
        assert_eq!(stored, fetched);
        assert_eq!(fetched.tags, vec!["work", "q1"]);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        assert!(store().get_task(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_filters() {
        let s = store();
        let base = Utc::now();
        for (i, prio) in [TaskPriority::Low, TaskPriority::High, TaskPriority::High]
            .into_iter()
            .enumerate()
        {
            let mut t = task(&format!("t{i}"));
            t.priority = prio;
            t.created_at = base + Duration::seconds(i as i64);
            s.insert_task(&t).await.unwrap();
        }

        let all = s.list_tasks(&TaskQuery::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t2", "t1", "t0"]);

        let high = s
            .list_tasks(&TaskQuery::default().with_priority(TaskPriority::High))
            .await
            .unwrap();
        assert_eq!(high.len(), 2);

        let page = s
            .list_tasks(&TaskQuery {
                limit: 1,
                offset: 1,
                ..TaskQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page[0].title, "t1");
    }

    #[tokio::test]
    async fn update_merges_and_bumps_timestamp() {
        let s = store();
        let t = s.insert_task(&task("a")).await.unwrap();
        let later = t.updated_at + Duration::minutes(1);
        let updated = s
            .update_task(t.id, &TaskPatch::status(TaskStatus::InProgress), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(updated.title, "a");
        assert!(updated.updated_at > t.updated_at);
        assert!(
            s.update_task(Uuid::new_v4(), &TaskPatch::default(), later)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_cascades_to_reminders() {
        let s = store();
        let t = s.insert_task(&task("a")).await.unwrap();
        let r = NewReminder::in_app(t.id, Utc::now()).into_reminder(Utc::now());
        s.insert_reminder(&r).await.unwrap();

        assert!(s.delete_task(t.id).await.unwrap());
        assert!(s.list_reminders(None).await.unwrap().is_empty());
        assert!(!s.delete_task(t.id).await.unwrap());
    }

    #[tokio::test]
    async fn reminder_requires_existing_task() {
        let s = store();
        let r = NewReminder::in_app(Uuid::new_v4(), Utc::now()).into_reminder(Utc::now());
        let err = s.insert_reminder(&r).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "{err}");
    }

    #[tokio::test]
    async fn due_reminders_and_claim() {
        let s = store();
        let t = s.insert_task(&task("a")).await.unwrap();
        let now = Utc::now();
        let past = NewReminder::in_app(t.id, now - Duration::minutes(5)).into_reminder(now);
        let future = NewReminder::in_app(t.id, now + Duration::minutes(5)).into_reminder(now);
        s.insert_reminder(&past).await.unwrap();
        s.insert_reminder(&future).await.unwrap();

        let due = s.due_reminders(now, 100).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);

        assert!(s.claim_reminder(past.id, ReminderStatus::Sent).await.unwrap());
        assert!(!s.claim_reminder(past.id, ReminderStatus::Sent).await.unwrap());
        assert!(s.due_reminders(now, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifications_unread_tracking() {
        let s = store();
        let t = s.insert_task(&task("a")).await.unwrap();
        let n = NewNotification::estimated_time(&t).into_notification(Utc::now());
        s.insert_notification(&n).await.unwrap();

        assert!(
            s.has_unread_notification(t.id, NotificationCategory::EstimatedTime)
                .await
                .unwrap()
        );
        assert!(
            !s.has_unread_notification(t.id, NotificationCategory::Reminder)
                .await
                .unwrap()
        );
        assert_eq!(s.count_unread_notifications().await.unwrap(), 1);

        let read = s.mark_notification_read(n.id).await.unwrap().unwrap();
        assert!(read.is_read);
        assert_eq!(s.count_unread_notifications().await.unwrap(), 0);

        let unread_only = s
            .list_notifications(&NotificationQuery {
                is_read: Some(false),
                ..NotificationQuery::default()
            })
            .await
            .unwrap();
        assert!(unread_only.is_empty());

        assert!(s.delete_notification(n.id).await.unwrap());
        assert!(s.mark_notification_read(n.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tasks.db");
        let s = SqliteStore::open(&path).unwrap();
        assert_eq!(s.path(), Some(path.as_path()));
        assert_eq!(s.schema_version().unwrap(), Some(1));
    }
}
