//! SQLite DDL for the task store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation. The same table layout, including
//! the unique index on unread estimated-time notifications, is expected on
//! the Postgres side when the PostgREST adapter is used.

use rusqlite::Connection;

/// Current schema version stamped into `schema_meta`.
pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Complete DDL for the task database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
/// Timestamps are RFC 3339 UTC strings with a fixed width, so text
/// comparison orders them chronologically.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id              TEXT PRIMARY KEY,
    title           TEXT NOT NULL CHECK (length(title) BETWEEN 1 AND 255),
    description     TEXT,
    priority        TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
    status          TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'in_progress', 'completed', 'archived')),
    due_date        TEXT,
    estimated_hours REAL CHECK (estimated_hours IS NULL OR (estimated_hours >= 0 AND estimated_hours <= 24)),
    tags            TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    assigned_to     TEXT,
    created_by      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
CREATE INDEX IF NOT EXISTS idx_tasks_status     ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_priority   ON tasks(priority);

CREATE TABLE IF NOT EXISTS reminders (
    id                TEXT PRIMARY KEY,
    task_id           TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    reminder_time     TEXT NOT NULL,
    notification_type TEXT NOT NULL DEFAULT 'email',
    status            TEXT NOT NULL DEFAULT 'pending'
                      CHECK (status IN ('pending', 'sent', 'failed')),
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(status, reminder_time);
CREATE INDEX IF NOT EXISTS idx_reminders_task ON reminders(task_id);

CREATE TABLE IF NOT EXISTS notifications (
    id                TEXT PRIMARY KEY,
    task_id           TEXT REFERENCES tasks(id) ON DELETE SET NULL,
    reminder_id       TEXT REFERENCES reminders(id) ON DELETE SET NULL,
    category          TEXT NOT NULL CHECK (category IN ('reminder', 'estimated_time')),
    notification_type TEXT NOT NULL DEFAULT 'in_app',
    title             TEXT NOT NULL,
    message           TEXT NOT NULL,
    is_read           INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_unread
    ON notifications(is_read, category, task_id);
CREATE INDEX IF NOT EXISTS idx_notifications_created_at ON notifications(created_at);

-- At most one unread estimated-time notification per task. Older unread
-- duplicates from version 1 databases are marked read first.
UPDATE notifications SET is_read = 1
 WHERE category = 'estimated_time' AND is_read = 0 AND task_id IS NOT NULL
   AND rowid NOT IN (
       SELECT MIN(rowid) FROM notifications
        WHERE category = 'estimated_time' AND is_read = 0 AND task_id IS NOT NULL
        GROUP BY task_id
   );
CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_one_unread_estimate
    ON notifications(task_id, category)
    WHERE is_read = 0 AND category = 'estimated_time';
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Stamps the current schema version.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the schema version, `None` if never stamped.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn apply_schema_creates_tables() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");

        let tables = table_names(&conn);
        for t in ["tasks", "reminders", "notifications", "schema_meta"] {
            assert!(tables.contains(&t.to_owned()), "missing {t}");
        }
    }

    #[test]
    fn apply_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("first");
        apply_schema(&conn).expect("second");
        assert_eq!(
            read_schema_version(&conn).expect("read"),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn check_constraints_reject_bad_enums() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");
        let res = conn.execute(
            "INSERT INTO tasks (id, title, priority, created_at, updated_at)
             VALUES ('a', 'x', 'critical', '', '')",
            [],
        );
        assert!(res.is_err());
    }

    #[test]
    fn only_one_unread_estimate_per_task() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        apply_schema(&conn).expect("apply_schema");
        conn.execute(
            "INSERT INTO tasks (id, title, created_at, updated_at) VALUES ('t', 'x', '', '')",
            [],
        )
        .expect("task");
        let insert = |id: &str, category: &str, is_read: i64| {
            conn.execute(
                "INSERT INTO notifications (id, task_id, category, title, message, is_read, created_at)
                 VALUES (?1, 't', ?2, 'title', 'message', ?3, '')",
                rusqlite::params![id, category, is_read],
            )
        };
        insert("n1", "estimated_time", 0).expect("first unread");
        assert!(insert("n2", "estimated_time", 0).is_err());
        insert("n3", "estimated_time", 1).expect("read rows are not limited");
        insert("n4", "reminder", 0).expect("reminders are not limited");
        insert("n5", "reminder", 0).expect("reminders are not limited");
    }
}
