//! Task index backed by SQLite + sqlite-vec.
//!
//! ```text
//! task_index        (task_id PK, text, priority, status, indexed_at)
//! task_embeddings   vec0(task_id PK, embedding FLOAT[dim] cosine)
//! ```
//!
//! KNN queries run against the `vec0` table directly; sqlite-vec needs the
//! `LIMIT` on that query rather than on a join.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Once};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use super::{Embedder, IndexError, IndexHit, SemanticIndex};
use crate::domain::Task;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register sqlite-vec as an auto extension for every new connection.
///
/// Idempotent; must run before the connection is opened.
#[allow(clippy::missing_transmute_annotations)]
pub fn ensure_sqlite_vec_loaded() {
    SQLITE_VEC_INIT.call_once(|| {
        // SAFETY: `sqlite3_vec_init` has the signature SQLite expects for an
        // extension entry point; registration happens once per process. The
        // target type is the one `sqlite3_auto_extension` declares.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

const CREATE_TASK_INDEX_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS task_index (
    task_id    TEXT PRIMARY KEY,
    text       TEXT NOT NULL,
    priority   TEXT NOT NULL,
    status     TEXT NOT NULL,
    indexed_at TEXT NOT NULL
)";

fn create_embeddings_table(dim: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS task_embeddings USING vec0(
    task_id TEXT PRIMARY KEY,
    embedding FLOAT[{dim}] distance_metric=cosine
)"
    )
}

/// sqlite-vec task index.
pub struct SqliteVecIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVecIndex {
    /// Open (or create) an index database at `path`.
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        ensure_sqlite_vec_loaded();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Storage(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, embedder)
    }

    /// An in-memory index, mostly for tests.
    pub fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        ensure_sqlite_vec_loaded();
        Self::with_connection(Connection::open_in_memory()?, embedder)
    }

    fn with_connection(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        conn.execute(CREATE_TASK_INDEX_TABLE, [])?;
        conn.execute(&create_embeddings_table(embedder.dim()), [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Number of indexed tasks.
    pub fn len(&self) -> Result<usize, IndexError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM task_index", [], |r| r.get(0))?;
        Ok(count.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn
            .lock()
            .map_err(|e| IndexError::Storage(format!("index lock poisoned: {e}")))
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let vector = self.embedder.embed(text).await?;
        let expected = self.embedder.dim();
        if vector.len() != expected {
            return Err(IndexError::Dimension {
                expected,
                got: vector.len(),
            });
        }
        Ok(vector)
    }
}

fn to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[async_trait]
impl SemanticIndex for SqliteVecIndex {
    fn name(&self) -> &str {
        "sqlite-vec"
    }

    async fn upsert(&self, task: &Task) -> Result<(), IndexError> {
        let text = task.embedding_text();
        let vector = self.embed_checked(&text).await?;
        let id = task.id.to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO task_index (task_id, text, priority, status, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(task_id) DO UPDATE SET
                 text = excluded.text,
                 priority = excluded.priority,
                 status = excluded.status,
                 indexed_at = excluded.indexed_at",
            params![
                id,
                text,
                task.priority.as_str(),
                task.status.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        // vec0 has no UPSERT, so delete then insert.
        conn.execute("DELETE FROM task_embeddings WHERE task_id = ?1", params![id])?;
        conn.execute(
            "INSERT INTO task_embeddings (task_id, embedding) VALUES (?1, ?2)",
            params![id, to_blob(&vector)],
        )?;
        Ok(())
    }

    async fn remove(&self, task_id: Uuid) -> Result<(), IndexError> {
        let id = task_id.to_string();
        let conn = self.lock()?;
        conn.execute("DELETE FROM task_index WHERE task_id = ?1", params![id])?;
        conn.execute("DELETE FROM task_embeddings WHERE task_id = ?1", params![id])?;
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<IndexHit>, IndexError> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embed_checked(query).await?;
        if vector.iter().all(|x| *x == 0.0) {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, distance FROM task_embeddings
             WHERE embedding MATCH ?1
             ORDER BY distance
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![to_blob(&vector), limit as i64], |row| {
            let id: String = row.get(0)?;
            let distance: f64 = row.get(1)?;
            Ok((id, distance))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, distance) = row?;
            let Ok(task_id) = Uuid::parse_str(&id) else {
                tracing::warn!(id = %id, "skipping index entry with malformed id");
                continue;
            };
            // Cosine distance is in [0.0, 2.0]; map to a [0.0, 1.0] score.
            let score = (1.0 - distance / 2.0).max(0.0) as f32;
            hits.push(IndexHit { task_id, score });
        }
        Ok(hits)
    }
}
