//! Semantic index over task text.
//!
//! The index mirrors a short summary of every task (`"{title}. {description}"`
//! plus priority/status metadata) as an embedding vector so tasks can be
//! found by meaning. It is best-effort: the relational store stays the
//! source of truth and callers log index failures instead of surfacing them.

pub mod embedding;
pub mod vec;

pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder, HttpEmbedderConfig};
pub use vec::SqliteVecIndex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Task;

/// Errors from the semantic index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The embedder failed to produce a vector.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Vector dimension does not match the index.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    /// Vector storage failed.
    #[error("index storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for IndexError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// One semantic search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub task_id: Uuid,
    /// Similarity in `0.0..=1.0`, higher is closer.
    pub score: f32,
}

/// Vector index over task summaries.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or replace the entry for `task`.
    async fn upsert(&self, task: &Task) -> Result<(), IndexError>;

    /// Remove the entry for `task_id`. No-op when absent.
    async fn remove(&self, task_id: Uuid) -> Result<(), IndexError>;

    /// Up to `limit` nearest tasks to `query`, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<IndexHit>, IndexError>;
}

/// Index that stores nothing and never finds anything.
///
/// Used when the semantic index is disabled; search then falls back to
/// text matching.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndex;

#[async_trait]
impl SemanticIndex for NoopIndex {
    fn name(&self) -> &str {
        "noop"
    }

    async fn upsert(&self, _task: &Task) -> Result<(), IndexError> {
        Ok(())
    }

    async fn remove(&self, _task_id: Uuid) -> Result<(), IndexError> {
        Ok(())
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<IndexHit>, IndexError> {
        Ok(Vec::new())
    }
}
