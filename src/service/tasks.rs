//! Task domain service.
//!
//! Validates input, persists through the [`TaskStore`] and mirrors every
//! write into the [`SemanticIndex`]. Index failures are logged and never
//! reach the caller.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus, ValidationError};
use crate::error::{AppError, Result};
use crate::index::SemanticIndex;
use crate::store::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TaskQuery, TaskStore};

/// Default number of search results.
pub const DEFAULT_SEARCH_RESULTS: usize = 10;

/// Upper bound on search results.
pub const MAX_SEARCH_RESULTS: usize = 50;

/// How many recent tasks the text fallback scans.
const TEXT_FALLBACK_SCAN: usize = 100;

/// Unvalidated list filter as it arrives from HTTP or the agent.
///
/// Filters are matched case-insensitively; `limit` is clamped to
/// `1..=100` and defaults to 50.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl TaskFilter {
    /// Normalize into a store query.
    pub fn to_query(&self) -> std::result::Result<TaskQuery, ValidationError> {
        let status = non_blank(&self.status)
            .map(str::parse::<TaskStatus>)
            .transpose()?;
        let priority = non_blank(&self.priority)
            .map(str::parse::<TaskPriority>)
            .transpose()?;
        Ok(TaskQuery {
            status,
            priority,
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One search result: the task plus its semantic score, when it came
/// from the index rather than the text fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub task: Task,
    pub score: Option<f32>,
}

/// Task CRUD plus best-effort semantic mirroring.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    index: Arc<dyn SemanticIndex>,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("store", &self.store.name())
            .field("index", &self.index.name())
            .finish()
    }
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, index: Arc<dyn SemanticIndex>) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Validate and persist a new task.
    pub async fn create(&self, new_task: NewTask) -> Result<Task> {
        let task = new_task.validate()?.into_task(Utc::now());
        let stored = self.store.insert_task(&task).await?;
        info!(task_id = %stored.id, priority = %stored.priority, "created task");
        self.mirror(&stored).await;
        Ok(stored)
    }

    pub async fn get(&self, id: Uuid) -> Result<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(AppError::task_not_found)
    }

    /// A page of tasks, newest first.
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let query = filter.to_query()?;
        Ok(self.store.list_tasks(&query).await?)
    }

    /// Merge `patch` into the task and refresh `updated_at`.
    ///
    /// An empty patch returns the current record untouched.
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Task> {
        let patch = patch.validate()?;
        if patch.is_empty() {
            return self.get(id).await;
        }
        let updated = self
            .store
            .update_task(id, &patch, Utc::now())
            .await?
            .ok_or_else(AppError::task_not_found)?;
        info!(task_id = %id, status = %updated.status, "updated task");
        self.mirror(&updated).await;
        Ok(updated)
    }

    /// Delete a task; reminders go with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_task(id).await? {
            return Err(AppError::task_not_found());
        }
        info!(task_id = %id, "deleted task");
        if let Err(e) = self.index.remove(id).await {
            warn!(task_id = %id, error = %e, "failed to remove task from semantic index");
        }
        Ok(())
    }

    /// Semantic search with a text-match fallback.
    ///
    /// Short queries (one or two words) are expanded before embedding.
    /// When the index yields nothing usable, the most recent tasks are
    /// scanned for a case-insensitive substring match instead.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::Invalid("search query must not be empty".into()).into());
        }
        let max_results = max_results.clamp(1, MAX_SEARCH_RESULTS);
        let expanded = expand_query(query);

        let hits = match self.index.search(&expanded, max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "semantic search failed, using text match");
                Vec::new()
            }
        };

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.get_task(hit.task_id).await {
                Ok(Some(task)) => results.push(SearchHit {
                    task,
                    score: Some(hit.score),
                }),
                Ok(None) => debug!(task_id = %hit.task_id, "index hit has no task, skipping"),
                Err(e) => warn!(task_id = %hit.task_id, error = %e, "could not load index hit"),
            }
        }
        if !results.is_empty() {
            return Ok(results);
        }

        debug!(query, "semantic search empty, falling back to text match");
        let recent = self
            .store
            .list_tasks(&TaskQuery::default().with_limit(TEXT_FALLBACK_SCAN))
            .await?;
        Ok(recent
            .into_iter()
            .filter(|t| t.matches_text(query))
            .take(max_results)
            .map(|task| SearchHit { task, score: None })
            .collect())
    }

    async fn mirror(&self, task: &Task) {
        if let Err(e) = self.index.upsert(task).await {
            warn!(task_id = %task.id, error = %e, "failed to mirror task into semantic index");
        }
    }
}

/// Give one- and two-word queries more context for the embedder.
fn expand_query(query: &str) -> String {
    if query.split_whitespace().count() <= 2 {
        format!("tasks related to {query} or about {query}")
    } else {
        query.to_owned()
    }
}
