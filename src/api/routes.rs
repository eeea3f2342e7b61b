//! Route handlers for `/api/v1`.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::ApiState;
use super::cache::CacheKey;
use crate::agent::{ChatExchange, ChatResponse, TaskAgent};
use crate::domain::{self, NewTask, TaskPatch, ValidationError};
use crate::error::{AppError, Result};
use crate::service::TaskFilter;
use crate::service::reminders::confirmation_message;
use crate::service::tasks::DEFAULT_SEARCH_RESULTS;
use crate::store::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Longest accepted search query, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

pub const CACHE_HEADER: &str = "x-cache";

fn task_id(raw: &str) -> Result<uuid::Uuid> {
    Ok(domain::parse_id("task", raw)?)
}

// ── Tasks ─────────────────────────────────────────────────────

pub(super) async fn create_task(
    State(state): State<ApiState>,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Value>)> {
    let task = state.services.tasks.create(body).await?;
    state.cache.invalidate_all();
    Ok((StatusCode::CREATED, Json(json!(task))))
}

pub(super) async fn list_tasks(
    State(state): State<ApiState>,
    Query(filter): Query<TaskFilter>,
) -> Result<Response> {
    let key = CacheKey::from(&filter.to_query()?);
    let (tasks, hit) = match state.cache.get(&key).await {
        Some(tasks) => (tasks, "HIT"),
        None => {
            let tasks = Arc::new(state.services.tasks.list(&filter).await?);
            state.cache.insert(key, Arc::clone(&tasks)).await;
            (tasks, "MISS")
        }
    };
    debug!(count = tasks.len(), cache = hit, "listed tasks");

    let mut response = Json(tasks.as_ref()).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_HEADER, HeaderValue::from_static(hit));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=5"),
    );
    Ok(response)
}

pub(super) async fn get_task(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let task = state.services.tasks.get(task_id(&id)?).await?;
    Ok(Json(json!(task)))
}

pub(super) async fn update_task(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Value>> {
    let id = task_id(&id)?;
    let task = state.services.tasks.update(id, patch).await?;
    state.cache.invalidate_all();
    Ok(Json(json!(task)))
}

pub(super) async fn delete_task(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = task_id(&id)?;
    state.services.tasks.delete(id).await?;
    state.cache.invalidate_all();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    max_results: Option<usize>,
}

pub(super) async fn search(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    let query = params.q.trim();
    let chars = query.chars().count();
    if chars == 0 || chars > MAX_QUERY_CHARS {
        return Err(ValidationError::Invalid(format!(
            "Search query must be between 1 and {MAX_QUERY_CHARS} characters"
        ))
        .into());
    }
    let hits = state
        .services
        .tasks
        .search(query, params.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS))
        .await?;
    Ok(Json(json!({ "results": hits, "query": query })))
}

// ── Reminders ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct ReminderBody {
    #[serde(default)]
    reminder_time: Option<String>,
    #[serde(default)]
    notification_type: Option<String>,
}

pub(super) async fn create_reminder(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let id = task_id(&id)?;
    let body: ReminderBody = if body.iter().all(u8::is_ascii_whitespace) {
        ReminderBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ValidationError::Invalid(format!("invalid reminder body: {e}")))?
    };
    let reminder = state
        .services
        .reminders
        .create(
            id,
            body.reminder_time.as_deref(),
            body.notification_type.as_deref(),
            Utc::now(),
        )
        .await?;
    let message = confirmation_message(&reminder);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "reminder": reminder, "message": message })),
    ))
}

#[derive(Debug, Deserialize)]
pub(super) struct ReminderParams {
    #[serde(default)]
    task_id: Option<String>,
}

pub(super) async fn list_reminders(
    State(state): State<ApiState>,
    Query(params): Query<ReminderParams>,
) -> Result<Json<Value>> {
    let task = params
        .task_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(task_id)
        .transpose()?;
    let reminders = state.services.reminders.list(task).await?;
    Ok(Json(json!(reminders)))
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct NotificationParams {
    #[serde(default)]
    is_read: Option<bool>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

pub(super) async fn list_notifications(
    State(state): State<ApiState>,
    Query(params): Query<NotificationParams>,
) -> Result<Json<Value>> {
    let notifications = state
        .services
        .notifications
        .list(params.is_read, params.limit, params.offset)
        .await?;
    Ok(Json(json!({
        "count": notifications.len(),
        "notifications": notifications,
        "limit": params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        "offset": params.offset.unwrap_or(0),
    })))
}

pub(super) async fn unread_count(State(state): State<ApiState>) -> Result<Json<Value>> {
    let n = state.services.notifications.unread_count().await?;
    Ok(Json(json!({ "unread_count": n })))
}

pub(super) async fn mark_notification_read(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = domain::parse_id("notification", &id)?;
    let notification = state.services.notifications.mark_read(id).await?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub(super) async fn delete_notification(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = domain::parse_id("notification", &id)?;
    state.services.notifications.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}

// ── Agent ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct ChatBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    history: Vec<ChatExchange>,
}

fn agent(state: &ApiState) -> Result<&TaskAgent> {
    state.agent.as_deref().ok_or_else(|| {
        AppError::Unavailable(
            "The assistant is not configured. Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY."
                .into(),
        )
    })
}

pub(super) async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>> {
    if body.message.trim().is_empty() {
        return Err(ValidationError::Invalid("Message cannot be empty".into()).into());
    }
    let reply = agent(&state)?.chat(&body.message, &body.history).await?;
    if reply.status == crate::agent::ChatStatus::Success {
        // The agent may have written tasks.
        state.cache.invalidate_all();
    }
    Ok(Json(reply))
}

pub(super) async fn summary(State(state): State<ApiState>) -> Result<Json<ChatResponse>> {
    Ok(Json(agent(&state)?.summary().await?))
}

pub(super) async fn next_task(State(state): State<ApiState>) -> Result<Json<ChatResponse>> {
    Ok(Json(agent(&state)?.next_task().await?))
}

// ── Health ────────────────────────────────────────────────────

pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
