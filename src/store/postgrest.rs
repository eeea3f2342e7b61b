//! PostgREST-backed task store.
//!
//! Talks to a managed Postgres through its PostgREST endpoint
//! (`{base_url}/rest/v1/{table}`), authenticating with an `apikey` header
//! plus a bearer token. Table layout matches [`schema`](super::schema).
//!
//! Error bodies (`{"message": ..., "code": ...}`) are classified into
//! [`StoreError`] guidance the same way SQLite driver errors are.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use super::{NotificationQuery, StoreError, TaskQuery, TaskStore};
use crate::domain::{
    Notification, NotificationCategory, Reminder, ReminderStatus, Task, TaskPatch,
};

const TASKS: &str = "tasks";
const REMINDERS: &str = "reminders";
const NOTIFICATIONS: &str = "notifications";

// ── Configuration ─────────────────────────────────────────────

/// Connection settings for a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Service or anon key.
    pub api_key: String,
}

impl PostgrestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// PostgREST task store.
pub struct PostgrestStore {
    client: reqwest::Client,
    rest_root: Url,
    config: PostgrestConfig,
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_root", &self.rest_root.as_str())
            .finish_non_exhaustive()
    }
}

impl PostgrestStore {
    pub fn new(config: PostgrestConfig) -> Result<Self, StoreError> {
        let mut base = config.base_url.trim_end_matches('/').to_owned();
        base.push_str("/rest/v1/");
        let rest_root = Url::parse(&base)
            .map_err(|e| StoreError::Backend(format!("invalid PostgREST URL '{base}': {e}")))?;
        let client = reqwest::Client::builder()
            .default_headers(auth_headers(&config.api_key)?)
            .build()
            .map_err(|e| StoreError::Backend(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            rest_root,
            config,
        })
    }

    pub fn config(&self) -> &PostgrestConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.rest_root
            .join(table)
            .map_err(|e| StoreError::Backend(format!("invalid table path '{table}': {e}")))
    }

    /// Send a request and decode a JSON array of rows.
    async fn rows<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("PostgREST request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("PostgREST body read failed: {e}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn first_row<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<T>, StoreError> {
        Ok(self.rows(request).await?.into_iter().next())
    }

    fn get(&self, table: &str) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(self.client.get(self.table_url(table)?).query(&[("select", "*")]))
    }

    fn insert(
        &self,
        table: &str,
        body: &impl serde::Serialize,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(self
            .client
            .post(self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(body))
    }

    fn patch(
        &self,
        table: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(self
            .client
            .patch(self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(body))
    }

    fn delete(&self, table: &str) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(self
            .client
            .delete(self.table_url(table)?)
            .header("Prefer", "return=representation"))
    }
}

fn auth_headers(api_key: &str) -> Result<HeaderMap, StoreError> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| {
        StoreError::Backend(format!("API key is not a valid header value: {e}"))
    };
    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(api_key).map_err(invalid)?);
    headers.insert(
        reqwest::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(invalid)?,
    );
    Ok(headers)
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map a non-success PostgREST response to a [`StoreError`].
fn map_http_error(status: reqwest::StatusCode, body: &str) -> StoreError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => StoreError::PermissionDenied(message),
        409 if body.contains("\"23505\"") => StoreError::Duplicate(message),
        _ => match StoreError::from_message(message.clone()) {
            StoreError::Backend(_) => {
                StoreError::Backend(format!("HTTP {}: {message}", status.as_u16()))
            }
            classified => classified,
        },
    }
}

/// Extract `message` (plus `hint` when present) from a PostgREST error body.
fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_owned();
    };
    let message = value
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.to_owned());
    match value.get("hint").and_then(|h| h.as_str()) {
        Some(hint) if !hint.is_empty() => format!("{message} ({hint})"),
        _ => message,
    }
}

/// PATCH body for a task update.
///
/// An empty description clears the column.
fn task_patch_body(patch: &TaskPatch, now: DateTime<Utc>) -> Result<serde_json::Value, StoreError> {
    let mut body = serde_json::to_value(patch)?;
    if let Some(obj) = body.as_object_mut() {
        if patch.description.as_deref() == Some("") {
            obj.insert("description".into(), serde_json::Value::Null);
        }
        obj.insert("updated_at".into(), serde_json::json!(ts(&now)));
    }
    Ok(body)
}

fn written(kind: &str) -> StoreError {
    StoreError::Backend(format!("{kind} insert returned no row; check the table's RLS policies"))
}

// ── TaskStore ─────────────────────────────────────────────────

#[async_trait]
impl TaskStore for PostgrestStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, StoreError> {
        self.first_row(self.insert(TASKS, task)?)
            .await?
            .ok_or_else(|| written("task"))
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.first_row(self.get(TASKS)?.query(&[("id", eq(id))]))
            .await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut params: Vec<(&str, String)> = vec![
            ("order", "created_at.desc".into()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("status", eq(status)));
        }
        if let Some(priority) = query.priority {
            params.push(("priority", eq(priority)));
        }
        self.rows(self.get(TASKS)?.query(&params)).await
    }

    async fn update_task(
        &self,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let body = task_patch_body(patch, now)?;
        self.first_row(self.patch(TASKS, &body)?.query(&[("id", eq(id))]))
            .await
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let deleted: Vec<serde_json::Value> = self
            .rows(self.delete(TASKS)?.query(&[("id", eq(id))]))
            .await?;
        Ok(!deleted.is_empty())
    }

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<Reminder, StoreError> {
        self.first_row(self.insert(REMINDERS, reminder)?)
            .await?
            .ok_or_else(|| written("reminder"))
    }

    async fn list_reminders(&self, task_id: Option<Uuid>) -> Result<Vec<Reminder>, StoreError> {
        let mut params: Vec<(&str, String)> = vec![("order", "reminder_time.asc".into())];
        if let Some(task_id) = task_id {
            params.push(("task_id", eq(task_id)));
        }
        self.rows(self.get(REMINDERS)?.query(&params)).await
    }

    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StoreError> {
        let params: [(&str, String); 4] = [
            ("status", eq(ReminderStatus::Pending)),
            ("reminder_time", format!("lte.{}", ts(&now))),
            ("order", "reminder_time.asc".into()),
            ("limit", limit.to_string()),
        ];
        self.rows(self.get(REMINDERS)?.query(&params)).await
    }

    async fn claim_reminder(&self, id: Uuid, status: ReminderStatus) -> Result<bool, StoreError> {
        let body = serde_json::json!({ "status": status });
        let claimed: Vec<serde_json::Value> = self
            .rows(self.patch(REMINDERS, &body)?.query(&[
                ("id", eq(id)),
                ("status", eq(ReminderStatus::Pending)),
            ]))
            .await?;
        Ok(!claimed.is_empty())
    }

    async fn set_reminder_status(
        &self,
        id: Uuid,
        status: ReminderStatus,
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({ "status": status });
        let _: Vec<serde_json::Value> = self
            .rows(self.patch(REMINDERS, &body)?.query(&[("id", eq(id))]))
            .await?;
        Ok(())
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Notification, StoreError> {
        self.first_row(self.insert(NOTIFICATIONS, notification)?)
            .await?
            .ok_or_else(|| written("notification"))
    }

    async fn list_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut params: Vec<(&str, String)> = vec![
            ("order", "created_at.desc".into()),
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(is_read) = query.is_read {
            params.push(("is_read", eq(is_read)));
        }
        self.rows(self.get(NOTIFICATIONS)?.query(&params)).await
    }

    async fn count_unread_notifications(&self) -> Result<u64, StoreError> {
        let ids: Vec<serde_json::Value> = self
            .rows(
                self.client
                    .get(self.table_url(NOTIFICATIONS)?)
                    .query(&[("select", "id"), ("is_read", "eq.false")]),
            )
            .await?;
        Ok(ids.len() as u64)
    }

    async fn has_unread_notification(
        &self,
        task_id: Uuid,
        category: NotificationCategory,
    ) -> Result<bool, StoreError> {
        let hits: Vec<serde_json::Value> = self
            .rows(self.client.get(self.table_url(NOTIFICATIONS)?).query(&[
                ("select", "id".to_owned()),
                ("task_id", eq(task_id)),
                ("category", eq(category)),
                ("is_read", "eq.false".to_owned()),
                ("limit", "1".to_owned()),
            ]))
            .await?;
        Ok(!hits.is_empty())
    }

    async fn mark_notification_read(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let body = serde_json::json!({ "is_read": true });
        self.first_row(self.patch(NOTIFICATIONS, &body)?.query(&[("id", eq(id))]))
            .await
    }

    async fn delete_notification(&self, id: Uuid) -> Result<bool, StoreError> {
        let deleted: Vec<serde_json::Value> = self
            .rows(self.delete(NOTIFICATIONS)?.query(&[("id", eq(id))]))
            .await?;
        Ok(!deleted.is_empty())
    }
}
