//! PostgREST store contract tests.
//!
//! Verify URL layout, auth headers, filter syntax and error translation
//! against a mocked `/rest/v1` endpoint.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Utc;
use serde_json::json;
use taskpilot::domain::{NewTask, ReminderStatus, TaskPriority, TaskStatus};
use taskpilot::store::{PostgrestConfig, PostgrestStore, StoreError, TaskQuery, TaskStore};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> PostgrestStore {
    PostgrestStore::new(PostgrestConfig::new(server.uri(), "anon-key")).unwrap()
}

fn task_row(id: Uuid, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "description": null,
        "priority": "high",
        "status": "pending",
        "due_date": null,
        "estimated_hours": null,
        "tags": null,
        "created_at": "2025-01-15T10:00:00Z",
        "updated_at": "2025-01-15T10:00:00Z"
    })
}

#[tokio::test]
async fn insert_sends_auth_headers_and_returns_representation() {
    let server = MockServer::start().await;
    let task = NewTask::new("Draft report")
        .with_priority(TaskPriority::High)
        .into_task(Utc::now());

    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "title": "Draft report", "priority": "high" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([task_row(task.id, "Draft report")])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = store(&server).insert_task(&task).await.unwrap();
    assert_eq!(stored.id, task.id);
    assert!(stored.tags.is_empty());
}

#[tokio::test]
async fn list_uses_eq_filters_and_ordering() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("priority", "eq.high"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task_row(id, "A")])))
        .expect(1)
        .mount(&server)
        .await;

    let query = TaskQuery::default()
        .with_status(TaskStatus::Pending)
        .with_priority(TaskPriority::High);
    let tasks = store(&server).list_tasks(&query).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
}

#[tokio::test]
async fn missing_row_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    assert!(store(&server).get_task(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn claim_is_conditional_on_pending() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reminders"))
        .and(query_param("id", format!("eq.{id}")))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "sent" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let claimed = store(&server)
        .claim_reminder(id, ReminderStatus::Sent)
        .await
        .unwrap();
    assert!(!claimed, "empty representation means another poll won");
}

#[tokio::test]
async fn missing_table_error_is_translated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "42P01",
            "message": "relation \"public.notifications\" does not exist"
        })))
        .mount(&server)
        .await;

    let err = store(&server).count_unread_notifications().await.unwrap_err();
    assert!(matches!(err, StoreError::MissingTable(_)));
    assert!(err.to_string().contains("Apply the schema"));
}

#[tokio::test]
async fn policy_error_is_translated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy for table \"tasks\""
        })))
        .mount(&server)
        .await;

    let task = NewTask::new("x").into_task(Utc::now());
    let err = store(&server).insert_task(&task).await.unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied(_)));
}

#[tokio::test]
async fn unauthorized_is_permission_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/tasks"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
        .mount(&server)
        .await;

    let err = store(&server).delete_task(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied(_)));
}
