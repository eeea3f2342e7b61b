//! HTTP contract tests against an in-process server.
//!
//! Each test starts its own server on an ephemeral port backed by an
//! in-memory SQLite store and a hashing-embedder vector index.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};
use taskpilot::api::{ApiServer, ApiState};
use taskpilot::domain::NewReminder;
use taskpilot::index::{HashingEmbedder, SqliteVecIndex};
use taskpilot::poller::ReminderPoller;
use taskpilot::service::Services;
use taskpilot::store::{SqliteStore, TaskStore};
use tokio_util::sync::CancellationToken;

struct Harness {
    server: ApiServer,
    services: Services,
    store: Arc<dyn TaskStore>,
    http: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let index = SqliteVecIndex::open_in_memory(Arc::new(HashingEmbedder::new(64))).unwrap();
        let services = Services::new(Arc::clone(&store), Arc::new(index));
        let state = ApiState::new(services.clone(), None);
        let server = ApiServer::start(state, "127.0.0.1:0", CancellationToken::new())
            .await
            .unwrap();
        Self {
            server,
            services,
            store,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.base_url())
    }

    async fn create(&self, body: Value) -> Value {
        let resp = self.http.post(self.url("/tasks")).json(&body).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.unwrap()
    }
}

async fn detail(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["detail"].as_str().unwrap_or_default().to_owned()
}

#[tokio::test]
async fn create_then_get_returns_stripped_title() {
    let h = Harness::start().await;
    let task = h
        .create(json!({
            "title": "  Draft report  ",
            "priority": "high",
            "due_date": "tomorrow 18:00",
            "estimated_hours": 3.5
        }))
        .await;
    assert_eq!(task["title"], "Draft report");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["status"], "pending");
    assert!(task["due_date"].is_string());

    let id = task["id"].as_str().unwrap();
    let fetched: Value = h
        .http
        .get(h.url(&format!("/tasks/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["title"], "Draft report");
    assert_eq!(fetched["estimated_hours"], 3.5);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let h = Harness::start().await;
    let resp = h
        .http
        .post(h.url("/tasks"))
        .json(&json!({ "title": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = h
        .http
        .post(h.url("/tasks"))
        .json(&json!({ "title": "Too long", "estimated_hours": 25 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_and_unknown_ids() {
    let h = Harness::start().await;
    for method in [reqwest::Method::GET, reqwest::Method::DELETE] {
        let resp = h
            .http
            .request(method, h.url("/tasks/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detail(resp).await, "Invalid task ID format");
    }

    for raw in [
        "550e8400e29b41d4a716446655440000",
        "%7B550e8400-e29b-41d4-a716-446655440000%7D",
        "urn:uuid:550e8400-e29b-41d4-a716-446655440000",
        "550e8400-e29b-11d4-a716-446655440000",
    ] {
        let resp = h.http.get(h.url(&format!("/tasks/{raw}"))).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{raw}");
    }

    let missing = uuid::Uuid::new_v4();
    let resp = h
        .http
        .get(h.url(&format!("/tasks/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(detail(resp).await, "Task not found");

    let resp = h
        .http
        .patch(h.url(&format!("/tasks/{missing}")))
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_is_cached_and_writes_invalidate() {
    let h = Harness::start().await;
    h.create(json!({ "title": "First" })).await;

    let first = h.http.get(h.url("/tasks")).send().await.unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.headers()["cache-control"], "public, max-age=5");
    let second = h.http.get(h.url("/tasks")).send().await.unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");

    h.create(json!({ "title": "Second" })).await;
    let third = h.http.get(h.url("/tasks")).send().await.unwrap();
    assert_eq!(third.headers()["x-cache"], "MISS");
    let tasks: Vec<Value> = third.json().await.unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn list_filters_ignore_case_and_reject_unknown_values() {
    let h = Harness::start().await;
    h.create(json!({ "title": "Urgent one", "priority": "high" })).await;
    let done = h.create(json!({ "title": "Done one" })).await;
    let id = done["id"].as_str().unwrap();
    h.http
        .patch(h.url(&format!("/tasks/{id}")))
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();

    let pending: Vec<Value> = h
        .http
        .get(h.url("/tasks?status=PENDING"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending.iter().all(|t| t["status"] == "pending"));

    let high: Vec<Value> = h
        .http
        .get(h.url("/tasks?priority=high"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(high[0]["title"], "Urgent one");

    let resp = h.http.get(h.url("/tasks?status=someday")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_is_idempotent_and_delete_removes() {
    let h = Harness::start().await;
    let task = h.create(json!({ "title": "Ship it" })).await;
    let id = task["id"].as_str().unwrap();

    for _ in 0..2 {
        let updated: Value = h
            .http
            .patch(h.url(&format!("/tasks/{id}")))
            .json(&json!({ "status": "completed" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["status"], "completed");
        assert_eq!(updated["title"], "Ship it");
    }

    let resp = h.http.delete(h.url(&format!("/tasks/{id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = h.http.get(h.url(&format!("/tasks/{id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_validates_query_and_finds_tasks() {
    let h = Harness::start().await;
    h.create(json!({ "title": "Prepare quarterly budget", "tags": ["finance"] }))
        .await;

    let resp = h.http.get(h.url("/search?q=%20%20")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let long = "x".repeat(201);
    let resp = h
        .http
        .get(h.url("/search"))
        .query(&[("q", long.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = h
        .http
        .get(h.url("/search"))
        .query(&[("q", " budget ")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["query"], "budget");
    let titles: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["title"].as_str())
        .collect();
    assert!(titles.contains(&"Prepare quarterly budget"));
}

#[tokio::test]
async fn reminders_can_be_scheduled_and_listed() {
    let h = Harness::start().await;
    let task = h.create(json!({ "title": "Call the bank" })).await;
    let id = task["id"].as_str().unwrap();

    let resp = h
        .http
        .post(h.url(&format!("/tasks/{id}/reminders")))
        .json(&json!({ "reminder_time": "in 30 minutes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reminder"]["status"], "pending");
    assert!(body["message"].as_str().unwrap().contains("(IST)"));

    let listed: Vec<Value> = h
        .http
        .get(h.url("/reminders"))
        .query(&[("task_id", id)])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    for raw in [
        "550e8400e29b41d4a716446655440000",
        "%7B550e8400-e29b-41d4-a716-446655440000%7D",
        "urn:uuid:550e8400-e29b-41d4-a716-446655440000",
        "550e8400-e29b-11d4-a716-446655440000",
    ] {
        let resp = h.http.get(h.url(&format!("/tasks/{raw}"))).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{raw}");
    }

    let missing = uuid::Uuid::new_v4();
    let resp = h
        .http
        .post(h.url(&format!("/tasks/{missing}/reminders")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notifications_flow() {
    let h = Harness::start().await;
    let task = h
        .services
        .tasks
        .create(taskpilot::domain::NewTask::new("Renew passport"))
        .await
        .unwrap();
    let now = Utc::now();
    h.store
        .insert_reminder(
            &NewReminder::in_app(task.id, now - Duration::minutes(1)).into_reminder(now),
        )
        .await
        .unwrap();
    let report = ReminderPoller::new(Arc::clone(&h.store))
        .poll_once(now)
        .await
        .unwrap();
    assert_eq!(report.reminders_sent, 1);

    let unread: Value = h
        .http
        .get(h.url("/notifications/unread"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["unread_count"], 1);

    let page: Value = h
        .http
        .get(h.url("/notifications?is_read=false"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 1);
    let id = page["notifications"][0]["id"].as_str().unwrap().to_owned();

    let read: Value = h
        .http
        .patch(h.url(&format!("/notifications/{id}/read")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["success"], true);
    assert_eq!(read["notification"]["is_read"], true);

    let resp = h
        .http
        .delete(h.url(&format!("/notifications/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = h
        .http
        .delete(h.url(&format!("/notifications/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_routes_need_a_provider() {
    let h = Harness::start().await;
    let resp = h
        .http
        .post(h.url("/agent/chat"))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = h
        .http
        .post(h.url("/agent/chat"))
        .json(&json!({ "message": "list my tasks" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = h.http.get(h.url("/agent/summary")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_timing_and_cors_headers() {
    let h = Harness::start().await;
    let resp = h.http.get(h.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-process-time"));
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
