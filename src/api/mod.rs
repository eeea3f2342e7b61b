//! HTTP API mounted under `/api/v1`.

pub mod cache;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};

pub use cache::TaskListCache;
pub use server::ApiServer;

use crate::agent::TaskAgent;
use crate::service::Services;

pub const API_PREFIX: &str = "/api/v1";

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub services: Services,
    /// `None` when no provider credential is configured.
    pub agent: Option<Arc<TaskAgent>>,
    pub cache: TaskListCache,
    pub debug: bool,
}

impl ApiState {
    pub fn new(services: Services, agent: Option<Arc<TaskAgent>>) -> Self {
        Self {
            services,
            agent,
            cache: TaskListCache::default(),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Build the full application router.
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/tasks", post(routes::create_task).get(routes::list_tasks))
        .route(
            "/tasks/{id}",
            get(routes::get_task)
                .patch(routes::update_task)
                .delete(routes::delete_task),
        )
        .route("/tasks/{id}/reminders", post(routes::create_reminder))
        .route("/reminders", get(routes::list_reminders))
        .route("/search", get(routes::search))
        .route("/agent/chat", post(routes::chat))
        .route("/agent/summary", get(routes::summary))
        .route("/agent/next-task", get(routes::next_task))
        .route("/notifications", get(routes::list_notifications))
        .route("/notifications/unread", get(routes::unread_count))
        .route(
            "/notifications/{id}/read",
            patch(routes::mark_notification_read),
        )
        .route(
            "/notifications/{id}",
            axum::routing::delete(routes::delete_notification),
        )
        .route("/health", get(routes::health));

    Router::new()
        .nest(API_PREFIX, api)
        .route("/health", get(routes::health))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::timing,
        ))
        .layer(axum::middleware::from_fn(middleware::cors))
        .with_state(state)
}
