//! Taskpilot: task management backend.
//!
//! Tasks, reminders and notifications live in a relational store (embedded
//! SQLite or a PostgREST endpoint) and are mirrored into a vector index for
//! semantic search. A background poller turns due reminders and reached
//! time estimates into notifications, and a chat agent backed by a hosted
//! LLM drives the same operations from free text.
//!
//! # Architecture
//!
//! - **domain**: records, enums and validation
//! - **store**: [`store::TaskStore`] and its SQLite / PostgREST backends
//! - **index**: [`index::SemanticIndex`] over sqlite-vec
//! - **service**: task, reminder and notification operations
//! - **poller**: reminder and estimate checks on an interval
//! - **agent**: LLM providers, tool dispatch and the chat loop
//! - **api**: axum routes under `/api/v1`

pub mod agent;
pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod index;
pub mod poller;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use service::Services;
