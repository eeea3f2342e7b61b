//! Error types for taskpilot.

use crate::agent::LlmError;
use crate::domain::ValidationError;
use crate::store::StoreError;

/// Top-level error type for the task services.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed identifier or out-of-range field.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No such record.
    #[error("{0}")]
    NotFound(String),

    /// Relational store failure, already phrased as guidance.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Language model provider or tool failure.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// A feature that needs configuration is not set up.
    #[error("{0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn task_not_found() -> Self {
        Self::NotFound("Task not found".into())
    }

    pub fn notification_not_found() -> Self {
        Self::NotFound("Notification not found".into())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
