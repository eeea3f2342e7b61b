//! Persistence errors and their user-facing guidance.

/// Errors raised by a [`TaskStore`](super::TaskStore) implementation.
///
/// Backend messages are classified by substring so callers see actionable
/// guidance instead of raw driver or REST errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required table is missing.
    #[error(
        "The required database table does not exist ({0}). Apply the schema before starting the service."
    )]
    MissingTable(String),

    /// Row-level security or a grant rejected the operation.
    #[error(
        "Database permission error ({0}). Check the row level security policies and grants for the service key."
    )]
    PermissionDenied(String),

    /// A unique constraint rejected the row because an equivalent one exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// A constraint (foreign key, check, not-null) rejected the data.
    #[error(
        "Data validation error: {0}. Check that all required fields are provided and data types are correct."
    )]
    Constraint(String),

    /// Any other backend failure.
    #[error("Database error: {0}")]
    Backend(String),

    /// The backend answered with a body we could not decode.
    #[error("Database error: malformed response: {0}")]
    Decode(String),

    /// Connection mutex was poisoned.
    #[error("Database error: store lock poisoned: {0}")]
    Lock(String),

    /// Filesystem error opening the database.
    #[error("Database error: I/O: {0}")]
    Io(String),
}

impl StoreError {
    /// Classify a raw backend message.
    pub fn from_message(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let lower = raw.to_lowercase();
        if lower.contains("unique constraint") || lower.contains("duplicate key") {
            Self::Duplicate(raw)
        } else if lower.contains("relation") || lower.contains("does not exist") || lower.contains("no such table")
        {
            Self::MissingTable(raw)
        } else if lower.contains("policy")
            || lower.contains("row level security")
            || lower.contains("row-level security")
            || lower.contains("permission")
        {
            Self::PermissionDenied(raw)
        } else if lower.contains("violates") || lower.contains("constraint") {
            Self::Constraint(raw)
        } else {
            Self::Backend(raw)
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::from_message(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
