use thiserror::Error;

/// Errors raised by storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no row in '{table}' with id {id}")]
    RowNotFound { table: String, id: String },
    #[error("malformed row returned from '{0}'")]
    MalformedRow(String),
    #[error("store state lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
