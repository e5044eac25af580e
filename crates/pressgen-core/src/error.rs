use thiserror::Error;

/// Core error type shared across pressgen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A table was requested (or inferred) that has no registered generator.
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    /// Declared and inferred dependencies form a cycle between these tables.
    #[error("cyclic dependency between tables: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
    /// A column annotation is not of the form `table.column`.
    #[error("invalid reference '{reference}' on {table}.{column}")]
    InvalidReference {
        table: String,
        column: String,
        reference: String,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results returned by pressgen crates.
pub type Result<T> = std::result::Result<T, Error>;
