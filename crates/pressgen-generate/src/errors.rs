use thiserror::Error;

use pressgen_store::StoreError;

/// Errors emitted by the generation engine. All of them abort the run.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Unknown tables and dependency cycles, raised before any row is written.
    #[error(transparent)]
    Core(#[from] pressgen_core::Error),
    #[error("missing reference: no {table} row with id '{id}' (from {column})")]
    MissingReference {
        table: String,
        column: String,
        id: String,
    },
    #[error("{table} row is missing column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("failed to read content pack {path}: {reason}")]
    ContentPackRead { path: String, reason: String },
    #[error("generated {table} row has column '{column}' that is not in the schema")]
    InvalidRow { table: String, column: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GenerationError {
    pub fn missing_reference(
        table: impl Into<String>,
        column: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        GenerationError::MissingReference {
            table: table.into(),
            column: column.into(),
            id: id.into(),
        }
    }
}
