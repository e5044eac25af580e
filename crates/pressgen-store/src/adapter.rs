use async_trait::async_trait;

use pressgen_core::{Row, Value};

use crate::error::StoreResult;

/// Entry point to a storage engine.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Open a transaction; nothing it writes is visible until commit.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;
}

/// Transaction-scoped CRUD used by importers and the orchestrator.
#[async_trait]
pub trait Transaction: Send {
    /// All rows of `table`, in no guaranteed order.
    async fn select(&mut self, table: &str) -> StoreResult<Vec<Row>>;

    async fn insert(&mut self, table: &str, row: &Row) -> StoreResult<()>;

    /// Overwrite `changes` on the row whose `id` column equals `id`.
    async fn update(&mut self, table: &str, id: &Value, changes: &Row) -> StoreResult<()>;

    async fn truncate(&mut self, table: &str) -> StoreResult<()>;

    /// Delete every row whose `column` differs from `keep`; returns rows removed.
    async fn delete_except(&mut self, table: &str, column: &str, keep: &Value)
    -> StoreResult<u64>;

    /// Toggle foreign-key and uniqueness checking for bulk loading.
    async fn set_integrity_checks(&mut self, enabled: bool) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
