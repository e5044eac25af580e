use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::debug;

use pressgen_core::{Row, Value, row_from_json, row_to_json};

use crate::adapter::{Store, Transaction};
use crate::error::{StoreError, StoreResult};

mod queries;

/// Store backed by a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn select(&mut self, table: &str) -> StoreResult<Vec<Row>> {
        let sql = queries::select_rows(table);
        let raw = sqlx::query_scalar::<_, String>(&sql).fetch_all(&mut *self.tx).await?;

        raw.into_iter()
            .map(|text| {
                let json: serde_json::Value = serde_json::from_str(&text)?;
                row_from_json(json).ok_or_else(|| StoreError::MalformedRow(table.to_string()))
            })
            .collect()
    }

    async fn insert(&mut self, table: &str, row: &Row) -> StoreResult<()> {
        let sql = queries::insert_row(table, row.keys().map(String::as_str));
        let payload = serde_json::to_string(&row_to_json(row))?;
        sqlx::query(&sql)
            .bind(payload)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update(&mut self, table: &str, id: &Value, changes: &Row) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let sql = queries::update_row(table, changes.keys().map(String::as_str));
        let payload = serde_json::to_string(&row_to_json(changes))?;
        let result = sqlx::query(&sql)
            .bind(payload)
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn truncate(&mut self, table: &str) -> StoreResult<()> {
        let result = sqlx::query(&queries::delete_all(table))
            .execute(&mut *self.tx)
            .await?;
        debug!(table, rows = result.rows_affected(), "table cleared");
        Ok(())
    }

    async fn delete_except(
        &mut self,
        table: &str,
        column: &str,
        keep: &Value,
    ) -> StoreResult<u64> {
        let result = sqlx::query(&queries::delete_except(table, column))
            .bind(keep.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_integrity_checks(&mut self, enabled: bool) -> StoreResult<()> {
        sqlx::query(queries::integrity_checks(enabled))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
