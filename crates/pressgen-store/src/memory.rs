use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use pressgen_core::{Row, Value};

use crate::adapter::{Store, Transaction};
use crate::error::{StoreError, StoreResult};

type Tables = BTreeMap<String, Vec<Row>>;

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    integrity_checks: Vec<bool>,
}

/// Transactional in-memory store.
///
/// A transaction works on a private copy of every table and publishes it on
/// commit, so a rolled back run leaves the store untouched.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self.lock()?.tables.get(table).cloned().unwrap_or_default())
    }

    /// Replace the committed contents of `table`.
    pub fn put_rows(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        self.lock()?.tables.insert(table.to_string(), rows);
        Ok(())
    }

    /// Every `set_integrity_checks` call seen so far, in order.
    pub fn integrity_check_history(&self) -> StoreResult<Vec<bool>> {
        Ok(self.lock()?.integrity_checks.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tables = self.lock()?.tables.clone();
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            tables,
        }))
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    tables: Tables,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn select(&mut self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn insert(&mut self, table: &str, row: &Row) -> StoreResult<()> {
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    async fn update(&mut self, table: &str, id: &Value, changes: &Row) -> StoreResult<()> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get("id").is_some_and(|value| same_value(value, id)))
            })
            .ok_or_else(|| StoreError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        for (column, value) in changes {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    async fn truncate(&mut self, table: &str) -> StoreResult<()> {
        if let Some(rows) = self.tables.get_mut(table) {
            rows.clear();
        }
        Ok(())
    }

    async fn delete_except(
        &mut self,
        table: &str,
        column: &str,
        keep: &Value,
    ) -> StoreResult<u64> {
        let Some(rows) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| row.get(column).is_some_and(|value| same_value(value, keep)));
        Ok((before - rows.len()) as u64)
    }

    async fn set_integrity_checks(&mut self, enabled: bool) -> StoreResult<()> {
        self.store.lock()?.integrity_checks.push(enabled);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { store, tables } = *self;
        store.lock()?.tables = tables;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

/// Ids may come back as numbers or text depending on who wrote them.
fn same_value(left: &Value, right: &Value) -> bool {
    left == right || left.to_string() == right.to_string()
}
