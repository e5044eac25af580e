//! The contract every table importer follows.
//!
//! Importers come in two flavours. A [`DirectGenerator`] produces `quantity`
//! rows from scratch. A [`ReferencedGenerator`] walks every row of a
//! reference table and emits up to `quantity` rows for each. Both are wrapped
//! into a [`TableImporter`] by [`Direct`] and [`ByReference`].

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::RngCore;
use rand_chacha::ChaCha8Rng;

use pressgen_core::{Row, SchemaMap, Value};
use pressgen_store::Transaction;

use crate::errors::GenerationError;
use crate::model::ImportMode;

/// What an importer sees of the run: the open transaction, its table's
/// random generator, the schema and the reference clock.
pub struct ImportContext<'a> {
    pub tx: &'a mut dyn Transaction,
    pub rng: &'a mut ChaCha8Rng,
    pub schema: &'a SchemaMap,
    pub now: NaiveDateTime,
}

impl ImportContext<'_> {
    /// Every row of `table`, ordered by `id` whatever order storage keeps.
    pub async fn select(&mut self, table: &str) -> Result<Vec<Row>, GenerationError> {
        let mut rows = self.tx.select(table).await?;
        sort_by_id(&mut rows);
        Ok(rows)
    }

    /// Insert a generated row after checking its columns against the schema.
    pub async fn persist(&mut self, table: &str, row: &Row) -> Result<(), GenerationError> {
        check_row(self.schema, table, row)?;
        self.tx.insert(table, row).await?;
        Ok(())
    }
}

fn sort_by_id(rows: &mut [Row]) {
    rows.sort_by_cached_key(|row| row.get("id").map(Value::to_string));
}

fn check_row(schema: &SchemaMap, table: &str, row: &Row) -> Result<(), GenerationError> {
    // Tables without a schema entry are not checked.
    let Some(columns) = schema.table(table).map(|schema| &schema.columns) else {
        return Ok(());
    };
    match row.keys().find(|column| !columns.contains_key(*column)) {
        Some(column) => Err(GenerationError::InvalidRow {
            table: table.to_string(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// A table the engine can populate.
#[async_trait]
pub trait TableImporter: Send {
    fn table(&self) -> &'static str;
    fn mode(&self) -> ImportMode;
    fn default_quantity(&self) -> usize;

    /// Generate and persist rows, returning how many were written.
    async fn import(
        &mut self,
        ctx: &mut ImportContext<'_>,
        quantity: usize,
    ) -> Result<u64, GenerationError>;

    /// Runs once every table of the run has been imported. Returns the
    /// number of rows it touched.
    async fn finalise(&mut self, _ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        Ok(0)
    }
}

/// Row source for tables generated from scratch.
#[async_trait]
pub trait DirectGenerator: Send {
    fn table(&self) -> &'static str;
    fn default_quantity(&self) -> usize;

    /// Snapshot whatever the generator needs before the first row.
    async fn load(
        &mut self,
        _ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Row number `index`, or `None` to stop early.
    fn generate(
        &mut self,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError>;

    async fn finalise(&mut self, _ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        Ok(0)
    }
}

/// Row source for tables derived from the rows of another table.
#[async_trait]
pub trait ReferencedGenerator: Send {
    fn table(&self) -> &'static str;
    fn reference_table(&self) -> &'static str;
    /// Upper bound of rows emitted per reference row.
    fn default_quantity(&self) -> usize;

    async fn load(&mut self, _ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Order in which reference rows are visited. `id` order by default.
    fn order_references(&self, _references: &mut Vec<Row>) {}

    /// Scope the following `generate` calls to one reference row.
    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError>;

    /// Next row for the current reference, `None` once it has nothing left.
    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError>;

    async fn finalise(&mut self, _ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        Ok(0)
    }
}

/// Drives a [`DirectGenerator`].
pub struct Direct<G>(pub G);

#[async_trait]
impl<G: DirectGenerator> TableImporter for Direct<G> {
    fn table(&self) -> &'static str {
        self.0.table()
    }

    fn mode(&self) -> ImportMode {
        ImportMode::Direct
    }

    fn default_quantity(&self) -> usize {
        self.0.default_quantity()
    }

    async fn import(
        &mut self,
        ctx: &mut ImportContext<'_>,
        quantity: usize,
    ) -> Result<u64, GenerationError> {
        let table = self.0.table();
        self.0.load(ctx, quantity).await?;

        let mut written = 0;
        for index in 0..quantity {
            let Some(row) = self.0.generate(index, &mut *ctx.rng)? else {
                break;
            };
            ctx.persist(table, &row).await?;
            written += 1;
        }
        Ok(written)
    }

    async fn finalise(&mut self, ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        self.0.finalise(ctx).await
    }
}

/// Drives a [`ReferencedGenerator`], capping each reference at `quantity` rows.
pub struct ByReference<G>(pub G);

#[async_trait]
impl<G: ReferencedGenerator> TableImporter for ByReference<G> {
    fn table(&self) -> &'static str {
        self.0.table()
    }

    fn mode(&self) -> ImportMode {
        ImportMode::ByReference
    }

    fn default_quantity(&self) -> usize {
        self.0.default_quantity()
    }

    async fn import(
        &mut self,
        ctx: &mut ImportContext<'_>,
        quantity: usize,
    ) -> Result<u64, GenerationError> {
        let table = self.0.table();
        self.0.load(ctx).await?;

        let mut references = ctx.select(self.0.reference_table()).await?;
        self.0.order_references(&mut references);

        let mut written = 0;
        for reference in &references {
            self.0.set_referenced_model(reference, &mut *ctx.rng)?;
            let mut produced = 0;
            while produced < quantity {
                let Some(row) = self.0.generate(&mut *ctx.rng)? else {
                    break;
                };
                ctx.persist(table, &row).await?;
                produced += 1;
            }
            written += produced as u64;
        }
        Ok(written)
    }

    async fn finalise(&mut self, ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        self.0.finalise(ctx).await
    }
}
