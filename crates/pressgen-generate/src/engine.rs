use std::fmt;
use std::time::Instant;

use chrono::{NaiveDateTime, NaiveTime, Timelike, Utc};
use tracing::{debug, info, warn};

use pressgen_core::{DependencyGraph, ResolveOptions, SchemaMap, TableCatalog, Value};
use pressgen_store::{Store, Transaction};

use crate::content_pack::{BASE_PACK_TABLES, ContentPack};
use crate::errors::GenerationError;
use crate::importer::ImportContext;
use crate::model::{
    DependencyReport, GenerateOptions, GenerationReport, ImportMode, RunOutcome, TableReport,
};
use crate::random::RunRandom;
use crate::registry::ImporterRegistry;

/// A row that survives clearing: rows of `table` whose `column` equals `keep`.
#[derive(Debug, Clone, Copy)]
pub struct ProtectedRow {
    pub table: &'static str,
    pub column: &'static str,
    pub keep: &'static str,
}

/// The site owner and its role assignment are never cleared.
pub const PROTECTED_ROWS: &[ProtectedRow] = &[
    ProtectedRow {
        table: "users",
        column: "id",
        keep: "1",
    },
    ProtectedRow {
        table: "roles_users",
        column: "user_id",
        keep: "1",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Resolving,
    ClearingData,
    ImportingBasePack,
    Generating,
    Finalising,
    Committed,
    RolledBack,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Resolving => "resolving",
            RunState::ClearingData => "clearing_data",
            RunState::ImportingBasePack => "importing_base_pack",
            RunState::Generating => "generating",
            RunState::Finalising => "finalising",
            RunState::Committed => "committed",
            RunState::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

fn enter(run_id: &str, state: RunState) {
    debug!(run_id = %run_id, state = %state, "run state changed");
}

/// Runs importers in dependency order inside one storage transaction.
pub struct GenerationEngine<S> {
    store: S,
    schema: SchemaMap,
    registry: ImporterRegistry,
    resolve: ResolveOptions,
    options: GenerateOptions,
}

impl<S: Store> GenerationEngine<S> {
    pub fn new(store: S, schema: SchemaMap, options: GenerateOptions) -> Self {
        Self {
            store,
            schema,
            registry: ImporterRegistry::new(),
            resolve: ResolveOptions::default(),
            options,
        }
    }

    pub fn with_registry(mut self, registry: ImporterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolve_options(mut self, resolve: ResolveOptions) -> Self {
        self.resolve = resolve;
        self
    }

    pub fn registry(&self) -> &ImporterRegistry {
        &self.registry
    }

    pub async fn run(&self) -> Result<RunOutcome, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        enter(&run_id, RunState::Resolving);

        let requested = if self.options.tables.is_empty() {
            self.registry.tables()
        } else {
            self.options.tables.clone()
        };
        if let Some(unknown) = self
            .options
            .quantities
            .keys()
            .find(|table| !self.registry.contains(table))
        {
            return Err(pressgen_core::Error::UnknownTable(unknown.clone()).into());
        }

        let graph =
            DependencyGraph::build(&requested, &self.schema, &self.registry, &self.resolve)?;
        let order = graph.topo_order()?;
        info!(
            run_id = %run_id,
            requested = requested.len(),
            resolved = order.len(),
            edges = graph.edge_count(),
            "tables resolved"
        );

        if self.options.print_dependencies {
            let report = DependencyReport::from_graph(&graph, &order, &requested);
            for entry in &report.order {
                info!(table = %entry.table, dependencies = ?entry.dependencies, "import order");
            }
            return Ok(RunOutcome::Dependencies(report));
        }

        let random = RunRandom::new(self.options.seed);
        let now = self
            .options
            .reference_time
            .unwrap_or_else(|| default_reference_time(random.is_explicit()));
        info!(
            run_id = %run_id,
            engine = self.store.engine(),
            seed = random.seed(),
            seeded = random.is_explicit(),
            reference_time = %now,
            tables = order.len(),
            "generation started"
        );

        let mut report = GenerationReport::new(run_id.clone(), random.seed(), now);
        let mut tx = self.store.begin().await?;

        let outcome = match tx.set_integrity_checks(false).await {
            Ok(()) => {
                let populated = self
                    .populate(&mut *tx, &order, &random, now, &mut report)
                    .await;
                let restored = tx.set_integrity_checks(true).await;
                match (populated, restored) {
                    (Ok(()), Ok(())) => Ok(()),
                    (Err(err), _) => Err(err),
                    (Ok(()), Err(err)) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        };

        if let Err(err) = outcome {
            warn!(run_id = %run_id, error = %err, "generation failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(run_id = %run_id, error = %rollback_err, "rollback failed");
            }
            enter(&run_id, RunState::RolledBack);
            return Err(err);
        }

        tx.commit().await?;
        enter(&run_id, RunState::Committed);
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            rows = report.rows_generated(),
            duration_ms = report.duration_ms,
            "generation committed"
        );
        Ok(RunOutcome::Completed(report))
    }

    async fn populate(
        &self,
        tx: &mut dyn Transaction,
        order: &[String],
        random: &RunRandom,
        now: NaiveDateTime,
        report: &mut GenerationReport,
    ) -> Result<(), GenerationError> {
        let run_id = report.run_id.clone();

        if self.options.clear_before_import {
            enter(&run_id, RunState::ClearingData);
            self.clear(tx, order, report).await?;
        }

        let mut pending: Vec<&String> = order.iter().collect();
        if let Some(path) = &self.options.base_pack {
            enter(&run_id, RunState::ImportingBasePack);
            let pack_start = Instant::now();
            let pack = ContentPack::load(path)?;
            for (table, rows) in pack.import(tx, &self.schema).await? {
                report.tables.push(TableReport {
                    table,
                    mode: ImportMode::BasePack,
                    rows_requested: rows,
                    rows_generated: rows,
                    rows_finalised: 0,
                    duration_ms: pack_start.elapsed().as_millis() as u64,
                });
            }
            pending.retain(|table| !BASE_PACK_TABLES.contains(&table.as_str()));
        }

        enter(&run_id, RunState::Generating);
        for table in &pending {
            let table_start = Instant::now();
            let mut importer = self.registry.create(table)?;
            let quantity = self
                .options
                .quantities
                .get(table.as_str())
                .copied()
                .unwrap_or_else(|| importer.default_quantity());
            info!(table = %table, mode = ?importer.mode(), quantity, "importing table");

            let mut rng = random.table_rng();
            let mut ctx = ImportContext {
                tx: &mut *tx,
                rng: &mut rng,
                schema: &self.schema,
                now,
            };
            let rows = importer.import(&mut ctx, quantity).await?;
            debug!(table = %table, rows, "table imported");

            report.tables.push(TableReport {
                table: table.to_string(),
                mode: importer.mode(),
                rows_requested: quantity as u64,
                rows_generated: rows,
                rows_finalised: 0,
                duration_ms: table_start.elapsed().as_millis() as u64,
            });
        }

        enter(&run_id, RunState::Finalising);
        for table in &pending {
            let mut importer = self.registry.create(table)?;
            let mut rng = random.table_rng();
            let mut ctx = ImportContext {
                tx: &mut *tx,
                rng: &mut rng,
                schema: &self.schema,
                now,
            };
            let touched = importer.finalise(&mut ctx).await?;
            if touched > 0 {
                info!(table = %table, rows = touched, "table finalised");
            }
            if let Some(entry) = report.table_mut(table) {
                entry.rows_finalised = touched;
            }
        }
        Ok(())
    }

    /// Empty the resolved tables, dependents first, sparing protected rows.
    async fn clear(
        &self,
        tx: &mut dyn Transaction,
        order: &[String],
        report: &mut GenerationReport,
    ) -> Result<(), GenerationError> {
        for table in order.iter().rev() {
            match PROTECTED_ROWS.iter().find(|protected| protected.table == table.as_str()) {
                Some(protected) => {
                    let removed = tx
                        .delete_except(table, protected.column, &Value::text(protected.keep))
                        .await?;
                    info!(table = %table, removed, kept = protected.keep, "table cleared");
                }
                None => {
                    tx.truncate(table).await?;
                    info!(table = %table, "table cleared");
                }
            }
            report.cleared.push(table.clone());
        }
        Ok(())
    }
}

/// Seeded runs pin the clock to the start of the current UTC day so that
/// repeated runs on the same day produce identical rows.
fn default_reference_time(seeded: bool) -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    if seeded {
        now.date().and_time(NaiveTime::MIN)
    } else {
        now.with_nanosecond(0).unwrap_or(now)
    }
}
