use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use pressgen_core::DependencyGraph;

/// Options for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Tables to generate. Empty means every registered table.
    pub tables: Vec<String>,
    /// Remove existing rows of the resolved tables before generating.
    pub clear_before_import: bool,
    /// Base content pack imported before generation.
    pub base_pack: Option<PathBuf>,
    /// Per-table quantity overrides.
    pub quantities: BTreeMap<String, usize>,
    /// Seed for every random draw of the run.
    pub seed: Option<u64>,
    /// Resolve and report the dependency order without touching storage.
    pub print_dependencies: bool,
    /// Clock used by every importer. Defaults to the current time.
    pub reference_time: Option<NaiveDateTime>,
}

/// How a table's rows were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Direct,
    ByReference,
    BasePack,
}

/// Summary of one imported table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub mode: ImportMode,
    pub rows_requested: u64,
    pub rows_generated: u64,
    #[serde(default)]
    pub rows_finalised: u64,
    pub duration_ms: u64,
}

/// Report for a committed generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub reference_time: NaiveDateTime,
    pub cleared: Vec<String>,
    pub tables: Vec<TableReport>,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: u64, reference_time: NaiveDateTime) -> Self {
        Self {
            run_id,
            seed,
            reference_time,
            cleared: Vec::new(),
            tables: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn table(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|report| report.table == table)
    }

    pub fn table_mut(&mut self, table: &str) -> Option<&mut TableReport> {
        self.tables.iter_mut().find(|report| report.table == table)
    }

    pub fn rows_generated(&self) -> u64 {
        self.tables.iter().map(|report| report.rows_generated).sum()
    }
}

/// One table of a resolved run, in import order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub table: String,
    pub requested: bool,
    pub dependencies: Vec<String>,
}

/// Resolved import order, produced by a dependency-printing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub order: Vec<DependencyEntry>,
}

impl DependencyReport {
    pub fn from_graph(graph: &DependencyGraph, order: &[String], requested: &[String]) -> Self {
        let order = order
            .iter()
            .map(|table| DependencyEntry {
                table: table.clone(),
                requested: requested.iter().any(|name| name == table),
                dependencies: graph
                    .dependencies_of(table)
                    .map(|deps| deps.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        Self { order }
    }

    pub fn tables(&self) -> Vec<&str> {
        self.order.iter().map(|entry| entry.table.as_str()).collect()
    }
}

/// Result of [`crate::GenerationEngine::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Dependency order only; storage was not touched.
    Dependencies(DependencyReport),
    /// Rows were generated and committed.
    Completed(GenerationReport),
}
