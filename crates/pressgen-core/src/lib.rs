//! Core contracts and helpers for pressgen.
//!
//! This crate defines the declarative schema map, the row model exchanged with
//! storage, and the dependency graph that orders table population.

pub mod error;
pub mod graph;
pub mod row;
pub mod schema;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, ResolveOptions, TableCatalog, resolve_tables};
pub use row::{Row, Value, parse_timestamp, row_from_json, row_to_json};
pub use schema::{ColumnSpec, ColumnType, SchemaMap, TableSchema};

/// Table whose own reference columns are never turned into dependency edges.
pub const SKIP_INFERENCE_TABLE: &str = "subscriptions";
