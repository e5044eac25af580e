use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUILTIN_SCHEMA: &str = include_str!("../schema/platform.json");

/// Declarative map of table → column → column spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaMap {
    pub tables: BTreeMap<String, TableSchema>,
}

/// Columns of a single table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnSpec>,
}

/// Column metadata used for dependency inference and row checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    /// Foreign key annotation in the form `table.column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl SchemaMap {
    /// The schema of the platform tables that ship with pressgen.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_SCHEMA)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|schema| schema.columns.contains_key(column))
    }

    /// Referenced tables of `table`, one entry per annotated column.
    pub fn references(&self, table: &str) -> Result<Vec<(String, String)>> {
        let Some(schema) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut references = Vec::new();
        for (column, spec) in &schema.columns {
            let Some(reference) = spec.references.as_deref() else {
                continue;
            };
            let (target, target_column) =
                reference
                    .split_once('.')
                    .ok_or_else(|| Error::InvalidReference {
                        table: table.to_string(),
                        column: column.clone(),
                        reference: reference.to_string(),
                    })?;
            if target.is_empty() || target_column.is_empty() {
                return Err(Error::InvalidReference {
                    table: table.to_string(),
                    column: column.clone(),
                    reference: reference.to_string(),
                });
            }
            references.push((column.clone(), target.to_string()));
        }
        Ok(references)
    }
}
