use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use pressgen_core::{Row, SchemaMap, row_from_json};
use pressgen_store::Transaction;

use crate::errors::GenerationError;

/// Tables a base content pack provides, in import order. They are skipped
/// by generation when a pack is loaded.
pub const BASE_PACK_TABLES: &[&str] = &[
    "users",
    "roles",
    "roles_users",
    "tags",
    "posts",
    "posts_tags",
    "posts_authors",
];

#[derive(Debug, Deserialize)]
struct PackDocument {
    data: BTreeMap<String, Vec<serde_json::Value>>,
}

/// Pre-authored rows loaded from a JSON document of the shape
/// `{"data": {"<table>": [row, ...]}}`.
#[derive(Debug, Clone)]
pub struct ContentPack {
    tables: BTreeMap<String, Vec<Row>>,
}

impl ContentPack {
    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let raw = std::fs::read_to_string(path).map_err(|err| GenerationError::ContentPackRead {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(&raw, &path.display().to_string())
    }

    /// Every table in [`BASE_PACK_TABLES`] must be present.
    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, GenerationError> {
        let read_error = |reason: String| GenerationError::ContentPackRead {
            path: origin.to_string(),
            reason,
        };
        let document: PackDocument =
            serde_json::from_str(raw).map_err(|err| read_error(err.to_string()))?;
        let mut data = document.data;

        let mut tables = BTreeMap::new();
        for table in BASE_PACK_TABLES {
            let values = data
                .remove(*table)
                .ok_or_else(|| read_error(format!("missing table '{table}'")))?;
            let rows = values
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    row_from_json(value)
                        .ok_or_else(|| read_error(format!("{table}[{index}] is not an object")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(table.to_string(), rows);
        }
        Ok(Self { tables })
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Insert the pack's rows table by table. Columns unknown to the schema
    /// are dropped. Returns the row count per table.
    pub async fn import(
        &self,
        tx: &mut dyn Transaction,
        schema: &SchemaMap,
    ) -> Result<Vec<(String, u64)>, GenerationError> {
        let mut imported = Vec::with_capacity(BASE_PACK_TABLES.len());
        for table in BASE_PACK_TABLES {
            let columns = schema.table(table).map(|schema| &schema.columns);
            let mut dropped = 0usize;
            let rows = self.rows(table);
            for row in rows {
                let row: Row = match columns {
                    Some(columns) => row
                        .iter()
                        .filter(|(column, _)| {
                            let known = columns.contains_key(*column);
                            dropped += usize::from(!known);
                            known
                        })
                        .map(|(column, value)| (column.clone(), value.clone()))
                        .collect(),
                    None => row.clone(),
                };
                tx.insert(table, &row).await?;
            }
            if dropped > 0 {
                debug!(table = %table, dropped, "content pack columns outside the schema dropped");
            }
            info!(table = %table, rows = rows.len(), "content pack table imported");
            imported.push((table.to_string(), rows.len() as u64));
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack_json(extra: &str) -> String {
        let tables: Vec<String> = BASE_PACK_TABLES
            .iter()
            .filter(|table| **table != "tags")
            .map(|table| format!("\"{table}\": []"))
            .collect();
        format!("{{\"data\": {{{}, {extra}}}}}", tables.join(", "))
    }

    #[test]
    fn loads_every_base_table() {
        let raw = pack_json(r#""tags": [{"id": "t1", "name": "News", "slug": "news"}]"#);
        let pack = ContentPack::from_json_str(&raw, "inline").expect("pack");
        assert_eq!(pack.rows("tags").len(), 1);
        assert!(pack.rows("posts").is_empty());
    }

    #[test]
    fn missing_table_is_a_read_error() {
        let raw = pack_json(r#""labels": []"#);
        let err = ContentPack::from_json_str(&raw, "inline").unwrap_err();
        match err {
            GenerationError::ContentPackRead { reason, .. } => assert!(reason.contains("tags")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_json_is_a_read_error() {
        let err = ContentPack::from_json_str("{\"data\": ", "inline").unwrap_err();
        assert!(matches!(err, GenerationError::ContentPackRead { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ContentPack::load(Path::new("/nonexistent/pack.json")).unwrap_err();
        assert!(matches!(err, GenerationError::ContentPackRead { .. }));
    }
}
