//! SQL text for the PostgreSQL store.
//!
//! Rows cross the boundary as JSON so the store needs no per-table type
//! mapping: `row_to_json` on the way out, `json_populate_record` on the way in.

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn select_rows(table: &str) -> String {
    format!("select row_to_json(t)::text from {} t", quote_ident(table))
}

/// Insert the columns named in the row; other columns keep their defaults.
pub fn insert_row<'a>(table: &str, columns: impl IntoIterator<Item = &'a str>) -> String {
    let columns: Vec<String> = columns.into_iter().map(quote_ident).collect();
    let list = columns.join(", ");
    format!(
        "insert into {table} ({list}) select {list} from json_populate_record(null::{table}, $1::json)",
        table = quote_ident(table),
    )
}

pub fn update_row<'a>(table: &str, columns: impl IntoIterator<Item = &'a str>) -> String {
    let quoted = quote_ident(table);
    let assignments: Vec<String> = columns
        .into_iter()
        .map(|column| {
            let column = quote_ident(column);
            format!("{column} = r.{column}")
        })
        .collect();
    format!(
        "update {quoted} set {} from json_populate_record(null::{quoted}, $1::json) r where {quoted}.\"id\"::text = $2",
        assignments.join(", "),
    )
}

pub fn delete_all(table: &str) -> String {
    format!("delete from {}", quote_ident(table))
}

pub fn delete_except(table: &str, column: &str) -> String {
    format!(
        "delete from {} where {}::text is distinct from $1",
        quote_ident(table),
        quote_ident(column)
    )
}

/// `replica` skips triggers, which is where PostgreSQL enforces foreign keys.
pub fn integrity_checks(enabled: bool) -> &'static str {
    if enabled {
        "set local session_replication_role = default"
    } else {
        "set local session_replication_role = replica"
    }
}
