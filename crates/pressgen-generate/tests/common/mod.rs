#![allow(dead_code)]

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use pressgen_core::{Row, Value};

pub fn reference_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("reference time")
}

pub fn text(row: &Row, column: &str) -> String {
    row.get(column).map(Value::to_string).unwrap_or_default()
}

pub fn is_set(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(|value| !value.is_null())
}

pub fn int(row: &Row, column: &str) -> i64 {
    row.get(column).and_then(Value::as_i64).unwrap_or_default()
}

pub fn timestamp(row: &Row, column: &str) -> NaiveDateTime {
    row.get(column)
        .and_then(Value::as_timestamp)
        .unwrap_or_else(|| panic!("{column} is not a timestamp"))
}

pub fn id_set(rows: &[Row]) -> HashSet<String> {
    rows.iter().map(|row| text(row, "id")).collect()
}

pub fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}
