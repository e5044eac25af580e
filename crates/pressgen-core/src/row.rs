use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Number};

/// A generated or persisted record, keyed by column name.
pub type Row = BTreeMap<String, Value>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const PARSE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Column value exchanged between importers and storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Value::Text(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Booleans also arrive as 0/1 from engines without a native type.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            Value::Int(value) => Some(*value != 0),
            _ => None,
        }
    }

    /// Timestamps read back from storage are often plain text.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(value) => Some(*value),
            Value::Text(value) => parse_timestamp(value),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::Number(Number::from(*value)),
            Value::Float(value) => Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(value) => serde_json::Value::String(value.clone()),
            Value::Timestamp(value) => {
                serde_json::Value::String(value.format(TIMESTAMP_FORMAT).to_string())
            }
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => number.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(value) => Value::Text(value),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value}"),
            Value::Timestamp(value) => write!(f, "{}", value.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parse the timestamp spellings produced by JSON exports and SQL engines.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.naive_utc());
    }
    PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub fn row_to_json(row: &Row) -> serde_json::Value {
    let mut map = Map::new();
    for (column, value) in row {
        map.insert(column.clone(), value.to_json());
    }
    serde_json::Value::Object(map)
}

/// Returns `None` when the JSON value is not an object.
pub fn row_from_json(value: serde_json::Value) -> Option<Row> {
    let serde_json::Value::Object(map) = value else {
        return None;
    };
    Some(
        map.into_iter()
            .map(|(column, value)| (column, Value::from_json(value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(h, m, s))
            .expect("valid timestamp")
    }

    #[test]
    fn parses_engine_timestamp_spellings() {
        let expected = at(10, 30, 5);
        assert_eq!(parse_timestamp("2024-03-01T10:30:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 10:30:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:05.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:05+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:05+02:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn text_timestamps_read_as_timestamps() {
        let value = Value::text("2024-03-01 10:30:05");
        assert_eq!(value.as_timestamp(), Some(at(10, 30, 5)));
    }

    #[test]
    fn timestamps_survive_json() {
        let value = Value::Timestamp(at(8, 0, 0));
        let json = value.to_json();
        assert_eq!(json, serde_json::json!("2024-03-01T08:00:00.000"));
        assert_eq!(Value::from_json(json).as_timestamp(), Some(at(8, 0, 0)));
    }

    #[test]
    fn row_from_json_rejects_non_objects() {
        assert!(row_from_json(serde_json::json!([1, 2])).is_none());
        let row = row_from_json(serde_json::json!({"id": "a", "count": 3, "flag": null}))
            .expect("object row");
        assert_eq!(row.get("count"), Some(&Value::Int(3)));
        assert!(row.get("flag").is_some_and(Value::is_null));
    }
}
