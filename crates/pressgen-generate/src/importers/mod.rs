//! Built-in importers for the platform tables.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use pressgen_core::{Row, Value};

use crate::errors::GenerationError;

pub mod email_batches;
pub mod email_recipients;
pub mod emails;
pub mod labels;
pub mod members;
pub mod members_labels;
pub mod members_newsletters;
pub mod members_subscribe_events;
pub mod newsletters;
pub mod posts;
pub mod posts_authors;
pub mod posts_tags;
pub mod roles;
pub mod roles_users;
pub mod tags;
pub mod users;

pub(crate) fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

pub(crate) fn text_column(row: &Row, table: &str, column: &str) -> Result<String, GenerationError> {
    match row.get(column) {
        Some(Value::Null) | None => Err(GenerationError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }),
        Some(value) => Ok(value.to_string()),
    }
}

pub(crate) fn timestamp_column(
    row: &Row,
    table: &str,
    column: &str,
) -> Result<NaiveDateTime, GenerationError> {
    row.get(column)
        .and_then(Value::as_timestamp)
        .ok_or_else(|| GenerationError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

pub(crate) fn optional_text(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .filter(|value| !value.is_null())
        .map(Value::to_string)
}

pub(crate) fn ids(rows: &[Row], table: &str) -> Result<Vec<String>, GenerationError> {
    rows.iter().map(|row| text_column(row, table, "id")).collect()
}

pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("item");
    }
    slug
}

/// Hands out slugs that are unique within one table.
#[derive(Debug, Default)]
pub(crate) struct SlugSet {
    taken: HashSet<String>,
}

impl SlugSet {
    pub fn extend_existing(&mut self, rows: &[Row]) {
        self.taken
            .extend(rows.iter().filter_map(|row| optional_text(row, "slug")));
    }

    pub fn claim(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("!!!"), "item");
    }

    #[test]
    fn slug_set_suffixes_duplicates() {
        let mut slugs = SlugSet::default();
        slugs.extend_existing(&[row([("slug", Value::text("news"))])]);
        assert_eq!(slugs.claim("News"), "news-2");
        assert_eq!(slugs.claim("News"), "news-3");
        assert_eq!(slugs.claim("Sports"), "sports");
    }

    #[test]
    fn text_column_rejects_null() {
        let row = row([("id", Value::Null)]);
        assert!(matches!(
            text_column(&row, "posts", "id"),
            Err(GenerationError::MissingColumn { .. })
        ));
    }
}
