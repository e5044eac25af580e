use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::SKIP_INFERENCE_TABLE;
use crate::error::{Error, Result};
use crate::schema::SchemaMap;

/// Source of registered tables and their statically declared dependencies.
pub trait TableCatalog {
    fn contains(&self, table: &str) -> bool;
    fn declared_dependencies(&self, table: &str) -> &[&'static str];
}

/// Knobs for dependency inference.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Tables whose own reference columns are not turned into edges.
    pub skip_inference: BTreeSet<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            skip_inference: BTreeSet::from([SKIP_INFERENCE_TABLE.to_string()]),
        }
    }
}

/// Table → prerequisite tables, closed over every dependency it mentions.
///
/// Tables keep the order in which they were requested, with appended
/// dependencies following in discovery order. That order breaks ties in
/// [`DependencyGraph::topo_order`].
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    tables: Vec<String>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn build(
        requested: &[String],
        schema: &SchemaMap,
        catalog: &impl TableCatalog,
        options: &ResolveOptions,
    ) -> Result<Self> {
        if let Some(unknown) = requested.iter().find(|table| !catalog.contains(table)) {
            return Err(Error::UnknownTable(unknown.clone()));
        }

        let mut seen = HashSet::new();
        let mut tables: Vec<String> = requested
            .iter()
            .filter(|table| seen.insert(table.to_string()))
            .cloned()
            .collect();
        let mut dependencies = BTreeMap::new();

        let mut cursor = 0;
        while cursor < tables.len() {
            let table = tables[cursor].clone();
            cursor += 1;

            let direct = direct_dependencies(&table, schema, catalog, options)?;
            for dependency in &direct {
                if !catalog.contains(dependency) {
                    return Err(Error::UnknownTable(dependency.clone()));
                }
                if seen.insert(dependency.clone()) {
                    tables.push(dependency.clone());
                }
            }
            dependencies.insert(table, direct);
        }

        Ok(Self {
            tables,
            dependencies,
        })
    }

    /// Tables in expansion order (requested first, then appended dependencies).
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn dependencies_of(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(table)
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(BTreeSet::len).sum()
    }

    /// Kahn's algorithm; among ready tables the earliest in expansion order wins.
    pub fn topo_order(&self) -> Result<Vec<String>> {
        let index: HashMap<&str, usize> = self
            .tables
            .iter()
            .enumerate()
            .map(|(idx, table)| (table.as_str(), idx))
            .collect();

        let mut indegree = vec![0_usize; self.tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.tables.len()];

        for (idx, table) in self.tables.iter().enumerate() {
            for dependency in self.dependencies.get(table).into_iter().flatten() {
                if let Some(&dep_idx) = index.get(dependency.as_str()) {
                    indegree[idx] += 1;
                    dependents[dep_idx].push(idx);
                }
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(idx, count)| if *count == 0 { Some(idx) } else { None })
            .collect();

        let mut order = Vec::with_capacity(self.tables.len());
        while let Some(next) = ready.pop_first() {
            order.push(self.tables[next].clone());
            for &dependent in &dependents[next] {
                indegree[dependent] = indegree[dependent].saturating_sub(1);
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == self.tables.len() {
            Ok(order)
        } else {
            let cycle = self
                .tables
                .iter()
                .zip(&indegree)
                .filter_map(|(table, count)| if *count > 0 { Some(table.clone()) } else { None })
                .collect();
            Err(Error::CyclicDependency(cycle))
        }
    }
}

/// Expand `requested` with missing dependencies and order it for population.
pub fn resolve_tables(
    requested: &[String],
    schema: &SchemaMap,
    catalog: &impl TableCatalog,
    options: &ResolveOptions,
) -> Result<Vec<String>> {
    DependencyGraph::build(requested, schema, catalog, options)?.topo_order()
}

fn direct_dependencies(
    table: &str,
    schema: &SchemaMap,
    catalog: &impl TableCatalog,
    options: &ResolveOptions,
) -> Result<BTreeSet<String>> {
    let mut direct: BTreeSet<String> = catalog
        .declared_dependencies(table)
        .iter()
        .map(|dependency| dependency.to_string())
        .collect();

    if !options.skip_inference.contains(table) {
        for (_, target) in schema.references(table)? {
            direct.insert(target);
        }
    }

    // A self reference is satisfied within the table itself.
    direct.remove(table);
    Ok(direct)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Catalog(BTreeMap<&'static str, Vec<&'static str>>);

    impl TableCatalog for Catalog {
        fn contains(&self, table: &str) -> bool {
            self.0.contains_key(table)
        }

        fn declared_dependencies(&self, table: &str) -> &[&'static str] {
            self.0.get(table).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    fn catalog(entries: &[(&'static str, &[&'static str])]) -> Catalog {
        Catalog(
            entries
                .iter()
                .map(|(table, deps)| (*table, deps.to_vec()))
                .collect(),
        )
    }

    fn schema(raw: &str) -> SchemaMap {
        SchemaMap::from_json_str(raw).expect("parse schema")
    }

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|table| table.to_string()).collect()
    }

    fn position(order: &[String], table: &str) -> usize {
        order
            .iter()
            .position(|item| item == table)
            .unwrap_or_else(|| panic!("{table} missing from order"))
    }

    const MAIL_SCHEMA: &str = r#"{"tables": {
        "emails": {"columns": {"id": {"type": "string"}}},
        "email_batches": {"columns": {"email_id": {"type": "string", "references": "emails.id"}}},
        "members": {"columns": {"id": {"type": "string"}}},
        "members_subscribe_events": {"columns": {"member_id": {"type": "string", "references": "members.id"}}},
        "email_recipients": {"columns": {
            "email_id": {"type": "string", "references": "emails.id"},
            "member_id": {"type": "string", "references": "members.id"},
            "batch_id": {"type": "string", "references": "email_batches.id"}
        }}
    }}"#;

    fn mail_catalog() -> Catalog {
        catalog(&[
            ("emails", &[]),
            ("email_batches", &[]),
            ("members", &[]),
            ("members_subscribe_events", &[]),
            ("email_recipients", &["members_subscribe_events"]),
        ])
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let schema = schema(MAIL_SCHEMA);
        let requested = names(&[
            "email_recipients",
            "email_batches",
            "members_subscribe_events",
            "emails",
            "members",
        ]);
        let order = resolve_tables(&requested, &schema, &mail_catalog(), &ResolveOptions::default())
            .expect("resolve");

        assert_eq!(order.len(), 5);
        assert!(position(&order, "emails") < position(&order, "email_batches"));
        assert!(position(&order, "email_batches") < position(&order, "email_recipients"));
        assert!(position(&order, "members") < position(&order, "members_subscribe_events"));
        assert!(
            position(&order, "members_subscribe_events") < position(&order, "email_recipients")
        );
    }

    #[test]
    fn appends_missing_dependencies_transitively() {
        let schema = schema(MAIL_SCHEMA);
        let order = resolve_tables(
            &names(&["email_recipients"]),
            &schema,
            &mail_catalog(),
            &ResolveOptions::default(),
        )
        .expect("resolve");

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            names(&[
                "email_batches",
                "email_recipients",
                "emails",
                "members",
                "members_subscribe_events",
            ])
        );
        assert_eq!(order.last().map(String::as_str), Some("email_recipients"));
    }

    #[test]
    fn ties_follow_request_order() {
        let schema = SchemaMap::default();
        let catalog = catalog(&[("tags", &[]), ("labels", &[]), ("roles", &[])]);
        let options = ResolveOptions::default();

        let first = resolve_tables(&names(&["tags", "labels", "roles"]), &schema, &catalog, &options)
            .expect("resolve");
        assert_eq!(first, names(&["tags", "labels", "roles"]));

        let second = resolve_tables(&names(&["roles", "tags", "labels"]), &schema, &catalog, &options)
            .expect("resolve");
        assert_eq!(second, names(&["roles", "tags", "labels"]));
    }

    #[test]
    fn unique_order_is_independent_of_input_order() {
        let schema = schema(MAIL_SCHEMA);
        let catalog = catalog(&[("emails", &[]), ("email_batches", &[])]);
        let options = ResolveOptions::default();

        let forward = resolve_tables(&names(&["emails", "email_batches"]), &schema, &catalog, &options)
            .expect("resolve");
        let reverse = resolve_tables(&names(&["email_batches", "emails"]), &schema, &catalog, &options)
            .expect("resolve");
        assert_eq!(forward, reverse);
        assert_eq!(forward, names(&["emails", "email_batches"]));
    }

    #[test]
    fn repeated_resolution_is_stable() {
        let schema = schema(MAIL_SCHEMA);
        let requested = names(&["email_recipients", "members"]);
        let options = ResolveOptions::default();
        let first = resolve_tables(&requested, &schema, &mail_catalog(), &options).expect("resolve");
        for _ in 0..5 {
            let again =
                resolve_tables(&requested, &schema, &mail_catalog(), &options).expect("resolve");
            assert_eq!(first, again);
        }
    }

    #[test]
    fn reports_cycles() {
        let schema = SchemaMap::default();
        let catalog = catalog(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let err = resolve_tables(&names(&["d", "a"]), &schema, &catalog, &ResolveOptions::default())
            .unwrap_err();
        match err {
            Error::CyclicDependency(tables) => assert_eq!(tables, names(&["a", "b", "c"])),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_references_do_not_form_cycles() {
        let schema = schema(
            r#"{"tables": {"comments": {"columns": {"parent_id": {"type": "string", "nullable": true, "references": "comments.id"}}}}}"#,
        );
        let catalog = catalog(&[("comments", &[])]);
        let order = resolve_tables(&names(&["comments"]), &schema, &catalog, &ResolveOptions::default())
            .expect("resolve");
        assert_eq!(order, names(&["comments"]));
    }

    #[test]
    fn unknown_requested_table_fails_fast() {
        let schema = schema(MAIL_SCHEMA);
        let err = resolve_tables(
            &names(&["emails", "webhooks"]),
            &schema,
            &mail_catalog(),
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownTable(table) if table == "webhooks"));
    }

    #[test]
    fn unregistered_inferred_dependency_is_unknown() {
        let schema = schema(MAIL_SCHEMA);
        let catalog = catalog(&[("email_batches", &[])]);
        let err = resolve_tables(
            &names(&["email_batches"]),
            &schema,
            &catalog,
            &ResolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownTable(table) if table == "emails"));
    }

    #[test]
    fn skipped_table_contributes_no_inferred_edges() {
        let schema = schema(
            r#"{"tables": {"subscriptions": {"columns": {"member_id": {"type": "string", "references": "members.id"}}}}}"#,
        );
        let catalog = catalog(&[("subscriptions", &[]), ("members", &[])]);
        let graph = DependencyGraph::build(
            &names(&["subscriptions"]),
            &schema,
            &catalog,
            &ResolveOptions::default(),
        )
        .expect("build");
        assert_eq!(graph.tables(), names(&["subscriptions"]).as_slice());
        assert_eq!(graph.edge_count(), 0);

        let graph = DependencyGraph::build(
            &names(&["subscriptions"]),
            &schema,
            &catalog,
            &ResolveOptions {
                skip_inference: BTreeSet::new(),
            },
        )
        .expect("build");
        assert_eq!(graph.tables(), names(&["subscriptions", "members"]).as_slice());
    }
}
