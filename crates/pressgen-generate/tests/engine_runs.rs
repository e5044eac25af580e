mod common;

use std::collections::BTreeMap;
use std::path::PathBuf;

use pressgen_core::{SchemaMap, Value};
use pressgen_generate::importers::tags::TagsImporter;
use pressgen_generate::{
    Direct, GenerateOptions, GenerationEngine, GenerationError, ImportMode, ImporterRegistry,
    ImporterSpec, RunOutcome,
};
use pressgen_store::MemoryStore;

use common::{reference_time, row, text};

fn options(tables: &[&str]) -> GenerateOptions {
    GenerateOptions {
        tables: tables.iter().map(|t| t.to_string()).collect(),
        seed: Some(99),
        reference_time: Some(reference_time()),
        ..GenerateOptions::default()
    }
}

fn engine(store: &MemoryStore, options: GenerateOptions) -> GenerationEngine<MemoryStore> {
    GenerationEngine::new(store.clone(), SchemaMap::builtin().expect("schema"), options)
}

#[tokio::test]
async fn clearing_keeps_the_owner_and_its_role() {
    let store = MemoryStore::new();
    store
        .put_rows(
            "users",
            vec![
                row([("id", Value::text("1")), ("name", Value::text("Owner"))]),
                row([("id", Value::text("stale")), ("name", Value::text("Stale"))]),
            ],
        )
        .expect("users");
    store
        .put_rows(
            "roles_users",
            vec![
                row([
                    ("id", Value::text("ru-owner")),
                    ("role_id", Value::text("000000000000000000000001")),
                    ("user_id", Value::text("1")),
                ]),
                row([
                    ("id", Value::text("ru-stale")),
                    ("role_id", Value::text("000000000000000000000002")),
                    ("user_id", Value::text("stale")),
                ]),
            ],
        )
        .expect("roles_users");

    let mut options = options(&["roles_users"]);
    options.clear_before_import = true;
    options.quantities = BTreeMap::from([("users".to_string(), 2)]);

    let RunOutcome::Completed(report) = engine(&store, options).run().await.expect("run") else {
        panic!("expected a completed run");
    };
    assert_eq!(report.cleared, vec!["roles_users", "users", "roles"]);

    let users = store.rows("users").expect("users");
    assert_eq!(users.len(), 3);
    assert!(users.iter().any(|user| text(user, "id") == "1"));
    assert!(!users.iter().any(|user| text(user, "id") == "stale"));

    let roles_users = store.rows("roles_users").expect("roles_users");
    assert_eq!(roles_users.len(), 3);
    let owner_links: Vec<_> = roles_users
        .iter()
        .filter(|link| text(link, "user_id") == "1")
        .collect();
    assert_eq!(owner_links.len(), 1);
    assert_eq!(text(owner_links[0], "id"), "ru-owner");
}

#[tokio::test]
async fn failure_rolls_back_and_restores_integrity_checks() {
    let store = MemoryStore::new();
    store
        .put_rows("tags", vec![row([("id", Value::text("keep-me"))])])
        .expect("tags");

    let mut options = options(&["posts_authors"]);
    options.quantities = BTreeMap::from([("users".to_string(), 0)]);

    let err = engine(&store, options).run().await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::MissingReference { ref table, .. } if table == "users"
    ));
    assert!(store.rows("posts").expect("posts").is_empty());
    assert!(store.rows("newsletters").expect("newsletters").is_empty());
    assert_eq!(store.rows("tags").expect("tags").len(), 1);
    assert_eq!(store.integrity_check_history().expect("history"), vec![false, true]);
}

#[tokio::test]
async fn base_pack_replaces_generation_of_its_tables() {
    let store = MemoryStore::new();
    let mut options = options(&["posts_tags"]);
    options.base_pack = Some(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/base_pack.json"),
    );

    let RunOutcome::Completed(report) = engine(&store, options).run().await.expect("run") else {
        panic!("expected a completed run");
    };

    let pack_tables: Vec<&str> = report
        .tables
        .iter()
        .filter(|t| t.mode == ImportMode::BasePack)
        .map(|t| t.table.as_str())
        .collect();
    assert_eq!(
        pack_tables,
        vec!["users", "roles", "roles_users", "tags", "posts", "posts_tags", "posts_authors"]
    );
    let generated: Vec<&str> = report
        .tables
        .iter()
        .filter(|t| t.mode != ImportMode::BasePack)
        .map(|t| t.table.as_str())
        .collect();
    assert_eq!(generated, vec!["newsletters"]);

    assert_eq!(store.rows("tags").expect("tags").len(), 2);
    assert_eq!(store.rows("roles").expect("roles").len(), 2);
    assert_eq!(store.rows("newsletters").expect("newsletters").len(), 2);
    let posts = store.rows("posts").expect("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(text(&posts[0], "slug"), "welcome");
    assert!(!posts[0].contains_key("mobiledoc"));
}

#[tokio::test]
async fn missing_base_pack_fails_before_generation() {
    let store = MemoryStore::new();
    let mut options = options(&["tags"]);
    options.base_pack = Some(PathBuf::from("/nonexistent/base_pack.json"));

    let err = engine(&store, options).run().await.unwrap_err();
    assert!(matches!(err, GenerationError::ContentPackRead { .. }));
    assert!(store.rows("tags").expect("tags").is_empty());
}

#[tokio::test]
async fn unknown_tables_never_touch_storage() {
    let store = MemoryStore::new();
    let err = engine(&store, options(&["ghosts"])).run().await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(pressgen_core::Error::UnknownTable(ref table)) if table == "ghosts"
    ));

    let mut bad_quantity = options(&["tags"]);
    bad_quantity.quantities = BTreeMap::from([("ghosts".to_string(), 3)]);
    let err = engine(&store, bad_quantity).run().await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(pressgen_core::Error::UnknownTable(_))
    ));

    assert!(store.integrity_check_history().expect("history").is_empty());
}

#[tokio::test]
async fn dependency_cycles_are_reported() {
    let mut registry = ImporterRegistry::empty();
    registry.register(ImporterSpec {
        table: "alpha",
        dependencies: &["beta"],
        build: || Box::new(Direct(TagsImporter::default())),
    });
    registry.register(ImporterSpec {
        table: "beta",
        dependencies: &["alpha"],
        build: || Box::new(Direct(TagsImporter::default())),
    });

    let store = MemoryStore::new();
    let err = engine(&store, options(&["alpha"]))
        .with_registry(registry)
        .run()
        .await
        .unwrap_err();
    match err {
        GenerationError::Core(pressgen_core::Error::CyclicDependency(tables)) => {
            assert_eq!(tables, vec!["alpha", "beta"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn printing_dependencies_skips_storage() {
    let store = MemoryStore::new();
    let mut options = options(&["emails"]);
    options.print_dependencies = true;

    let RunOutcome::Dependencies(report) = engine(&store, options).run().await.expect("run")
    else {
        panic!("expected a dependency report");
    };
    let tables = report.tables();
    assert_eq!(tables.last(), Some(&"emails"));
    assert!(tables.contains(&"members_subscribe_events"));
    let position = |name: &str| tables.iter().position(|t| *t == name).expect(name);
    assert!(position("members") < position("members_newsletters"));
    assert!(report.order.iter().any(|entry| entry.table == "emails" && entry.requested));
    assert!(store.integrity_check_history().expect("history").is_empty());
}
