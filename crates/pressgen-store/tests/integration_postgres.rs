use anyhow::{Context, Result};
use pressgen_store::{PostgresStore, Row, Store, Transaction, Value};
use sqlx::postgres::PgPoolOptions;
use std::env;

const FIXTURE: &[&str] = &[
    "drop table if exists pressgen_it_members",
    "create table pressgen_it_members (id text primary key, email text not null, email_count integer not null default 0, created_at timestamp not null)",
];

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

fn member(id: &str, email: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), Value::text(id));
    row.insert("email".to_string(), Value::text(email));
    row.insert(
        "created_at".to_string(),
        Value::text("2024-01-01T00:00:00.000"),
    );
    row
}

#[tokio::test]
async fn round_trips_rows_through_postgres() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to Postgres")?;

    for statement in FIXTURE {
        sqlx::query(statement).execute(&pool).await?;
    }

    let store = PostgresStore::new(pool);
    let mut tx = store.begin().await?;
    tx.set_integrity_checks(false).await?;
    tx.insert("pressgen_it_members", &member("1", "admin@example.com"))
        .await?;
    tx.insert("pressgen_it_members", &member("2", "reader@example.com"))
        .await?;

    let mut changes = Row::new();
    changes.insert("email_count".to_string(), Value::Int(3));
    tx.update("pressgen_it_members", &Value::text("2"), &changes)
        .await?;
    tx.set_integrity_checks(true).await?;
    tx.commit().await?;

    let mut tx = store.begin().await?;
    let rows = tx.select("pressgen_it_members").await?;
    assert_eq!(rows.len(), 2);
    let reader = rows
        .iter()
        .find(|row| row.get("id") == Some(&Value::text("2")))
        .context("expected reader row")?;
    assert_eq!(reader.get("email_count"), Some(&Value::Int(3)));
    assert!(
        reader
            .get("created_at")
            .and_then(Value::as_timestamp)
            .is_some()
    );

    let removed = tx
        .delete_except("pressgen_it_members", "id", &Value::text("1"))
        .await?;
    assert_eq!(removed, 1);
    tx.rollback().await?;

    let mut tx = store.begin().await?;
    assert_eq!(tx.select("pressgen_it_members").await?.len(), 2);
    tx.rollback().await?;

    Ok(())
}
