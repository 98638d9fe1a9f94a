#![cfg(feature = "sqlite")]

use std::sync::Arc;

use sql_runner::prelude::*;
use sql_runner::sqlite::SqliteSource;
use tempfile::TempDir;

#[tokio::test]
async fn async_executor_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("async.db").to_string_lossy().into_owned();
    let runner = AsyncQueryRunner::new(Box::new(SqliteSource::new(path)));

    runner
        .execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY AUTOINCREMENT, kind TEXT);")
        .await?;

    let mut p = QueryParameters::new();
    p.set("kind", ParamValue::Text("login".into()));
    let affected = runner
        .execute_dml("INSERT INTO events (kind) VALUES (?)", p.clone())
        .await?;
    assert_eq!(affected, 1);
    runner
        .execute_dml("INSERT INTO events (kind) VALUES (?)", p)
        .await?;

    let rows = runner
        .execute_select("SELECT kind FROM events ORDER BY id", QueryParameters::new())
        .await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("kind"), Some(&ParamValue::Text("login".into())));
    Ok(())
}

#[tokio::test]
async fn async_generic_shapes_and_batch() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("async2.db").to_string_lossy().into_owned();
    let runner = AsyncQueryRunner::new(Box::new(SqliteSource::new(path)));
    runner
        .execute_batch("CREATE TABLE t (a INTEGER);")
        .await?;

    let sets: Vec<QueryParameters> = (1..=3)
        .map(|i| {
            let mut p = QueryParameters::new();
            p.set("a", ParamValue::Int(i));
            p
        })
        .collect();
    let counts = runner.batch("INSERT INTO t (a) VALUES (?)", sets).await?;
    assert_eq!(counts, vec![1, 1, 1]);

    let total = runner
        .query(
            "SELECT SUM(a) FROM t",
            Arc::new(ScalarHandler),
            QueryParameters::new(),
        )
        .await?;
    assert_eq!(total, Some(ParamValue::Int(6)));
    Ok(())
}

#[tokio::test]
async fn async_manual_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("async3.db").to_string_lossy().into_owned();
    {
        let setup = AsyncQueryRunner::new(Box::new(SqliteSource::new(path.clone())));
        setup.execute_batch("CREATE TABLE t (a INTEGER);").await?;
    }

    let config = RunnerConfig {
        manual_mode: true,
        ..RunnerConfig::default()
    };
    let runner = AsyncQueryRunner::with_config(Box::new(SqliteSource::new(path.clone())), config);
    let mut p = QueryParameters::new();
    p.set("a", ParamValue::Int(1));
    runner
        .update("INSERT INTO t (a) VALUES (?)", Arc::new(RowCountHandler), p)
        .await?;
    runner.rollback().await?;

    let check = AsyncQueryRunner::new(Box::new(SqliteSource::new(path)));
    let count = check
        .execute_select("SELECT COUNT(*) AS n FROM t", QueryParameters::new())
        .await?;
    assert_eq!(count[0].get("n"), Some(&ParamValue::Int(0)));
    Ok(())
}
