#![cfg(feature = "test-utils")]

use std::io::Write;

use pg_dbutils::cli::{Command, run};
use pg_dbutils::prelude::*;
use pg_dbutils::test_utils::{SHARED_RUNTIME, setup_postgres_embedded, stop_postgres_embedded};
use serde_json::json;

async fn count(config: &DbConfig) -> Result<i64, DbUtilsError> {
    let mut db = DbConnection::new(config.clone()).await?;
    let rs = db.execute_query("SELECT count(*) AS n FROM accounts").await?;
    db.close().await?;
    Ok(*rs.results[0].get("n").and_then(RowValues::as_int).unwrap_or(&-1))
}

#[test]
fn test04_cli_manual_commit() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("test04_db")?;
    let observer = DbConfig {
        auto_connect: true,
        ..pg.config.clone()
    };
    let manual = DbConfig {
        auto_connect: true,
        auto_commit: false,
        ..pg.config.clone()
    };

    let mut script = tempfile::NamedTempFile::new()?;
    writeln!(
        script,
        "INSERT INTO accounts VALUES (2, 'carol');\nINSERT INTO accounts VALUES (1, 'dup');"
    )?;

    SHARED_RUNTIME.block_on(async move {
        let mut setup = DbConnection::new(observer.clone()).await?;
        setup
            .execute_update("CREATE TABLE accounts (id BIGINT PRIMARY KEY, name TEXT)")
            .await?;
        setup.close().await?;

        let insert = Command::Update {
            sql: "INSERT INTO accounts VALUES ($1, $2)".into(),
            params: vec!["1".into(), "alice".into()],
        };
        let out = run(manual.clone(), &insert, false).await?;
        assert_eq!(out, "1");
        assert_eq!(count(&observer).await?, 1, "row committed after the command");

        // the second statement violates the key, so the first is rolled back too
        let batch = Command::Batch {
            file: script.path().to_path_buf(),
        };
        assert!(run(manual.clone(), &batch, false).await.is_err());
        assert_eq!(count(&observer).await?, 1);

        let query = Command::Query {
            sql: "SELECT id, name FROM accounts WHERE id = $1".into(),
            params: vec!["1".into()],
        };
        let out = run(manual, &query, false).await?;
        let rows: serde_json::Value = serde_json::from_str(&out)?;
        assert_eq!(rows, json!([{"id": 1, "name": "alice"}]));

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    stop_postgres_embedded(pg);
    Ok(())
}
