#![cfg(feature = "test-utils")]

use pg_dbutils::prelude::*;
use pg_dbutils::test_utils::{SHARED_RUNTIME, setup_postgres_embedded, stop_postgres_embedded};

async fn count(db: &mut DbConnection) -> Result<i64, DbUtilsError> {
    let rs = db.execute_query("SELECT count(*) AS n FROM ledger").await?;
    Ok(*rs.results[0].get("n").and_then(RowValues::as_int).unwrap_or(&-1))
}

#[test]
fn test02_manual_commit_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("test02_db")?;
    let config = pg.config.clone();

    SHARED_RUNTIME.block_on(async move {
        let mut setup = DbConnection::new(DbConfig {
            auto_connect: true,
            ..config.clone()
        })
        .await?;
        setup
            .execute_update("CREATE TABLE ledger (id BIGINT, amount FLOAT8)")
            .await?;

        let mut db = DbConnection::new(DbConfig {
            auto_connect: true,
            auto_commit: false,
            ..config.clone()
        })
        .await?;
        assert!(!db.in_transaction());

        // nothing to commit yet
        db.commit().await?;

        db.execute_update_with(
            "INSERT INTO ledger VALUES ($1, $2)",
            &[RowValues::Int(1), RowValues::Float(9.5)],
        )
        .await?;
        assert!(db.in_transaction());
        assert_eq!(count(&mut setup).await?, 0, "uncommitted row is invisible elsewhere");
        assert_eq!(count(&mut db).await?, 1);

        db.commit().await?;
        assert!(!db.in_transaction());
        assert_eq!(count(&mut setup).await?, 1);

        db.execute_update("INSERT INTO ledger VALUES (2, 1.0)").await?;
        db.rollback().await?;
        assert!(!db.in_transaction());
        assert_eq!(count(&mut db).await?, 1);
        db.commit().await?;

        // switching to auto-commit commits pending work
        db.execute_update("INSERT INTO ledger VALUES (3, 2.0)").await?;
        db.set_auto_commit(true).await?;
        assert!(!db.in_transaction());
        assert_eq!(count(&mut setup).await?, 2);
        assert!(db.rollback().await.is_err());

        // closing with an open transaction discards it
        db.set_auto_commit(false).await?;
        db.execute_update("INSERT INTO ledger VALUES (4, 3.0)").await?;
        db.close().await?;
        assert_eq!(count(&mut setup).await?, 2);

        setup.close().await?;
        Ok::<(), DbUtilsError>(())
    })?;

    stop_postgres_embedded(pg);
    Ok(())
}

#[test]
fn test02_failed_statement_needs_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("test02_abort_db")?;
    let config = DbConfig {
        auto_connect: true,
        auto_commit: false,
        ..pg.config.clone()
    };

    SHARED_RUNTIME.block_on(async move {
        let mut db = DbConnection::new(config).await?;
        db.execute_update("CREATE TABLE ledger (id BIGINT PRIMARY KEY)").await?;
        db.commit().await?;

        db.execute_update("INSERT INTO ledger VALUES (1)").await?;
        let dup = db.execute_update("INSERT INTO ledger VALUES (1)").await;
        assert!(matches!(dup, Err(DbUtilsError::PostgresError(_))));

        // the server refuses further statements until the transaction ends
        assert!(db.execute_query("SELECT 1").await.is_err());
        db.rollback().await?;

        assert_eq!(count(&mut db).await?, 0);
        db.close().await?;
        Ok::<(), DbUtilsError>(())
    })?;

    stop_postgres_embedded(pg);
    Ok(())
}

#[test]
fn test02_failed_commit_resets_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("test02_commit_db")?;
    let config = DbConfig {
        auto_connect: true,
        auto_commit: false,
        ..pg.config.clone()
    };

    SHARED_RUNTIME.block_on(async move {
        let mut db = DbConnection::new(config).await?;
        db.execute_update(
            "CREATE TABLE ledger (id BIGINT, \
             CONSTRAINT ledger_id_key UNIQUE (id) DEFERRABLE INITIALLY DEFERRED)",
        )
        .await?;
        db.commit().await?;

        // the duplicate is only detected at COMMIT
        db.execute_update("INSERT INTO ledger VALUES (1)").await?;
        db.execute_update("INSERT INTO ledger VALUES (1)").await?;
        assert!(db.in_transaction());

        let err = db.commit().await.unwrap_err();
        assert!(matches!(err, DbUtilsError::PostgresError(_)));
        assert!(!db.in_transaction());

        assert_eq!(count(&mut db).await?, 0);
        db.execute_update("INSERT INTO ledger VALUES (2)").await?;
        db.commit().await?;
        assert_eq!(count(&mut db).await?, 1);

        db.close().await?;
        Ok::<(), DbUtilsError>(())
    })?;

    stop_postgres_embedded(pg);
    Ok(())
}
