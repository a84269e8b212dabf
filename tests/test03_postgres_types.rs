#![cfg(feature = "test-utils")]

use chrono::NaiveDateTime;
use pg_dbutils::prelude::*;
use pg_dbutils::test_utils::{SHARED_RUNTIME, setup_postgres_embedded, stop_postgres_embedded};
use serde_json::json;

#[test]
fn test03_column_types() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("test03_db")?;
    let config = DbConfig {
        auto_connect: true,
        ..pg.config.clone()
    };

    SHARED_RUNTIME.block_on(async move {
        let mut db = DbConnection::new(config).await?;
        db.execute_batch(
            "CREATE TABLE typed (
                small INT2, big INT8, ratio FLOAT4, score FLOAT8, flag BOOL,
                seen TIMESTAMP, day DATE, doc JSONB, raw BYTEA, label VARCHAR(20), note TEXT
            );",
        )
        .await?;

        let seen = NaiveDateTime::parse_from_str("2024-05-06 07:08:09", "%Y-%m-%d %H:%M:%S")?;
        let params = vec![
            RowValues::Int(7),
            RowValues::Int(9_000_000_000),
            RowValues::Float(0.5),
            RowValues::Float(2.25),
            RowValues::Bool(true),
            RowValues::Timestamp(seen),
            RowValues::Timestamp(seen),
            RowValues::JSON(json!({"k": [1, 2]})),
            RowValues::Blob(vec![0, 1, 254]),
            RowValues::Text("short".into()),
            RowValues::Null,
        ];
        let n = db
            .execute_update_with(
                "INSERT INTO typed VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &params,
            )
            .await?;
        assert_eq!(n, 1);

        let rs = db.execute_query("SELECT * FROM typed").await?;
        let row = &rs.results[0];
        assert_eq!(row.get("small"), Some(&RowValues::Int(7)));
        assert_eq!(row.get("big"), Some(&RowValues::Int(9_000_000_000)));
        assert_eq!(row.get("ratio"), Some(&RowValues::Float(0.5)));
        assert_eq!(row.get("score"), Some(&RowValues::Float(2.25)));
        assert_eq!(row.get("flag").and_then(RowValues::as_bool), Some(&true));
        assert_eq!(row.get("seen").and_then(RowValues::as_timestamp), Some(seen));
        assert_eq!(
            row.get("day").and_then(RowValues::as_timestamp).map(|d| d.date()),
            Some(seen.date())
        );
        assert_eq!(row.get("doc"), Some(&RowValues::JSON(json!({"k": [1, 2]}))));
        assert_eq!(row.get("raw").and_then(RowValues::as_blob), Some(&[0u8, 1, 254][..]));
        assert_eq!(row.get("label").and_then(RowValues::as_text), Some("short"));
        assert!(row.get("note").is_some_and(RowValues::is_null));

        assert_eq!(
            rs.to_json()[0]["seen"],
            json!("2024-05-06 07:08:09.000")
        );

        db.execute_update("CREATE TABLE mixed (amount FLOAT8, qty INT4)").await?;
        let n = db
            .execute_update_with(
                "INSERT INTO mixed (amount, qty) VALUES ($1, $2)",
                &[RowValues::Int(2), RowValues::Int(3)],
            )
            .await?;
        assert_eq!(n, 1);

        let err = db
            .execute_update_with(
                "INSERT INTO mixed (amount, qty) VALUES ($1, $2)",
                &[RowValues::Float(1.0), RowValues::Text("1234".into())],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbUtilsError::PostgresError(_)));

        let rs = db.execute_query("SELECT amount, qty FROM mixed").await?;
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.results[0].get("amount"), Some(&RowValues::Float(2.0)));
        assert_eq!(rs.results[0].get("qty"), Some(&RowValues::Int(3)));

        db.close().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    stop_postgres_embedded(pg);
    Ok(())
}
