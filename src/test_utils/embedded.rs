use postgresql_embedded::PostgreSQL;

use super::SHARED_RUNTIME;
use crate::config::DbConfig;
use crate::connection::DbConnection;

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
    /// Connection parameters for the provisioned database, with `auto_connect` off.
    pub config: DbConfig,
}

/// Start an embedded `PostgreSQL` server and create `dbname` on it.
///
/// The returned config carries the server's real host, port and credentials.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, if creating the database
/// fails, or if the post-start connectivity check fails.
pub fn setup_postgres_embedded(
    dbname: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();
        postgresql.setup().await?;
        postgresql.start().await?;

        let settings = postgresql.settings();
        let port = settings.port;
        let host = settings.host.clone();
        let user = settings.username.clone();
        let password = settings.password.clone();

        postgresql.create_database(dbname).await?;

        let database_url = format!("postgres://{user}:{password}@{host}:{port}/{dbname}");

        let config = DbConfig {
            host,
            port,
            dbname: dbname.to_string(),
            user,
            password,
            auto_connect: false,
            auto_commit: true,
            application_name: Some("pg-dbutils-tests".to_string()),
            connect_timeout: None,
        };

        let mut check = DbConnection::new(DbConfig {
            auto_connect: true,
            ..config.clone()
        })
        .await?;
        check.execute_query("SELECT 1").await?;
        check.close().await?;
        tracing::info!(port, "embedded postgres ready");

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            database_url,
            config,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
