use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::error::DbUtilsError;
use crate::postgres::{Params, build_result_set_from_statement};
use crate::results::ResultSet;
use crate::transaction::{TxCommand, TxState};
use crate::types::{ConversionMode, ParamConverter, RowValues};

/// A statement prepared on a [`DbConnection`].
///
/// The server-side statement is deallocated when this value is dropped.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    stmt: Statement,
    sql: String,
}

impl PreparedStatement {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `$n` placeholders the statement expects.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.stmt.params().len()
    }

    /// Names of the columns the statement returns (empty for plain DML).
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }
}

/// A single PostgreSQL connection with manual transaction control.
///
/// ```no_run
/// use pg_dbutils::prelude::*;
///
/// # async fn demo() -> Result<(), DbUtilsError> {
/// let mut db = DbConnection::new(DbConfig::new(true, false)).await?;
/// db.execute_update("CREATE TABLE IF NOT EXISTS t (id BIGINT, name TEXT)").await?;
/// db.execute_update_with(
///     "INSERT INTO t (id, name) VALUES ($1, $2)",
///     &[RowValues::Int(1), RowValues::Text("alice".into())],
/// )
/// .await?;
/// db.commit().await?;
/// let rs = db.execute_query("SELECT name FROM t").await?;
/// assert_eq!(rs.results[0].get("name").and_then(RowValues::as_text), Some("alice"));
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct DbConnection {
    config: DbConfig,
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
    tx: TxState,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

impl DbConnection {
    /// Create the helper, connecting immediately when `config.auto_connect` is set.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` for an incomplete config, or the driver error if
    /// the immediate connect fails.
    pub async fn new(config: DbConfig) -> Result<Self, DbUtilsError> {
        config.validate()?;
        let tx = TxState::new(config.auto_commit);
        let mut conn = Self {
            config,
            client: None,
            driver: None,
            tx,
        };
        if conn.config.auto_connect {
            conn.connect().await?;
        }
        Ok(conn)
    }

    /// Open the connection, replacing any existing one.
    ///
    /// A transaction left open on the replaced connection is rolled back by the server.
    ///
    /// # Errors
    /// Returns the driver error if the connection cannot be established.
    pub async fn connect(&mut self) -> Result<(), DbUtilsError> {
        if self.client.is_some() {
            info!("replacing existing connection");
            self.disconnect().await;
        }

        info!(url = %self.config.display_url(), auto_commit = self.tx.auto_commit(), "connecting");
        let (client, connection) = self.config.to_pg_config().connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection terminated with error");
            }
        });

        self.client = Some(client);
        self.driver = Some(driver);
        self.tx.reset();
        info!("connection established");
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// The underlying driver client, if connected.
    #[must_use]
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub fn auto_commit(&self) -> bool {
        self.tx.auto_commit()
    }

    /// True while a manually controlled transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.tx.in_transaction()
    }

    /// Run an ad-hoc read and return its rows.
    ///
    /// # Errors
    /// Returns `NotConnected`, or the driver error if the statement fails.
    pub async fn execute_query(&mut self, sql: &str) -> Result<ResultSet, DbUtilsError> {
        self.execute_query_with(sql, &[]).await
    }

    /// Run an ad-hoc write (DDL or DML) and return the number of affected rows.
    ///
    /// # Errors
    /// Returns `NotConnected`, or the driver error if the statement fails.
    pub async fn execute_update(&mut self, sql: &str) -> Result<usize, DbUtilsError> {
        self.execute_update_with(sql, &[]).await
    }

    /// Parameterized read using `$1..$n` placeholders.
    ///
    /// # Errors
    /// Returns `NotConnected`, `ParameterError` on a placeholder count mismatch, or the
    /// driver error if preparing or running the statement fails.
    pub async fn execute_query_with(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, DbUtilsError> {
        let prepared = self.prepare(sql).await?;
        self.query_prepared(&prepared, params).await
    }

    /// Parameterized write using `$1..$n` placeholders.
    ///
    /// # Errors
    /// Returns `NotConnected`, `ParameterError` on a placeholder count mismatch, or the
    /// driver error if preparing or running the statement fails.
    pub async fn execute_update_with(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<usize, DbUtilsError> {
        let prepared = self.prepare(sql).await?;
        self.execute_prepared(&prepared, params).await
    }

    /// Prepare a statement for repeated execution.
    ///
    /// # Errors
    /// Returns `NotConnected`, or the driver error if the server rejects the SQL.
    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement, DbUtilsError> {
        self.begin_if_needed().await?;
        let client = self.client_ref()?;
        debug!(sql, "prepare");
        let stmt = client.prepare(sql).await?;
        Ok(PreparedStatement {
            stmt,
            sql: sql.to_string(),
        })
    }

    /// Run a prepared read.
    ///
    /// # Errors
    /// Returns `NotConnected`, `ParameterError` on a placeholder count mismatch, or the
    /// driver error.
    pub async fn query_prepared(
        &mut self,
        prepared: &PreparedStatement,
        params: &[RowValues],
    ) -> Result<ResultSet, DbUtilsError> {
        check_arity(prepared, params)?;
        self.begin_if_needed().await?;
        let client = self.client_ref()?;
        debug!(sql = prepared.sql(), params = params.len(), "query");

        let converted = Params::convert_sql_params(params, ConversionMode::Query)?;
        let rows = client.query(&prepared.stmt, converted.as_refs()).await?;
        build_result_set_from_statement(&prepared.stmt, &rows)
    }

    /// Run a prepared write and return the affected row count.
    ///
    /// # Errors
    /// Returns `NotConnected`, `ParameterError` on a placeholder count mismatch, or the
    /// driver error.
    pub async fn execute_prepared(
        &mut self,
        prepared: &PreparedStatement,
        params: &[RowValues],
    ) -> Result<usize, DbUtilsError> {
        check_arity(prepared, params)?;
        self.begin_if_needed().await?;
        let client = self.client_ref()?;
        debug!(sql = prepared.sql(), params = params.len(), "execute");

        let converted = Params::convert_sql_params(params, ConversionMode::Execute)?;
        let rows = client.execute(&prepared.stmt, converted.as_refs()).await?;
        usize::try_from(rows).map_err(|e| {
            DbUtilsError::ExecutionError(format!("Invalid rows affected count: {e}"))
        })
    }

    /// Run several `;`-separated statements in one round trip. Parameters are not supported.
    ///
    /// # Errors
    /// Returns `NotConnected`, or the driver error for the first failing statement.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), DbUtilsError> {
        self.begin_if_needed().await?;
        let client = self.client_ref()?;
        debug!(sql, "batch");
        client.batch_execute(sql).await?;
        Ok(())
    }

    /// Commit the open transaction. Does nothing if no statement ran since the last
    /// commit or rollback.
    ///
    /// # Errors
    /// Returns `TransactionError` when auto-commit is enabled, `NotConnected`, or the
    /// driver error if the commit fails. A failed commit is followed by a best-effort
    /// rollback and leaves no transaction open.
    pub async fn commit(&mut self) -> Result<(), DbUtilsError> {
        self.client_ref()?;
        let Some(command) = self.tx.commit()? else {
            return Ok(());
        };
        if let Err(err) = self.run_tx_command(command).await {
            if let Some(client) = &self.client {
                let _ = client.batch_execute(TxCommand::Rollback.sql()).await;
            }
            self.tx.reset();
            return Err(err);
        }
        Ok(())
    }

    /// Roll back the open transaction. Does nothing if no statement ran since the last
    /// commit or rollback.
    ///
    /// # Errors
    /// Returns `TransactionError` when auto-commit is enabled, `NotConnected`, or the
    /// driver error if the rollback fails.
    pub async fn rollback(&mut self) -> Result<(), DbUtilsError> {
        self.client_ref()?;
        if let Some(command) = self.tx.rollback()? {
            self.run_tx_command(command).await?;
        }
        Ok(())
    }

    /// Switch auto-commit mode. Enabling it commits any open transaction first.
    ///
    /// # Errors
    /// Returns the driver error if the pending commit fails; the mode is unchanged then.
    pub async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DbUtilsError> {
        if let Some(command) = self.tx.before_mode_change(auto_commit) {
            self.run_tx_command(command).await?;
        }
        self.tx.set_auto_commit(auto_commit);
        self.config.auto_commit = auto_commit;
        debug!(auto_commit, "auto-commit changed");
        Ok(())
    }

    /// Close the connection, rolling back an open transaction.
    ///
    /// # Errors
    /// Returns the driver error if the rollback fails; the connection is closed regardless.
    pub async fn close(mut self) -> Result<(), DbUtilsError> {
        let mut result = Ok(());
        if self.client.is_some() {
            if let Some(command) = self.tx.on_close() {
                result = self.run_tx_command(command).await;
            }
        }
        self.disconnect().await;
        info!("connection closed");
        result
    }

    async fn disconnect(&mut self) {
        self.client = None;
        self.tx.reset();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                warn!(error = %e, "postgres connection task failed");
            }
        }
    }

    fn client_ref(&self) -> Result<&Client, DbUtilsError> {
        self.client.as_ref().ok_or(DbUtilsError::NotConnected)
    }

    async fn begin_if_needed(&mut self) -> Result<(), DbUtilsError> {
        if let Some(command) = self.tx.before_statement() {
            self.run_tx_command(command).await?;
        }
        Ok(())
    }

    async fn run_tx_command(&mut self, command: TxCommand) -> Result<(), DbUtilsError> {
        let client = self.client_ref()?;
        info!(sql = command.sql(), "transaction control");
        client.batch_execute(command.sql()).await?;
        self.tx.confirm(command);
        Ok(())
    }
}

fn check_arity(prepared: &PreparedStatement, params: &[RowValues]) -> Result<(), DbUtilsError> {
    let expected = prepared.param_count();
    if expected == params.len() {
        Ok(())
    } else {
        Err(DbUtilsError::ParameterError(format!(
            "statement expects {expected} parameters, got {}",
            params.len()
        )))
    }
}
