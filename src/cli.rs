//! Command-line front end used by the `dbutils` binary.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::DbConfig;
use crate::connection::DbConnection;
use crate::error::DbUtilsError;
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "dbutils", author, version, about = "Run SQL against a PostgreSQL database")]
pub struct Args {
    /// Connection URL (postgres://, postgresql:// or jdbc:postgresql://); overrides DBUTILS_URL
    #[arg(long, global = true)]
    pub url: Option<String>,
    #[arg(long, global = true)]
    pub user: Option<String>,
    #[arg(long, global = true)]
    pub password: Option<String>,
    /// Run the command in a transaction: commit on success, roll back on failure
    #[arg(long, global = true)]
    pub no_auto_commit: bool,
    #[arg(long, global = true, value_enum, default_value = "compact")]
    pub log_format: LogFormat,
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a read and print the rows as JSON
    Query {
        sql: String,
        /// Positional parameter as a JSON literal, bound to $1, $2, ... in order
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Run a write and print the affected row count
    Update {
        sql: String,
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Run every statement in a SQL script
    Batch { file: PathBuf },
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::Query { .. } => "query",
            Command::Update { .. } => "update",
            Command::Batch { .. } => "batch",
        }
    }
}

/// Resolved settings as logged at startup. The password is left out.
#[derive(Debug, Clone, Serialize)]
pub struct CliSettings {
    pub url: String,
    pub auto_commit: bool,
    pub application_name: Option<String>,
    pub command: &'static str,
    pub log_format: LogFormat,
    pub pretty: bool,
}

impl Args {
    /// Resolve the connection config from the process environment plus flags.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` for a malformed URL or auto-commit value.
    pub fn to_config(&self) -> Result<DbConfig, DbUtilsError> {
        self.to_config_with(|key| std::env::var(key).ok())
    }

    /// Resolve the connection config from `lookup` plus flags; flags win.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` for a malformed URL or auto-commit value.
    pub fn to_config_with<F>(&self, lookup: F) -> Result<DbConfig, DbUtilsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DbConfig::from_lookup(lookup)?;
        if let Some(url) = &self.url {
            config.apply_url(url)?;
        }
        if let Some(user) = &self.user {
            config.user.clone_from(user);
        }
        if let Some(password) = &self.password {
            config.password.clone_from(password);
        }
        if self.no_auto_commit {
            config.auto_commit = false;
        }
        config.auto_connect = true;
        config
            .application_name
            .get_or_insert_with(|| "dbutils".to_string());
        Ok(config)
    }

    #[must_use]
    pub fn settings(&self, config: &DbConfig) -> CliSettings {
        CliSettings {
            url: config.display_url(),
            auto_commit: config.auto_commit,
            application_name: config.application_name.clone(),
            command: self.command.name(),
            log_format: self.log_format,
            pretty: self.pretty,
        }
    }
}

/// Parse `--param` values. Anything that is not valid JSON is bound as text.
#[must_use]
pub fn parse_params(raw: &[String]) -> Vec<RowValues> {
    raw.iter()
        .map(|p| match serde_json::from_str(p) {
            Ok(value) => RowValues::from_json(value),
            Err(_) => RowValues::Text(p.clone()),
        })
        .collect()
}

fn render(value: &serde_json::Value, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

async fn execute(
    db: &mut DbConnection,
    command: &Command,
    script: Option<&str>,
    pretty: bool,
) -> Result<String, Box<dyn Error>> {
    match command {
        Command::Query { sql, params } => {
            let rs = db.execute_query_with(sql, &parse_params(params)).await?;
            Ok(render(&rs.to_json(), pretty)?)
        }
        Command::Update { sql, params } => {
            let count = db.execute_update_with(sql, &parse_params(params)).await?;
            Ok(count.to_string())
        }
        Command::Batch { .. } => {
            db.execute_batch(script.unwrap_or_default()).await?;
            Ok("ok".to_string())
        }
    }
}

/// Connect with `config`, run `command` and return what it prints.
///
/// With auto-commit off the command's transaction is committed on success and rolled
/// back on failure.
///
/// # Errors
/// Returns the connection, statement or commit error, or an I/O error reading a batch script.
pub async fn run(
    config: DbConfig,
    command: &Command,
    pretty: bool,
) -> Result<String, Box<dyn Error>> {
    let script = match command {
        Command::Batch { file } => Some(std::fs::read_to_string(file)?),
        _ => None,
    };

    let mut db = DbConnection::new(config).await?;
    let mut outcome = execute(&mut db, command, script.as_deref(), pretty).await;

    if !db.auto_commit() {
        match &outcome {
            Ok(_) => {
                if let Err(e) = db.commit().await {
                    outcome = Err(e.into());
                }
            }
            Err(_) => {
                if let Err(e) = db.rollback().await {
                    warn!(error = %e, "rollback after failed command");
                }
            }
        }
    }
    db.close().await?;

    outcome
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pg_dbutils=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}
