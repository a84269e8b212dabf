use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio_postgres::config::Host;

use crate::error::DbUtilsError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DBNAME: &str = "postgres";
pub const DEFAULT_USER: &str = "user";
pub const DEFAULT_PASSWORD: &str = "user";

pub const ENV_URL: &str = "DBUTILS_URL";
pub const ENV_USER: &str = "DBUTILS_USER";
pub const ENV_PASSWORD: &str = "DBUTILS_PASSWORD";
pub const ENV_AUTO_COMMIT: &str = "DBUTILS_AUTO_COMMIT";

const JDBC_PREFIX: &str = "jdbc:";

/// Connection parameters plus the two behavioral switches of [`DbConnection`].
///
/// The defaults point at a local development database; override them with
/// [`DbConfig::from_url`], [`DbConfig::from_env`] or by setting fields directly.
///
/// [`DbConnection`]: crate::DbConnection
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Connect as part of `DbConnection::new`.
    pub auto_connect: bool,
    /// Run every statement in its own implicit transaction.
    pub auto_commit: bool,
    pub application_name: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dbname: DEFAULT_DBNAME.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            auto_connect: true,
            auto_commit: true,
            application_name: None,
            connect_timeout: None,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("auto_connect", &self.auto_connect)
            .field("auto_commit", &self.auto_commit)
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl DbConfig {
    /// Default connection parameters with the given switches.
    #[must_use]
    pub fn new(auto_connect: bool, auto_commit: bool) -> Self {
        Self {
            auto_connect,
            auto_commit,
            ..Self::default()
        }
    }

    /// Parse a connection URL on top of the defaults.
    ///
    /// Accepts `postgres://`, `postgresql://` and `jdbc:postgresql://` URLs as well as
    /// libpq `key=value` strings. Components the URL leaves out keep their default value.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` if the URL cannot be parsed.
    pub fn from_url(url: &str) -> Result<Self, DbUtilsError> {
        let mut config = Self::default();
        config.apply_url(url)?;
        Ok(config)
    }

    /// Defaults overridden by `DBUTILS_*` environment variables.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` if `DBUTILS_URL` or `DBUTILS_AUTO_COMMIT` is malformed.
    pub fn from_env() -> Result<Self, DbUtilsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-supplied variable source.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` if the URL or auto-commit value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbUtilsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.apply_url(&url)?;
        }
        if let Some(user) = lookup(ENV_USER) {
            config.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.password = password;
        }
        if let Some(flag) = lookup(ENV_AUTO_COMMIT) {
            config.auto_commit = parse_flag(ENV_AUTO_COMMIT, &flag)?;
        }
        Ok(config)
    }

    /// Overwrite the fields present in `url`.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` if the URL cannot be parsed.
    pub fn apply_url(&mut self, url: &str) -> Result<(), DbUtilsError> {
        let trimmed = url.trim();
        let url = trimmed.strip_prefix(JDBC_PREFIX).unwrap_or(trimmed);
        let parsed = tokio_postgres::Config::from_str(url)
            .map_err(|e| DbUtilsError::ConfigError(format!("invalid connection url: {e}")))?;

        if let Some(host) = parsed.get_hosts().iter().find_map(|h| match h {
            Host::Tcp(name) => Some(name.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        }) {
            self.host = host;
        }
        if let Some(port) = parsed.get_ports().first() {
            self.port = *port;
        }
        if let Some(dbname) = parsed.get_dbname() {
            self.dbname = dbname.to_string();
        }
        if let Some(user) = parsed.get_user() {
            self.user = user.to_string();
        }
        if let Some(password) = parsed.get_password() {
            self.password = String::from_utf8(password.to_vec()).map_err(|_| {
                DbUtilsError::ConfigError("password is not valid UTF-8".to_string())
            })?;
        }
        if let Some(name) = parsed.get_application_name() {
            self.application_name = Some(name.to_string());
        }
        if let Some(timeout) = parsed.get_connect_timeout() {
            self.connect_timeout = Some(*timeout);
        }
        Ok(())
    }

    /// Check that every required connection field is present.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` naming the first missing field.
    pub fn validate(&self) -> Result<(), DbUtilsError> {
        if self.host.trim().is_empty() {
            return Err(DbUtilsError::ConfigError("host is required".to_string()));
        }
        if self.port == 0 {
            return Err(DbUtilsError::ConfigError("port is required".to_string()));
        }
        if self.dbname.trim().is_empty() {
            return Err(DbUtilsError::ConfigError("dbname is required".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(DbUtilsError::ConfigError("user is required".to_string()));
        }
        Ok(())
    }

    /// Build the driver configuration.
    #[must_use]
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password);
        if let Some(name) = &self.application_name {
            pg.application_name(name);
        }
        if let Some(timeout) = self.connect_timeout {
            pg.connect_timeout(timeout);
        }
        pg
    }

    /// `postgres://` URL with the password masked, for log output.
    #[must_use]
    pub fn display_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.dbname
        )
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, DbUtilsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DbUtilsError::ConfigError(format!(
            "{key} must be true or false, got {other:?}"
        ))),
    }
}
