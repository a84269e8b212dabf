//! Single-connection helper for PostgreSQL built on `tokio-postgres`.
//!
//! [`DbConnection`] opens one connection, runs ad-hoc and parameterized SQL, and
//! exposes manual transaction control. With auto-commit disabled a transaction is
//! opened before the first statement and finished by [`DbConnection::commit`] or
//! [`DbConnection::rollback`].

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod postgres;
pub mod prelude;
pub mod results;
pub mod transaction;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::DbConfig;
pub use connection::{DbConnection, PreparedStatement};
pub use error::DbUtilsError;
pub use results::{CustomDbRow, ResultSet};
pub use types::{ConversionMode, ParamConverter, RowValues};

/// Convert generic values into a driver-specific parameter container.
///
/// # Errors
/// Returns `DbUtilsError::ParameterError` if any value cannot be converted.
pub fn convert_sql_params<'a, T: ParamConverter<'a>>(
    params: &'a [RowValues],
    mode: ConversionMode,
) -> Result<T::Converted, DbUtilsError> {
    T::convert_sql_params(params, mode)
}
