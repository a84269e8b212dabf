//! Convenient imports for common functionality.

pub use crate::config::DbConfig;
pub use crate::connection::{DbConnection, PreparedStatement};
pub use crate::convert_sql_params;
pub use crate::error::DbUtilsError;
pub use crate::postgres::Params as PostgresParams;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{ConversionMode, RowValues};
