// PostgreSQL driver glue.
//
// - params: RowValues -> driver parameters
// - query: driver rows -> ResultSet

pub mod params;
pub mod query;

pub use params::Params;
pub use query::{build_result_set_from_statement, postgres_extract_value};
