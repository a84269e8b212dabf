use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::row::{CustomDbRow, column_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// This struct represents the result of a database query,
/// containing the rows returned by the query and metadata.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows returned
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index_cache: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set.
    ///
    /// Rows added before [`set_column_names`](Self::set_column_names) are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    /// Add an already-built row, adopting its column names if none are set.
    pub fn add_row(&mut self, row: CustomDbRow) {
        if self.column_names.is_none() {
            self.column_index_cache = Some(Arc::clone(&row.column_index_cache));
            self.column_names = Some(Arc::clone(&row.column_names));
        }
        self.results.push(row);
        self.rows_affected += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }

    /// Render the result set as a JSON array of row objects.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.results.iter().map(CustomDbRow::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> ResultSet {
        let mut rs = ResultSet::with_capacity(2);
        rs.set_column_names(Arc::new(vec!["id".to_string(), "name".to_string()]));
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("alice".into())]);
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Null]);
        rs
    }

    #[test]
    fn rows_share_columns_and_lookup_by_name() {
        let rs = people();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows_affected, 2);
        assert!(Arc::ptr_eq(&rs.results[0].column_names, &rs.results[1].column_names));
        assert_eq!(rs.results[0].get("name").and_then(RowValues::as_text), Some("alice"));
        assert_eq!(rs.results[1].get_by_index(0), Some(&RowValues::Int(2)));
        assert!(rs.results[1].get("missing").is_none());
    }

    #[test]
    fn rows_without_columns_are_ignored() {
        let mut rs = ResultSet::default();
        rs.add_row_values(vec![RowValues::Int(1)]);
        assert!(rs.is_empty());
        assert_eq!(rs.rows_affected, 0);
    }

    #[test]
    fn add_row_adopts_column_names() {
        let mut rs = ResultSet::default();
        let row = CustomDbRow::new(Arc::new(vec!["x".to_string()]), vec![RowValues::Bool(true)]);
        rs.add_row(row);
        assert_eq!(rs.get_column_names().map(|c| c.len()), Some(1));
        assert_eq!(rs.results[0].get("x"), Some(&RowValues::Bool(true)));
    }

    #[test]
    fn duplicate_column_names_resolve_to_first() {
        let row = CustomDbRow::new(
            Arc::new(vec!["v".to_string(), "v".to_string()]),
            vec![RowValues::Int(1), RowValues::Int(2)],
        );
        assert_eq!(row.get("v"), Some(&RowValues::Int(1)));
    }

    #[test]
    fn column_index_covers_every_name() {
        let rs = people();
        let row = &rs.results[0];
        assert_eq!(row.get_column_index("id"), Some(0));
        assert_eq!(row.get_column_index("name"), Some(1));
        assert_eq!(row.get_column_index("Name"), None);
    }

    #[test]
    fn to_json_keys_rows_by_column() {
        assert_eq!(
            people().to_json(),
            json!([{"id": 1, "name": "alice"}, {"id": 2, "name": null}])
        );
    }
}
