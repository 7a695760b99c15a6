use serde::{Deserialize, Serialize};

use crate::bookmark::{Bookmark, BookmarkId};
use crate::value::{format_sql_timestamp, Value};

/// A bound parameter for a native query fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlParam {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&Value> for SqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Int(if *b { 1 } else { 0 }),
            Value::Int(i) => SqlParam::Int(*i),
            Value::Float(f) => SqlParam::Float(*f),
            Value::String(s) => SqlParam::Text(s.clone()),
            Value::DateTime(dt) => SqlParam::Text(format_sql_timestamp(dt)),
            Value::Array(_) => SqlParam::Text(value.to_string()),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        SqlParam::Text(s.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        SqlParam::Text(s)
    }
}

impl From<i64> for SqlParam {
    fn from(i: i64) -> Self {
        SqlParam::Int(i)
    }
}

/// Read access the view system needs from a bookmark store.
///
/// `query` receives a WHERE-clause fragment over the `bookmarks` table
/// (with tags reachable through `bookmark_tags` joined to `tags`) and its
/// positional `?` parameters. Stores without a native query language
/// return `StoreError::Unsupported`.
pub trait BookmarkStore: Send + Sync {
    /// Every bookmark, ordered by id.
    fn all(&self) -> Result<Vec<Bookmark>, StoreError>;

    /// Bookmarks matching a native WHERE fragment, ordered by id.
    fn query(&self, where_clause: &str, params: &[SqlParam]) -> Result<Vec<Bookmark>, StoreError>;
}

impl<S: BookmarkStore + ?Sized> BookmarkStore for &S {
    fn all(&self) -> Result<Vec<Bookmark>, StoreError> {
        (**self).all()
    }

    fn query(&self, where_clause: &str, params: &[SqlParam]) -> Result<Vec<Bookmark>, StoreError> {
        (**self).query(where_clause, params)
    }
}

/// Errors from the bookmark store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Bookmark not found: {0}")]
    NotFound(BookmarkId),

    #[error("Bookmark already exists: {0}")]
    AlreadyExists(BookmarkId),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::parse_timestamp;

    #[test]
    fn value_to_param() {
        assert_eq!(SqlParam::from(&Value::Bool(true)), SqlParam::Int(1));
        assert_eq!(SqlParam::from(&Value::Null), SqlParam::Null);
        let dt = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(
            SqlParam::from(&Value::DateTime(dt)),
            SqlParam::Text("2024-03-01 12:30:00".into())
        );
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound(42);
        assert!(err.to_string().contains("not found"));

        let err = StoreError::Unsupported("native queries".into());
        assert!(err.to_string().contains("native queries"));
    }
}
