//! The query interface drivers provide to the schema layer.
//!
//! Rows travel as JSON objects keyed by column name, so dialect code can read
//! introspection output without depending on any particular driver's row type.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverError;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Rows returned by a statement plus the number of rows it produced or touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Returned rows (empty for DDL).
    pub rows: Vec<Row>,
    /// Row count reported by the driver.
    pub count: u64,
}

impl QueryResult {
    /// Builds a result from rows, counting them.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let count = rows.len() as u64;
        Self { rows, count }
    }

    /// Returns `true` when no row came back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes SQL on behalf of the schema and migration layers.
///
/// Implementations own connection handling, timeouts and parameter binding.
/// Each call is one suspension point; callers never issue two statements on
/// the same executor concurrently.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs one statement with positional parameters.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DriverError>;

    /// Runs one statement without parameters.
    async fn query(&self, sql: &str) -> Result<QueryResult, DriverError> {
        self.execute(sql, &[]).await
    }
}

/// Reads a column as a string slice.
#[must_use]
pub fn row_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Reads a column as an owned string, stringifying scalars.
#[must_use]
pub fn row_string(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Reads a column as an unsigned number. Numeric strings are accepted since
/// some drivers hand `numeric` values back as text.
#[must_use]
pub fn row_u32(row: &Row, key: &str) -> Option<u32> {
    match row.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interprets an engine-specific truth sentinel.
///
/// Accepts `"YES"`, `"yes"`, `"y"`, `"t"`, `"true"`, `"1"`, JSON `true` and the
/// number `1`. Everything else, including a missing column, is `false`.
#[must_use]
pub fn row_flag(row: &Row, key: &str) -> bool {
    row.get(key).is_some_and(is_truthy)
}

/// See [`row_flag`].
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "y" | "t" | "true" | "1"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_truth_sentinels() {
        for sentinel in [json!("YES"), json!("yes"), json!("t"), json!(true), json!(1)] {
            assert!(is_truthy(&sentinel), "{sentinel} should be truthy");
        }
        for sentinel in [json!("NO"), json!("no"), json!("f"), json!(false), json!(0), json!(null)] {
            assert!(!is_truthy(&sentinel), "{sentinel} should be falsy");
        }
    }

    #[test]
    fn test_row_u32_accepts_numeric_text() {
        let r = row(json!({ "precision": "10", "scale": 2, "length": null }));
        assert_eq!(row_u32(&r, "precision"), Some(10));
        assert_eq!(row_u32(&r, "scale"), Some(2));
        assert_eq!(row_u32(&r, "length"), None);
        assert_eq!(row_u32(&r, "missing"), None);
    }

    #[test]
    fn test_row_string_stringifies_scalars() {
        let r = row(json!({ "default": 0, "name": "id", "none": null }));
        assert_eq!(row_string(&r, "default").as_deref(), Some("0"));
        assert_eq!(row_string(&r, "name").as_deref(), Some("id"));
        assert_eq!(row_string(&r, "none"), None);
    }
}
