//! [`Executor`] implementation on top of a `sqlx` SQLite pool.
//!
//! This is the driver the CLI uses. Other engines plug in through their own
//! `Executor` implementations.

use std::str::FromStr;

use async_trait::async_trait;
use oxide_schema::{DriverError, Executor, QueryResult, Row};
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row as _, Sqlite, TypeInfo as _, ValueRef as _};
use tracing::debug;

use crate::config::LogConfig;
use crate::error::Result;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Keywords of statements that hand rows back.
const ROW_KEYWORDS: &[&str] = &["select", "pragma", "with", "values", "explain"];

/// Runs statements on a SQLite pool and returns rows as JSON objects.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    log: LogConfig,
}

impl SqliteExecutor {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            log: LogConfig::default(),
        }
    }

    /// Opens a pool for `url`, creating the database file if needed.
    ///
    /// In-memory databases get a single connection so every statement sees
    /// the same database.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Sets statement logging.
    #[must_use]
    pub fn with_logging(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if !self.log.sql {
            return;
        }
        if self.log.params {
            debug!(sql = %sql, params = ?params, "Executing SQL");
        } else {
            debug!(sql = %sql, "Executing SQL");
        }
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> std::result::Result<QueryResult, DriverError> {
        self.log_statement(sql, params);

        let query = params.iter().fold(sqlx::query(sql), bind_value);
        if returns_rows(sql) {
            let rows = query.fetch_all(&self.pool).await.map_err(driver_error)?;
            let rows = rows.iter().map(row_to_json).collect::<std::result::Result<_, _>>()?;
            Ok(QueryResult::from_rows(rows))
        } else {
            let done = query.execute(&self.pool).await.map_err(driver_error)?;
            Ok(QueryResult {
                rows: Vec::new(),
                count: done.rows_affected(),
            })
        }
    }
}

fn returns_rows(sql: &str) -> bool {
    let lowered = sql.trim_start().to_ascii_lowercase();
    ROW_KEYWORDS.iter().any(|kw| lowered.starts_with(kw)) || lowered.contains(" returning ")
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> std::result::Result<Row, DriverError> {
    let mut out = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index).map_err(driver_error)?;
        let storage = if raw.is_null() {
            "NULL".to_string()
        } else {
            raw.type_info().name().to_ascii_uppercase()
        };

        let value = match storage.as_str() {
            "NULL" => Value::Null,
            "INTEGER" | "BOOLEAN" => {
                Value::from(row.try_get_unchecked::<i64, _>(index).map_err(driver_error)?)
            }
            "REAL" => Number::from_f64(row.try_get_unchecked::<f64, _>(index).map_err(driver_error)?)
                .map_or(Value::Null, Value::Number),
            "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(index).map_err(driver_error)?),
            _ => Value::from(row.try_get_unchecked::<String, _>(index).map_err(driver_error)?),
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn driver_error(err: sqlx::Error) -> DriverError {
    match &err {
        sqlx::Error::Database(db) => {
            let error = DriverError::new(db.message());
            match db.code() {
                Some(code) => error.with_code(code),
                None => error,
            }
        }
        _ => DriverError::new(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn executor() -> SqliteExecutor {
        SqliteExecutor::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_rows_come_back_as_json() {
        let db = executor().await;
        db.query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB)")
            .await
            .unwrap();
        let inserted = db
            .execute(
                "INSERT INTO t (id, name, score) VALUES (?, ?, ?)",
                &[json!(1), json!("alice"), json!(1.5)],
            )
            .await
            .unwrap();
        assert_eq!(inserted.count, 1);

        let result = db.query("SELECT id, name, score, data FROM t").await.unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(
            Value::Object(result.rows[0].clone()),
            json!({ "id": 1, "name": "alice", "score": 1.5, "data": null })
        );
    }

    #[tokio::test]
    async fn test_pragma_rows() {
        let db = executor().await;
        db.query("CREATE TABLE t (id INTEGER NOT NULL PRIMARY KEY, label VARCHAR(10))")
            .await
            .unwrap();
        let result = db.query("PRAGMA table_info(\"t\")").await.unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1]["type"], json!("VARCHAR(10)"));
        assert_eq!(result.rows[0]["pk"], json!(1));
    }

    #[tokio::test]
    async fn test_missing_table_is_classified() {
        let db = executor().await;
        let err = db.query("SELECT * FROM ghost").await.unwrap_err();
        assert!(err.is_undefined_table(), "{err:?}");
    }

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("PRAGMA index_list(\"t\")"));
        assert!(returns_rows("DELETE FROM t WHERE id = 1 RETURNING id"));
        assert!(!returns_rows("CREATE TABLE t (id INTEGER)"));
    }
}
