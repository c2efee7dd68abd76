//! Persistent migration state.
//!
//! State lives in a two-column key/value table (`"key"` up to 64 chars,
//! `"value"` holding JSON). The migration ledger is the JSON array of applied
//! ids stored under [`MIGRATION_LOG_KEY`], in application order.

use std::sync::Arc;

use oxide_schema::{Dialect, Executor};
use serde_json::Value;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Default state table name.
pub const DEFAULT_STATE_TABLE: &str = "oxide_state";

/// State key of the migration ledger.
pub const MIGRATION_LOG_KEY: &str = "migration_log";

/// Key/value state table access.
#[derive(Clone)]
pub struct StateStore {
    executor: Arc<dyn Executor>,
    dialect: Arc<dyn Dialect>,
    table: String,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("dialect", &self.dialect.kind())
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Creates a store over `table`.
    pub fn new(
        executor: Arc<dyn Executor>,
        dialect: Arc<dyn Dialect>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            dialect,
            table: table.into(),
        }
    }

    /// Returns the state table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the state table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        self.executor
            .query(&self.dialect.state_table_sql(&self.table))
            .await?;
        Ok(())
    }

    /// Drops the state table.
    pub async fn drop_table(&self) -> Result<()> {
        self.executor
            .query(&self.dialect.drop_table_sql(&self.table))
            .await?;
        Ok(())
    }

    /// Reads one value. On text-backed stores the JSON text is decoded.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let result = self
            .executor
            .execute(
                &self.dialect.state_get_sql(&self.table),
                &[Value::String(key.to_string())],
            )
            .await?;
        let Some(row) = result.rows.into_iter().next() else {
            return Ok(None);
        };
        let value = row.get("value").cloned();
        if self.dialect.state_value_is_text() {
            Ok(value.map(decode_text))
        } else {
            Ok(value)
        }
    }

    /// Writes one value, replacing any previous one.
    pub async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.executor
            .execute(
                &self.dialect.state_set_sql(&self.table),
                &[Value::String(key.to_string()), Value::String(text)],
            )
            .await?;
        Ok(())
    }

    /// Removes one value.
    pub async fn unset(&self, key: &str) -> Result<()> {
        self.executor
            .execute(
                &self.dialect.state_unset_sql(&self.table),
                &[Value::String(key.to_string())],
            )
            .await?;
        Ok(())
    }
}

fn decode_text(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// The ordered list of applied migration ids.
///
/// Only the migrator and the database facade write it.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: StateStore,
}

impl Ledger {
    /// Creates a ledger stored in `store`.
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Returns the underlying state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Creates the state table if needed.
    pub async fn ensure_table(&self) -> Result<()> {
        self.store.ensure_table().await
    }

    /// Drops the state table, ledger included.
    pub async fn drop_table(&self) -> Result<()> {
        self.store.drop_table().await
    }

    /// Drops and recreates the state table, leaving an empty ledger.
    pub async fn reset(&self) -> Result<()> {
        self.drop_table().await?;
        self.ensure_table().await
    }

    /// Returns the applied ids in application order; empty when unset.
    pub async fn get(&self) -> Result<Vec<u64>> {
        match self.store.get(MIGRATION_LOG_KEY).await? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
            Some(other) => Err(MigrateError::InvalidState(format!(
                "{MIGRATION_LOG_KEY} is not a list of ids: {other}"
            ))),
        }
    }

    /// Replaces the whole ledger.
    pub async fn set(&self, ids: &[u64]) -> Result<()> {
        debug!(ledger = ?ids, "Persisting migration log");
        self.store.set(MIGRATION_LOG_KEY, &Value::from(ids.to_vec())).await
    }

    /// Removes the ledger entry.
    pub async fn clear(&self) -> Result<()> {
        self.store.unset(MIGRATION_LOG_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteExecutor;
    use oxide_schema::{DriverError, PostgresDialect, QueryResult, Row, SqliteDialect};
    use serde_json::json;

    async fn ledger() -> Ledger {
        let executor = SqliteExecutor::connect("sqlite::memory:").await.unwrap();
        let store = StateStore::new(
            Arc::new(executor),
            Arc::new(SqliteDialect::new()),
            DEFAULT_STATE_TABLE,
        );
        let ledger = Ledger::new(store);
        ledger.ensure_table().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_unset_ledger_is_empty() {
        let ledger = ledger().await;
        assert!(ledger.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_replaces_and_is_idempotent() {
        let ledger = ledger().await;
        ledger.set(&[1, 2, 3]).await.unwrap();
        ledger.set(&[1, 2, 3]).await.unwrap();
        assert_eq!(ledger.get().await.unwrap(), vec![1, 2, 3]);

        ledger.set(&[1]).await.unwrap();
        assert_eq!(ledger.get().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_clear_and_reset() {
        let ledger = ledger().await;
        ledger.set(&[4, 5]).await.unwrap();
        ledger.clear().await.unwrap();
        assert!(ledger.get().await.unwrap().is_empty());

        ledger.set(&[4, 5]).await.unwrap();
        ledger.reset().await.unwrap();
        assert!(ledger.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_table_is_repeatable() {
        let ledger = ledger().await;
        ledger.set(&[7]).await.unwrap();
        ledger.ensure_table().await.unwrap();
        assert_eq!(ledger.get().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_store_round_trips_arbitrary_json() {
        let ledger = ledger().await;
        let store = ledger.store();
        store
            .set("seed", &json!({ "users": 3, "tags": ["a"] }))
            .await
            .unwrap();
        assert_eq!(
            store.get("seed").await.unwrap(),
            Some(json!({ "users": 3, "tags": ["a"] }))
        );
        store.unset("seed").await.unwrap();
        assert_eq!(store.get("seed").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_text_store_keeps_string_values() {
        let ledger = ledger().await;
        let store = ledger.store();
        store.set("raw", &json!("[1,2]")).await.unwrap();
        assert_eq!(store.get("raw").await.unwrap(), Some(json!("[1,2]")));
    }

    /// Hands back one stored `value` cell for every statement.
    #[derive(Debug)]
    struct StoredValue(Value);

    #[async_trait::async_trait]
    impl Executor for StoredValue {
        async fn execute(
            &self,
            _sql: &str,
            _params: &[Value],
        ) -> std::result::Result<QueryResult, DriverError> {
            let mut row = Row::new();
            row.insert("value".to_string(), self.0.clone());
            Ok(QueryResult::from_rows(vec![row]))
        }
    }

    #[tokio::test]
    async fn test_native_json_store_returns_strings_verbatim() {
        let store = StateStore::new(
            Arc::new(StoredValue(json!("[1,2]"))),
            Arc::new(PostgresDialect::new()),
            DEFAULT_STATE_TABLE,
        );
        assert_eq!(store.get("raw").await.unwrap(), Some(json!("[1,2]")));

        let store = StateStore::new(
            Arc::new(StoredValue(json!("[1,2]"))),
            Arc::new(SqliteDialect::new()),
            DEFAULT_STATE_TABLE,
        );
        assert_eq!(store.get("raw").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_non_list_ledger_is_invalid_state() {
        let ledger = ledger().await;
        ledger
            .store()
            .set(MIGRATION_LOG_KEY, &json!({ "oops": true }))
            .await
            .unwrap();
        assert!(matches!(
            ledger.get().await,
            Err(MigrateError::InvalidState(_))
        ));
    }
}
