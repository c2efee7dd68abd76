//! High-level database handle.
//!
//! [`Database`] ties a configuration, an executor and the configured dialect
//! together and exposes state, table, column and migration operations on
//! top of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use oxide_schema::{Action, Column, DatabaseInfo, Dialect, Executor, Table};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Environment, MigrateConfig};
use crate::error::{MigrateError, Result};
use crate::ledger::StateStore;
use crate::source::{DirectorySource, MigrationSource, execute_statements};
use crate::sqlite::SqliteExecutor;
use crate::stepper::{MigrationReport, Migrator};
use crate::writer::next_migration_id;

/// A configured database connection.
pub struct Database {
    config: MigrateConfig,
    executor: Arc<dyn Executor>,
    dialect: Arc<dyn Dialect>,
    state: StateStore,
    migrator: Migrator,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("dialect", &self.dialect.kind())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a handle reading migrations from the configured directory.
    pub fn new(config: MigrateConfig, executor: Arc<dyn Executor>) -> Result<Self> {
        let source = DirectorySource::from_config(&config.migration)?;
        Ok(Self::with_source(config, executor, Arc::new(source)))
    }

    /// Creates a handle with an explicit migration source.
    pub fn with_source(
        config: MigrateConfig,
        executor: Arc<dyn Executor>,
        source: Arc<dyn MigrationSource>,
    ) -> Self {
        let dialect = config.dialect.dialect();
        let table = config.state.table_name.clone();
        let state = StateStore::new(Arc::clone(&executor), Arc::clone(&dialect), table.clone());
        let migrator = Migrator::new(Arc::clone(&executor), Arc::clone(&dialect), source, table);
        Self {
            config,
            executor,
            dialect,
            state,
            migrator,
        }
    }

    /// Opens the bundled SQLite driver for the configured URL.
    pub async fn connect_sqlite(config: MigrateConfig) -> Result<Self> {
        config.validate()?;
        let url = config.sqlite_url()?;
        let executor = SqliteExecutor::connect(&url).await?.with_logging(config.log);
        info!(url = %url, "Connected");
        Self::new(config, Arc::new(executor))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    /// Returns the dialect.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Returns the executor.
    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Returns the migrator.
    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    fn require_testing(&self, what: &str) -> Result<()> {
        if self.config.environment == Environment::Testing {
            Ok(())
        } else {
            Err(MigrateError::InvalidState(format!(
                "{what} is only allowed in the testing environment, current environment is {}",
                self.config.environment
            )))
        }
    }

    // ------------------------------------------------------------------
    // Server and databases
    // ------------------------------------------------------------------

    /// Returns `true` when the server answers.
    pub async fn ping(&self) -> Result<bool> {
        Ok(self.dialect.ping(self.executor()).await?)
    }

    /// Returns the server version string.
    pub async fn server_version(&self) -> Result<String> {
        Ok(self.dialect.server_version(self.executor()).await?)
    }

    /// Lists every database on the server.
    pub async fn database_list(&self) -> Result<Vec<DatabaseInfo>> {
        Ok(self.dialect.list_databases(self.executor()).await?)
    }

    /// Describes one database; `None` if it does not exist.
    pub async fn database_pick(&self, name: &str) -> Result<Option<DatabaseInfo>> {
        Ok(self.dialect.describe_database(self.executor(), name).await?)
    }

    /// Creates a database.
    pub async fn database_create(&self, name: &str) -> Result<DatabaseInfo> {
        info!(database = %name, "Creating database");
        Ok(self.dialect.create_database(self.executor(), name).await?)
    }

    /// Drops a database if it exists.
    pub async fn database_drop(&self, name: &str) -> Result<()> {
        info!(database = %name, "Dropping database");
        Ok(self.dialect.drop_database(self.executor(), name).await?)
    }

    /// Returns the database, creating it if needed.
    pub async fn database_ensure(&self, name: &str) -> Result<DatabaseInfo> {
        Ok(self.dialect.ensure_database(self.executor(), name).await?)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Creates the state table.
    pub async fn state_init(&self) -> Result<()> {
        self.state_ensure_table().await
    }

    /// Creates the state table if it does not exist.
    pub async fn state_ensure_table(&self) -> Result<()> {
        self.state.ensure_table().await
    }

    /// Drops the state table.
    pub async fn state_drop_table(&self) -> Result<()> {
        self.state.drop_table().await
    }

    /// Removes all migration state.
    pub async fn state_destroy(&self) -> Result<()> {
        self.state_drop_table().await
    }

    /// Destroys then re-initializes the state.
    pub async fn state_reset(&self) -> Result<()> {
        self.state_destroy().await?;
        self.state_init().await
    }

    /// Reads a state value.
    pub async fn state_get(&self, key: &str) -> Result<Option<Value>> {
        self.state.get(key).await
    }

    /// Writes a state value.
    pub async fn state_set(&self, key: &str, value: &Value) -> Result<()> {
        self.state.set(key, value).await
    }

    /// Removes a state value.
    pub async fn state_unset(&self, key: &str) -> Result<()> {
        self.state.unset(key).await
    }

    // ------------------------------------------------------------------
    // Tables and columns
    // ------------------------------------------------------------------

    /// Lists user table names.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.dialect.list_tables(self.executor()).await?)
    }

    /// Describes one table; `None` if it does not exist.
    pub async fn table_pick(&self, name: &str) -> Result<Option<Table>> {
        Ok(self.dialect.describe_table(self.executor(), name).await?)
    }

    /// Describes every table.
    pub async fn table_list(&self) -> Result<Vec<Table>> {
        Ok(self.snapshot().await?.into_values().collect())
    }

    /// Counts the tables that could be described.
    pub async fn table_count(&self) -> Result<usize> {
        Ok(self.table_list().await?.len())
    }

    /// Drops one table if it exists.
    pub async fn table_drop(&self, name: &str) -> Result<()> {
        debug!(table = %name, "Dropping table");
        self.executor.query(&self.dialect.drop_table_sql(name)).await?;
        Ok(())
    }

    /// Drops every table, the state table included.
    pub async fn table_drop_all(&self) -> Result<()> {
        self.require_testing("Dropping all tables")?;
        for name in self.table_names().await? {
            self.table_drop(&name).await?;
        }
        Ok(())
    }

    /// Creates a table covering the common column types.
    pub async fn create_test_table(&self, name: &str) -> Result<()> {
        self.require_testing("Creating a test table")?;
        self.executor
            .query(&self.dialect.test_table_sql(name))
            .await?;
        Ok(())
    }

    /// Describes one column; `None` if the table or column does not exist.
    pub async fn column_pick(&self, table: &str, column: &str) -> Result<Option<Column>> {
        Ok(self
            .table_pick(table)
            .await?
            .and_then(|mut t| t.columns.remove(column)))
    }

    /// Describes every table, keyed by name.
    pub async fn snapshot(&self) -> Result<BTreeMap<String, Table>> {
        Ok(self.dialect.snapshot_database(self.executor()).await?)
    }

    /// Renders actions with the dialect and executes them in order.
    ///
    /// Returns how many statements ran; unsupported ones are skipped.
    pub async fn apply_actions(&self, actions: &[Action]) -> Result<usize> {
        let statements: Vec<String> = actions
            .iter()
            .flat_map(|action| self.dialect.action_sql(action))
            .collect();
        execute_statements(self.executor(), &statements).await
    }

    // ------------------------------------------------------------------
    // Migrations
    // ------------------------------------------------------------------

    /// Moves the migration position by `step` (0 = every pending unit).
    pub async fn migration_run(&self, step: i64) -> Result<MigrationReport> {
        self.migrator.run(step).await
    }

    /// Returns the last applied id, or 0.
    pub async fn migration_last(&self) -> Result<u64> {
        self.migrator.last().await
    }

    /// Returns the applied ids in application order.
    pub async fn migration_log(&self) -> Result<Vec<u64>> {
        self.migrator.applied().await
    }

    /// Lists every migration file name.
    pub async fn migration_list_all(&self) -> Result<Vec<String>> {
        self.migrator.list_files().await
    }

    /// Returns the id a new migration file should take.
    ///
    /// A migration directory that does not exist yet counts as empty.
    pub async fn migration_next_id(&self) -> Result<u64> {
        match self.migrator.list_files().await {
            Ok(files) => Ok(next_migration_id(&files)),
            Err(MigrateError::Discovery { location, .. }) if !location.exists() => Ok(1),
            Err(err) => Err(err),
        }
    }

    /// Lists every migration id, ascending.
    pub async fn migration_list_all_ids(&self) -> Result<Vec<u64>> {
        self.migrator.list_available_ids().await
    }
}
