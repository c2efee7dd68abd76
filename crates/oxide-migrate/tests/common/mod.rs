#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oxide_migrate::prelude::*;

pub const STATE_TABLE: &str = "oxide_state";

pub async fn memory_executor() -> Arc<SqliteExecutor> {
    Arc::new(
        SqliteExecutor::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite"),
    )
}

pub fn migrator(executor: Arc<SqliteExecutor>, source: impl MigrationSource + 'static) -> Migrator {
    Migrator::new(
        executor,
        DialectKind::Sqlite.dialect(),
        Arc::new(source),
        STATE_TABLE,
    )
}

/// A unit creating `table` forward and dropping it backward.
pub fn table_unit(table: &str) -> SqlUnit {
    SqlUnit::new(
        vec![format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY)")],
        vec![format!("DROP TABLE {table}")],
    )
}

/// Units `1.create_a.m` .. `n.create_<x>.m`, one table each.
pub fn table_source(tables: &[&str]) -> StaticSource {
    tables
        .iter()
        .enumerate()
        .fold(StaticSource::new(), |source, (i, table)| {
            source.with_unit(format!("{}.create_{table}.m", i + 1), table_unit(table))
        })
}

pub async fn tables(executor: &SqliteExecutor) -> Vec<String> {
    SqliteDialect::new()
        .list_tables(executor)
        .await
        .expect("list tables")
        .into_iter()
        .filter(|name| name != STATE_TABLE)
        .collect()
}

/// A unit that records every call and can be told to fail.
pub struct RecordingUnit {
    pub id: u64,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_forward: bool,
}

#[async_trait]
impl MigrationUnit for RecordingUnit {
    async fn forward(&self, _executor: &dyn Executor) -> Result<()> {
        if self.fail_forward {
            return Err(MigrateError::InvalidState(format!("unit {} failed", self.id)));
        }
        self.calls.lock().unwrap().push(format!("forward:{}", self.id));
        Ok(())
    }

    async fn backward(&self, _executor: &dyn Executor) -> Result<()> {
        self.calls.lock().unwrap().push(format!("backward:{}", self.id));
        Ok(())
    }
}

pub fn recording_source(ids: &[u64], calls: &Arc<Mutex<Vec<String>>>) -> StaticSource {
    ids.iter().fold(StaticSource::new(), |source, id| {
        source.with_unit(
            format!("{id}.unit.m"),
            RecordingUnit {
                id: *id,
                calls: Arc::clone(calls),
                fail_forward: false,
            },
        )
    })
}
