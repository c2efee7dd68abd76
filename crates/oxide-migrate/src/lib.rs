//! Numbered, reversible database migrations with a persistent ledger.
//!
//! `oxide-migrate` applies an ordered sequence of migration units and
//! records which ones ran in a key/value state table:
//!
//! - **Source** - Lists unit files (`<id>.<description>.m.sql`) and loads them
//! - **Stepper** - Moves forward or backward by a number of units
//! - **Ledger** - The applied ids, persisted after every unit
//! - **Database** - State, table, column and migration operations in one handle
//! - **Writer** - Generates new migration files, optionally from a schema diff
//! - **Config** - Defaults, JSON file, environment and explicit overrides
//!
//! Every statement goes through an [`oxide_schema::Executor`]. A SQLite
//! executor built on `sqlx` is bundled; other engines bring their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oxide_migrate::prelude::*;
//!
//! let source = StaticSource::new().with_unit(
//!     "1.create_users.m",
//!     SqlUnit::new(
//!         vec!["CREATE TABLE users (id INTEGER PRIMARY KEY)".into()],
//!         vec!["DROP TABLE users".into()],
//!     ),
//! );
//! let executor = Arc::new(SqliteExecutor::connect("sqlite::memory:").await?);
//! let migrator = Migrator::new(executor, DialectKind::Sqlite.dialect(), Arc::new(source), "oxide_state");
//!
//! migrator.run(0).await?;   // apply everything pending
//! migrator.run(-1).await?;  // revert the last unit
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the state table
//! oxide-migrate init
//!
//! # Apply pending migrations, or move by N (negative reverts)
//! oxide-migrate migrate
//! oxide-migrate migrate --step -1
//!
//! # Show migration status
//! oxide-migrate status
//!
//! # Write a migration from the difference with a target schema
//! oxide-migrate make --name add_email --target schema.json
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod source;
pub mod sqlite;
pub mod stepper;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ConfigOverrides, Environment, MigrateConfig};
    pub use crate::database::Database;
    pub use crate::error::{MigrateError, Result};
    pub use crate::ledger::{Ledger, StateStore};
    pub use crate::source::{
        DirectorySource, MigrationSource, MigrationUnit, SqlUnit, StaticSource, parse_unit_id,
    };
    pub use crate::sqlite::SqliteExecutor;
    pub use crate::stepper::{Direction, MigrationReport, MigrationStatus, Migrator};
    pub use crate::writer::{MigrationWriter, generate_migration_name, next_migration_id};
    pub use oxide_schema::prelude::*;
}
