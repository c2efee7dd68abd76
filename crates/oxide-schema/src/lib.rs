//! Dialect-independent schema snapshots and structural diffs.
//!
//! `oxide-schema` turns the introspection output of a live database into one
//! canonical [`Table`]/[`Column`] model and compares two such tables to find
//! the structural changes between them:
//!
//! - **Schema** - Canonical `Table`, `Column` and `ColumnType` types
//! - **Executor** - The query interface a driver has to provide
//! - **Dialect** - Per-engine column normalizers, table listing/description
//!   and SQL rendering (PostgreSQL, MySQL, SQLite)
//! - **Diff** - Pure comparison of a target table against the current one
//!
//! The crate never opens connections itself. Every database round-trip goes
//! through an injected [`Executor`].
//!
//! # Example
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! let current = Table::new("users")
//!     .column(Column::new("id", ColumnType::BigInt).not_null().primary())
//!     .column(Column::new("email", ColumnType::Text));
//!
//! let target = Table::new("accounts")
//!     .column(Column::new("id", ColumnType::BigInt).not_null().primary())
//!     .column(Column::new("email", ColumnType::Varchar).length(255).not_null());
//!
//! let actions = diff(&target, Some(&current));
//! assert_eq!(actions.len(), 3);
//! assert!(matches!(actions[0], Action::TableRename { .. }));
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod executor;
pub mod schema;

pub use dialect::{Dialect, DialectKind, MysqlDialect, PostgresDialect, SqliteDialect};
pub use diff::{Action, diff, diff_snapshot};
pub use error::{DriverError, Result, SchemaError};
pub use executor::{Executor, QueryResult, Row};
pub use schema::{Column, ColumnType, DatabaseInfo, ForeignKey, Table, TypeArgs};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{Dialect, DialectKind, MysqlDialect, PostgresDialect, SqliteDialect};
    pub use crate::diff::{Action, diff, diff_snapshot};
    pub use crate::error::{DriverError, Result, SchemaError};
    pub use crate::executor::{Executor, QueryResult, Row};
    pub use crate::schema::{Column, ColumnType, DatabaseInfo, ForeignKey, Table, TypeArgs};
}
