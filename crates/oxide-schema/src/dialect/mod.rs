//! Database dialect implementations.
//!
//! A [`Dialect`] bundles everything engine specific: how introspection rows
//! map to canonical [`Column`]s, how tables are listed and described, and how
//! statements are rendered. One implementation is picked from a
//! [`DialectKind`] when a component is constructed; shared code only ever
//! talks to the trait.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::diff::Action;
use crate::error::{Result, SchemaError};
use crate::executor::{Executor, Row, row_string};
use crate::schema::{Column, ColumnType, DatabaseInfo, ForeignKey, Table, TypeArgs};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// PostgreSQL.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    /// MySQL / MariaDB.
    #[serde(alias = "mariadb")]
    Mysql,
    /// SQLite.
    #[default]
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl DialectKind {
    /// Returns the canonical tag.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Instantiates the dialect for this engine.
    #[must_use]
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            Self::Postgres => Arc::new(PostgresDialect::new()),
            Self::Mysql => Arc::new(MysqlDialect::new()),
            Self::Sqlite => Arc::new(SqliteDialect::new()),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(SchemaError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Engine-specific introspection and SQL rendering.
#[async_trait]
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Returns which engine this is.
    fn kind(&self) -> DialectKind;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Returns the positional parameter marker for a 1-based index.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    // ----------------------------------------------------------------
    // Introspection
    // ----------------------------------------------------------------

    /// Maps one raw column description row to a canonical column.
    ///
    /// Never fails: unknown type names are kept as [`ColumnType::Other`].
    fn normalize_column(&self, row: &Row) -> Column;

    /// Lists user table names, excluding system and catalog tables.
    async fn list_tables(&self, executor: &dyn Executor) -> Result<Vec<String>>;

    /// Describes one table. A table that does not exist is `Ok(None)`.
    async fn describe_table(&self, executor: &dyn Executor, name: &str) -> Result<Option<Table>>;

    /// Lists then describes every table.
    ///
    /// A table that disappears between listing and describing is omitted.
    async fn snapshot_database(&self, executor: &dyn Executor) -> Result<BTreeMap<String, Table>> {
        let names = self.list_tables(executor).await?;
        let mut tables = BTreeMap::new();
        for name in names {
            match self.describe_table(executor, &name).await? {
                Some(table) => {
                    tables.insert(name, table);
                }
                None => warn!(table = %name, "Table vanished before it could be described"),
            }
        }
        debug!(dialect = %self.kind(), tables = tables.len(), "Snapshot built");
        Ok(tables)
    }

    // ----------------------------------------------------------------
    // Databases
    // ----------------------------------------------------------------

    /// Renders the listing of every database on the server.
    fn database_list_sql(&self) -> String;

    /// Renders the lookup of one database (first placeholder = name).
    fn database_pick_sql(&self) -> String;

    /// Renders CREATE DATABASE, or `None` when the engine has no such statement.
    fn database_create_sql(&self, name: &str) -> Option<String> {
        Some(format!("CREATE DATABASE {}", self.quote_identifier(name)))
    }

    /// Renders DROP DATABASE IF EXISTS, or `None` when the engine has no such
    /// statement.
    fn database_drop_sql(&self, name: &str) -> Option<String> {
        Some(format!("DROP DATABASE IF EXISTS {}", self.quote_identifier(name)))
    }

    /// Renders the server version query; the value comes back as `version`.
    fn server_version_sql(&self) -> &'static str {
        "SELECT version() AS version"
    }

    /// Maps one database listing row.
    fn normalize_database(&self, row: &Row) -> DatabaseInfo {
        DatabaseInfo {
            name: row_string(row, "name").unwrap_or_default(),
            owner: row_string(row, "owner"),
            encoding: row_string(row, "encoding"),
            collate: row_string(row, "collate"),
            file: row_string(row, "file").filter(|f| !f.is_empty()),
        }
    }

    /// Lists every database on the server.
    async fn list_databases(&self, executor: &dyn Executor) -> Result<Vec<DatabaseInfo>> {
        let result = executor.query(&self.database_list_sql()).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| self.normalize_database(row))
            .filter(|db| !db.name.is_empty())
            .collect())
    }

    /// Describes one database; `None` if it does not exist.
    async fn describe_database(
        &self,
        executor: &dyn Executor,
        name: &str,
    ) -> Result<Option<DatabaseInfo>> {
        let params = [Value::String(name.to_string())];
        let result = executor.execute(&self.database_pick_sql(), &params).await?;
        Ok(result
            .rows
            .first()
            .map(|row| self.normalize_database(row))
            .filter(|db| db.name == name))
    }

    /// Creates a database and describes it.
    async fn create_database(&self, executor: &dyn Executor, name: &str) -> Result<DatabaseInfo> {
        let sql = self
            .database_create_sql(name)
            .ok_or_else(|| self.unsupported("creating databases"))?;
        debug!(database = %name, "Creating database");
        executor.query(&sql).await?;
        Ok(self
            .describe_database(executor, name)
            .await?
            .unwrap_or_else(|| DatabaseInfo {
                name: name.to_string(),
                ..DatabaseInfo::default()
            }))
    }

    /// Drops a database if it exists.
    async fn drop_database(&self, executor: &dyn Executor, name: &str) -> Result<()> {
        let sql = self
            .database_drop_sql(name)
            .ok_or_else(|| self.unsupported("dropping databases"))?;
        debug!(database = %name, "Dropping database");
        executor.query(&sql).await?;
        Ok(())
    }

    /// Returns the database, creating it first if it does not exist.
    async fn ensure_database(&self, executor: &dyn Executor, name: &str) -> Result<DatabaseInfo> {
        match self.describe_database(executor, name).await? {
            Some(existing) => Ok(existing),
            None => self.create_database(executor, name).await,
        }
    }

    /// Returns the server version string.
    async fn server_version(&self, executor: &dyn Executor) -> Result<String> {
        let result = executor.query(self.server_version_sql()).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row_string(row, "version"))
            .unwrap_or_default())
    }

    /// Returns `true` when the server answers with a version.
    async fn ping(&self, executor: &dyn Executor) -> Result<bool> {
        Ok(!self.server_version(executor).await?.is_empty())
    }

    /// Error for an operation this engine cannot perform.
    fn unsupported(&self, operation: &str) -> SchemaError {
        SchemaError::Unsupported {
            dialect: self.kind().to_string(),
            operation: operation.to_string(),
        }
    }

    // ----------------------------------------------------------------
    // DDL rendering
    // ----------------------------------------------------------------

    /// Renders a type declaration.
    fn type_sql(&self, column_type: &ColumnType, args: &TypeArgs) -> String;

    /// Renders a default expression. Strings are raw expressions and are
    /// emitted verbatim.
    fn default_sql(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::String(expr) => expr.clone(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Array(_) | Value::Object(_) => {
                format!("'{}'", value.to_string().replace('\'', "''"))
            }
        }
    }

    /// Renders a column definition for CREATE TABLE / ADD COLUMN.
    ///
    /// The PRIMARY KEY clause is left to [`Dialect::create_table_sql`].
    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_sql(&column.column_type, &column.type_args),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = &column.default_value {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }
        parts.join(" ")
    }

    /// Renders CREATE TABLE. Primary key columns come first.
    fn create_table_sql(&self, table: &str, columns: &BTreeMap<String, Column>) -> String {
        let (primary, rest): (Vec<&Column>, Vec<&Column>) =
            columns.values().partition(|c| c.primary);

        let mut defs: Vec<String> = primary
            .iter()
            .chain(rest.iter())
            .map(|c| self.column_definition(c))
            .collect();

        if !primary.is_empty() {
            let keys: Vec<String> = primary
                .iter()
                .map(|c| self.quote_identifier(&c.name))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(table),
            defs.join(",\n  ")
        )
    }

    /// Renders DROP TABLE IF EXISTS.
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Renders a table rename.
    fn rename_table_sql(&self, table: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(table),
            self.quote_identifier(to)
        )
    }

    /// Renders ADD COLUMN.
    fn add_column_sql(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// Renders DROP COLUMN.
    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Renders RENAME COLUMN.
    fn rename_column_sql(&self, table: &str, column: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.quote_identifier(to)
        )
    }

    /// Renders a column type change.
    fn update_type_sql(
        &self,
        table: &str,
        column: &str,
        to: &ColumnType,
        args: &TypeArgs,
    ) -> String;

    /// Renders a nullability change.
    fn update_nullable_sql(&self, table: &str, column: &str, nullable: bool) -> String;

    /// Renders a default change; `None` drops the default.
    fn update_default_sql(&self, table: &str, column: &str, default: Option<&Value>) -> String {
        let change = match default {
            Some(value) => format!("SET DEFAULT {}", self.default_sql(value)),
            None => "DROP DEFAULT".to_string(),
        };
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            change
        )
    }

    /// Renders adding or removing a unique constraint named `key`.
    fn update_unique_sql(&self, table: &str, column: &str, unique: bool, key: &str) -> String {
        if unique {
            format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(table),
                self.quote_identifier(key),
                self.quote_identifier(column)
            )
        } else {
            format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.quote_identifier(table),
                self.quote_identifier(key)
            )
        }
    }

    /// Renders the statements for one action.
    ///
    /// Statements starting with `--` describe a change the engine cannot
    /// express; executors skip them.
    fn action_sql(&self, action: &Action) -> Vec<String> {
        let sql = match action {
            Action::TableCreate { table, columns } => self.create_table_sql(table, columns),
            Action::TableDrop { table } => self.drop_table_sql(table),
            Action::TableRename { table, to } => self.rename_table_sql(table, to),
            Action::ColumnCreate { table, column } => self.add_column_sql(table, column),
            Action::ColumnDrop { table, column } => self.drop_column_sql(table, column),
            Action::ColumnRename { table, column, to } => {
                self.rename_column_sql(table, column, to)
            }
            Action::ColumnUpdateType {
                table,
                column,
                to,
                type_args,
            } => self.update_type_sql(table, column, to, type_args),
            Action::ColumnUpdateNullable {
                table,
                column,
                nullable,
            } => self.update_nullable_sql(table, column, *nullable),
            Action::ColumnUpdateDefault {
                table,
                column,
                default,
            } => self.update_default_sql(table, column, default.as_ref()),
            Action::ColumnUpdateUnique {
                table,
                column,
                unique,
                key,
            } => {
                let key = key
                    .clone()
                    .unwrap_or_else(|| format!("uk_{table}_{column}"));
                self.update_unique_sql(table, column, *unique, &key)
            }
        };
        vec![sql]
    }

    // ----------------------------------------------------------------
    // State store
    // ----------------------------------------------------------------

    /// Renders CREATE TABLE IF NOT EXISTS for the key/value state table.
    fn state_table_sql(&self, table: &str) -> String;

    /// Renders the lookup of one state value (`$1` = key).
    fn state_get_sql(&self, table: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.quote_identifier("value"),
            self.quote_identifier(table),
            self.quote_identifier("key"),
            self.placeholder(1)
        )
    }

    /// Renders the upsert of one state value (`$1` = key, `$2` = JSON text).
    fn state_set_sql(&self, table: &str) -> String;

    /// Whether state values come back as JSON text rather than native JSON.
    fn state_value_is_text(&self) -> bool {
        false
    }

    /// Renders the removal of one state value (`$1` = key).
    fn state_unset_sql(&self, table: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            self.quote_identifier(table),
            self.quote_identifier("key"),
            self.placeholder(1)
        )
    }

    /// Renders the creation of a table exercising the common column types.
    fn test_table_sql(&self, name: &str) -> String;
}

/// Runs a description query, downgrading "table does not exist" and an
/// empty result to `None`.
pub(crate) async fn describe_rows(
    executor: &dyn Executor,
    sql: &str,
    params: &[Value],
) -> Result<Option<Vec<Row>>> {
    match executor.execute(sql, params).await {
        Ok(result) if result.is_empty() => Ok(None),
        Ok(result) => Ok(Some(result.rows)),
        Err(err) if err.is_undefined_table() => {
            debug!(error = %err, "Table not found");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// A type declaration split into its parts: `decimal(10,2) unsigned` becomes
/// `("decimal", [10, 2])`.
pub(crate) fn split_type_decl(decl: &str) -> (String, Vec<u32>) {
    let decl = decl.trim();
    let (base, args) = match (decl.find('('), decl.rfind(')')) {
        (Some(open), Some(close)) if close > open => {
            let args = decl[open + 1..close]
                .split(',')
                .filter_map(|arg| arg.trim().parse().ok())
                .collect();
            (decl[..open].trim(), args)
        }
        _ => (decl, Vec::new()),
    };

    let base = base
        .split_whitespace()
        .filter(|word| {
            !matches!(
                word.to_ascii_lowercase().as_str(),
                "unsigned" | "signed" | "zerofill"
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    (base, args)
}

/// Assigns type arguments only where the logical type carries them.
pub(crate) fn type_args_for(
    column_type: &ColumnType,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
) -> TypeArgs {
    if column_type.is_length_bearing() {
        TypeArgs {
            length,
            ..TypeArgs::default()
        }
    } else if column_type.is_decimal() {
        let scale = match (precision, scale) {
            (Some(p), Some(s)) if s > p => {
                warn!(precision = p, scale = s, "Dropping scale larger than precision");
                None
            }
            _ => scale,
        };
        TypeArgs {
            precision,
            scale,
            ..TypeArgs::default()
        }
    } else if column_type.is_temporal_with_precision() {
        TypeArgs {
            precision,
            ..TypeArgs::default()
        }
    } else {
        TypeArgs::default()
    }
}

/// Type arguments from a parenthesised declaration (`varchar(255)`,
/// `decimal(10,2)`, `timestamp(3)`).
pub(crate) fn type_args_from_decl(column_type: &ColumnType, args: &[u32]) -> TypeArgs {
    let first = args.first().copied();
    let second = args.get(1).copied();
    type_args_for(column_type, first, first, second)
}

/// Renders a type with its arguments in the common `name(a, b)` form.
pub(crate) fn render_type(name: &str, column_type: &ColumnType, args: &TypeArgs) -> String {
    if column_type.is_length_bearing() {
        if let Some(length) = args.length {
            return format!("{name}({length})");
        }
    } else if column_type.is_decimal() || column_type.is_temporal_with_precision() {
        match (args.precision, args.scale) {
            (Some(p), Some(s)) if column_type.is_decimal() => return format!("{name}({p}, {s})"),
            (Some(p), _) => return format!("{name}({p})"),
            _ => {}
        }
    }
    name.to_string()
}

/// Kind of a key constraint read from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
}

/// One (constraint, column) pair read from the catalog.
#[derive(Debug, Clone)]
pub(crate) struct ConstraintRow {
    pub name: String,
    pub kind: ConstraintKind,
    pub column: String,
    pub references: Option<(String, String)>,
}

/// Assembles a table from normalized columns and constraint rows.
///
/// Columns breaking an invariant are kept and reported with a warning.
pub(crate) fn build_table(
    name: &str,
    columns: Vec<Column>,
    constraints: Vec<ConstraintRow>,
) -> Table {
    let mut table = Table::new(name);
    for column in columns {
        table.columns.insert(column.name.clone(), column);
    }

    for row in constraints {
        match row.kind {
            ConstraintKind::PrimaryKey => {
                let key = table.primary_key.get_or_insert_with(Vec::new);
                if !key.contains(&row.column) {
                    key.push(row.column.clone());
                }
            }
            ConstraintKind::Unique => {
                let key = table.unique_keys.entry(row.name).or_default();
                if !key.contains(&row.column) {
                    key.push(row.column);
                }
            }
            ConstraintKind::ForeignKey => {
                let Some((ref_table, ref_column)) = row.references else {
                    continue;
                };
                let fk = table
                    .foreign_keys
                    .entry(row.name)
                    .or_insert_with(|| ForeignKey {
                        columns: Vec::new(),
                        references_table: ref_table,
                        references_columns: Vec::new(),
                    });
                if !fk.columns.contains(&row.column) {
                    fk.columns.push(row.column);
                }
                if !fk.references_columns.contains(&ref_column) {
                    fk.references_columns.push(ref_column);
                }
            }
        }
    }

    // Flags mirror the constraints.
    if let Some(key) = &table.primary_key {
        for name in key {
            if let Some(column) = table.columns.get_mut(name) {
                column.primary = true;
            }
        }
    } else {
        let primary: Vec<String> = table
            .columns
            .values()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect();
        if !primary.is_empty() {
            table.primary_key = Some(primary);
        }
    }
    for key in table.unique_keys.values() {
        if let [single] = key.as_slice() {
            if let Some(column) = table.columns.get_mut(single) {
                column.unique = true;
            }
        }
    }

    if let Err(err) = table.validate() {
        warn!(table = %name, error = %err, "Introspected table breaks a column invariant");
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_kind_parsing() {
        assert_eq!("PostgreSQL".parse::<DialectKind>().unwrap(), DialectKind::Postgres);
        assert_eq!("mariadb".parse::<DialectKind>().unwrap(), DialectKind::Mysql);
        assert_eq!("sqlite3".parse::<DialectKind>().unwrap(), DialectKind::Sqlite);
        assert!(matches!(
            "oracle".parse::<DialectKind>(),
            Err(SchemaError::UnsupportedDialect(_))
        ));
    }

    #[test]
    fn test_dialect_kind_selects_implementation() {
        for kind in [DialectKind::Postgres, DialectKind::Mysql, DialectKind::Sqlite] {
            assert_eq!(kind.dialect().kind(), kind);
        }
    }

    #[test]
    fn test_split_type_decl() {
        assert_eq!(split_type_decl("varchar(255)"), ("varchar".to_string(), vec![255]));
        assert_eq!(
            split_type_decl("decimal(10, 2) unsigned"),
            ("decimal".to_string(), vec![10, 2])
        );
        assert_eq!(split_type_decl("int unsigned"), ("int".to_string(), vec![]));
        assert_eq!(
            split_type_decl("double precision"),
            ("double precision".to_string(), vec![])
        );
    }

    #[test]
    fn test_type_args_only_where_carried() {
        let args = type_args_for(&ColumnType::Integer, Some(11), Some(32), Some(0));
        assert!(args.is_empty());

        let args = type_args_for(&ColumnType::Varchar, Some(64), Some(1), None);
        assert_eq!(args.length, Some(64));
        assert_eq!(args.precision, None);

        let args = type_args_for(&ColumnType::Numeric, None, Some(10), Some(2));
        assert_eq!((args.precision, args.scale), (Some(10), Some(2)));

        let args = type_args_for(&ColumnType::Numeric, None, Some(2), Some(5));
        assert_eq!((args.precision, args.scale), (Some(2), None));

        let args = type_args_for(&ColumnType::Timestamp, None, Some(6), Some(0));
        assert_eq!((args.precision, args.scale), (Some(6), None));
    }

    #[test]
    fn test_build_table_folds_constraints() {
        let columns = vec![
            Column::new("id", ColumnType::BigInt).not_null(),
            Column::new("email", ColumnType::Text),
            Column::new("org_id", ColumnType::BigInt),
        ];
        let constraints = vec![
            ConstraintRow {
                name: "pk_users".to_string(),
                kind: ConstraintKind::PrimaryKey,
                column: "id".to_string(),
                references: None,
            },
            ConstraintRow {
                name: "uk_users_email".to_string(),
                kind: ConstraintKind::Unique,
                column: "email".to_string(),
                references: None,
            },
            ConstraintRow {
                name: "fk_users_org".to_string(),
                kind: ConstraintKind::ForeignKey,
                column: "org_id".to_string(),
                references: Some(("orgs".to_string(), "id".to_string())),
            },
        ];

        let table = build_table("users", columns, constraints);
        assert_eq!(table.primary_key, Some(vec!["id".to_string()]));
        assert!(table.columns["id"].primary);
        assert!(table.columns["email"].unique);
        let fk = &table.foreign_keys["fk_users_org"];
        assert_eq!(fk.references_table, "orgs");
        assert_eq!(fk.columns, vec!["org_id"]);
        assert_eq!(fk.references_columns, vec!["id"]);
    }

    #[test]
    fn test_build_table_keeps_columns_breaking_invariants() {
        let columns = vec![
            Column::new("", ColumnType::Text),
            Column::new("id", ColumnType::Integer),
        ];
        let table = build_table("odd", columns, Vec::new());
        assert_eq!(table.columns.len(), 2);
        assert!(table.validate().is_err());
    }
}
