//! SQLite dialect.
//!
//! Introspection goes through the `table_info`, `index_list`, `index_info`
//! and `foreign_key_list` pragmas. SQLite cannot alter a column in place, so
//! type, nullability and default changes render as comments.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    ConstraintKind, ConstraintRow, Dialect, DialectKind, build_table, describe_rows, render_type,
    split_type_decl, type_args_from_decl,
};
use crate::error::Result;
use crate::executor::{Executor, Row, row_flag, row_str, row_string, row_u32};
use crate::schema::{Column, ColumnType, Table, TypeArgs};

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn pragma(&self, name: &str, arg: &str) -> String {
        format!("PRAGMA {name}({})", self.quote_identifier(arg))
    }

    async fn unique_constraints(
        &self,
        executor: &dyn Executor,
        table: &str,
    ) -> Result<Vec<ConstraintRow>> {
        let indexes = describe_rows(executor, &self.pragma("index_list", table), &[])
            .await?
            .unwrap_or_default();

        let mut rows = Vec::new();
        for index in indexes {
            if !row_flag(&index, "unique") || row_str(&index, "origin") == Some("pk") {
                continue;
            }
            let Some(name) = row_string(&index, "name") else {
                continue;
            };
            let mut columns = describe_rows(executor, &self.pragma("index_info", &name), &[])
                .await?
                .unwrap_or_default();
            columns.sort_by_key(|c| row_u32(c, "seqno"));
            rows.extend(columns.iter().filter_map(|c| {
                Some(ConstraintRow {
                    name: name.clone(),
                    kind: ConstraintKind::Unique,
                    column: row_string(c, "name")?,
                    references: None,
                })
            }));
        }
        Ok(rows)
    }

    async fn foreign_key_constraints(
        &self,
        executor: &dyn Executor,
        table: &str,
    ) -> Result<Vec<ConstraintRow>> {
        let mut keys = describe_rows(executor, &self.pragma("foreign_key_list", table), &[])
            .await?
            .unwrap_or_default();
        keys.sort_by_key(|k| (row_u32(k, "id"), row_u32(k, "seq")));

        Ok(keys
            .iter()
            .filter_map(|k| {
                let id = row_u32(k, "id").unwrap_or_default();
                let references = match (row_string(k, "table"), row_string(k, "to")) {
                    (Some(table), Some(column)) => Some((table, column)),
                    _ => None,
                };
                Some(ConstraintRow {
                    name: format!("fk_{table}_{id}"),
                    kind: ConstraintKind::ForeignKey,
                    column: row_string(k, "from")?,
                    references,
                })
            })
            .collect())
    }
}

#[async_trait]
impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    /// Reads one `PRAGMA table_info` row.
    fn normalize_column(&self, row: &Row) -> Column {
        let decl = row_str(row, "type").unwrap_or_default();
        let (base, args) = split_type_decl(decl);
        let column_type = ColumnType::from_raw(&base);
        let type_args = type_args_from_decl(&column_type, &args);

        Column {
            name: row_string(row, "name").unwrap_or_default(),
            column_type,
            type_args,
            nullable: !row_flag(row, "notnull"),
            default_value: row.get("dflt_value").filter(|v| !v.is_null()).cloned(),
            primary: row_u32(row, "pk").is_some_and(|pk| pk > 0),
            unique: false,
            comment: None,
        }
    }

    async fn list_tables(&self, executor: &dyn Executor) -> Result<Vec<String>> {
        let result = executor.query(LIST_TABLES_SQL).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row_string(row, "name"))
            .collect())
    }

    async fn describe_table(&self, executor: &dyn Executor, name: &str) -> Result<Option<Table>> {
        let Some(mut rows) = describe_rows(executor, &self.pragma("table_info", name), &[]).await?
        else {
            return Ok(None);
        };
        rows.sort_by_key(|row| row_u32(row, "cid"));

        let mut primary: Vec<(u32, String)> = rows
            .iter()
            .filter_map(|row| {
                let pk = row_u32(row, "pk").filter(|pk| *pk > 0)?;
                Some((pk, row_string(row, "name")?))
            })
            .collect();
        primary.sort();

        let columns = rows.iter().map(|row| self.normalize_column(row)).collect();

        let mut constraints: Vec<ConstraintRow> = primary
            .into_iter()
            .map(|(_, column)| ConstraintRow {
                name: format!("pk_{name}"),
                kind: ConstraintKind::PrimaryKey,
                column,
                references: None,
            })
            .collect();
        constraints.extend(self.unique_constraints(executor, name).await?);
        constraints.extend(self.foreign_key_constraints(executor, name).await?);

        Ok(Some(build_table(name, columns, constraints)))
    }

    /// Attached schemas stand in for databases.
    fn database_list_sql(&self) -> String {
        "SELECT name, file FROM pragma_database_list ORDER BY seq".to_string()
    }

    fn database_pick_sql(&self) -> String {
        "SELECT name, file FROM pragma_database_list WHERE name = ?".to_string()
    }

    fn database_create_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn database_drop_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn server_version_sql(&self) -> &'static str {
        "SELECT sqlite_version() AS version"
    }

    fn type_sql(&self, column_type: &ColumnType, args: &TypeArgs) -> String {
        let name = match column_type {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Real => "REAL",
            ColumnType::Double => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::TimestampTz => "TIMESTAMPTZ",
            ColumnType::Interval => "INTERVAL",
            ColumnType::Json => "JSON",
            ColumnType::Jsonb => "JSONB",
            ColumnType::Uuid => "UUID",
            ColumnType::Binary => "BINARY",
            ColumnType::Blob => "BLOB",
            ColumnType::Other(raw) => return raw.clone(),
        };
        render_type(name, column_type, args)
    }

    fn update_type_sql(
        &self,
        table: &str,
        column: &str,
        to: &ColumnType,
        args: &TypeArgs,
    ) -> String {
        format!(
            "-- sqlite: change {table}.{column} to {} by rebuilding the table",
            self.type_sql(to, args)
        )
    }

    fn update_nullable_sql(&self, table: &str, column: &str, nullable: bool) -> String {
        format!(
            "-- sqlite: set {table}.{column} {} by rebuilding the table",
            if nullable { "NULL" } else { "NOT NULL" }
        )
    }

    fn update_default_sql(&self, table: &str, column: &str, default: Option<&Value>) -> String {
        match default {
            Some(value) => format!(
                "-- sqlite: set {table}.{column} DEFAULT {} by rebuilding the table",
                self.default_sql(value)
            ),
            None => format!("-- sqlite: drop {table}.{column} DEFAULT by rebuilding the table"),
        }
    }

    fn update_unique_sql(&self, table: &str, column: &str, unique: bool, key: &str) -> String {
        if unique {
            format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.quote_identifier(key),
                self.quote_identifier(table),
                self.quote_identifier(column)
            )
        } else {
            format!("DROP INDEX IF EXISTS {}", self.quote_identifier(key))
        }
    }

    fn state_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\"key\" VARCHAR(64) PRIMARY KEY, \"value\" TEXT)",
            self.quote_identifier(table)
        )
    }

    fn state_set_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (\"key\", \"value\") VALUES (?, ?) \
             ON CONFLICT (\"key\") DO UPDATE SET \"value\" = excluded.\"value\"",
            self.quote_identifier(table)
        )
    }

    fn state_value_is_text(&self) -> bool {
        true
    }

    fn test_table_sql(&self, name: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  smallint_ SMALLINT,
  int_ INTEGER,
  bigint_ BIGINT,
  decimal_ DECIMAL(10, 2),
  numeric_ NUMERIC,
  real_ REAL,
  varchar_ VARCHAR(64),
  text_ TEXT,
  timestamp_ TIMESTAMP,
  blob_ BLOB,
  not_null_ INTEGER NOT NULL
)",
            self.quote_identifier(name)
        )
    }
}
