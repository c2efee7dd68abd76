//! MySQL / MariaDB dialect.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    ConstraintKind, ConstraintRow, Dialect, DialectKind, build_table, describe_rows, render_type,
    split_type_decl, type_args_from_decl,
};
use crate::error::Result;
use crate::executor::{Executor, Row, row_flag, row_str, row_string};
use crate::schema::{Column, ColumnType, Table, TypeArgs};

const LIST_TABLES_SQL: &str = "SELECT table_name AS name FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name";

const DESCRIBE_CONSTRAINTS_SQL: &str = "SELECT constraint_name AS name, column_name, \
     referenced_table_name AS ref_table, referenced_column_name AS ref_column \
     FROM information_schema.key_column_usage \
     WHERE table_schema = DATABASE() AND table_name = ? \
     ORDER BY constraint_name, ordinal_position";

const DATABASE_COLUMNS_SQL: &str = "SELECT schema_name AS `name`, \
     default_character_set_name AS `encoding`, default_collation_name AS `collate` \
     FROM information_schema.schemata";

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn constraint_row(row: &Row) -> Option<ConstraintRow> {
        let name = row_string(row, "name")?;
        let references = match (row_string(row, "ref_table"), row_string(row, "ref_column")) {
            (Some(table), Some(column)) => Some((table, column)),
            _ => None,
        };
        let kind = if name == "PRIMARY" {
            ConstraintKind::PrimaryKey
        } else if references.is_some() {
            ConstraintKind::ForeignKey
        } else {
            ConstraintKind::Unique
        };
        Some(ConstraintRow {
            name,
            kind,
            column: row_string(row, "column_name")?,
            references,
        })
    }
}

#[async_trait]
impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Reads one `SHOW FULL COLUMNS` row.
    fn normalize_column(&self, row: &Row) -> Column {
        let decl = row_str(row, "Type").unwrap_or_default();
        let (base, args) = split_type_decl(decl);
        let column_type = match ColumnType::from_raw(&base) {
            // BOOLEAN is stored as tinyint(1).
            ColumnType::TinyInt if args == [1] => ColumnType::Boolean,
            // Keep enum('a','b') and friends whole.
            ColumnType::Other(_) => ColumnType::Other(decl.trim().to_string()),
            known => known,
        };
        let type_args = type_args_from_decl(&column_type, &args);
        let key = row_str(row, "Key").unwrap_or_default();

        Column {
            name: row_string(row, "Field").unwrap_or_default(),
            column_type,
            type_args,
            nullable: row_flag(row, "Null"),
            default_value: row.get("Default").filter(|v| !v.is_null()).cloned(),
            primary: key == "PRI",
            unique: key == "UNI",
            comment: row_string(row, "Comment").filter(|c| !c.is_empty()),
        }
    }

    async fn list_tables(&self, executor: &dyn Executor) -> Result<Vec<String>> {
        let result = executor.query(LIST_TABLES_SQL).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row_string(row, "name").or_else(|| row_string(row, "NAME")))
            .collect())
    }

    async fn describe_table(&self, executor: &dyn Executor, name: &str) -> Result<Option<Table>> {
        let sql = format!("SHOW FULL COLUMNS FROM {}", self.quote_identifier(name));
        let Some(rows) = describe_rows(executor, &sql, &[]).await? else {
            return Ok(None);
        };
        let columns = rows.iter().map(|row| self.normalize_column(row)).collect();

        let params = [Value::String(name.to_string())];
        let constraints = describe_rows(executor, DESCRIBE_CONSTRAINTS_SQL, &params)
            .await?
            .unwrap_or_default()
            .iter()
            .filter_map(Self::constraint_row)
            .collect();

        Ok(Some(build_table(name, columns, constraints)))
    }

    fn database_list_sql(&self) -> String {
        format!("{DATABASE_COLUMNS_SQL} ORDER BY schema_name")
    }

    fn database_pick_sql(&self) -> String {
        format!("{DATABASE_COLUMNS_SQL} WHERE schema_name = ?")
    }

    /// UUIDs render as `CHAR(36)` and intervals as `TIME`; both read back as
    /// those types.
    fn type_sql(&self, column_type: &ColumnType, args: &TypeArgs) -> String {
        let name = match column_type {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Real => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => {
                return format!("VARCHAR({})", args.length.unwrap_or(255));
            }
            ColumnType::Text => "TEXT",
            ColumnType::Date => "DATE",
            ColumnType::Time | ColumnType::Interval => "TIME",
            ColumnType::Timestamp => "DATETIME",
            ColumnType::TimestampTz => "TIMESTAMP",
            ColumnType::Json | ColumnType::Jsonb => "JSON",
            ColumnType::Uuid => "CHAR(36)",
            ColumnType::Binary => "VARBINARY",
            ColumnType::Blob => "LONGBLOB",
            ColumnType::Other(raw) => return raw.clone(),
        };
        if matches!(column_type, ColumnType::Binary) && args.length.is_none() {
            return "BLOB".to_string();
        }
        render_type(name, column_type, args)
    }

    fn rename_table_sql(&self, table: &str, to: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(to)
        )
    }

    fn update_type_sql(
        &self,
        table: &str,
        column: &str,
        to: &ColumnType,
        args: &TypeArgs,
    ) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.type_sql(to, args)
        )
    }

    fn update_nullable_sql(&self, table: &str, column: &str, nullable: bool) -> String {
        // MODIFY COLUMN restates the full type, which an action alone does not carry.
        format!(
            "-- mysql: set {table}.{column} {} by restating its type with MODIFY COLUMN",
            if nullable { "NULL" } else { "NOT NULL" }
        )
    }

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
                "ALTER TABLE {} DROP INDEX {}",
                self.quote_identifier(table),
                self.quote_identifier(key)
            )
        }
    }

    fn state_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (`key` VARCHAR(64) PRIMARY KEY, `value` JSON)",
            self.quote_identifier(table)
        )
    }

    fn state_set_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (`key`, `value`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `value` = VALUES(`value`)",
            self.quote_identifier(table)
        )
    }

    fn test_table_sql(&self, name: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
  id INT NOT NULL AUTO_INCREMENT,
  tinyint_ TINYINT,
  smallint_ SMALLINT,
  int_ INT,
  bigint_ BIGINT,
  decimal_ DECIMAL(10, 2),
  float_ FLOAT,
  double_ DOUBLE,
  varchar_ VARCHAR(64),
  text_ TEXT,
  datetime_ DATETIME,
  timestamp_ TIMESTAMP NULL,
  json_ JSON,
  not_null_ INT NOT NULL,
  PRIMARY KEY (id)
)",
            self.quote_identifier(name)
        )
    }
}
