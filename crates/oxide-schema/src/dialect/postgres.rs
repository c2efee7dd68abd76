//! PostgreSQL dialect.
//!
//! Columns come from `information_schema.columns`, keys from the
//! `information_schema` constraint views.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    ConstraintKind, ConstraintRow, Dialect, DialectKind, build_table, describe_rows, render_type,
    type_args_for,
};
use crate::error::Result;
use crate::executor::{Executor, Row, row_flag, row_str, row_string, row_u32};
use crate::schema::{Column, ColumnType, Table, TypeArgs};

const LIST_TABLES_SQL: &str = r"
SELECT c.relname AS name
  FROM pg_catalog.pg_class c
  LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
 WHERE pg_catalog.pg_table_is_visible(c.oid)
   AND c.relkind IN ('r', 'p')
   AND n.nspname NOT IN ('pg_catalog', 'information_schema')
   AND n.nspname !~ '^pg_toast'
   AND c.relname NOT LIKE 'pg\_%'
 ORDER BY c.relname
";

// Both descriptions are limited to the schema a bare table name resolves
// to through the search path, like `list_tables`.
const DESCRIBE_COLUMNS_SQL: &str = r"
SELECT column_name,
       data_type,
       udt_name,
       is_nullable,
       column_default,
       character_maximum_length,
       numeric_precision,
       numeric_scale,
       datetime_precision,
       col_description(format('%I.%I', table_schema, table_name)::regclass, ordinal_position)
           AS column_comment
  FROM information_schema.columns
 WHERE table_name = $1
   AND table_schema = (
       SELECT n.nspname
         FROM pg_catalog.pg_class c
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE c.relname = $1
          AND c.relkind IN ('r', 'p')
          AND pg_catalog.pg_table_is_visible(c.oid))
 ORDER BY ordinal_position
";

const DESCRIBE_CONSTRAINTS_SQL: &str = r"
SELECT tc.constraint_name AS name,
       tc.constraint_type AS type,
       kcu.column_name AS column_name,
       ccu.table_name AS ref_table,
       ccu.column_name AS ref_column
  FROM information_schema.table_constraints tc
  JOIN information_schema.key_column_usage kcu
    ON kcu.constraint_name = tc.constraint_name
   AND kcu.table_schema = tc.table_schema
   AND kcu.table_name = tc.table_name
  LEFT JOIN information_schema.constraint_column_usage ccu
    ON tc.constraint_type = 'FOREIGN KEY'
   AND ccu.constraint_name = tc.constraint_name
   AND ccu.constraint_schema = tc.constraint_schema
 WHERE tc.table_name = $1
   AND tc.table_schema = (
       SELECT n.nspname
         FROM pg_catalog.pg_class c
         JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE c.relname = $1
          AND c.relkind IN ('r', 'p')
          AND pg_catalog.pg_table_is_visible(c.oid))
   AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE', 'FOREIGN KEY')
 ORDER BY tc.constraint_name, kcu.ordinal_position
";

const DATABASE_COLUMNS_SQL: &str = r#"
SELECT d.datname AS "name",
       pg_catalog.pg_get_userbyid(d.datdba) AS "owner",
       pg_catalog.pg_encoding_to_char(d.encoding) AS "encoding",
       d.datcollate AS "collate"
  FROM pg_catalog.pg_database d"#;

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn constraint_row(row: &Row) -> Option<ConstraintRow> {
        let kind = match row_str(row, "type")? {
            "PRIMARY KEY" => ConstraintKind::PrimaryKey,
            "UNIQUE" => ConstraintKind::Unique,
            "FOREIGN KEY" => ConstraintKind::ForeignKey,
            _ => return None,
        };
        let references = match (row_string(row, "ref_table"), row_string(row, "ref_column")) {
            (Some(table), Some(column)) => Some((table, column)),
            _ => None,
        };
        Some(ConstraintRow {
            name: row_string(row, "name")?,
            kind,
            column: row_string(row, "column_name")?,
            references,
        })
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn normalize_column(&self, row: &Row) -> Column {
        let data_type = row_str(row, "data_type").unwrap_or_default();
        let raw_type = match data_type {
            "USER-DEFINED" | "ARRAY" => row_str(row, "udt_name").unwrap_or(data_type),
            other => other,
        };
        let column_type = ColumnType::from_raw(raw_type);

        let precision = if column_type.is_decimal() {
            row_u32(row, "numeric_precision")
        } else {
            row_u32(row, "datetime_precision")
        };
        let type_args = type_args_for(
            &column_type,
            row_u32(row, "character_maximum_length"),
            precision,
            row_u32(row, "numeric_scale"),
        );

        Column {
            name: row_string(row, "column_name").unwrap_or_default(),
            column_type,
            type_args,
            nullable: row_flag(row, "is_nullable"),
            default_value: row.get("column_default").filter(|v| !v.is_null()).cloned(),
            primary: false,
            unique: false,
            comment: row_string(row, "column_comment"),
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
        let params = [Value::String(name.to_string())];
        let Some(rows) = describe_rows(executor, DESCRIBE_COLUMNS_SQL, &params).await? else {
            return Ok(None);
        };
        let columns = rows.iter().map(|row| self.normalize_column(row)).collect();

        let constraints = describe_rows(executor, DESCRIBE_CONSTRAINTS_SQL, &params)
            .await?
            .unwrap_or_default()
            .iter()
            .filter_map(Self::constraint_row)
            .collect();

        Ok(Some(build_table(name, columns, constraints)))
    }

    fn database_list_sql(&self) -> String {
        format!("{DATABASE_COLUMNS_SQL}\n ORDER BY 1")
    }

    fn database_pick_sql(&self) -> String {
        format!("{DATABASE_COLUMNS_SQL}\n WHERE d.datname = $1\n LIMIT 1")
    }

    /// PostgreSQL has no one-byte integer: `TinyInt` renders as `SMALLINT`
    /// and reads back as `SmallInt`.
    fn type_sql(&self, column_type: &ColumnType, args: &TypeArgs) -> String {
        let name = match column_type {
            ColumnType::TinyInt | ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Real => "REAL",
            ColumnType::Double => "DOUBLE PRECISION",
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
            // BYTEA has no length.
            ColumnType::Binary | ColumnType::Blob => return "BYTEA".to_string(),
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
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.type_sql(to, args)
        )
    }

    fn update_nullable_sql(&self, table: &str, column: &str, nullable: bool) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            if nullable { "DROP NOT NULL" } else { "SET NOT NULL" }
        )
    }

    fn state_table_sql(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\"key\" VARCHAR(64) PRIMARY KEY, \"value\" JSONB)",
            self.quote_identifier(table)
        )
    }

    fn state_set_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (\"key\", \"value\") VALUES ($1, $2::jsonb) \
             ON CONFLICT (\"key\") DO UPDATE SET \"value\" = EXCLUDED.\"value\"",
            self.quote_identifier(table)
        )
    }

    fn test_table_sql(&self, name: &str) -> String {
        let table = self.quote_identifier(name);
        let pk = self.quote_identifier(&format!("pk_{name}"));
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
  id SERIAL,
  smallint_ SMALLINT,
  int_ INT,
  bigint_ BIGINT,
  decimal_ DECIMAL(10, 2),
  numeric_ NUMERIC,
  real_ REAL,
  double_ DOUBLE PRECISION,
  varchar_ VARCHAR(64),
  text_ TEXT,
  timestamp_ TIMESTAMP,
  interval_ INTERVAL,
  json_ JSONB,
  not_null_ INT NOT NULL,
  CONSTRAINT {pk} PRIMARY KEY (id)
)"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_normalize_varchar() {
        let column = PostgresDialect::new().normalize_column(&raw(json!({
            "column_name": "email",
            "data_type": "character varying",
            "udt_name": "varchar",
            "is_nullable": "YES",
            "column_default": null,
            "character_maximum_length": 255,
            "numeric_precision": null,
            "numeric_scale": null,
            "datetime_precision": null,
            "column_comment": "login"
        })));

        assert_eq!(column.name, "email");
        assert_eq!(column.column_type, ColumnType::Varchar);
        assert_eq!(column.type_args.length, Some(255));
        assert!(column.nullable);
        assert_eq!(column.default_value, None);
        assert_eq!(column.comment.as_deref(), Some("login"));
    }

    #[test]
    fn test_normalize_integer_drops_catalog_precision() {
        let column = PostgresDialect::new().normalize_column(&raw(json!({
            "column_name": "id",
            "data_type": "integer",
            "is_nullable": "NO",
            "column_default": "nextval('a_id_seq'::regclass)",
            "numeric_precision": 32,
            "numeric_scale": 0
        })));

        assert_eq!(column.column_type, ColumnType::Integer);
        assert!(column.type_args.is_empty());
        assert!(!column.nullable);
        assert_eq!(
            column.default_value,
            Some(json!("nextval('a_id_seq'::regclass)"))
        );
    }

    #[test]
    fn test_normalize_decimal_and_timestamp() {
        let dialect = PostgresDialect::new();
        let decimal = dialect.normalize_column(&raw(json!({
            "column_name": "price",
            "data_type": "numeric",
            "is_nullable": "YES",
            "numeric_precision": 10,
            "numeric_scale": 2
        })));
        assert_eq!(decimal.type_args.precision, Some(10));
        assert_eq!(decimal.type_args.scale, Some(2));

        let ts = dialect.normalize_column(&raw(json!({
            "column_name": "created_at",
            "data_type": "timestamp with time zone",
            "is_nullable": "NO",
            "datetime_precision": 6
        })));
        assert_eq!(ts.column_type, ColumnType::TimestampTz);
        assert_eq!(ts.type_args.precision, Some(6));
        assert_eq!(ts.type_args.scale, None);
    }

    #[test]
    fn test_user_defined_type_uses_udt_name() {
        let column = PostgresDialect::new().normalize_column(&raw(json!({
            "column_name": "mood",
            "data_type": "USER-DEFINED",
            "udt_name": "mood_enum",
            "is_nullable": "YES"
        })));
        assert_eq!(column.column_type, ColumnType::Other("mood_enum".to_string()));
    }

    #[test]
    fn test_alter_statements() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.update_type_sql("a", "b", &ColumnType::Varchar, &TypeArgs {
                length: Some(10),
                ..TypeArgs::default()
            }),
            "ALTER TABLE \"a\" ALTER COLUMN \"b\" TYPE VARCHAR(10)"
        );
        assert_eq!(
            dialect.update_nullable_sql("a", "b", true),
            "ALTER TABLE \"a\" ALTER COLUMN \"b\" DROP NOT NULL"
        );
        assert_eq!(
            dialect.state_get_sql("oxide_state"),
            "SELECT \"value\" FROM \"oxide_state\" WHERE \"key\" = $1"
        );
    }
}
