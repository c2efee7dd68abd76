//! Canonical schema representation types.
//!
//! Every dialect normalizes its introspection output into these types, so the
//! diff engine and the tooling around it never look at engine-specific rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Logical column type, independent of the engine that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// 8-bit integer (MySQL `tinyint`).
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Exact decimal with optional precision and scale.
    Decimal,
    /// Exact numeric (alias family of decimal on most engines).
    Numeric,
    /// Single precision float.
    Real,
    /// Double precision float.
    Double,
    /// Boolean.
    Boolean,
    /// Fixed-length character string.
    Char,
    /// Variable-length character string.
    Varchar,
    /// Unbounded text.
    Text,
    /// Date only.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// Time interval.
    Interval,
    /// JSON document stored as text.
    Json,
    /// Binary JSON (PostgreSQL `jsonb`).
    Jsonb,
    /// UUID.
    Uuid,
    /// Fixed or variable length binary with a length.
    Binary,
    /// Binary large object.
    Blob,
    /// A type name no dialect recognised, kept verbatim.
    Other(String),
}

impl ColumnType {
    /// Maps a raw engine type name to its logical type.
    ///
    /// Matching is case-insensitive and covers the aliases PostgreSQL, MySQL
    /// and SQLite report. Unknown names never fail: they come back as
    /// [`ColumnType::Other`] so callers can decide what to do with them.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "tinyint" | "int1" => Self::TinyInt,
            "smallint" | "int2" | "smallserial" => Self::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => Self::Integer,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            "decimal" | "dec" => Self::Decimal,
            "numeric" => Self::Numeric,
            "real" | "float" | "float4" => Self::Real,
            "double" | "double precision" | "float8" => Self::Double,
            "boolean" | "bool" => Self::Boolean,
            "char" | "character" | "bpchar" => Self::Char,
            "varchar" | "character varying" | "nvarchar" => Self::Varchar,
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" => Self::Text,
            "date" => Self::Date,
            "time" | "time without time zone" => Self::Time,
            "timestamp" | "timestamp without time zone" | "datetime" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::TimestampTz,
            "interval" => Self::Interval,
            "json" => Self::Json,
            "jsonb" => Self::Jsonb,
            "uuid" => Self::Uuid,
            "binary" | "varbinary" => Self::Binary,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "bytea" => Self::Blob,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Decimal => "decimal",
            Self::Numeric => "numeric",
            Self::Real => "real",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Varchar => "varchar",
            Self::Text => "text",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Interval => "interval",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
            Self::Uuid => "uuid",
            Self::Binary => "binary",
            Self::Blob => "blob",
            Self::Other(raw) => raw,
        }
    }

    /// Types whose declaration carries a length (`varchar(255)`).
    #[must_use]
    pub fn is_length_bearing(&self) -> bool {
        matches!(self, Self::Char | Self::Varchar | Self::Binary)
    }

    /// Types that carry precision and scale.
    #[must_use]
    pub fn is_decimal(&self) -> bool {
        matches!(self, Self::Decimal | Self::Numeric)
    }

    /// Temporal types that carry a fractional seconds precision.
    #[must_use]
    pub fn is_temporal_with_precision(&self) -> bool {
        matches!(
            self,
            Self::Time | Self::Timestamp | Self::TimestampTz | Self::Interval
        )
    }

    /// Returns `true` for [`ColumnType::Other`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ColumnType {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<&str> for ColumnType {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.as_str().to_string()
    }
}

/// Optional size arguments of a type declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeArgs {
    /// Length of character/binary types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Precision of decimal types or fractional seconds of temporal types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Scale of decimal types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl TypeArgs {
    /// Returns `true` if no argument is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.precision.is_none() && self.scale.is_none()
    }
}

/// Canonical column description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Size arguments of the type.
    #[serde(default, skip_serializing_if = "TypeArgs::is_empty")]
    pub type_args: TypeArgs,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Raw default expression as the engine reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Column is (part of) the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Column carries a single-column UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Column comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

const fn default_nullable() -> bool {
    true
}

impl Column {
    /// Creates a nullable column without arguments or constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            type_args: TypeArgs::default(),
            nullable: true,
            default_value: None,
            primary: false,
            unique: false,
            comment: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the type length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.type_args.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.type_args.precision = Some(precision);
        self.type_args.scale = scale;
        self
    }

    /// Sets the raw default expression.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Marks the column as primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Checks the column invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidColumn`] for an empty name, or a
    /// decimal whose scale exceeds its precision.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::InvalidColumn {
                column: self.name.clone(),
                message: "column name is empty".to_string(),
            });
        }
        if !self.column_type.is_decimal() {
            return Ok(());
        }
        match (self.type_args.precision, self.type_args.scale) {
            (Some(precision), Some(scale)) if scale > precision => {
                Err(SchemaError::InvalidColumn {
                    column: self.name.clone(),
                    message: format!("scale {scale} exceeds precision {precision}"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing columns, in constraint order.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references_table: String,
    /// Referenced columns, in constraint order.
    pub references_columns: Vec<String>,
}

/// One database (or attached SQLite schema) on a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Owning role. Only PostgreSQL reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Character set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collate: Option<String>,
    /// Backing file. Only SQLite reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Canonical table description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns keyed by name.
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    /// Primary key columns in key order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
    /// Unique constraints keyed by constraint name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unique_keys: BTreeMap<String, Vec<String>>,
    /// Foreign keys keyed by constraint name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: BTreeMap<String, ForeignKey>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            primary_key: None,
            unique_keys: BTreeMap::new(),
            foreign_keys: BTreeMap::new(),
        }
    }

    /// Adds a column. A primary column is appended to the primary key.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        if column.primary {
            let key = self.primary_key.get_or_insert_with(Vec::new);
            if !key.contains(&column.name) {
                key.push(column.name.clone());
            }
        }
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = Some(columns);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique_key(mut self, name: impl Into<String>, columns: Vec<String>) -> Self {
        self.unique_keys.insert(name.into(), columns);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>, fk: ForeignKey) -> Self {
        self.foreign_keys.insert(name.into(), fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Checks every column.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError::InvalidColumn`] found.
    pub fn validate(&self) -> Result<()> {
        self.columns.values().try_for_each(Column::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_aliases() {
        assert_eq!(ColumnType::from_raw("INT4"), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_raw("character varying"),
            ColumnType::Varchar
        );
        assert_eq!(
            ColumnType::from_raw("timestamp without time zone"),
            ColumnType::Timestamp
        );
        assert_eq!(
            ColumnType::from_raw("timestamp with time zone"),
            ColumnType::TimestampTz
        );
        assert_eq!(ColumnType::from_raw("bytea"), ColumnType::Blob);
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let ty = ColumnType::from_raw("tsvector");
        assert_eq!(ty, ColumnType::Other("tsvector".to_string()));
        assert!(ty.is_unknown());
        assert_eq!(ty.as_str(), "tsvector");
    }

    #[test]
    fn test_column_type_serializes_as_name() {
        let json = serde_json::to_string(&ColumnType::Varchar).unwrap();
        assert_eq!(json, "\"varchar\"");
        let back: ColumnType = serde_json::from_str("\"jsonb\"").unwrap();
        assert_eq!(back, ColumnType::Jsonb);
    }

    #[test]
    fn test_decimal_scale_must_not_exceed_precision() {
        let ok = Column::new("price", ColumnType::Decimal).precision(10, Some(2));
        assert!(ok.validate().is_ok());

        let bad = Column::new("price", ColumnType::Decimal).precision(2, Some(4));
        assert!(matches!(
            bad.validate(),
            Err(SchemaError::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_empty_column_name_is_invalid() {
        let table = Table::new("t").column(Column::new("", ColumnType::Text));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_table_builder_tracks_primary_key() {
        let table = Table::new("users")
            .column(Column::new("id", ColumnType::BigInt).primary().not_null())
            .column(Column::new("email", ColumnType::Varchar).length(255));

        assert_eq!(table.primary_key, Some(vec!["id".to_string()]));
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.get_column("email").unwrap().type_args.length, Some(255));
    }

    #[test]
    fn test_table_deserializes_with_defaults() {
        let table: Table = serde_json::from_str(
            r#"{ "name": "a", "columns": { "id": { "name": "id", "type": "int4", "nullable": false } } }"#,
        )
        .unwrap();
        let id = table.get_column("id").unwrap();
        assert_eq!(id.column_type, ColumnType::Integer);
        assert!(!id.nullable);
        assert!(!id.primary);
        assert!(table.primary_key.is_none());
    }
}
