//! Error types for introspection and schema handling.

/// SQLSTATE / vendor codes reported when a table does not exist.
const UNDEFINED_TABLE_CODES: &[&str] = &["42P01", "42S02", "1146"];

/// Message fragments drivers use for a missing table.
const UNDEFINED_TABLE_MESSAGES: &[&str] = &["does not exist", "doesn't exist", "no such table"];

/// An error reported by an [`Executor`](crate::Executor).
///
/// Drivers translate their native errors into this shape so the dialects can
/// classify them without knowing which driver is underneath.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    /// Engine error code (SQLSTATE or vendor code), when the driver has one.
    pub code: Option<String>,
    /// Human readable message.
    pub message: String,
}

impl DriverError {
    /// Creates an error with a message and no code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Attaches an engine error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns `true` if the error says the queried table does not exist.
    #[must_use]
    pub fn is_undefined_table(&self) -> bool {
        if self
            .code
            .as_deref()
            .is_some_and(|code| UNDEFINED_TABLE_CODES.contains(&code))
        {
            return true;
        }
        let message = self.message.to_lowercase();
        UNDEFINED_TABLE_MESSAGES
            .iter()
            .any(|fragment| message.contains(fragment))
    }
}

/// Errors raised while introspecting or validating schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The executor failed.
    #[error("Database error: {0}")]
    Driver(#[from] DriverError),

    /// A column violates the canonical model invariants.
    #[error("Invalid column '{column}': {message}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// What is wrong with it.
        message: String,
    },

    /// The dialect tag is not one of the supported engines.
    #[error("Unsupported dialect: \"{0}\"")]
    UnsupportedDialect(String),

    /// The engine has no way to perform the operation.
    #[error("{dialect} does not support {operation}")]
    Unsupported {
        /// Engine tag.
        dialect: String,
        /// What was attempted.
        operation: String,
    },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_table_by_code() {
        let err = DriverError::new("boom").with_code("42P01");
        assert!(err.is_undefined_table());
    }

    #[test]
    fn test_undefined_table_by_message() {
        assert!(DriverError::new("relation \"a\" does not exist").is_undefined_table());
        assert!(DriverError::new("Table 'db.a' doesn't exist").is_undefined_table());
        assert!(DriverError::new("no such table: a").is_undefined_table());
    }

    #[test]
    fn test_other_errors_are_not_downgraded() {
        let err = DriverError::new("syntax error at or near \"selec\"").with_code("42601");
        assert!(!err.is_undefined_table());
    }
}
