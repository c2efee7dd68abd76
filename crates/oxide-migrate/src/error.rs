//! Error types for the migration system.

use std::path::PathBuf;

use oxide_schema::{DriverError, SchemaError};

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A caller-supplied argument is out of range or does not resolve.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state or environment.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// Configuration is missing or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Migration files could not be listed or parsed.
    #[error("Failed to discover migrations in '{}': {message}", location.display())]
    Discovery {
        /// Directory or file that failed.
        location: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The injected executor failed.
    #[error("Database error: {0}")]
    Driver(#[from] DriverError),

    /// Introspection or schema validation failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Database error from the bundled SQLite driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    pub(crate) fn discovery(location: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Discovery {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
