//! Generates migration files for the directory source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oxide_schema::{Action, Dialect, Table, diff};
use tracing::info;

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::source::{SqlUnit, parse_unit_id};

/// Builds a file name such as `3.add_users_email.m.sql` with the default
/// suffix and extension.
pub fn generate_migration_name(id: u64, description: &str) -> String {
    let defaults = MigrationConfig::default();
    migration_file_name(id, description, &defaults.file_suffix, &defaults.file_extension)
}

/// Builds `<id>.<slug><suffix>.<extension>`.
pub fn migration_file_name(id: u64, description: &str, suffix: &str, extension: &str) -> String {
    format!(
        "{id}.{}{suffix}.{}",
        slugify(description),
        extension.trim_start_matches('.')
    )
}

/// Returns the id following the highest one among `existing` file names.
pub fn next_migration_id<S: AsRef<str>>(existing: &[S]) -> u64 {
    existing
        .iter()
        .filter_map(|name| parse_unit_id(name.as_ref()))
        .max()
        .unwrap_or(0)
        + 1
}

fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "migration".to_string()
    } else {
        slug.to_string()
    }
}

/// Renders one migration file.
#[derive(Debug, Clone)]
pub struct MigrationWriter {
    id: u64,
    description: String,
    suffix: String,
    extension: String,
    created_at: DateTime<Utc>,
    forward: Vec<String>,
    backward: Vec<String>,
}

impl MigrationWriter {
    /// Creates an empty migration.
    pub fn new(id: u64, description: impl Into<String>) -> Self {
        let defaults = MigrationConfig::default();
        Self {
            id,
            description: description.into(),
            suffix: defaults.file_suffix,
            extension: defaults.file_extension,
            created_at: Utc::now(),
            forward: Vec::new(),
            backward: Vec::new(),
        }
    }

    /// Uses the configured file suffix and extension.
    #[must_use]
    pub fn naming(mut self, config: &MigrationConfig) -> Self {
        self.suffix.clone_from(&config.file_suffix);
        self.extension.clone_from(&config.file_extension);
        self
    }

    /// Overrides the creation timestamp in the header.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Appends a forward statement.
    #[must_use]
    pub fn forward(mut self, sql: impl Into<String>) -> Self {
        self.forward.push(sql.into());
        self
    }

    /// Appends a backward statement.
    #[must_use]
    pub fn backward(mut self, sql: impl Into<String>) -> Self {
        self.backward.push(sql.into());
        self
    }

    /// Fills both sections from the difference between `target` and
    /// `current`, matching tables by name.
    ///
    /// Backward statements undo the forward ones in reverse order: created
    /// tables are dropped, changed tables are diffed the other way round.
    #[must_use]
    pub fn from_diff(
        mut self,
        dialect: &dyn Dialect,
        target: &BTreeMap<String, Table>,
        current: &BTreeMap<String, Table>,
    ) -> Self {
        let mut backward_groups = Vec::new();
        for (name, table) in target {
            let existing = current.get(name);
            let forward = diff(table, existing);
            if forward.is_empty() {
                continue;
            }
            let backward = match existing {
                Some(existing) => diff(existing, Some(table)),
                None => vec![Action::TableDrop {
                    table: table.name.clone(),
                }],
            };
            self.forward.extend(render(dialect, &forward));
            backward_groups.push(render(dialect, &backward));
        }
        for group in backward_groups.into_iter().rev() {
            self.backward.extend(group);
        }
        self
    }

    /// Returns `true` when both sections are empty.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }

    /// Returns the file name.
    pub fn file_name(&self) -> String {
        migration_file_name(self.id, &self.description, &self.suffix, &self.extension)
    }

    /// Renders the file content.
    pub fn generate(&self) -> String {
        let header = format!(
            "-- Migration: {}\n-- Generated by oxide-migrate {} on {}\n\n",
            self.description,
            env!("CARGO_PKG_VERSION"),
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let body = SqlUnit::new(self.forward.clone(), self.backward.clone()).render();
        header + &body
    }

    /// Writes the file into `dir`, creating the directory if needed.
    /// An existing file is never overwritten.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        if path.exists() {
            return Err(MigrateError::InvalidState(format!(
                "migration file already exists: {}",
                path.display()
            )));
        }
        std::fs::write(&path, self.generate())?;
        info!(path = %path.display(), "Created migration");
        Ok(path)
    }
}

fn render(dialect: &dyn Dialect, actions: &[Action]) -> Vec<String> {
    actions.iter().flat_map(|a| dialect.action_sql(a)).collect()
}
