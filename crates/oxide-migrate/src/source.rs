//! Where migration units come from.
//!
//! A unit is a pair of forward/backward procedures. A [`MigrationSource`]
//! lists unit file names (`<id>.<description><suffix>.<ext>`) and loads
//! units by name. [`DirectorySource`] reads SQL files from disk;
//! [`StaticSource`] holds units registered in code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use oxide_schema::Executor;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};

/// Marker line opening the forward section of a SQL migration file.
pub const FORWARD_MARKER: &str = "-- forward";

/// Marker line opening the backward section of a SQL migration file.
pub const BACKWARD_MARKER: &str = "-- backward";

/// One reversible schema change.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    /// Applies the change.
    async fn forward(&self, executor: &dyn Executor) -> Result<()>;

    /// Reverts the change.
    async fn backward(&self, executor: &dyn Executor) -> Result<()>;
}

/// Lists and loads migration units.
#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// Returns every unit file name the source knows about.
    async fn list_unit_files(&self) -> Result<Vec<String>>;

    /// Loads the unit behind `file_name`.
    async fn load_unit(&self, file_name: &str) -> Result<Arc<dyn MigrationUnit>>;
}

/// Extracts the numeric id from a unit file name (`12.add_users.m.sql` is 12).
///
/// Ids start at 1.
#[must_use]
pub fn parse_unit_id(file_name: &str) -> Option<u64> {
    let (prefix, _) = file_name.split_once('.')?;
    prefix.parse().ok().filter(|id| *id > 0)
}

/// Runs statements in order. Statements starting with `--` are skipped.
///
/// Returns how many statements ran.
pub async fn execute_statements(executor: &dyn Executor, statements: &[String]) -> Result<usize> {
    let mut executed = 0;
    for sql in statements {
        let sql = sql.trim();
        if sql.is_empty() {
            continue;
        }
        if sql.starts_with("--") {
            warn!(sql = %sql, "Skipping unsupported operation");
            continue;
        }
        debug!(sql = %sql, "Executing SQL");
        executor.query(sql).await?;
        executed += 1;
    }
    Ok(executed)
}

// ============================================================================
// SQL units
// ============================================================================

/// A unit made of forward and backward SQL statement lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlUnit {
    /// Statements applied by `forward`.
    pub forward: Vec<String>,
    /// Statements applied by `backward`.
    pub backward: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Forward,
    Backward,
}

impl SqlUnit {
    /// Creates a unit from statement lists.
    pub fn new(forward: Vec<String>, backward: Vec<String>) -> Self {
        Self { forward, backward }
    }

    /// Parses a migration file body.
    ///
    /// The body needs a `-- forward` line and a `-- backward` line. A
    /// statement ends at a line ending in `;`. Comment lines between
    /// statements are dropped.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut unit = Self::default();
        let mut section = Section::Preamble;
        let mut seen_forward = false;
        let mut seen_backward = false;
        let mut buffer = String::new();

        for (number, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if let Some(next) = marker(trimmed) {
                unit.flush(section, &mut buffer);
                match next {
                    Section::Forward if seen_forward => {
                        return Err(format!(
                            "line {}: duplicate '{FORWARD_MARKER}' marker",
                            number + 1
                        ));
                    }
                    Section::Backward if seen_backward => {
                        return Err(format!(
                            "line {}: duplicate '{BACKWARD_MARKER}' marker",
                            number + 1
                        ));
                    }
                    Section::Forward => seen_forward = true,
                    Section::Backward => seen_backward = true,
                    Section::Preamble => {}
                }
                section = next;
                continue;
            }

            if buffer.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
                continue;
            }
            if section == Section::Preamble {
                return Err(format!(
                    "line {}: statement before the '{FORWARD_MARKER}' marker",
                    number + 1
                ));
            }

            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(line.trim_end());
            if trimmed.ends_with(';') {
                unit.flush(section, &mut buffer);
            }
        }
        unit.flush(section, &mut buffer);

        if !seen_forward {
            return Err(format!("missing '{FORWARD_MARKER}' marker"));
        }
        if !seen_backward {
            return Err(format!("missing '{BACKWARD_MARKER}' marker"));
        }
        Ok(unit)
    }

    fn flush(&mut self, section: Section, buffer: &mut String) {
        let statement = buffer.trim().to_string();
        buffer.clear();
        if statement.is_empty() {
            return;
        }
        match section {
            Section::Forward => self.forward.push(statement),
            Section::Backward => self.backward.push(statement),
            Section::Preamble => {}
        }
    }

    /// Renders the unit in the file format [`SqlUnit::parse`] reads.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let sections = [
            (FORWARD_MARKER, &self.forward),
            (BACKWARD_MARKER, &self.backward),
        ];
        for (marker, statements) in sections {
            out.push_str(marker);
            out.push('\n');
            for statement in statements {
                out.push_str(statement);
                if !statement.starts_with("--") && !statement.ends_with(';') {
                    out.push(';');
                }
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

fn marker(line: &str) -> Option<Section> {
    let rest = line.strip_prefix("--")?.trim();
    if rest.eq_ignore_ascii_case("forward") {
        Some(Section::Forward)
    } else if rest.eq_ignore_ascii_case("backward") {
        Some(Section::Backward)
    } else {
        None
    }
}

#[async_trait]
impl MigrationUnit for SqlUnit {
    async fn forward(&self, executor: &dyn Executor) -> Result<()> {
        execute_statements(executor, &self.forward).await?;
        Ok(())
    }

    async fn backward(&self, executor: &dyn Executor) -> Result<()> {
        execute_statements(executor, &self.backward).await?;
        Ok(())
    }
}

// ============================================================================
// Directory source
// ============================================================================

/// Reads SQL migration files from a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    pattern: Regex,
}

impl DirectorySource {
    /// Creates a source for `<id>.<description><suffix>.<extension>` files.
    pub fn new(dir: impl Into<PathBuf>, suffix: &str, extension: &str) -> Result<Self> {
        let pattern = format!(
            r"^\d+\..+{}\.{}$",
            regex::escape(suffix),
            regex::escape(extension.trim_start_matches('.'))
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| MigrateError::InvalidConfig(format!("bad migration file pattern: {e}")))?;
        Ok(Self {
            dir: dir.into(),
            pattern,
        })
    }

    /// Creates a source from the migration configuration.
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        Self::new(&config.file_dir, &config.file_suffix, &config.file_extension)
    }

    /// Returns the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `true` if `file_name` is a migration file name.
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }
}

#[async_trait]
impl MigrationSource for DirectorySource {
    async fn list_unit_files(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| MigrateError::discovery(&self.dir, e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigrateError::discovery(&self.dir, e.to_string()))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if self.matches(&name) {
                files.push(name);
            }
        }
        files.sort_by(|a, b| parse_unit_id(a).cmp(&parse_unit_id(b)).then_with(|| a.cmp(b)));
        debug!(dir = %self.dir.display(), count = files.len(), "Listed migration files");
        Ok(files)
    }

    async fn load_unit(&self, file_name: &str) -> Result<Arc<dyn MigrationUnit>> {
        let path = self.dir.join(file_name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MigrateError::discovery(&path, e.to_string()))?;
        let unit =
            SqlUnit::parse(&content).map_err(|message| MigrateError::discovery(&path, message))?;
        Ok(Arc::new(unit))
    }
}

// ============================================================================
// Static source
// ============================================================================

/// Units registered in code under file-style names.
#[derive(Clone, Default)]
pub struct StaticSource {
    units: Vec<(String, Arc<dyn MigrationUnit>)>,
}

impl StaticSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a unit under `file_name`.
    #[must_use]
    pub fn with_unit(
        mut self,
        file_name: impl Into<String>,
        unit: impl MigrationUnit + 'static,
    ) -> Self {
        let unit: Arc<dyn MigrationUnit> = Arc::new(unit);
        self.units.push((file_name.into(), unit));
        self
    }

    /// Registers an already shared unit.
    pub fn add(&mut self, file_name: impl Into<String>, unit: Arc<dyn MigrationUnit>) {
        self.units.push((file_name.into(), unit));
    }
}

impl std::fmt::Debug for StaticSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.units.iter().map(|(name, _)| name))
            .finish()
    }
}

#[async_trait]
impl MigrationSource for StaticSource {
    async fn list_unit_files(&self) -> Result<Vec<String>> {
        Ok(self.units.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn load_unit(&self, file_name: &str) -> Result<Arc<dyn MigrationUnit>> {
        self.units
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, unit)| Arc::clone(unit))
            .ok_or_else(|| MigrateError::discovery(file_name, "no unit registered under this name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_id() {
        assert_eq!(parse_unit_id("1.create_table_a.m.sql"), Some(1));
        assert_eq!(parse_unit_id("42.x.m.sql"), Some(42));
        assert_eq!(parse_unit_id("0.zero.m.sql"), None);
        assert_eq!(parse_unit_id("abc.m.sql"), None);
        assert_eq!(parse_unit_id("7"), None);
    }

    #[test]
    fn test_parse_sections_and_statements() {
        let unit = SqlUnit::parse(
            "-- forward\n\
             -- create the table\n\
             CREATE TABLE a (\n  id INTEGER\n);\n\
             INSERT INTO a VALUES (1);\n\
             \n\
             -- backward\n\
             DROP TABLE a;\n",
        )
        .unwrap();

        assert_eq!(
            unit.forward,
            vec!["CREATE TABLE a (\n  id INTEGER\n);", "INSERT INTO a VALUES (1);"]
        );
        assert_eq!(unit.backward, vec!["DROP TABLE a;"]);
    }

    #[test]
    fn test_parse_requires_both_markers() {
        let err = SqlUnit::parse("-- forward\nCREATE TABLE a (id INTEGER);\n").unwrap_err();
        assert!(err.contains("-- backward"), "{err}");

        let err = SqlUnit::parse("-- backward\nDROP TABLE a;\n").unwrap_err();
        assert!(err.contains("-- forward"), "{err}");
    }

    #[test]
    fn test_parse_rejects_statements_outside_sections() {
        let err = SqlUnit::parse("DROP TABLE a;\n-- forward\n-- backward\n").unwrap_err();
        assert!(err.contains("line 1"), "{err}");
    }

    #[test]
    fn test_empty_sections_are_allowed() {
        let unit = SqlUnit::parse("-- forward\n-- backward\n").unwrap();
        assert!(unit.forward.is_empty());
        assert!(unit.backward.is_empty());
    }

    #[test]
    fn test_render_parses_back() {
        let unit = SqlUnit::new(
            vec!["CREATE TABLE a (id INTEGER)".to_string()],
            vec!["DROP TABLE a".to_string()],
        );
        let parsed = SqlUnit::parse(&unit.render()).unwrap();
        assert_eq!(parsed.forward, vec!["CREATE TABLE a (id INTEGER);"]);
        assert_eq!(parsed.backward, vec!["DROP TABLE a;"]);
    }

    #[test]
    fn test_directory_pattern() {
        let source = DirectorySource::new("migrations", ".m", "sql").unwrap();
        assert!(source.matches("1.create_users.m.sql"));
        assert!(source.matches("10.add.email.m.sql"));
        assert!(!source.matches("1.create_users.sql"));
        assert!(!source.matches("create_users.m.sql"));
        assert!(!source.matches("1.create_users.mxsql"));
    }

    #[tokio::test]
    async fn test_directory_listing_and_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("10.b.m.sql"), "-- forward\n-- backward\n").unwrap();
        std::fs::write(
            dir.path().join("2.a.m.sql"),
            "-- forward\nCREATE TABLE a (id INTEGER);\n-- backward\nDROP TABLE a;\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a migration").unwrap();
        std::fs::write(dir.path().join("3.broken.m.sql"), "-- forward\n").unwrap();

        let source = DirectorySource::new(dir.path(), ".m", "sql").unwrap();
        assert_eq!(
            source.list_unit_files().await.unwrap(),
            vec!["2.a.m.sql", "3.broken.m.sql", "10.b.m.sql"]
        );

        assert!(source.load_unit("2.a.m.sql").await.is_ok());
        assert!(matches!(
            source.load_unit("3.broken.m.sql").await,
            Err(MigrateError::Discovery { .. })
        ));
        assert!(matches!(
            source.load_unit("99.missing.m.sql").await,
            Err(MigrateError::Discovery { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_is_discovery_error() {
        let source = DirectorySource::new("/definitely/not/here", ".m", "sql").unwrap();
        assert!(matches!(
            source.list_unit_files().await,
            Err(MigrateError::Discovery { .. })
        ));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new()
            .with_unit("1.a.m", SqlUnit::default())
            .with_unit("2.b.m", SqlUnit::default());
        assert_eq!(source.list_unit_files().await.unwrap(), vec!["1.a.m", "2.b.m"]);
        assert!(source.load_unit("2.b.m").await.is_ok());
        assert!(source.load_unit("3.c.m").await.is_err());
    }
}
