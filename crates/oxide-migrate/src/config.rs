//! Migration configuration.
//!
//! A [`MigrateConfig`] is assembled once, in precedence order: built-in
//! defaults, then an optional JSON file, then environment variables, then
//! explicit [`ConfigOverrides`] (typically CLI flags). The result is passed
//! by value to whatever needs it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use oxide_schema::DialectKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Prefix of the environment variables read by [`MigrateConfig::load`].
pub const ENV_PREFIX: &str = "OXIDE_MIGRATE_";

/// Deployment environment. Destructive helpers only run in `Testing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// Automated tests.
    #[serde(alias = "test")]
    Testing,
    /// Production.
    #[serde(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        })
    }
}

impl FromStr for Environment {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "testing" | "test" => Ok(Self::Testing),
            "production" | "prod" => Ok(Self::Production),
            other => Err(MigrateError::InvalidConfig(format!(
                "unknown environment \"{other}\""
            ))),
        }
    }
}

/// Where migration files live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory holding the migration files.
    pub file_dir: PathBuf,
    /// Marker between description and extension (`.m` in `1.init.m.sql`).
    pub file_suffix: String,
    /// File extension without the dot.
    pub file_extension: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            file_dir: PathBuf::from("migrations"),
            file_suffix: ".m".to_string(),
            file_extension: "sql".to_string(),
        }
    }
}

/// The key/value state table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Table name.
    pub table_name: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            table_name: "oxide_state".to_string(),
        }
    }
}

/// Statement logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log every statement at DEBUG.
    pub sql: bool,
    /// Include bound parameters in statement logs.
    pub params: bool,
}

/// Full configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Database engine.
    pub dialect: DialectKind,
    /// Connection URL. Takes priority over the discrete fields.
    pub url: Option<String>,
    /// Server host.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// User name.
    pub user: Option<String>,
    /// Password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Database name, or file path for SQLite.
    pub database: Option<String>,
    /// Deployment environment.
    pub environment: Environment,
    /// Migration files.
    pub migration: MigrationConfig,
    /// State table.
    pub state: StateConfig,
    /// Statement logging.
    pub log: LogConfig,
}

/// Values set explicitly by the caller; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Connection URL.
    pub url: Option<String>,
    /// Database engine.
    pub dialect: Option<DialectKind>,
    /// Migration directory.
    pub migrations_dir: Option<PathBuf>,
    /// Deployment environment.
    pub environment: Option<Environment>,
}

impl MigrateConfig {
    /// Builds a validated configuration from defaults, an optional JSON file,
    /// the given environment variables and explicit overrides.
    pub fn load<I>(file: Option<&Path>, env: I, overrides: &ConfigOverrides) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.apply_overrides(overrides);
        config.validate()?;
        debug!(
            dialect = %config.dialect,
            environment = %config.environment,
            migrations = %config.migration.file_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Same as [`MigrateConfig::load`], reading the process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are ignored.
    pub fn from_env(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let vars = std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        });
        Self::load(file, vars, overrides)
    }

    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            MigrateError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })
    }

    fn apply_env<I>(&mut self, env: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = env
            .into_iter()
            .filter(|(key, _)| key == "DATABASE_URL" || key.starts_with(ENV_PREFIX))
            .collect();
        let get = |name: &str| vars.get(&format!("{ENV_PREFIX}{name}")).cloned();

        if let Some(url) = get("URL").or_else(|| vars.get("DATABASE_URL").cloned()) {
            self.url = Some(url);
        }
        if let Some(dialect) = get("DIALECT") {
            self.dialect = dialect
                .parse()
                .map_err(|e| MigrateError::InvalidConfig(format!("{ENV_PREFIX}DIALECT: {e}")))?;
        }
        if let Some(host) = get("HOST") {
            self.host = Some(host);
        }
        if let Some(port) = get("PORT") {
            let port = port.trim().parse().map_err(|_| {
                MigrateError::InvalidConfig(format!("{ENV_PREFIX}PORT is not a port: \"{port}\""))
            })?;
            self.port = Some(port);
        }
        if let Some(user) = get("USER") {
            self.user = Some(user);
        }
        if let Some(password) = get("PASSWORD") {
            self.password = Some(password);
        }
        if let Some(database) = get("DATABASE") {
            self.database = Some(database);
        }
        if let Some(environment) = get("ENVIRONMENT") {
            self.environment = environment.parse()?;
        }
        if let Some(dir) = get("MIGRATION_DIR") {
            self.migration.file_dir = PathBuf::from(dir);
        }
        if let Some(suffix) = get("MIGRATION_SUFFIX") {
            self.migration.file_suffix = suffix;
        }
        if let Some(extension) = get("MIGRATION_EXTENSION") {
            self.migration.file_extension = extension;
        }
        if let Some(table) = get("STATE_TABLE") {
            self.state.table_name = table;
        }
        if let Some(flag) = get("LOG_SQL") {
            self.log.sql = parse_flag(&flag);
        }
        if let Some(flag) = get("LOG_PARAMS") {
            self.log.params = parse_flag(&flag);
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = &overrides.url {
            self.url = Some(url.clone());
        }
        if let Some(dialect) = overrides.dialect {
            self.dialect = dialect;
        }
        if let Some(dir) = &overrides.migrations_dir {
            self.migration.file_dir = dir.clone();
        }
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
    }

    /// Checks that the connection and migration settings are usable.
    pub fn validate(&self) -> Result<()> {
        let has_url = self.url.as_deref().is_some_and(|url| !url.is_empty());
        match self.dialect {
            DialectKind::Sqlite => {
                if !has_url && self.database.is_none() {
                    return Err(MigrateError::InvalidConfig(
                        "Required configs: {url} or {database}".to_string(),
                    ));
                }
            }
            DialectKind::Postgres | DialectKind::Mysql => {
                if !has_url && (self.host.is_none() || self.port.is_none() || self.user.is_none())
                {
                    return Err(MigrateError::InvalidConfig(
                        "Required configs: {url} or {user & host & port}".to_string(),
                    ));
                }
            }
        }
        if self.migration.file_dir.as_os_str().is_empty() {
            return Err(MigrateError::InvalidConfig(
                "Required configs: {migration.file_dir}".to_string(),
            ));
        }
        if self.state.table_name.trim().is_empty() {
            return Err(MigrateError::InvalidConfig(
                "Required configs: {state.table_name}".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URL for the bundled SQLite driver.
    pub fn sqlite_url(&self) -> Result<String> {
        if self.dialect != DialectKind::Sqlite {
            return Err(MigrateError::InvalidConfig(format!(
                "the bundled driver only speaks sqlite, configured dialect is {}",
                self.dialect
            )));
        }
        match (&self.url, &self.database) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(path)) => Ok(format!("sqlite:{path}")),
            (None, None) => Err(MigrateError::InvalidConfig(
                "Required configs: {url} or {database}".to_string(),
            )),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_from_env_ignores_non_utf8_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var("OXIDE_CONFIG_TEST_BYTES", OsStr::from_bytes(b"\xff\xfe"));
        let overrides = ConfigOverrides {
            url: Some("sqlite::memory:".to_string()),
            ..ConfigOverrides::default()
        };
        let config = MigrateConfig::from_env(None, &overrides).unwrap();
        std::env::remove_var("OXIDE_CONFIG_TEST_BYTES");
        assert_eq!(config.url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_defaults() {
        let config = MigrateConfig::default();
        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.migration.file_dir, PathBuf::from("migrations"));
        assert_eq!(config.migration.file_suffix, ".m");
        assert_eq!(config.migration.file_extension, "sql");
        assert_eq!(config.state.table_name, "oxide_state");
        assert!(!config.log.sql);
    }

    #[test]
    fn test_precedence_file_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oxide.json");
        std::fs::write(
            &path,
            r#"{
                "url": "sqlite:from-file.db",
                "environment": "production",
                "migration": { "file_dir": "db/migrations" },
                "state": { "table_name": "file_state" }
            }"#,
        )
        .unwrap();

        let config = MigrateConfig::load(
            Some(&path),
            env(&[
                ("DATABASE_URL", "sqlite:from-env.db"),
                ("OXIDE_MIGRATE_STATE_TABLE", "env_state"),
                ("OXIDE_MIGRATE_LOG_SQL", "true"),
                ("UNRELATED", "x"),
            ]),
            &ConfigOverrides {
                environment: Some(Environment::Testing),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.url.as_deref(), Some("sqlite:from-env.db"));
        assert_eq!(config.migration.file_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.migration.file_suffix, ".m");
        assert_eq!(config.state.table_name, "env_state");
        assert_eq!(config.environment, Environment::Testing);
        assert!(config.log.sql);
        assert!(!config.log.params);
    }

    #[test]
    fn test_prefixed_url_beats_database_url() {
        let config = MigrateConfig::load(
            None,
            env(&[
                ("DATABASE_URL", "sqlite:generic.db"),
                ("OXIDE_MIGRATE_URL", "sqlite:specific.db"),
            ]),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("sqlite:specific.db"));

        let config = MigrateConfig::load(
            None,
            env(&[("OXIDE_MIGRATE_URL", "sqlite:specific.db")]),
            &ConfigOverrides {
                url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_server_dialect_requires_connection_settings() {
        let err = MigrateConfig::load(
            None,
            env(&[("OXIDE_MIGRATE_DIALECT", "postgres"), ("OXIDE_MIGRATE_HOST", "db")]),
            &ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig(_)));

        let config = MigrateConfig::load(
            None,
            env(&[
                ("OXIDE_MIGRATE_DIALECT", "postgres"),
                ("OXIDE_MIGRATE_HOST", "db"),
                ("OXIDE_MIGRATE_PORT", "5432"),
                ("OXIDE_MIGRATE_USER", "app"),
            ]),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.port, Some(5432));
        assert!(config.sqlite_url().is_err());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for (key, value) in [
            ("OXIDE_MIGRATE_PORT", "http"),
            ("OXIDE_MIGRATE_DIALECT", "oracle"),
            ("OXIDE_MIGRATE_ENVIRONMENT", "staging"),
        ] {
            let err = MigrateConfig::load(
                None,
                env(&[("DATABASE_URL", "sqlite::memory:"), (key, value)]),
                &ConfigOverrides::default(),
            )
            .unwrap_err();
            assert!(matches!(err, MigrateError::InvalidConfig(_)), "{key}={value}");
        }
    }

    #[test]
    fn test_empty_state_table_is_rejected() {
        let err = MigrateConfig::load(
            None,
            env(&[("DATABASE_URL", "sqlite::memory:"), ("OXIDE_MIGRATE_STATE_TABLE", " ")]),
            &ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("state.table_name"));
    }

    #[test]
    fn test_sqlite_url_from_database_path() {
        let config = MigrateConfig {
            database: Some("app.db".to_string()),
            ..MigrateConfig::default()
        };
        assert_eq!(config.sqlite_url().unwrap(), "sqlite:app.db");
    }
}
