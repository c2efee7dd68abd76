//! oxide-migrate CLI
//!
//! Command-line tool for managing database migrations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::prelude::*;

/// Numbered, reversible database migrations.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (overrides OXIDE_MIGRATE_URL and DATABASE_URL).
    #[arg(short, long)]
    database_url: Option<String>,

    /// Database dialect.
    #[arg(long)]
    dialect: Option<DialectKind>,

    /// Migrations directory.
    #[arg(short, long)]
    migrations_dir: Option<PathBuf>,

    /// Deployment environment (development, testing, production).
    #[arg(short, long)]
    environment: Option<Environment>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the state table.
    Init,

    /// Apply pending migrations, or move by a number of units.
    Migrate {
        /// Units to move: 0 applies everything pending, negative reverts.
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        step: i64,
    },

    /// Show every migration file and whether it is applied.
    Status,

    /// Print the last applied migration id (0 if none).
    Last,

    /// Print the server version and its databases.
    Server,

    /// Print the live schema as JSON.
    Inspect {
        /// Only this table.
        table: Option<String>,
    },

    /// Compare the live schema with a target schema file.
    Diff {
        /// JSON file with the target tables.
        #[arg(short, long)]
        target: PathBuf,

        /// Print SQL instead of JSON actions.
        #[arg(long)]
        sql: bool,
    },

    /// Create a new migration file.
    Make {
        /// Migration description.
        #[arg(short, long)]
        name: String,

        /// Fill the migration from the difference with this target schema.
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Print the file instead of writing it.
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop and recreate the state table, forgetting applied migrations.
    ResetState,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let overrides = ConfigOverrides {
        url: cli.database_url,
        dialect: cli.dialect,
        migrations_dir: cli.migrations_dir,
        environment: cli.environment,
    };
    let config = MigrateConfig::from_env(cli.config.as_deref(), &overrides)?;
    let db = Database::connect_sqlite(config).await?;

    match cli.command {
        Commands::Init => {
            db.state_init().await?;
            info!(table = %db.config().state.table_name, "State table ready");
        }

        Commands::Migrate { step } => {
            let report = db.migration_run(step).await?;
            if report.is_empty() {
                info!("Nothing to do.");
            } else {
                let verb = match report.direction {
                    Direction::Forward => "Applied",
                    Direction::Backward => "Reverted",
                };
                for unit in &report.units {
                    println!(" {verb} {}", unit.file);
                }
            }
            info!(ledger = ?report.ledger, "Migration log");
        }

        Commands::Status => {
            db.state_ensure_table().await?;
            let status = db.migrator().status().await?;
            if status.is_empty() {
                info!("No migration files found.");
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");
                for entry in &status {
                    let mark = if entry.applied { "X" } else { " " };
                    println!(" [{mark}] {}", entry.file);
                }
                println!();
            }
        }

        Commands::Last => {
            db.state_ensure_table().await?;
            println!("{}", db.migration_last().await?);
        }

        Commands::Server => {
            println!("{}", db.server_version().await?);
            for database in db.database_list().await? {
                match &database.file {
                    Some(file) => println!(" {} ({file})", database.name),
                    None => println!(" {}", database.name),
                }
            }
        }

        Commands::Inspect { table } => {
            let output = match table {
                Some(name) => {
                    let table = db
                        .table_pick(&name)
                        .await?
                        .with_context(|| format!("table {name} does not exist"))?;
                    serde_json::to_string_pretty(&table)?
                }
                None => serde_json::to_string_pretty(&db.snapshot().await?)?,
            };
            println!("{output}");
        }

        Commands::Diff { target, sql } => {
            let target = load_target(&target)?;
            let current = db.snapshot().await?;
            let actions = diff_snapshot(&target, &current);
            if sql {
                for action in &actions {
                    for statement in db.dialect().action_sql(action) {
                        println!("{statement};");
                    }
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&actions)?);
            }
        }

        Commands::Make {
            name,
            target,
            dry_run,
        } => {
            let id = db.migration_next_id().await?;
            let mut writer = MigrationWriter::new(id, &name).naming(&db.config().migration);
            if let Some(path) = target {
                let target = load_target(&path)?;
                let current = db.snapshot().await?;
                writer = writer.from_diff(db.dialect(), &target, &current);
                if writer.is_empty() {
                    info!("No changes detected.");
                    return Ok(());
                }
            }

            if dry_run {
                println!("Would create migration: {}", writer.file_name());
                println!("\n{}", writer.generate());
            } else {
                writer.write_to(&db.config().migration.file_dir)?;
            }
        }

        Commands::ResetState => {
            db.state_reset().await?;
            info!("State table reset.");
        }
    }

    Ok(())
}

/// Reads target tables from a JSON file holding either a list of tables or
/// an object keyed by table name.
fn load_target(path: &Path) -> anyhow::Result<BTreeMap<String, Table>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let tables: Vec<Table> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        serde_json::from_value::<BTreeMap<String, Table>>(value)?
            .into_values()
            .collect()
    };

    let mut target = BTreeMap::new();
    for table in tables {
        table.validate()?;
        target.insert(table.name.clone(), table);
    }
    Ok(target)
}
