//! Applies and reverts migration units against the ledger.
//!
//! `run(0)` applies every pending unit in id order, `run(n)` the first `n`
//! pending ones and `run(-n)` reverts the last `n` applied ones, most recent
//! first. The ledger is persisted after every unit, so a failure leaves it
//! describing exactly the units that completed.

use std::sync::Arc;

use oxide_schema::{Dialect, Executor};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{MigrateError, Result};
use crate::ledger::{Ledger, StateStore};
use crate::source::{MigrationSource, MigrationUnit, parse_unit_id};

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Applying pending units.
    Forward,
    /// Reverting applied units.
    Backward,
}

/// One unit processed by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Unit id.
    pub id: u64,
    /// Unit file name.
    pub file: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Direction of the run.
    pub direction: Direction,
    /// Units processed, in execution order.
    pub units: Vec<MigrationRecord>,
    /// Ledger after the run.
    pub ledger: Vec<u64>,
}

impl MigrationReport {
    /// Returns `true` if nothing ran.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Whether a unit file is recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Unit id.
    pub id: u64,
    /// Unit file name.
    pub file: String,
    /// Recorded as applied.
    pub applied: bool,
}

/// Drives migration units. Runs must not overlap.
pub struct Migrator {
    executor: Arc<dyn Executor>,
    source: Arc<dyn MigrationSource>,
    ledger: Ledger,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl Migrator {
    /// Creates a migrator keeping its ledger in `state_table`.
    pub fn new(
        executor: Arc<dyn Executor>,
        dialect: Arc<dyn Dialect>,
        source: Arc<dyn MigrationSource>,
        state_table: impl Into<String>,
    ) -> Self {
        let store = StateStore::new(Arc::clone(&executor), dialect, state_table);
        Self {
            executor,
            source,
            ledger: Ledger::new(store),
        }
    }

    /// Returns the ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Lists every unit file name.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.source.list_unit_files().await
    }

    /// Lists the ids of every unit file, ascending. Duplicates are kept.
    pub async fn list_available_ids(&self) -> Result<Vec<u64>> {
        let files = self.list_files().await?;
        Ok(ids_of(&files))
    }

    /// Returns the applied ids in application order.
    pub async fn applied(&self) -> Result<Vec<u64>> {
        self.ledger.get().await
    }

    /// Returns available ids not yet applied, ascending.
    pub async fn pending(&self) -> Result<Vec<u64>> {
        let applied = self.applied().await?;
        let available = self.list_available_ids().await?;
        Ok(available
            .into_iter()
            .filter(|id| !applied.contains(id))
            .collect())
    }

    /// Returns the last applied id, or 0 when nothing is applied.
    pub async fn last(&self) -> Result<u64> {
        Ok(self.applied().await?.last().copied().unwrap_or(0))
    }

    /// Returns every unit file with its applied flag.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied().await?;
        let mut files: Vec<(u64, String)> = self
            .list_files()
            .await?
            .into_iter()
            .filter_map(|file| parse_unit_id(&file).map(|id| (id, file)))
            .collect();
        files.sort();
        Ok(files
            .into_iter()
            .map(|(id, file)| MigrationStatus {
                id,
                applied: applied.contains(&id),
                file,
            })
            .collect())
    }

    /// Moves the ledger by `step` units (0 = every pending unit).
    pub async fn run(&self, step: i64) -> Result<MigrationReport> {
        self.ledger.ensure_table().await?;

        let mut ledger = self.ledger.get().await?;
        let files = self.list_files().await?;
        let available = ids_of(&files);

        let distance = usize::try_from(step.unsigned_abs()).unwrap_or(usize::MAX);
        if distance > available.len() {
            return Err(MigrateError::InvalidArgument(format!(
                "Invalid step {step}, migration files count: {}",
                available.len()
            )));
        }

        let (direction, targets) = if step >= 0 {
            let pending: Vec<u64> = available
                .iter()
                .copied()
                .filter(|id| !ledger.contains(id))
                .collect();
            let take = if step == 0 {
                pending.len()
            } else {
                distance.min(pending.len())
            };
            (Direction::Forward, pending[..take].to_vec())
        } else {
            let take = distance.min(ledger.len());
            let tail = ledger[ledger.len() - take..].iter().rev().copied().collect();
            (Direction::Backward, tail)
        };

        // Every target resolves and loads before any unit runs.
        let mut plan: Vec<(MigrationRecord, Arc<dyn MigrationUnit>)> = Vec::new();
        for id in targets {
            let file = resolve_file(&files, id)?;
            let unit = self.source.load_unit(&file).await?;
            plan.push((MigrationRecord { id, file }, unit));
        }

        if plan.is_empty() {
            info!("No migrations to run");
        }

        let mut units = Vec::with_capacity(plan.len());
        for (record, unit) in plan {
            match direction {
                Direction::Forward => {
                    info!(id = record.id, file = %record.file, "Applying migration");
                    unit.forward(self.executor.as_ref()).await?;
                    ledger.push(record.id);
                }
                Direction::Backward => {
                    info!(id = record.id, file = %record.file, "Reverting migration");
                    unit.backward(self.executor.as_ref()).await?;
                    if ledger.pop() != Some(record.id) {
                        warn!(id = record.id, "Ledger tail did not match the reverted migration");
                    }
                }
            }
            self.ledger.set(&ledger).await?;
            units.push(record);
        }

        Ok(MigrationReport {
            direction,
            units,
            ledger,
        })
    }
}

fn ids_of(files: &[String]) -> Vec<u64> {
    let mut ids: Vec<u64> = files.iter().filter_map(|f| parse_unit_id(f)).collect();
    ids.sort_unstable();
    ids
}

fn resolve_file(files: &[String], id: u64) -> Result<String> {
    let mut matching = files.iter().filter(|f| parse_unit_id(f) == Some(id));
    match (matching.next(), matching.next()) {
        (Some(file), None) => Ok(file.clone()),
        (None, _) => Err(MigrateError::InvalidArgument(format!(
            "no migration file for id {id}"
        ))),
        (Some(first), Some(second)) => Err(MigrateError::InvalidArgument(format!(
            "migration id {id} is ambiguous: {first}, {second}"
        ))),
    }
}
