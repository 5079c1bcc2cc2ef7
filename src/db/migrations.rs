//! Migration runner.
//!
//! Resolves a requested target into an ordered plan over the catalog and
//! executes it one step at a time, persisting the version after every
//! successful step so that a failed run resumes where it stopped.
//!
//! Only one runner may operate against a given store at a time; the
//! version record is not locked.

use tracing::{error, info, warn};

use super::{KeyValueStore, VersionStore};
use crate::error::{AppError, AppResult};
use crate::migration::Catalog;
use crate::models::{Direction, MigrationPlan, RunReport, StepRecord, UpgradeTarget};

/// Plans and executes upgrades and downgrades.
pub struct Sequencer<'a> {
    catalog: &'a Catalog,
    store: &'a dyn KeyValueStore,
    versions: VersionStore<'a>,
}

impl<'a> Sequencer<'a> {
    pub fn new(catalog: &'a Catalog, store: &'a dyn KeyValueStore, version_table: &str) -> Self {
        Sequencer {
            catalog,
            store,
            versions: VersionStore::new(store, version_table),
        }
    }

    /// Read the persisted version, creating the version table on first use.
    pub async fn current_version(&self) -> AppResult<u32> {
        self.versions.ensure_initialized().await?;
        self.versions.get_version().await
    }

    /// Resolve a requested target to a concrete version within the catalog.
    pub fn resolve_target(&self, target: UpgradeTarget) -> AppResult<u32> {
        match target {
            UpgradeTarget::Latest => Ok(self.catalog.head_version()),
            UpgradeTarget::Version(version) if version as usize > self.catalog.len() => {
                Err(AppError::InvalidTarget(format!(
                    "version {} not found (highest available version is {})",
                    version,
                    self.catalog.head_version()
                )))
            }
            UpgradeTarget::Version(version) => Ok(version),
        }
    }

    /// Entries in `(current, target]`, ascending. Empty when `target <= current`.
    pub fn plan_upgrade(&self, current: u32, target: u32) -> AppResult<MigrationPlan<'a>> {
        if target <= current {
            return Ok(MigrationPlan {
                direction: Direction::Upgrade,
                from: current,
                to: current,
                steps: Vec::new(),
            });
        }

        Ok(MigrationPlan {
            direction: Direction::Upgrade,
            from: current,
            to: target,
            steps: self.catalog.window(current, target)?,
        })
    }

    /// Entries in `(current - steps, current]`, descending.
    pub fn plan_downgrade(&self, current: u32, steps: i64) -> AppResult<MigrationPlan<'a>> {
        if steps < 0 {
            return Err(AppError::InvalidSteps(steps));
        }

        let desired = i64::from(current) - steps;
        if desired < 0 {
            return Err(AppError::BelowFloor { current, steps });
        }
        let desired = desired as u32;

        let mut entries = if desired == current {
            Vec::new()
        } else {
            self.catalog.window(desired, current)?
        };
        entries.reverse();

        Ok(MigrationPlan {
            direction: Direction::Downgrade,
            from: current,
            to: desired,
            steps: entries,
        })
    }

    /// Apply every pending migration up to `target`.
    pub async fn upgrade(&self, target: UpgradeTarget) -> AppResult<RunReport> {
        let target = self.resolve_target(target)?;
        let current = self.current_version().await?;

        if target <= current {
            info!(
                "Version is already up to date - current version {}, requested {}",
                current, target
            );
            return Ok(RunReport::noop(Direction::Upgrade, current));
        }

        let plan = self.plan_upgrade(current, target)?;
        self.execute(plan).await
    }

    /// Revert the `steps` most recently applied migrations.
    pub async fn downgrade(&self, steps: i64) -> AppResult<RunReport> {
        if steps < 0 {
            return Err(AppError::InvalidSteps(steps));
        }

        let current = self.current_version().await?;
        let plan = self.plan_downgrade(current, steps)?;

        if plan.is_empty() {
            info!("Nothing to downgrade - current version {}", current);
            return Ok(RunReport::noop(Direction::Downgrade, current));
        }

        self.execute(plan).await
    }

    /// Run a plan to completion or to its first failing step.
    async fn execute(&self, plan: MigrationPlan<'_>) -> AppResult<RunReport> {
        info!(
            "{} from version {} to {}: {} migration(s) {:?}",
            plan.direction,
            plan.from,
            plan.to,
            plan.steps.len(),
            plan.versions()
        );

        let mut persisted = plan.from;
        let mut executed = Vec::with_capacity(plan.steps.len());

        for entry in &plan.steps {
            info!("{} file: {}", plan.direction, entry.name());

            let (result, next_version) = match plan.direction {
                Direction::Upgrade => (entry.apply(self.store).await, entry.version),
                Direction::Downgrade => (entry.revert(self.store).await, entry.version - 1),
            };

            if let Err(e) = result {
                let completed: Vec<u32> = executed.iter().map(|s: &StepRecord| s.version).collect();
                error!(
                    "{} of {} failed: {}. Completed {:?}; version left at {}",
                    plan.direction,
                    entry.name(),
                    e,
                    completed,
                    persisted
                );
                return Err(AppError::StepFailure {
                    version: entry.version,
                    slug: entry.slug.clone(),
                    direction: plan.direction,
                    completed,
                    resumed_at: persisted,
                    reason: e.to_string(),
                });
            }

            if let Err(e) = self.versions.set_version(next_version).await {
                warn!(
                    "{} of {} succeeded but version {} could not be recorded; stored version is still {}",
                    plan.direction,
                    entry.name(),
                    next_version,
                    persisted
                );
                return Err(AppError::VersionNotRecorded {
                    version: entry.version,
                    slug: entry.slug.clone(),
                    direction: plan.direction,
                    completed: executed.iter().map(|s: &StepRecord| s.version).collect(),
                    unrecorded: next_version,
                    resumed_at: persisted,
                    reason: e.to_string(),
                });
            }

            persisted = next_version;
            executed.push(StepRecord {
                version: entry.version,
                slug: entry.slug.clone(),
            });
        }

        info!("{} complete - current version {}", plan.direction, persisted);

        Ok(RunReport {
            direction: plan.direction,
            from: plan.from,
            to: persisted,
            executed,
        })
    }
}
