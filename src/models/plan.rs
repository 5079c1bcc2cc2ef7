//! Migration plan and run report models.

use std::fmt;

use crate::error::{AppError, AppResult};
use crate::migration::MigrationEntry;

/// Sentinel accepted by `upgrade` for the highest catalog version.
pub const LATEST: &str = "latest";

/// Alias for [`LATEST`].
pub const HEAD: &str = "head";

/// Direction a plan moves the version pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => write!(f, "Upgrade"),
            Self::Downgrade => write!(f, "Downgrade"),
        }
    }
}

/// Requested upgrade target before it is checked against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeTarget {
    Latest,
    Version(u32),
}

impl UpgradeTarget {
    /// Parse a target from command line input.
    ///
    /// Accepts `latest`, `head` or a non-negative integer. Range checks
    /// against the catalog happen in the sequencer.
    pub fn parse(input: &str) -> AppResult<Self> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case(LATEST) || trimmed.eq_ignore_ascii_case(HEAD) {
            return Ok(Self::Latest);
        }

        trimmed.parse::<u32>().map(Self::Version).map_err(|_| {
            AppError::InvalidTarget(format!(
                "'{}' is not a valid version (expected '{}' or a non-negative integer)",
                input, LATEST
            ))
        })
    }
}

impl fmt::Display for UpgradeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{}", LATEST),
            Self::Version(v) => write!(f, "{}", v),
        }
    }
}

/// Ordered entries selected for one invocation.
#[derive(Debug)]
pub struct MigrationPlan<'a> {
    pub direction: Direction,
    /// Version persisted before the plan runs
    pub from: u32,
    /// Version persisted once every step has run
    pub to: u32,
    pub steps: Vec<&'a MigrationEntry>,
}

impl MigrationPlan<'_> {
    /// Check whether the plan has nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Versions of the planned steps, in execution order.
    pub fn versions(&self) -> Vec<u32> {
        self.steps.iter().map(|entry| entry.version).collect()
    }
}

/// A step executed by a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub version: u32,
    pub slug: String,
}

/// Outcome of a plan that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub direction: Direction,
    pub from: u32,
    pub to: u32,
    pub executed: Vec<StepRecord>,
}

impl RunReport {
    /// Report for a run that had nothing to do.
    pub fn noop(direction: Direction, current: u32) -> Self {
        RunReport {
            direction,
            from: current,
            to: current,
            executed: Vec::new(),
        }
    }

    /// Check whether any step ran.
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}
