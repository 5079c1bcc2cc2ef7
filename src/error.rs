//! Domain error types for the migration runner.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use std::path::PathBuf;

use crate::models::Direction;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Requested upgrade target is not a sentinel, not a number, or out of range
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Negative downgrade step count
    #[error("Invalid number of steps: {0}")]
    InvalidSteps(i64),

    /// Downgrade would move the version below zero
    #[error("Cannot downgrade below version 0 (current version {current}, requested {steps} step(s))")]
    BelowFloor { current: u32, steps: i64 },

    /// Revision name normalizes to an empty slug
    #[error("Invalid revision name: {0:?}")]
    InvalidName(String),

    /// Unparseable, duplicate or missing version identifiers
    #[error("Migration catalog is corrupt: {0}")]
    CatalogCorrupt(String),

    /// A single migration step failed; the persisted version is left at the last success
    #[error(
        "{direction} of migration {version}_{slug} failed: {reason} (version left at {resumed_at})"
    )]
    StepFailure {
        version: u32,
        slug: String,
        direction: Direction,
        /// Versions completed by this run before the failure, in execution order
        completed: Vec<u32>,
        /// Version persisted in the store after the failure
        resumed_at: u32,
        reason: String,
    },

    /// A step ran but the version it reached could not be persisted
    #[error(
        "{direction} of migration {version}_{slug} ran but version {unrecorded} could not be recorded: {reason} (version left at {resumed_at})"
    )]
    VersionNotRecorded {
        version: u32,
        slug: String,
        direction: Direction,
        /// Versions completed and recorded by this run, in execution order
        completed: Vec<u32>,
        /// Version the store should hold after the step
        unrecorded: u32,
        /// Version persisted in the store after the failure
        resumed_at: u32,
        reason: String,
    },

    /// Revision template could not be read
    #[error("Revision template not found at {}", .0.display())]
    TemplateMissing(PathBuf),

    /// Revision file could not be written
    #[error("Failed to write {}: {reason}", .path.display())]
    WriteError { path: PathBuf, reason: String },

    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The backing store rejected or failed a request
    #[error("Store error: {0}")]
    Store(String),

    /// Local filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this error is caused by operator input rather than a runtime failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidTarget(_)
                | AppError::InvalidSteps(_)
                | AppError::BelowFloor { .. }
                | AppError::InvalidName(_)
        )
    }

    /// Process exit code for the command line front end.
    pub fn exit_code(&self) -> i32 {
        if self.is_validation() { 2 } else { 1 }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Store(format!("Malformed item: {}", err))
    }
}
