//! Domain models for the migration runner.

pub mod plan;
pub mod version_record;

// Re-export commonly used types
pub use plan::{Direction, MigrationPlan, RunReport, StepRecord, UpgradeTarget, HEAD, LATEST};
pub use version_record::{VersionRecord, VERSION_RECORD_ID};
