//! Persisted version record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Partition key value of the singleton version record.
pub const VERSION_RECORD_ID: u32 = 1;

/// The single item holding the current applied version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Singleton key, always [`VERSION_RECORD_ID`]
    pub id: u32,
    /// Highest migration fully applied, 0 when none
    pub version: u32,
    /// Last write time; absent on records written by older tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VersionRecord {
    /// Create a record for `version` stamped with the current time.
    pub fn new(version: u32) -> Self {
        VersionRecord {
            id: VERSION_RECORD_ID,
            version,
            updated_at: Some(Utc::now()),
        }
    }
}
