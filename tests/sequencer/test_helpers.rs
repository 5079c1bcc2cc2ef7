//! Shared helpers for sequencer tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dynamo_migrate::db::{KeyValueStore, MemoryStore, Sequencer, VersionStore};
use dynamo_migrate::error::{AppError, AppResult};
use dynamo_migrate::migration::{Catalog, Migration, Registration};
use dynamo_migrate::models::Direction;

/// Version table used by every test.
pub const VERSION_TABLE: &str = "MigrationVersion";

const NAMES: [&str; 8] = [
    "1_create_users",
    "2_create_orders",
    "3_add_email_index",
    "4_backfill_emails",
    "5_create_audit_log",
    "6_drop_legacy",
    "7_add_ttl",
    "8_rename_status",
];

/// Records every apply/revert call and fails the ones it is told to.
#[derive(Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<(Direction, u32)>>>,
    failing: Arc<Mutex<HashSet<(Direction, u32)>>>,
}

impl Journal {
    pub fn calls(&self) -> Vec<(Direction, u32)> {
        self.calls.lock().unwrap().clone()
    }

    /// Versions touched in `direction`, in call order.
    pub fn versions(&self, direction: Direction) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter(|(d, _)| *d == direction)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail(&self, direction: Direction, version: u32) {
        self.failing.lock().unwrap().insert((direction, version));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn record(&self, direction: Direction, version: u32) -> AppResult<()> {
        self.calls.lock().unwrap().push((direction, version));
        if self.failing.lock().unwrap().contains(&(direction, version)) {
            return Err(AppError::Store(format!("simulated failure at {}", version)));
        }
        Ok(())
    }
}

struct Recording {
    version: u32,
    journal: Journal,
}

#[async_trait::async_trait]
impl Migration for Recording {
    async fn apply(&self, _store: &dyn KeyValueStore) -> AppResult<()> {
        self.journal.record(Direction::Upgrade, self.version)
    }

    async fn revert(&self, _store: &dyn KeyValueStore) -> AppResult<()> {
        self.journal.record(Direction::Downgrade, self.version)
    }
}

/// A catalog of `count` recording migrations sharing `journal`.
pub fn catalog(count: usize, journal: &Journal) -> Catalog {
    Catalog::from_registry(registry(count, journal)).expect("test catalog should be valid")
}

/// Like [`catalog`], with the entry at `version` running `migration` instead.
pub fn catalog_with(
    count: usize,
    journal: &Journal,
    version: u32,
    migration: Box<dyn Migration>,
) -> Catalog {
    let mut registry = registry(count, journal);
    registry[version as usize - 1].1 = migration;
    Catalog::from_registry(registry).expect("test catalog should be valid")
}

fn registry(count: usize, journal: &Journal) -> Vec<Registration> {
    NAMES[..count]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let migration = Recording {
                version: i as u32 + 1,
                journal: journal.clone(),
            };
            (*name, Box::new(migration) as Box<dyn Migration>)
        })
        .collect()
}

pub fn sequencer<'a>(catalog: &'a Catalog, store: &'a MemoryStore) -> Sequencer<'a> {
    Sequencer::new(catalog, store, VERSION_TABLE)
}

/// Read the persisted version directly from the store.
pub async fn stored_version(store: &MemoryStore) -> u32 {
    VersionStore::new(store, VERSION_TABLE)
        .get_version()
        .await
        .expect("version should be readable")
}

/// Seed the store as if `version` migrations had already been applied.
pub async fn seed_version(store: &MemoryStore, version: u32) {
    let versions = VersionStore::new(store, VERSION_TABLE);
    versions.ensure_initialized().await.unwrap();
    versions.set_version(version).await.unwrap();
}
