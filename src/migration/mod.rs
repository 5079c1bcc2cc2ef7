//! Migration steps and the catalog that orders them.
//!
//! Steps are registered in a table mapping `<version>_<slug>` names to
//! boxed [`Migration`] handlers. The binary builds that table at compile
//! time from `migrations/versions/`.

pub mod catalog;

pub use catalog::{scan_dir, Catalog, CatalogFile, EntryName, MIGRATION_EXTENSION};

use std::fmt;

use crate::db::KeyValueStore;
use crate::error::AppResult;

/// One unit of schema or data change.
///
/// Neither operation is assumed to be idempotent: the sequencer runs each
/// at most once per plan and records progress after every success.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Move the store forward past this step.
    async fn apply(&self, store: &dyn KeyValueStore) -> AppResult<()>;

    /// Undo [`Migration::apply`].
    async fn revert(&self, store: &dyn KeyValueStore) -> AppResult<()>;
}

/// A registry row: the entry's file stem and its handler.
pub type Registration = (&'static str, Box<dyn Migration>);

/// A catalog entry with its parsed version.
pub struct MigrationEntry {
    pub version: u32,
    pub slug: String,
    handler: Box<dyn Migration>,
}

impl MigrationEntry {
    pub fn new(name: EntryName, handler: Box<dyn Migration>) -> Self {
        MigrationEntry {
            version: name.version,
            slug: name.slug,
            handler,
        }
    }

    /// The `<version>_<slug>` identifier.
    pub fn name(&self) -> String {
        format!("{}_{}", self.version, self.slug)
    }

    pub async fn apply(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        self.handler.apply(store).await
    }

    pub async fn revert(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        self.handler.revert(store).await
    }
}

impl fmt::Debug for MigrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEntry")
            .field("version", &self.version)
            .field("slug", &self.slug)
            .finish_non_exhaustive()
    }
}
