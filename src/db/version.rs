//! Current version tracking.
//!
//! The applied version lives in a single item of a dedicated table, keyed by
//! a fixed singleton id. Absence of the item means nothing has been applied.

use serde_json::{Value, json};
use tracing::{debug, info};

use super::{Item, KeyAttribute, KeyValueStore, TableCreation, TableSpec};
use crate::error::{AppError, AppResult};
use crate::models::{VERSION_RECORD_ID, VersionRecord};

/// Partition key attribute of the version table.
const KEY_ATTRIBUTE: &str = "id";

/// Reads and writes the persisted version record.
pub struct VersionStore<'a> {
    store: &'a dyn KeyValueStore,
    table: String,
}

impl<'a> VersionStore<'a> {
    pub fn new(store: &'a dyn KeyValueStore, table: &str) -> Self {
        VersionStore {
            store,
            table: table.to_string(),
        }
    }

    /// Table definition: numeric `id` key, one read and one write unit.
    pub fn table_spec(&self) -> TableSpec {
        TableSpec::new(&self.table, KeyAttribute::number(KEY_ATTRIBUTE)).with_throughput(1, 1)
    }

    /// Create the version table if it does not exist yet.
    pub async fn ensure_initialized(&self) -> AppResult<()> {
        if self.store.table_exists(&self.table).await? {
            debug!("Version table '{}' exists", self.table);
            return Ok(());
        }

        match self.store.create_table(&self.table_spec()).await? {
            TableCreation::Created => info!("Created version table '{}'", self.table),
            TableCreation::AlreadyExists => {
                debug!("Version table '{}' was created concurrently", self.table)
            }
        }
        Ok(())
    }

    /// Get the current version, or 0 when no record exists.
    pub async fn get_version(&self) -> AppResult<u32> {
        let item = self.store.get_item(&self.table, &singleton_key()).await?;

        match item {
            Some(item) => {
                let record: VersionRecord = serde_json::from_value(Value::Object(item))
                    .map_err(|e| {
                        AppError::Store(format!(
                            "Version record in '{}' is malformed: {}",
                            self.table, e
                        ))
                    })?;
                Ok(record.version)
            }
            None => Ok(0),
        }
    }

    /// Persist `version`, creating the record if needed.
    pub async fn set_version(&self, version: u32) -> AppResult<()> {
        let item = to_item(&VersionRecord::new(version))?;
        self.store.put_item(&self.table, item).await?;

        debug!("Stored version updated to {}", version);
        Ok(())
    }
}

fn singleton_key() -> Item {
    let mut key = Item::new();
    key.insert(KEY_ATTRIBUTE.to_string(), json!(VERSION_RECORD_ID));
    key
}

fn to_item(record: &VersionRecord) -> AppResult<Item> {
    match serde_json::to_value(record)? {
        Value::Object(item) => Ok(item),
        other => Err(AppError::Store(format!(
            "Version record serialized to a non-object value: {}",
            other
        ))),
    }
}
