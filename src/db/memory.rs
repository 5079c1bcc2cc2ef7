//! In-process key-value store.
//!
//! Mirrors the DynamoDB semantics the runner relies on (create reports an
//! existing table, put is an upsert, reads of a missing table fail) without
//! any network. Used by tests and by embedders that run migrations against
//! a local fixture.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{Item, KeyValueStore, TableCreation, TableSpec};
use crate::error::{AppError, AppResult};

struct MemoryTable {
    spec: TableSpec,
    rows: BTreeMap<String, Item>,
}

impl MemoryTable {
    /// Serialized key attributes of `item`, in key order.
    fn row_key(&self, item: &Item) -> AppResult<String> {
        let values = self
            .spec
            .key_names()
            .into_iter()
            .map(|name| {
                item.get(name).cloned().ok_or_else(|| {
                    AppError::Store(format!(
                        "Missing key attribute '{}' for table {}",
                        name, self.spec.name
                    ))
                })
            })
            .collect::<AppResult<Vec<Value>>>()?;

        Ok(serde_json::to_string(&values)?)
    }
}

/// Thread-safe in-memory table store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a connection outage: every call fails with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn missing_table(table: &str) -> AppError {
    AppError::Store(format!("Table {} does not exist", table))
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn create_table(&self, spec: &TableSpec) -> AppResult<TableCreation> {
        self.check_available()?;
        let mut tables = self.lock();
        if tables.contains_key(&spec.name) {
            return Ok(TableCreation::AlreadyExists);
        }

        tables.insert(
            spec.name.clone(),
            MemoryTable {
                spec: spec.clone(),
                rows: BTreeMap::new(),
            },
        );
        Ok(TableCreation::Created)
    }

    async fn table_exists(&self, table: &str) -> AppResult<bool> {
        self.check_available()?;
        Ok(self.lock().contains_key(table))
    }

    async fn delete_table(&self, table: &str) -> AppResult<()> {
        self.check_available()?;
        self.lock()
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| missing_table(table))
    }

    async fn get_item(&self, table: &str, key: &Item) -> AppResult<Option<Item>> {
        self.check_available()?;
        let tables = self.lock();
        let table = tables.get(table).ok_or_else(|| missing_table(table))?;
        let row_key = table.row_key(key)?;
        Ok(table.rows.get(&row_key).cloned())
    }

    async fn put_item(&self, table: &str, item: Item) -> AppResult<()> {
        self.check_available()?;
        let mut tables = self.lock();
        let table = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let row_key = table.row_key(&item)?;
        table.rows.insert(row_key, item);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> AppResult<()> {
        self.check_available()?;
        let mut tables = self.lock();
        let table = tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let row_key = table.row_key(key)?;
        table.rows.remove(&row_key);
        Ok(())
    }

    async fn scan(&self, table: &str) -> AppResult<Vec<Item>> {
        self.check_available()?;
        let tables = self.lock();
        let table = tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(table.rows.values().cloned().collect())
    }
}
