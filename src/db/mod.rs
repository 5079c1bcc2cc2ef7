//! Store module providing the key-value seam, version tracking and the migration runner.

pub mod dynamo;
pub mod memory;
pub mod migrations;
pub mod version;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;
pub use migrations::Sequencer;
pub use version::VersionStore;

use serde_json::{Map, Value};

use crate::error::AppResult;

/// A table row: attribute name to value.
pub type Item = Map<String, Value>;

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Number,
    String,
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub kind: KeyKind,
}

impl KeyAttribute {
    pub fn number(name: &str) -> Self {
        KeyAttribute {
            name: name.to_string(),
            kind: KeyKind::Number,
        }
    }

    pub fn string(name: &str) -> Self {
        KeyAttribute {
            name: name.to_string(),
            kind: KeyKind::String,
        }
    }
}

/// Provisioned read/write capacity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub read: i64,
    pub write: i64,
}

/// Definition of a table to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    /// Provisioned capacity, or on-demand billing when `None`
    pub throughput: Option<Throughput>,
}

impl TableSpec {
    /// An on-demand table keyed by `partition_key` alone.
    pub fn new(name: &str, partition_key: KeyAttribute) -> Self {
        TableSpec {
            name: name.to_string(),
            partition_key,
            sort_key: None,
            throughput: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn with_throughput(mut self, read: i64, write: i64) -> Self {
        self.throughput = Some(Throughput { read, write });
        self
    }

    /// Key attribute names, partition key first.
    pub fn key_names(&self) -> Vec<&str> {
        std::iter::once(self.partition_key.name.as_str())
            .chain(self.sort_key.as_ref().map(|key| key.name.as_str()))
            .collect()
    }
}

/// Outcome of a create-table request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCreation {
    Created,
    AlreadyExists,
}

/// Key-value table store used by the runner and by migration bodies.
///
/// Calls are awaited one at a time; implementations need not coordinate
/// concurrent writers.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Create a table. An existing table is reported, not treated as an error.
    async fn create_table(&self, spec: &TableSpec) -> AppResult<TableCreation>;

    async fn table_exists(&self, table: &str) -> AppResult<bool>;

    async fn delete_table(&self, table: &str) -> AppResult<()>;

    /// Fetch the item whose key attributes equal `key`.
    async fn get_item(&self, table: &str, key: &Item) -> AppResult<Option<Item>>;

    /// Insert or replace an item.
    async fn put_item(&self, table: &str, item: Item) -> AppResult<()>;

    async fn delete_item(&self, table: &str, key: &Item) -> AppResult<()>;

    /// Read every item in a table.
    async fn scan(&self, table: &str) -> AppResult<Vec<Item>>;
}
