//! Create users table
//!
//! Revision: 1
//! Created: 2026-10-18T09:12:44Z

use dynamo_migrate::db::{KeyAttribute, KeyValueStore, TableSpec};
use dynamo_migrate::error::AppResult;
use dynamo_migrate::migration::Migration as MigrationStep;

const TABLE: &str = "Users";

pub struct Migration;

#[async_trait::async_trait]
impl MigrationStep for Migration {
    async fn apply(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        let spec = TableSpec::new(TABLE, KeyAttribute::string("user_id"));
        store.create_table(&spec).await?;
        Ok(())
    }

    async fn revert(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        store.delete_table(TABLE).await
    }
}
