//! Seed admin user
//!
//! Revision: 2
//! Created: 2026-10-18T09:20:03Z

use dynamo_migrate::db::{Item, KeyValueStore};
use dynamo_migrate::error::AppResult;
use dynamo_migrate::migration::Migration as MigrationStep;
use serde_json::json;

const TABLE: &str = "Users";
const ADMIN_ID: &str = "admin";

pub struct Migration;

fn admin_key() -> Item {
    let mut key = Item::new();
    key.insert("user_id".to_string(), json!(ADMIN_ID));
    key
}

#[async_trait::async_trait]
impl MigrationStep for Migration {
    async fn apply(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        let mut item = admin_key();
        item.insert("role".to_string(), json!("admin"));
        item.insert("active".to_string(), json!(true));
        store.put_item(TABLE, item).await
    }

    async fn revert(&self, store: &dyn KeyValueStore) -> AppResult<()> {
        store.delete_item(TABLE, &admin_key()).await
    }
}
