//! Upgrade planning and execution.

use dynamo_migrate::db::MemoryStore;
use dynamo_migrate::error::AppError;
use dynamo_migrate::models::{Direction, UpgradeTarget};
use tokio_test::{assert_err, assert_ok};

use super::test_helpers::*;

/// Upgrading to latest from 0 applies every entry once, in order.
#[tokio::test]
async fn test_upgrade_latest_applies_all_in_order() {
    let journal = Journal::default();
    let catalog = catalog(5, &journal);
    let store = MemoryStore::new();

    let report = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap();

    assert_eq!(journal.versions(Direction::Upgrade), vec![1, 2, 3, 4, 5]);
    assert!(journal.versions(Direction::Downgrade).is_empty());
    assert_eq!(report.from, 0);
    assert_eq!(report.to, 5);
    assert_eq!(report.executed.len(), 5);
    assert_eq!(report.executed[2].slug, "add_email_index");
    assert_eq!(stored_version(&store).await, 5);
}

/// An explicit target stops at that version.
#[tokio::test]
async fn test_upgrade_to_explicit_version() {
    let journal = Journal::default();
    let catalog = catalog(5, &journal);
    let store = MemoryStore::new();
    seed_version(&store, 1).await;

    let report = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Version(3))
        .await
        .unwrap();

    assert_eq!(journal.versions(Direction::Upgrade), vec![2, 3]);
    assert_eq!(report.to, 3);
    assert_eq!(stored_version(&store).await, 3);
}

/// Targets at or below the current version do nothing.
#[tokio::test]
async fn test_upgrade_noop_when_at_or_past_target() {
    let journal = Journal::default();
    let catalog = catalog(4, &journal);
    let store = MemoryStore::new();
    seed_version(&store, 3).await;
    let sequencer = sequencer(&catalog, &store);

    for target in [UpgradeTarget::Version(0), UpgradeTarget::Version(2), UpgradeTarget::Version(3)] {
        let report = assert_ok!(sequencer.upgrade(target).await);
        assert!(report.is_noop());
        assert_eq!(report.to, 3);
    }

    assert!(journal.calls().is_empty());
    assert_eq!(stored_version(&store).await, 3);
}

/// Running latest twice only applies migrations the first time.
#[tokio::test]
async fn test_upgrade_latest_is_idempotent() {
    let journal = Journal::default();
    let catalog = catalog(3, &journal);
    let store = MemoryStore::new();
    let sequencer = sequencer(&catalog, &store);

    sequencer.upgrade(UpgradeTarget::Latest).await.unwrap();
    journal.clear();
    let report = sequencer.upgrade(UpgradeTarget::Latest).await.unwrap();

    assert!(report.is_noop());
    assert!(journal.calls().is_empty());
    assert_eq!(stored_version(&store).await, 3);
}

/// Out of range targets are rejected before the store is touched.
#[tokio::test]
async fn test_upgrade_rejects_target_beyond_catalog() {
    let journal = Journal::default();
    let catalog = catalog(3, &journal);
    let store = MemoryStore::new();

    let err = assert_err!(
        sequencer(&catalog, &store)
            .upgrade(UpgradeTarget::Version(4))
            .await
    );

    assert!(matches!(err, AppError::InvalidTarget(_)));
    assert!(err.is_validation());
    assert!(journal.calls().is_empty());
    assert!(store.table_names().is_empty());
}

/// Latest against an empty catalog is a no-op at version 0.
#[tokio::test]
async fn test_upgrade_empty_catalog() {
    let journal = Journal::default();
    let catalog = catalog(0, &journal);
    let store = MemoryStore::new();

    let report = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap();

    assert!(report.is_noop());
    assert_eq!(report.to, 0);
    assert_eq!(stored_version(&store).await, 0);
}

/// A stored version ahead of the catalog does not trigger any step.
#[tokio::test]
async fn test_upgrade_with_store_ahead_of_catalog() {
    let journal = Journal::default();
    let catalog = catalog(2, &journal);
    let store = MemoryStore::new();
    seed_version(&store, 6).await;

    let report = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap();

    assert!(report.is_noop());
    assert_eq!(stored_version(&store).await, 6);
}
