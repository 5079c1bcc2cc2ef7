//! Partial progress, resume and fatal store errors.

use std::sync::Arc;

use dynamo_migrate::db::{KeyValueStore, MemoryStore};
use dynamo_migrate::error::{AppError, AppResult};
use dynamo_migrate::migration::Migration;
use dynamo_migrate::models::{Direction, UpgradeTarget};

use super::test_helpers::*;

/// A failing step stops the run and leaves the last success persisted.
#[tokio::test]
async fn test_upgrade_failure_keeps_partial_progress() {
    let journal = Journal::default();
    let catalog = catalog(6, &journal);
    let store = MemoryStore::new();
    journal.fail(Direction::Upgrade, 4);

    let err = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap_err();

    match err {
        AppError::StepFailure {
            version,
            slug,
            direction,
            completed,
            resumed_at,
            ..
        } => {
            assert_eq!(version, 4);
            assert_eq!(slug, "backfill_emails");
            assert_eq!(direction, Direction::Upgrade);
            assert_eq!(completed, vec![1, 2, 3]);
            assert_eq!(resumed_at, 3);
        }
        other => panic!("expected StepFailure, got {other:?}"),
    }

    // Steps after the failure were never attempted
    assert_eq!(journal.versions(Direction::Upgrade), vec![1, 2, 3, 4]);
    assert_eq!(stored_version(&store).await, 3);
}

/// Retrying after a failure runs exactly the remaining steps.
#[tokio::test]
async fn test_upgrade_resumes_after_failure() {
    let journal = Journal::default();
    let catalog = catalog(6, &journal);
    let store = MemoryStore::new();
    let sequencer = sequencer(&catalog, &store);

    for k in [2, 5] {
        journal.fail(Direction::Upgrade, k);
        assert!(sequencer.upgrade(UpgradeTarget::Latest).await.is_err());
        journal.heal();
    }
    journal.clear();

    let report = sequencer.upgrade(UpgradeTarget::Latest).await.unwrap();

    assert_eq!(journal.versions(Direction::Upgrade), vec![5, 6]);
    assert_eq!(report.from, 4);
    assert_eq!(stored_version(&store).await, 6);
}

/// The very first step failing leaves the version untouched.
#[tokio::test]
async fn test_first_step_failure() {
    let journal = Journal::default();
    let catalog = catalog(3, &journal);
    let store = MemoryStore::new();
    journal.fail(Direction::Upgrade, 1);

    let err = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::StepFailure { resumed_at: 0, ref completed, .. } if completed.is_empty()
    ));
    assert!(!err.is_validation());
    assert_eq!(stored_version(&store).await, 0);
}

/// A failed revert leaves the floor of the last successful revert.
#[tokio::test]
async fn test_downgrade_failure_and_resume() {
    let journal = Journal::default();
    let catalog = catalog(5, &journal);
    let store = MemoryStore::new();
    seed_version(&store, 5).await;
    let sequencer = sequencer(&catalog, &store);
    journal.fail(Direction::Downgrade, 3);

    let err = sequencer.downgrade(4).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::StepFailure { version: 3, resumed_at: 3, direction: Direction::Downgrade, .. }
    ));
    assert_eq!(journal.versions(Direction::Downgrade), vec![5, 4, 3]);
    assert_eq!(stored_version(&store).await, 3);

    journal.heal();
    journal.clear();
    sequencer.downgrade(2).await.unwrap();

    assert_eq!(journal.versions(Direction::Downgrade), vec![3, 2]);
    assert_eq!(stored_version(&store).await, 1);
}

/// An unreachable store aborts before any step runs.
#[tokio::test]
async fn test_store_unavailable_is_fatal() {
    let journal = Journal::default();
    let catalog = catalog(3, &journal);
    let store = MemoryStore::new();
    store.set_unavailable(true);
    let sequencer = sequencer(&catalog, &store);

    let err = sequencer.upgrade(UpgradeTarget::Latest).await.unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));

    let err = sequencer.downgrade(1).await.unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable(_)));

    assert!(journal.calls().is_empty());
}

/// A stored version the catalog cannot revert is refused before any step.
#[tokio::test]
async fn test_downgrade_with_store_ahead_of_catalog() {
    let journal = Journal::default();
    let catalog = catalog(3, &journal);
    let store = MemoryStore::new();
    seed_version(&store, 5).await;

    let err = sequencer(&catalog, &store).downgrade(1).await.unwrap_err();

    assert!(matches!(err, AppError::CatalogCorrupt(_)));
    assert!(journal.calls().is_empty());
    assert_eq!(stored_version(&store).await, 5);
}

/// Succeeds, then takes the store down before the version can be written.
struct DropsStore {
    store: Arc<MemoryStore>,
}

#[async_trait::async_trait]
impl Migration for DropsStore {
    async fn apply(&self, _store: &dyn KeyValueStore) -> AppResult<()> {
        self.store.set_unavailable(true);
        Ok(())
    }

    async fn revert(&self, _store: &dyn KeyValueStore) -> AppResult<()> {
        self.store.set_unavailable(true);
        Ok(())
    }
}

/// A step that ran but could not be recorded still reports partial progress.
#[tokio::test]
async fn test_unrecorded_step_reports_progress() {
    let journal = Journal::default();
    let store = Arc::new(MemoryStore::new());
    let drops = DropsStore {
        store: Arc::clone(&store),
    };
    let catalog = catalog_with(4, &journal, 3, Box::new(drops));

    let err = sequencer(&catalog, &store)
        .upgrade(UpgradeTarget::Latest)
        .await
        .unwrap_err();

    match err {
        AppError::VersionNotRecorded {
            version,
            ref slug,
            direction,
            ref completed,
            unrecorded,
            resumed_at,
            ..
        } => {
            assert_eq!(version, 3);
            assert_eq!(slug, "add_email_index");
            assert_eq!(direction, Direction::Upgrade);
            assert_eq!(completed, &vec![1, 2]);
            assert_eq!(unrecorded, 3);
            assert_eq!(resumed_at, 2);
        }
        ref other => panic!("expected VersionNotRecorded, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 1);

    // Step 4 never ran and the store still holds the last recorded version
    assert_eq!(journal.versions(Direction::Upgrade), vec![1, 2]);
    store.set_unavailable(false);
    assert_eq!(stored_version(&store).await, 2);
}

/// The same holds for a revert whose new floor cannot be written.
#[tokio::test]
async fn test_unrecorded_revert_reports_progress() {
    let journal = Journal::default();
    let store = Arc::new(MemoryStore::new());
    let drops = DropsStore {
        store: Arc::clone(&store),
    };
    let catalog = catalog_with(4, &journal, 2, Box::new(drops));
    seed_version(&store, 4).await;

    let err = sequencer(&catalog, &store).downgrade(3).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::VersionNotRecorded {
            version: 2,
            unrecorded: 1,
            resumed_at: 2,
            direction: Direction::Downgrade,
            ref completed,
            ..
        } if completed == &vec![4, 3]
    ));
    assert_eq!(journal.versions(Direction::Downgrade), vec![4, 3]);
    store.set_unavailable(false);
    assert_eq!(stored_version(&store).await, 2);
}
