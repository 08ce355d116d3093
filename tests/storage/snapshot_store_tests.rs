//! SnapshotStore interface tests.
//!
//! These tests verify the contract of the SnapshotStore trait.
//! Each storage implementation should run these tests.

use serde_json::json;

use cmodel_es::message::SnapshotRecord;
use cmodel_es::storage::SnapshotStore;

use super::journal_store_tests::test_id;

/// Create a test snapshot at the given sequence.
pub fn make_snapshot(aggregate_id: &str, seq: u64) -> SnapshotRecord {
    SnapshotRecord {
        aggregate_id: aggregate_id.to_string(),
        sequence: seq,
        state: json!({
            "$state": "Active",
            "data": { "uuid": aggregate_id, "name": format!("Type{}", seq), "properties": {} }
        }),
    }
}

// =============================================================================
// SnapshotStore::get tests
// =============================================================================

pub async fn test_get_nonexistent<S: SnapshotStore + ?Sized>(store: &S) {
    let id = test_id("snap-none");

    let snapshot = store.get(&id).await.expect("get should succeed");
    assert!(snapshot.is_none(), "nonexistent snapshot should be None");
}

pub async fn test_get_existing<S: SnapshotStore + ?Sized>(store: &S) {
    let id = test_id("snap-exist");

    store
        .save(make_snapshot(&id, 10))
        .await
        .expect("save should succeed");

    let snapshot = store
        .get(&id)
        .await
        .expect("get should succeed")
        .expect("snapshot should exist");

    assert_eq!(snapshot.sequence, 10);
    assert_eq!(snapshot, make_snapshot(&id, 10));
}

pub async fn test_get_returns_latest<S: SnapshotStore + ?Sized>(store: &S) {
    let id = test_id("snap-latest");

    for seq in [4, 19, 9] {
        store
            .save(make_snapshot(&id, seq))
            .await
            .expect("save should succeed");
    }

    let snapshot = store.get(&id).await.unwrap().expect("snapshot should exist");
    assert_eq!(snapshot.sequence, 19, "highest sequence wins");
}

pub async fn test_save_overwrites_same_sequence<S: SnapshotStore + ?Sized>(store: &S) {
    let id = test_id("snap-overwrite");

    store.save(make_snapshot(&id, 3)).await.unwrap();
    let mut replacement = make_snapshot(&id, 3);
    replacement.state = json!({ "$state": "Deleted", "data": { "uuid": id } });
    store.save(replacement.clone()).await.unwrap();

    let snapshot = store.get(&id).await.unwrap().expect("snapshot should exist");
    assert_eq!(snapshot, replacement);
}

pub async fn test_aggregate_isolation<S: SnapshotStore + ?Sized>(store: &S) {
    let first = test_id("snap-iso-a");
    let second = test_id("snap-iso-b");

    store.save(make_snapshot(&first, 1)).await.unwrap();
    store.save(make_snapshot(&second, 7)).await.unwrap();

    assert_eq!(store.get(&first).await.unwrap().unwrap().sequence, 1);
    assert_eq!(store.get(&second).await.unwrap().unwrap().sequence, 7);
}

// =============================================================================
// SnapshotStore::rollforward_to tests
// =============================================================================

pub async fn test_rollforward_prunes_older<S: SnapshotStore + ?Sized>(store: &S) {
    let id = test_id("snap-prune");
    for seq in [2, 5, 8] {
        store.save(make_snapshot(&id, seq)).await.unwrap();
    }

    let status = store
        .rollforward_to(&id, 5)
        .await
        .expect("rollforward_to should succeed");
    assert!(status.success);

    let snapshot = store.get(&id).await.unwrap().expect("latest should survive");
    assert_eq!(snapshot.sequence, 8);

    store.rollforward_to(&id, 8).await.unwrap();
    assert!(store.get(&id).await.unwrap().is_none());
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all SnapshotStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_snapshot_store_tests {
    ($store:expr) => {
        use $crate::storage::snapshot_store_tests::*;

        // get tests
        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        test_get_existing($store).await;
        println!("  test_get_existing: PASSED");

        test_get_returns_latest($store).await;
        println!("  test_get_returns_latest: PASSED");

        // save tests
        test_save_overwrites_same_sequence($store).await;
        println!("  test_save_overwrites_same_sequence: PASSED");

        test_aggregate_isolation($store).await;
        println!("  test_aggregate_isolation: PASSED");

        // prune tests
        test_rollforward_prunes_older($store).await;
        println!("  test_rollforward_prunes_older: PASSED");
    };
}
