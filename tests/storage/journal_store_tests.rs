//! JournalStore interface tests.
//!
//! These tests verify the contract of the JournalStore trait.
//! Each storage implementation should run these tests.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use cmodel_es::message::EventRecord;
use cmodel_es::storage::JournalStore;

/// Unique aggregate id so runs against a shared table never collide.
pub fn test_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Create a test event record at the given sequence.
pub fn make_event(aggregate_id: &str, seq: u64) -> EventRecord {
    EventRecord {
        aggregate_id: aggregate_id.to_string(),
        sequence: seq,
        event: "MappingPropertiesSet".to_string(),
        version: 1,
        created_at: Utc::now(),
        payload: json!({
            "$event": "MappingPropertiesSet",
            "data": { "properties": { "seq": seq } }
        }),
    }
}

/// Create `count` contiguous events starting at `start`.
pub fn make_events(aggregate_id: &str, start: u64, count: u64) -> Vec<EventRecord> {
    (start..start + count)
        .map(|seq| make_event(aggregate_id, seq))
        .collect()
}

async fn sequences<S: JournalStore + ?Sized>(store: &S, aggregate_id: &str) -> Vec<u64> {
    store
        .get_events(aggregate_id, 0, u64::MAX >> 1)
        .await
        .expect("get_events should succeed")
        .iter()
        .map(|e| e.sequence)
        .collect()
}

// =============================================================================
// JournalStore::save_all tests
// =============================================================================

pub async fn test_save_single_event<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-single");

    let status = store
        .save_all(vec![make_event(&id, 0)])
        .await
        .expect("save_all should succeed");
    assert!(status.success, "single event should be applied");
    assert!(status.errors.is_empty());

    let events = store
        .get_events(&id, 0, 0)
        .await
        .expect("get_events should succeed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].sequence, 0);
}

pub async fn test_save_preserves_record<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-preserve");
    let record = make_event(&id, 0);

    store
        .save_all(vec![record.clone()])
        .await
        .expect("save_all should succeed");

    let stored = store
        .get_events(&id, 0, 0)
        .await
        .expect("get_events should succeed")
        .pop()
        .expect("event should exist");
    assert_eq!(stored.event, record.event);
    assert_eq!(stored.version, record.version);
    assert_eq!(stored.payload, record.payload);
    assert_eq!(stored.created_at.timestamp(), record.created_at.timestamp());
}

pub async fn test_save_empty_batch<S: JournalStore + ?Sized>(store: &S) {
    let status = store
        .save_all(Vec::new())
        .await
        .expect("empty save_all should succeed");
    assert!(status.success);
}

pub async fn test_save_large_batch<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-large");

    // More than one native batch worth of items.
    let status = store
        .save_all(make_events(&id, 0, 60))
        .await
        .expect("save_all should succeed");
    assert!(status.success, "errors: {:?}", status.reasons());

    assert_eq!(sequences(store, &id).await, (0..60).collect::<Vec<_>>());
}

pub async fn test_save_sequential_batches<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-batches");

    store
        .save_all(make_events(&id, 0, 2))
        .await
        .expect("first batch should succeed");
    store
        .save_all(make_events(&id, 2, 3))
        .await
        .expect("second batch should succeed");

    assert_eq!(sequences(store, &id).await, vec![0, 1, 2, 3, 4]);
}

// =============================================================================
// JournalStore::get_events / get_last_sequence tests
// =============================================================================

pub async fn test_get_events_nonexistent<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-none");
    let events = store
        .get_events(&id, 0, 100)
        .await
        .expect("get_events should succeed");
    assert!(events.is_empty());
}

pub async fn test_get_events_inclusive_range<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-range");
    store
        .save_all(make_events(&id, 0, 10))
        .await
        .expect("save_all should succeed");

    let events = store
        .get_events(&id, 3, 6)
        .await
        .expect("get_events should succeed");
    let seqs: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(seqs, vec![3, 4, 5, 6]);
}

pub async fn test_get_last_sequence<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-last");

    let last = store
        .get_last_sequence(&id, 0)
        .await
        .expect("get_last_sequence should succeed");
    assert_eq!(last, None, "empty journal has no last sequence");

    store
        .save_all(make_events(&id, 0, 5))
        .await
        .expect("save_all should succeed");

    let last = store.get_last_sequence(&id, 0).await.unwrap();
    assert_eq!(last, Some(4));

    let last = store.get_last_sequence(&id, 3).await.unwrap();
    assert_eq!(last, Some(4));

    let last = store.get_last_sequence(&id, 5).await.unwrap();
    assert_eq!(last, None, "nothing at or after 5");
}

pub async fn test_aggregate_isolation<S: JournalStore + ?Sized>(store: &S) {
    let first = test_id("journal-iso-a");
    let second = test_id("journal-iso-b");

    store.save_all(make_events(&first, 0, 3)).await.unwrap();
    store.save_all(make_events(&second, 0, 1)).await.unwrap();

    assert_eq!(sequences(store, &first).await.len(), 3);
    assert_eq!(sequences(store, &second).await.len(), 1);
    assert_eq!(store.get_last_sequence(&second, 0).await.unwrap(), Some(0));
}

// =============================================================================
// JournalStore::rollback_to / rollforward_to tests
// =============================================================================

pub async fn test_rollback_to<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-rollback");
    store.save_all(make_events(&id, 0, 6)).await.unwrap();

    let status = store
        .rollback_to(&id, 4)
        .await
        .expect("rollback_to should succeed");
    assert!(status.success);

    assert_eq!(sequences(store, &id).await, vec![0, 1, 2, 3]);
    assert_eq!(store.get_last_sequence(&id, 0).await.unwrap(), Some(3));
}

pub async fn test_rollforward_to<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-rollforward");
    store.save_all(make_events(&id, 0, 6)).await.unwrap();

    let status = store
        .rollforward_to(&id, 2)
        .await
        .expect("rollforward_to should succeed");
    assert!(status.success);

    assert_eq!(sequences(store, &id).await, vec![3, 4, 5]);
}

pub async fn test_delete_nonexistent<S: JournalStore + ?Sized>(store: &S) {
    let id = test_id("journal-delete-none");

    assert!(store.rollback_to(&id, 0).await.unwrap().success);
    assert!(store.rollforward_to(&id, 10).await.unwrap().success);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all JournalStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_journal_store_tests {
    ($store:expr) => {
        use $crate::storage::journal_store_tests::*;

        // save tests
        test_save_single_event($store).await;
        println!("  test_save_single_event: PASSED");

        test_save_preserves_record($store).await;
        println!("  test_save_preserves_record: PASSED");

        test_save_empty_batch($store).await;
        println!("  test_save_empty_batch: PASSED");

        test_save_large_batch($store).await;
        println!("  test_save_large_batch: PASSED");

        test_save_sequential_batches($store).await;
        println!("  test_save_sequential_batches: PASSED");

        // read tests
        test_get_events_nonexistent($store).await;
        println!("  test_get_events_nonexistent: PASSED");

        test_get_events_inclusive_range($store).await;
        println!("  test_get_events_inclusive_range: PASSED");

        test_get_last_sequence($store).await;
        println!("  test_get_last_sequence: PASSED");

        test_aggregate_isolation($store).await;
        println!("  test_aggregate_isolation: PASSED");

        // delete tests
        test_rollback_to($store).await;
        println!("  test_rollback_to: PASSED");

        test_rollforward_to($store).await;
        println!("  test_rollforward_to: PASSED");

        test_delete_nonexistent($store).await;
        println!("  test_delete_nonexistent: PASSED");
    };
}
