//! In-memory storage implementations.
//!
//! Used by tests and local development. Both stores honour the full
//! contracts and expose hooks for injecting outright failures and partial
//! batch failures.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    unprocessed_reason, BatchStatus, ErrorStatus, JournalStore, Result, SnapshotStore,
    StorageError,
};
use crate::message::{EventRecord, RecordKey, SnapshotRecord};

type Stream<T> = BTreeMap<u64, T>;

/// Journal kept in memory, one ordered stream per aggregate.
#[derive(Default)]
pub struct MemoryJournalStore {
    streams: RwLock<HashMap<String, Stream<EventRecord>>>,
    fail_on_save: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    unprocessed: RwLock<HashSet<u64>>,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `save_all` fail outright.
    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    /// Make every read fail outright.
    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Make every `rollback_to`/`rollforward_to` fail outright.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    /// Saves and deletes at these sequences are reported unprocessed and
    /// leave the stream untouched.
    pub async fn set_unprocessed(&self, sequences: impl IntoIterator<Item = u64>) {
        *self.unprocessed.write().await = sequences.into_iter().collect();
    }

    pub async fn clear_unprocessed(&self) {
        self.unprocessed.write().await.clear();
    }

    /// Number of stored events for an aggregate.
    pub async fn event_count(&self, aggregate_id: &str) -> usize {
        self.streams
            .read()
            .await
            .get(aggregate_id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("journal read failed".to_string()));
        }
        Ok(())
    }

    async fn delete_where(
        &self,
        aggregate_id: &str,
        keep: impl Fn(u64) -> bool,
    ) -> Result<BatchStatus<RecordKey>> {
        if *self.fail_on_delete.read().await {
            return Err(StorageError::Unavailable("journal delete failed".to_string()));
        }

        let unprocessed = self.unprocessed.read().await;
        let mut streams = self.streams.write().await;
        let Some(stream) = streams.get_mut(aggregate_id) else {
            return Ok(BatchStatus::ok());
        };

        let before = stream.len();
        let errors = retain_unless(stream, aggregate_id, keep, &unprocessed);
        debug!(
            aggregate_id = %aggregate_id,
            count = before - stream.len(),
            failed = errors.len(),
            "Deleted events from memory journal"
        );
        Ok(BatchStatus::from_errors(errors))
    }
}

/// Drop entries `keep` rejects, except those at `unprocessed` sequences,
/// which are reported instead.
fn retain_unless<T>(
    stream: &mut Stream<T>,
    aggregate_id: &str,
    keep: impl Fn(u64) -> bool,
    unprocessed: &HashSet<u64>,
) -> Vec<ErrorStatus<RecordKey>> {
    let mut errors = Vec::new();
    stream.retain(|seq, _| {
        if keep(*seq) {
            return true;
        }
        if unprocessed.contains(seq) {
            let key = RecordKey::new(aggregate_id, *seq);
            errors.push(ErrorStatus {
                reason: unprocessed_reason("delete", &key),
                item: key,
            });
            return true;
        }
        false
    });
    errors
}

#[async_trait]
impl JournalStore for MemoryJournalStore {
    async fn save_all(&self, events: Vec<EventRecord>) -> Result<BatchStatus<EventRecord>> {
        if *self.fail_on_save.read().await {
            return Err(StorageError::Unavailable("journal write failed".to_string()));
        }

        let unprocessed = self.unprocessed.read().await;
        let mut streams = self.streams.write().await;
        let mut errors = Vec::new();

        for event in events {
            if unprocessed.contains(&event.sequence) {
                errors.push(ErrorStatus {
                    reason: unprocessed_reason(&format!("event {}", event.event), &event.key()),
                    item: event,
                });
                continue;
            }
            streams
                .entry(event.aggregate_id.clone())
                .or_default()
                .insert(event.sequence, event);
        }

        Ok(BatchStatus::from_errors(errors))
    }

    async fn rollback_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        self.delete_where(aggregate_id, |seq| seq < sequence).await
    }

    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        self.delete_where(aggregate_id, |seq| seq > sequence).await
    }

    async fn get_events(&self, aggregate_id: &str, from: u64, to: u64) -> Result<Vec<EventRecord>> {
        self.check_read().await?;
        if from > to {
            return Ok(Vec::new());
        }
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .map(|stream| stream.range(from..=to).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_last_sequence(&self, aggregate_id: &str, from: u64) -> Result<Option<u64>> {
        self.check_read().await?;
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .and_then(|stream| stream.range(from..).next_back().map(|(seq, _)| *seq)))
    }
}

/// Snapshots kept in memory, every sequence retained until pruned.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Stream<SnapshotRecord>>>,
    fail_on_save: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    unprocessed: RwLock<HashSet<u64>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    /// Deletes at these sequences are reported unprocessed and not applied.
    pub async fn set_unprocessed(&self, sequences: impl IntoIterator<Item = u64>) {
        *self.unprocessed.write().await = sequences.into_iter().collect();
    }

    /// Number of stored snapshots for an aggregate.
    pub async fn stored_count(&self, aggregate_id: &str) -> usize {
        self.snapshots
            .read()
            .await
            .get(aggregate_id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, aggregate_id: &str) -> Result<Option<SnapshotRecord>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(aggregate_id)
            .and_then(|stream| stream.values().next_back().cloned()))
    }

    async fn save(&self, snapshot: SnapshotRecord) -> Result<()> {
        if *self.fail_on_save.read().await {
            return Err(StorageError::Unavailable("snapshot write failed".to_string()));
        }
        self.snapshots
            .write()
            .await
            .entry(snapshot.aggregate_id.clone())
            .or_default()
            .insert(snapshot.sequence, snapshot);
        Ok(())
    }

    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        if *self.fail_on_delete.read().await {
            return Err(StorageError::Unavailable("snapshot delete failed".to_string()));
        }

        let unprocessed = self.unprocessed.read().await;
        let errors = match self.snapshots.write().await.get_mut(aggregate_id) {
            Some(stream) => {
                retain_unless(stream, aggregate_id, |seq| seq > sequence, &unprocessed)
            }
            None => Vec::new(),
        };
        Ok(BatchStatus::from_errors(errors))
    }
}
