//! JournalStore trait definition.

use async_trait::async_trait;

use super::{BatchStatus, Result};
use crate::message::{EventRecord, RecordKey};

/// Durable, append-only, per-aggregate event log.
///
/// `(aggregate_id, sequence)` is the unique key of a stored event. Sequences
/// are assigned by the aggregate; the store never renumbers.
///
/// Implementations:
/// - `DynamoJournalStore`: DynamoDB storage
/// - `MemoryJournalStore`: in-memory storage for tests and local runs
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Append a batch of events.
    ///
    /// Events are persisted independently; there is no transaction across the
    /// batch. Items the store could not apply are returned in
    /// [`BatchStatus::errors`].
    async fn save_all(&self, events: Vec<EventRecord>) -> Result<BatchStatus<EventRecord>>;

    /// Delete every event with sequence >= `sequence`.
    ///
    /// Used to restore a consistent stream after a partial `save_all`.
    async fn rollback_to(&self, aggregate_id: &str, sequence: u64)
        -> Result<BatchStatus<RecordKey>>;

    /// Delete every event with sequence <= `sequence`.
    ///
    /// History pruning once a snapshot at or after `sequence` is durable.
    /// Does not consult the snapshot store; see `AggregateRoot::compact`.
    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>>;

    /// Events in `[from, to]`, ascending by sequence. Empty if none match.
    async fn get_events(&self, aggregate_id: &str, from: u64, to: u64) -> Result<Vec<EventRecord>>;

    /// Highest sequence >= `from`, or `None` if the range is empty.
    async fn get_last_sequence(&self, aggregate_id: &str, from: u64) -> Result<Option<u64>>;
}
