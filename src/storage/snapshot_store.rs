//! SnapshotStore trait definition.

use async_trait::async_trait;

use super::{BatchStatus, Result};
use crate::message::{RecordKey, SnapshotRecord};

/// Interface for snapshot persistence.
///
/// Snapshots bound replay cost: when loading an aggregate, replay starts at
/// the latest snapshot's sequence + 1. Several snapshots per aggregate may
/// exist; `get` returns the one with the highest sequence.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Retrieve the latest snapshot for an aggregate.
    ///
    /// Returns `None` if no snapshot exists.
    async fn get(&self, aggregate_id: &str) -> Result<Option<SnapshotRecord>>;

    /// Store a snapshot. Last write wins for an existing `(id, sequence)`.
    async fn save(&self, snapshot: SnapshotRecord) -> Result<()>;

    /// Delete every snapshot with sequence <= `sequence`.
    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>>;
}
