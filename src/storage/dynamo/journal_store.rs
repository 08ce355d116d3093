//! DynamoDB JournalStore implementation.
//!
//! Table schema:
//! - PK: `aggregateId` (String)
//! - SK: `sequence` (Number)
//! - `$event`, `$version`, `createdAt`, `payload`

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use tracing::{debug, warn};

use super::batch::{delete_keys, retry_batch_write, to_batch_status};
use super::codec;
use super::query::{query_all, query_keys, range_query, SequenceRange};
use crate::message::{EventRecord, RecordKey};
use crate::storage::{BatchStatus, JournalStore, Result};
use crate::utils::retry::RetryConfig;

/// DynamoDB implementation of JournalStore.
pub struct DynamoJournalStore {
    client: Client,
    table_name: String,
    retry: RetryConfig,
}

impl DynamoJournalStore {
    /// Create a journal store on a shared client.
    pub fn new(client: Client, table_name: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            retry,
        }
    }

    async fn delete_range(
        &self,
        aggregate_id: &str,
        range: SequenceRange,
    ) -> Result<BatchStatus<RecordKey>> {
        let keys = query_keys(&self.client, &self.table_name, aggregate_id, range).await?;
        let count = keys.len();
        let status = delete_keys(&self.client, &self.table_name, keys, &self.retry).await?;
        debug!(
            aggregate_id = %aggregate_id,
            ?range,
            count,
            failed = status.errors.len(),
            "Deleted journal events"
        );
        Ok(status)
    }
}

#[async_trait]
impl JournalStore for DynamoJournalStore {
    #[tracing::instrument(name = "journal.save_all", skip_all, fields(count = events.len()))]
    async fn save_all(&self, events: Vec<EventRecord>) -> Result<BatchStatus<EventRecord>> {
        if events.is_empty() {
            return Ok(BatchStatus::ok());
        }

        let requests = events
            .iter()
            .map(|event| codec::put_request(codec::event_item(event)))
            .collect::<Result<Vec<_>>>()?;

        let unprocessed =
            retry_batch_write(&self.client, &self.table_name, requests, &self.retry).await?;
        let status = to_batch_status(&events, &unprocessed);

        if status.success {
            debug!(table = %self.table_name, count = events.len(), "Saved events");
        } else {
            warn!(
                table = %self.table_name,
                failed = status.errors.len(),
                "Journal batch partially persisted"
            );
        }
        Ok(status)
    }

    async fn rollback_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        self.delete_range(aggregate_id, SequenceRange::From(sequence))
            .await
    }

    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        self.delete_range(aggregate_id, SequenceRange::UpTo(sequence))
            .await
    }

    async fn get_events(&self, aggregate_id: &str, from: u64, to: u64) -> Result<Vec<EventRecord>> {
        if from > to {
            return Ok(Vec::new());
        }

        let query = range_query(
            &self.client,
            &self.table_name,
            aggregate_id,
            SequenceRange::Between(from, to),
        )
        .scan_index_forward(true);

        let mut events = query_all(query)
            .await?
            .iter()
            .map(codec::event_from_item)
            .collect::<Result<Vec<_>>>()?;
        events.sort_by_key(|e| e.sequence);

        debug!(
            aggregate_id = %aggregate_id,
            from,
            to,
            count = events.len(),
            "Read events"
        );
        Ok(events)
    }

    async fn get_last_sequence(&self, aggregate_id: &str, from: u64) -> Result<Option<u64>> {
        // Reduced client-side; the scan is bounded below by `from`.
        let keys = query_keys(
            &self.client,
            &self.table_name,
            aggregate_id,
            SequenceRange::From(from),
        )
        .await?;
        Ok(keys.iter().map(|k| k.sequence).max())
    }
}
