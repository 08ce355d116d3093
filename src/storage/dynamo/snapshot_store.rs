//! DynamoDB SnapshotStore implementation.
//!
//! Table schema:
//! - PK: `aggregateId` (String)
//! - SK: `sequence` (Number)
//! - `state`: serialized `State` (tag + payload)

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::Client;
use tracing::debug;

use super::batch::delete_keys;
use super::codec;
use super::query::{query_keys, range_query, SequenceRange};
use crate::message::{RecordKey, SnapshotRecord};
use crate::storage::{BatchStatus, Result, SnapshotStore, StorageError};
use crate::utils::retry::RetryConfig;

/// DynamoDB implementation of SnapshotStore.
pub struct DynamoSnapshotStore {
    client: Client,
    table_name: String,
    retry: RetryConfig,
}

impl DynamoSnapshotStore {
    pub fn new(client: Client, table_name: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            retry,
        }
    }
}

#[async_trait]
impl SnapshotStore for DynamoSnapshotStore {
    async fn get(&self, aggregate_id: &str) -> Result<Option<SnapshotRecord>> {
        let output = range_query(
            &self.client,
            &self.table_name,
            aggregate_id,
            SequenceRange::All,
        )
        .scan_index_forward(false)
        .limit(1)
        .send()
        .await
        .map_err(|e| StorageError::Dynamo(DisplayErrorContext(&e).to_string()))?;

        let snapshot = output
            .items()
            .first()
            .map(codec::snapshot_from_item)
            .transpose()?;

        if let Some(ref s) = snapshot {
            debug!(aggregate_id = %aggregate_id, sequence = s.sequence, "Retrieved snapshot");
        }
        Ok(snapshot)
    }

    async fn save(&self, snapshot: SnapshotRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(codec::snapshot_item(&snapshot)))
            .send()
            .await
            .map_err(|e| StorageError::Dynamo(DisplayErrorContext(&e).to_string()))?;

        debug!(
            aggregate_id = %snapshot.aggregate_id,
            sequence = snapshot.sequence,
            "Stored snapshot"
        );
        Ok(())
    }

    async fn rollforward_to(
        &self,
        aggregate_id: &str,
        sequence: u64,
    ) -> Result<BatchStatus<RecordKey>> {
        let keys = query_keys(
            &self.client,
            &self.table_name,
            aggregate_id,
            SequenceRange::UpTo(sequence),
        )
        .await?;
        delete_keys(&self.client, &self.table_name, keys, &self.retry).await
    }
}
