//! Retrying BatchWriteItem helper and partial-failure reporting.
//!
//! BatchWriteItem may succeed while leaving some requests unprocessed
//! (typically under throttling). [`retry_batch_write`] resubmits those with
//! backoff; whatever is still unprocessed afterwards is handed back so
//! [`to_batch_status`] can report exactly those items to the caller.

use std::collections::HashSet;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::types::WriteRequest;
use aws_sdk_dynamodb::Client;
use tracing::{debug, error, warn};

use super::codec;
use crate::message::{EventRecord, RecordKey};
use crate::storage::{unprocessed_reason, BatchStatus, ErrorStatus, Result, StorageError};
use crate::utils::retry::RetryConfig;

/// Service limit on requests per BatchWriteItem call.
pub const MAX_BATCH_ITEMS: usize = 25;

/// A failed BatchWriteItem call.
#[derive(Debug, Clone)]
pub struct BatchWriteFailure {
    pub retryable: bool,
    pub message: String,
}

/// The native batch-write primitive.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Issue one BatchWriteItem call and return the requests left unprocessed.
    async fn write_batch(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> std::result::Result<Vec<WriteRequest>, BatchWriteFailure>;
}

#[async_trait]
impl BatchWriter for Client {
    async fn write_batch(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> std::result::Result<Vec<WriteRequest>, BatchWriteFailure> {
        let output = self
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(classify)?;

        Ok(output
            .unprocessed_items()
            .and_then(|items| items.get(table))
            .cloned()
            .unwrap_or_default())
    }
}

/// Throttling, capacity and transport failures are worth retrying.
fn classify<R: std::fmt::Debug>(err: SdkError<BatchWriteItemError, R>) -> BatchWriteFailure {
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => {
            let service_err = context.err();
            matches!(
                service_err,
                BatchWriteItemError::ProvisionedThroughputExceededException(_)
                    | BatchWriteItemError::RequestLimitExceeded(_)
                    | BatchWriteItemError::InternalServerError(_)
            ) || service_err.code() == Some("ThrottlingException")
        }
        _ => false,
    };
    BatchWriteFailure {
        retryable,
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// Write `requests` to `table` with bounded retries.
///
/// Requests are split into chunks of [`MAX_BATCH_ITEMS`] written
/// concurrently. Each chunk gets `retry.attempts()` attempts; retryable
/// failures and unprocessed items are retried, only the unprocessed items
/// being resubmitted.
///
/// Returns the requests that were not applied. An error is returned only
/// when nothing in the call was applied; once any item has landed, every
/// request still pending (including a whole failed chunk) is returned as
/// unprocessed so the caller can report exactly those items.
pub async fn retry_batch_write<W: BatchWriter + ?Sized>(
    writer: &W,
    table: &str,
    requests: Vec<WriteRequest>,
    retry: &RetryConfig,
) -> Result<Vec<WriteRequest>> {
    let chunks = requests
        .chunks(MAX_BATCH_ITEMS)
        .map(|chunk| write_chunk(writer, table, chunk.to_vec(), retry));
    let outcomes = futures::future::join_all(chunks).await;

    let applied = outcomes.iter().any(ChunkOutcome::applied_any);
    let mut unprocessed = Vec::new();
    for outcome in outcomes {
        match outcome {
            ChunkOutcome::Written { pending, .. } => unprocessed.extend(pending),
            ChunkOutcome::Failed { error, .. } if !applied => return Err(error),
            ChunkOutcome::Failed { error, pending } => {
                warn!(
                    table = %table,
                    count = pending.len(),
                    error = %error,
                    "Chunk failed after other items were written"
                );
                unprocessed.extend(pending);
            }
        }
    }
    Ok(unprocessed)
}

/// Result of writing one chunk.
enum ChunkOutcome {
    /// The chunk ran to completion; `pending` were never applied.
    Written {
        pending: Vec<WriteRequest>,
        applied: bool,
    },
    /// Nothing in the chunk was applied.
    Failed {
        error: StorageError,
        pending: Vec<WriteRequest>,
    },
}

impl ChunkOutcome {
    fn applied_any(&self) -> bool {
        matches!(self, ChunkOutcome::Written { applied: true, .. })
    }
}

async fn write_chunk<W: BatchWriter + ?Sized>(
    writer: &W,
    table: &str,
    requests: Vec<WriteRequest>,
    retry: &RetryConfig,
) -> ChunkOutcome {
    let attempts = retry.attempts();
    let total = requests.len();
    let mut pending = requests;
    let mut last_failure = None;

    for (attempt, delay) in retry.delays().enumerate() {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
        }

        match writer.write_batch(table, pending.clone()).await {
            Ok(unprocessed) if unprocessed.is_empty() => {
                debug!(table = %table, count = pending.len(), "Batch written");
                return ChunkOutcome::Written {
                    pending: Vec::new(),
                    applied: true,
                };
            }
            Ok(unprocessed) => {
                warn!(
                    table = %table,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    unprocessed = unprocessed.len(),
                    "Batch write left items unprocessed"
                );
                pending = unprocessed;
                last_failure = None;
            }
            Err(failure) if failure.retryable => {
                warn!(
                    table = %table,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %failure.message,
                    "Retryable batch write failure"
                );
                last_failure = Some(failure);
            }
            Err(failure) => {
                error!(table = %table, error = %failure.message, "Batch write failed");
                return finish(StorageError::Dynamo(failure.message), pending, total);
            }
        }
    }

    match last_failure {
        Some(failure) => {
            error!(table = %table, attempts, error = %failure.message, "Batch write retries exhausted");
            let error = StorageError::RetriesExhausted {
                table: table.to_string(),
                attempts,
                message: failure.message,
            };
            finish(error, pending, total)
        }
        None => {
            warn!(table = %table, unprocessed = pending.len(), "Items unprocessed after retries");
            let applied = pending.len() < total;
            ChunkOutcome::Written { pending, applied }
        }
    }
}

/// A failure after earlier attempts applied part of the chunk is reported as
/// the still-pending requests, not as an error.
fn finish(error: StorageError, pending: Vec<WriteRequest>, total: usize) -> ChunkOutcome {
    if pending.len() < total {
        ChunkOutcome::Written {
            pending,
            applied: true,
        }
    } else {
        ChunkOutcome::Failed { error, pending }
    }
}

/// An item that can be correlated with a write request by key.
pub trait BatchItem: Clone {
    fn key(&self) -> RecordKey;
    /// What the write did, for error reasons: `"event MappingCreated"`.
    fn describe(&self) -> String;
}

impl BatchItem for EventRecord {
    fn key(&self) -> RecordKey {
        EventRecord::key(self)
    }

    fn describe(&self) -> String {
        format!("event {}", self.event)
    }
}

impl BatchItem for RecordKey {
    fn key(&self) -> RecordKey {
        self.clone()
    }

    fn describe(&self) -> String {
        "delete".to_string()
    }
}

/// Report the requested items that appear among `unprocessed`, and no others.
pub fn to_batch_status<T: BatchItem>(requested: &[T], unprocessed: &[WriteRequest]) -> BatchStatus<T> {
    let missing: HashSet<RecordKey> = unprocessed.iter().filter_map(codec::request_key).collect();
    let errors = requested
        .iter()
        .filter_map(|item| {
            let key = item.key();
            missing.contains(&key).then(|| ErrorStatus {
                reason: unprocessed_reason(&item.describe(), &key),
                item: item.clone(),
            })
        })
        .collect();
    BatchStatus::from_errors(errors)
}

/// Delete `keys` from `table` through the retrying helper.
pub async fn delete_keys(
    client: &Client,
    table: &str,
    keys: Vec<RecordKey>,
    retry: &RetryConfig,
) -> Result<BatchStatus<RecordKey>> {
    if keys.is_empty() {
        return Ok(BatchStatus::ok());
    }
    let requests = keys
        .iter()
        .map(codec::delete_request)
        .collect::<Result<Vec<_>>>()?;
    let unprocessed = retry_batch_write(client, table, requests, retry).await?;
    Ok(to_batch_status(&keys, &unprocessed))
}

#[cfg(test)]
mod tests;
