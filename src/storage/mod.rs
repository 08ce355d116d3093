//! Journal and snapshot storage.
//!
//! Stores persist untyped [`EventRecord`](crate::message::EventRecord) and
//! [`SnapshotRecord`](crate::message::SnapshotRecord) rows keyed by
//! `(aggregate_id, sequence)`. Batched writes report partial failure through
//! [`BatchStatus`] instead of failing the whole call.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::message::RecordKey;

mod journal_store;
mod snapshot_store;

pub mod memory;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use journal_store::JournalStore;
pub use memory::{MemoryJournalStore, MemorySnapshotStore};
pub use snapshot_store::SnapshotStore;

/// Storage backend errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("DynamoDB error: {0}")]
    Dynamo(String),

    #[error("Batch write to {table} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        table: String,
        attempts: usize,
        message: String,
    },

    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid attribute {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage type {0:?} is not enabled in this build")]
    NotEnabled(StorageType),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One item a batched operation could not apply.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorStatus<T> {
    pub reason: String,
    pub item: T,
}

/// Outcome of a batched store operation.
///
/// `success` is true exactly when `errors` is empty. A `false` result means
/// the batch was partially applied and the caller owns recovery: retry the
/// failed items, or roll back to the last good sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatus<T> {
    pub success: bool,
    pub errors: Vec<ErrorStatus<T>>,
}

impl<T> BatchStatus<T> {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ErrorStatus<T>>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }

    pub fn reasons(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.reason.clone()).collect()
    }
}

/// Reason text for an item a batch left unapplied.
pub(crate) fn unprocessed_reason(what: &str, key: &RecordKey) -> String {
    format!(
        "{what} for aggregate {} at sequence {} was not processed",
        key.aggregate_id, key.sequence
    )
}

impl<T> Default for BatchStatus<T> {
    fn default() -> Self {
        Self::ok()
    }
}

/// Initialize storage based on configuration.
///
/// Returns the (JournalStore, SnapshotStore) pair. For DynamoDB a single
/// client is built and shared by both stores.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<(Arc<dyn JournalStore>, Arc<dyn SnapshotStore>)> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok((
                Arc::new(MemoryJournalStore::new()),
                Arc::new(MemorySnapshotStore::new()),
            ))
        }
        #[cfg(feature = "dynamo")]
        StorageType::Dynamo => {
            let client = dynamo::connect(&config.dynamo).await;
            info!(
                journal_table = %config.dynamo.journal_table,
                snapshot_table = %config.dynamo.snapshot_table,
                "Storage: DynamoDB"
            );
            Ok((
                Arc::new(dynamo::DynamoJournalStore::new(
                    client.clone(),
                    &config.dynamo.journal_table,
                    config.retry.clone(),
                )),
                Arc::new(dynamo::DynamoSnapshotStore::new(
                    client,
                    &config.dynamo.snapshot_table,
                    config.retry.clone(),
                )),
            ))
        }
        #[cfg(not(feature = "dynamo"))]
        StorageType::Dynamo => {
            tracing::error!("DynamoDB storage requested but 'dynamo' feature is not enabled");
            Err(StorageError::NotEnabled(StorageType::Dynamo))
        }
    }
}
