//! Storage configuration types.

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Dynamo,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// DynamoDB-specific configuration.
    pub dynamo: DynamoConfig,
    /// Retry policy for batched writes.
    pub retry: RetryConfig,
}

/// DynamoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// Endpoint override, e.g. `http://localhost:8000` for DynamoDB Local.
    pub endpoint_url: Option<String>,
    /// Region override; otherwise resolved by the AWS default chain.
    pub region: Option<String>,
    /// Journal table: PK `aggregateId` (S), SK `sequence` (N).
    pub journal_table: String,
    /// Snapshot table: PK `aggregateId` (S), SK `sequence` (N).
    pub snapshot_table: String,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: None,
            journal_table: "journal".to_string(),
            snapshot_table: "snapshots".to_string(),
        }
    }
}

/// Snapshot behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SnapshotsConfig {
    /// Take a snapshot after every `interval` events. 0 disables automatic
    /// snapshots; `compact` still writes one.
    pub interval: u64,
    /// Use snapshots when rehydrating. When false, always replays from 0.
    pub read: bool,
    /// Persist snapshots. When false nothing is ever written, and explicit
    /// `snapshot` and `compact` calls return `None`.
    pub write: bool,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            read: true,
            write: true,
        }
    }
}
