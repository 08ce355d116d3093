//! DynamoDB storage implementations.
//!
//! One client is built by [`connect`] and shared by both stores.

pub mod batch;
pub mod codec;
mod journal_store;
mod query;
mod snapshot_store;

use aws_sdk_dynamodb::Client;
use tracing::info;

use crate::config::DynamoConfig;

pub use batch::{retry_batch_write, to_batch_status, BatchWriteFailure, BatchWriter};
pub use journal_store::DynamoJournalStore;
pub use snapshot_store::DynamoSnapshotStore;

/// Build a DynamoDB client from the AWS default chain plus overrides.
pub async fn connect(config: &DynamoConfig) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &config.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }

    info!(
        endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
        "Connected to DynamoDB"
    );
    Client::from_conf(builder.build())
}
