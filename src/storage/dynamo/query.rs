//! Sort-key range queries shared by the journal and snapshot stores.

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use super::codec::{self, Item};
use crate::message::RecordKey;
use crate::storage::{Result, StorageError};

/// Bounds on `sequence` within one partition. All bounds are inclusive.
#[derive(Debug, Clone, Copy)]
pub enum SequenceRange {
    All,
    From(u64),
    UpTo(u64),
    Between(u64, u64),
}

/// Query builder for `aggregateId = :id` plus a `sequence` range.
pub fn range_query(
    client: &Client,
    table: &str,
    aggregate_id: &str,
    range: SequenceRange,
) -> QueryFluentBuilder {
    let query = client
        .query()
        .table_name(table)
        .expression_attribute_names("#id", codec::AGGREGATE_ID)
        .expression_attribute_values(":id", AttributeValue::S(aggregate_id.to_string()));

    let number = |n: u64| AttributeValue::N(n.to_string());
    let (condition, query) = match range {
        SequenceRange::All => ("#id = :id", query),
        SequenceRange::From(from) => (
            "#id = :id AND #seq >= :from",
            query
                .expression_attribute_names("#seq", codec::SEQUENCE)
                .expression_attribute_values(":from", number(from)),
        ),
        SequenceRange::UpTo(to) => (
            "#id = :id AND #seq <= :to",
            query
                .expression_attribute_names("#seq", codec::SEQUENCE)
                .expression_attribute_values(":to", number(to)),
        ),
        SequenceRange::Between(from, to) => (
            "#id = :id AND #seq BETWEEN :from AND :to",
            query
                .expression_attribute_names("#seq", codec::SEQUENCE)
                .expression_attribute_values(":from", number(from))
                .expression_attribute_values(":to", number(to)),
        ),
    };

    query.key_condition_expression(condition)
}

/// Keys only, to keep delete scans small.
pub fn key_query(
    client: &Client,
    table: &str,
    aggregate_id: &str,
    range: SequenceRange,
) -> QueryFluentBuilder {
    range_query(client, table, aggregate_id, range)
        .expression_attribute_names("#id", codec::AGGREGATE_ID)
        .expression_attribute_names("#seq", codec::SEQUENCE)
        .projection_expression("#id, #seq")
}

/// Run a query to completion, following `LastEvaluatedKey`.
pub async fn query_all(query: QueryFluentBuilder) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let mut start_key = None;

    loop {
        let output = query
            .clone()
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| StorageError::Dynamo(DisplayErrorContext(&e).to_string()))?;

        items.extend(output.items().iter().cloned());

        match output.last_evaluated_key() {
            Some(key) if !key.is_empty() => start_key = Some(key.clone()),
            _ => break,
        }
    }

    Ok(items)
}

pub async fn query_keys(
    client: &Client,
    table: &str,
    aggregate_id: &str,
    range: SequenceRange,
) -> Result<Vec<RecordKey>> {
    query_all(key_query(client, table, aggregate_id, range))
        .await?
        .iter()
        .map(codec::key_from_item)
        .collect()
}
