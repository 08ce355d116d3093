//! Item layout and `serde_json::Value` <-> `AttributeValue` conversion.
//!
//! Journal item: `aggregateId` (S), `sequence` (N), `$event` (S),
//! `$version` (N), `createdAt` (S, RFC 3339), `payload` (native attributes).
//! Snapshot item: `aggregateId` (S), `sequence` (N), `state`.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest};
use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};

use crate::message::{EventRecord, RecordKey, SnapshotRecord};
use crate::storage::{Result, StorageError};

pub type Item = HashMap<String, AttributeValue>;

pub const AGGREGATE_ID: &str = "aggregateId";
pub const SEQUENCE: &str = "sequence";
pub const EVENT: &str = "$event";
pub const VERSION: &str = "$version";
pub const CREATED_AT: &str = "createdAt";
pub const PAYLOAD: &str = "payload";
pub const STATE: &str = "state";

/// Convert a JSON value to its native DynamoDB representation.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute back to JSON. Binary attributes are rejected.
pub fn from_attribute(attr: &AttributeValue) -> Result<Value> {
    Ok(match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute)
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::M(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), from_attribute(v)?)))
                .collect::<Result<Map<_, _>>>()?,
        ),
        AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(StorageError::InvalidAttribute {
                attribute: format!("{other:?}"),
                reason: "unsupported attribute type".to_string(),
            })
        }
    })
}

fn parse_number(n: &str) -> Result<Number> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(i.into());
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(u.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| StorageError::InvalidAttribute {
            attribute: n.to_string(),
            reason: "not a finite number".to_string(),
        })
}

fn get<'a>(item: &'a Item, name: &'static str) -> Result<&'a AttributeValue> {
    item.get(name).ok_or(StorageError::MissingAttribute(name))
}

fn get_s<'a>(item: &'a Item, name: &'static str) -> Result<&'a str> {
    match get(item, name)? {
        AttributeValue::S(s) => Ok(s),
        other => Err(invalid(name, other)),
    }
}

fn get_n<T: std::str::FromStr>(item: &Item, name: &'static str) -> Result<T> {
    match get(item, name)? {
        AttributeValue::N(n) => n.parse().map_err(|_| StorageError::InvalidAttribute {
            attribute: name.to_string(),
            reason: format!("cannot parse {n:?}"),
        }),
        other => Err(invalid(name, other)),
    }
}

fn invalid(name: &str, attr: &AttributeValue) -> StorageError {
    StorageError::InvalidAttribute {
        attribute: name.to_string(),
        reason: format!("unexpected type {attr:?}"),
    }
}

pub fn key_item(key: &RecordKey) -> Item {
    HashMap::from([
        (
            AGGREGATE_ID.to_string(),
            AttributeValue::S(key.aggregate_id.clone()),
        ),
        (SEQUENCE.to_string(), AttributeValue::N(key.sequence.to_string())),
    ])
}

pub fn key_from_item(item: &Item) -> Result<RecordKey> {
    Ok(RecordKey::new(
        get_s(item, AGGREGATE_ID)?,
        get_n(item, SEQUENCE)?,
    ))
}

pub fn event_item(event: &EventRecord) -> Item {
    let mut item = key_item(&event.key());
    item.insert(EVENT.to_string(), AttributeValue::S(event.event.clone()));
    item.insert(
        VERSION.to_string(),
        AttributeValue::N(event.version.to_string()),
    );
    item.insert(
        CREATED_AT.to_string(),
        AttributeValue::S(event.created_at.to_rfc3339()),
    );
    item.insert(PAYLOAD.to_string(), to_attribute(&event.payload));
    item
}

pub fn event_from_item(item: &Item) -> Result<EventRecord> {
    let key = key_from_item(item)?;
    let created_at = DateTime::parse_from_rfc3339(get_s(item, CREATED_AT)?)
        .map_err(|e| StorageError::InvalidAttribute {
            attribute: CREATED_AT.to_string(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);
    Ok(EventRecord {
        aggregate_id: key.aggregate_id,
        sequence: key.sequence,
        event: get_s(item, EVENT)?.to_string(),
        version: get_n(item, VERSION)?,
        created_at,
        payload: from_attribute(get(item, PAYLOAD)?)?,
    })
}

pub fn snapshot_item(snapshot: &SnapshotRecord) -> Item {
    let mut item = key_item(&snapshot.key());
    item.insert(STATE.to_string(), to_attribute(&snapshot.state));
    item
}

pub fn snapshot_from_item(item: &Item) -> Result<SnapshotRecord> {
    let key = key_from_item(item)?;
    Ok(SnapshotRecord {
        aggregate_id: key.aggregate_id,
        sequence: key.sequence,
        state: from_attribute(get(item, STATE)?)?,
    })
}

pub fn put_request(item: Item) -> Result<WriteRequest> {
    let put = PutRequest::builder()
        .set_item(Some(item))
        .build()
        .map_err(|e| StorageError::Dynamo(e.to_string()))?;
    Ok(WriteRequest::builder().put_request(put).build())
}

pub fn delete_request(key: &RecordKey) -> Result<WriteRequest> {
    let delete = DeleteRequest::builder()
        .set_key(Some(key_item(key)))
        .build()
        .map_err(|e| StorageError::Dynamo(e.to_string()))?;
    Ok(WriteRequest::builder().delete_request(delete).build())
}

/// Key of the item a put or delete request targets.
pub fn request_key(request: &WriteRequest) -> Option<RecordKey> {
    let item = request
        .put_request()
        .map(PutRequest::item)
        .or_else(|| request.delete_request().map(DeleteRequest::key))?;
    key_from_item(item).ok()
}
