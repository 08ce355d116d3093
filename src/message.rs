//! Command, Event and Snapshot envelopes.
//!
//! Concrete aggregates define their commands and events as closed enums.
//! Those enums serialize adjacently tagged (`"$command"`/`"$event"` plus
//! `"data"`) so the discriminant survives the trip through storage. The
//! stores never see typed payloads: they persist [`EventRecord`] and
//! [`SnapshotRecord`], and the aggregate layer converts between the two.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AggregateError;

/// Field carrying the command discriminant in serialized form.
pub const COMMAND_TAG: &str = "$command";
/// Field carrying the event discriminant in serialized form.
pub const EVENT_TAG: &str = "$event";

/// A member of a closed command or event union.
pub trait Message: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Discriminant name, e.g. `"MappingCreated"`.
    fn tag(&self) -> &'static str;

    /// Schema version of this message shape.
    fn version(&self) -> u32 {
        1
    }
}

/// An immutable, sequenced fact emitted by an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<E> {
    pub aggregate_id: String,
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub payload: E,
}

impl<E: Message> Event<E> {
    pub fn new(aggregate_id: impl Into<String>, sequence: u64, payload: E) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            sequence,
            created_at: Utc::now(),
            payload,
        }
    }

    /// Convert to the untyped form persisted by a [`JournalStore`](crate::storage::JournalStore).
    pub fn to_record(&self) -> Result<EventRecord, AggregateError> {
        let payload = serde_json::to_value(&self.payload)
            .map_err(|source| AggregateError::codec(&self.aggregate_id, source))?;
        Ok(EventRecord {
            aggregate_id: self.aggregate_id.clone(),
            sequence: self.sequence,
            event: self.payload.tag().to_string(),
            version: self.payload.version(),
            created_at: self.created_at,
            payload,
        })
    }

    /// Decode a stored record.
    ///
    /// A tag the union does not know fails with `UnsupportedEvent`; unknown
    /// events are never skipped, since skipping would silently fork state.
    /// The record's `event` and `version` columns must match the payload.
    pub fn from_record(record: EventRecord) -> Result<Self, AggregateError> {
        let payload = serde_json::from_value::<E>(record.payload).map_err(|source| {
            if is_unknown_variant(&source) {
                AggregateError::UnsupportedEvent {
                    aggregate_id: record.aggregate_id.clone(),
                    tag: record.event.clone(),
                }
            } else {
                AggregateError::codec(&record.aggregate_id, source)
            }
        })?;

        if record.event != payload.tag() || record.version != payload.version() {
            return Err(AggregateError::RecordMismatch {
                aggregate_id: record.aggregate_id,
                sequence: record.sequence,
                stored: format!("{} v{}", record.event, record.version),
                decoded: format!("{} v{}", payload.tag(), payload.version()),
            });
        }

        Ok(Self {
            aggregate_id: record.aggregate_id,
            sequence: record.sequence,
            created_at: record.created_at,
            payload,
        })
    }
}

/// Point-in-time capture of fully-applied state as of `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub aggregate_id: String,
    pub sequence: u64,
    pub state: S,
}

impl<S: Serialize + DeserializeOwned> Snapshot<S> {
    pub fn to_record(&self) -> Result<SnapshotRecord, AggregateError> {
        let state = serde_json::to_value(&self.state)
            .map_err(|source| AggregateError::codec(&self.aggregate_id, source))?;
        Ok(SnapshotRecord {
            aggregate_id: self.aggregate_id.clone(),
            sequence: self.sequence,
            state,
        })
    }

    pub fn from_record(record: SnapshotRecord) -> Result<Self, AggregateError> {
        let state = serde_json::from_value(record.state)
            .map_err(|source| AggregateError::codec(&record.aggregate_id, source))?;
        Ok(Self {
            aggregate_id: record.aggregate_id,
            sequence: record.sequence,
            state,
        })
    }
}

/// Journal row: an event with its payload kept as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub aggregate_id: String,
    pub sequence: u64,
    /// Event discriminant, duplicated out of the payload for store-side reads.
    pub event: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl EventRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.aggregate_id, self.sequence)
    }
}

/// Snapshot row: serialized `State` (tag + payload) as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub aggregate_id: String,
    pub sequence: u64,
    pub state: serde_json::Value,
}

impl SnapshotRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.aggregate_id, self.sequence)
    }
}

/// Primary key of a journal or snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub aggregate_id: String,
    pub sequence: u64,
}

impl RecordKey {
    pub fn new(aggregate_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            sequence,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.aggregate_id, self.sequence)
    }
}

/// Decode an untyped command, e.g. one received from an API layer.
///
/// Unknown discriminants fail with `UnsupportedCommand` naming the tag.
pub fn decode_command<C: Message>(
    aggregate_id: &str,
    value: serde_json::Value,
) -> Result<C, AggregateError> {
    let tag = value
        .get(COMMAND_TAG)
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(value).map_err(|source| {
        if is_unknown_variant(&source) {
            AggregateError::UnsupportedCommand {
                aggregate_id: aggregate_id.to_string(),
                tag,
            }
        } else {
            AggregateError::codec(aggregate_id, source)
        }
    })
}

/// Serde reports an unrecognized discriminant as an `unknown variant` data error.
fn is_unknown_variant(err: &serde_json::Error) -> bool {
    err.is_data() && err.to_string().starts_with("unknown variant")
}
