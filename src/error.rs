//! Aggregate-scoped errors.
//!
//! Every variant names the aggregate it concerns so callers can correlate
//! failures with a specific entity.

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The command is not valid for the current state. State is unchanged.
    #[error("{aggregate_id}: {reason}")]
    Rejected {
        aggregate_id: String,
        reason: String,
    },

    #[error("{aggregate_id}: unsupported command {tag}")]
    UnsupportedCommand { aggregate_id: String, tag: String },

    #[error("{aggregate_id}: unsupported event {tag}")]
    UnsupportedEvent { aggregate_id: String, tag: String },

    /// A stored record's tag or version disagrees with its decoded payload.
    #[error("{aggregate_id}: record at sequence {sequence} is {stored} but payload is {decoded}")]
    RecordMismatch {
        aggregate_id: String,
        sequence: u64,
        stored: String,
        decoded: String,
    },

    /// The journal did not apply every item of a batch.
    #[error("{aggregate_id}: batch partially persisted: {}", .reasons.join("; "))]
    PartialFailure {
        aggregate_id: String,
        reasons: Vec<String>,
    },

    /// A persisted event does not apply to the state it follows.
    #[error("{aggregate_id}: event {event} cannot apply to state {state}")]
    InvalidTransition {
        aggregate_id: String,
        event: String,
        state: String,
    },

    #[error("{aggregate_id}: sequence gap, expected {expected} found {found}")]
    SequenceGap {
        aggregate_id: String,
        expected: u64,
        found: u64,
    },

    #[error("{aggregate_id}: cannot roll back to {sequence}, snapshot covers up to {snapshot}")]
    RollbackBelowSnapshot {
        aggregate_id: String,
        sequence: u64,
        snapshot: u64,
    },

    #[error("{aggregate_id}: storage error: {source}")]
    Storage {
        aggregate_id: String,
        #[source]
        source: StorageError,
    },

    #[error("{aggregate_id}: codec error: {source}")]
    Codec {
        aggregate_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{aggregate_id}: aggregate actor has stopped")]
    ActorStopped { aggregate_id: String },
}

impl AggregateError {
    pub fn rejected(aggregate_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AggregateError::Rejected {
            aggregate_id: aggregate_id.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(aggregate_id: impl Into<String>, source: StorageError) -> Self {
        AggregateError::Storage {
            aggregate_id: aggregate_id.into(),
            source,
        }
    }

    pub fn codec(aggregate_id: impl Into<String>, source: serde_json::Error) -> Self {
        AggregateError::Codec {
            aggregate_id: aggregate_id.into(),
            source,
        }
    }

    /// The aggregate this error concerns.
    pub fn aggregate_id(&self) -> &str {
        match self {
            AggregateError::Rejected { aggregate_id, .. }
            | AggregateError::UnsupportedCommand { aggregate_id, .. }
            | AggregateError::UnsupportedEvent { aggregate_id, .. }
            | AggregateError::RecordMismatch { aggregate_id, .. }
            | AggregateError::PartialFailure { aggregate_id, .. }
            | AggregateError::InvalidTransition { aggregate_id, .. }
            | AggregateError::SequenceGap { aggregate_id, .. }
            | AggregateError::RollbackBelowSnapshot { aggregate_id, .. }
            | AggregateError::Storage { aggregate_id, .. }
            | AggregateError::Codec { aggregate_id, .. }
            | AggregateError::ActorStopped { aggregate_id } => aggregate_id,
        }
    }

    /// Precondition violations are local and the aggregate may take another command.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AggregateError::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, AggregateError>;
