//! Aggregate lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of an aggregate's domain object.
///
/// Serialized tagged with `$state` so snapshots keep the discriminant:
/// `{"$state": "Active", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$state", content = "data")]
pub enum State<T> {
    /// Before creation; nothing has been persisted.
    New,
    /// Created and writable.
    Active(T),
    /// Terminal for writes; keeps the last object for readers.
    Deleted(T),
}

impl<T> Default for State<T> {
    fn default() -> Self {
        State::New
    }
}

impl<T> State<T> {
    pub fn tag(&self) -> &'static str {
        match self {
            State::New => "New",
            State::Active(_) => "Active",
            State::Deleted(_) => "Deleted",
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            State::New => None,
            State::Active(payload) | State::Deleted(payload) => Some(payload),
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            State::New => None,
            State::Active(payload) | State::Deleted(payload) => Some(payload),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, State::New)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, State::Active(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, State::Deleted(_))
    }
}
