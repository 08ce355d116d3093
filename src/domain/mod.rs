//! Content-model aggregates: Mappings and the Nodes that instantiate them.
//!
//! Both follow the same lifecycle. Create is allowed only from `New`,
//! property updates only while `Active`, and delete moves `Active` to
//! `Deleted`. Deleting an already deleted entity is accepted without a new
//! event.

use crate::error::AggregateError;
use crate::message::Message;
use crate::state::State;

pub mod mapping;
pub mod node;

pub use mapping::{Mapping, MappingAggregate, MappingCommand, MappingEvent, MappingRoot};
pub use node::{Node, NodeAggregate, NodeCommand, NodeEvent, NodeRoot};

/// Free-form property bag attached to Mappings and Nodes.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Fresh random aggregate id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn already_exists(kind: &str, aggregate_id: &str) -> AggregateError {
    AggregateError::rejected(aggregate_id, format!("{kind} {aggregate_id} already exists"))
}

pub(crate) fn not_found(kind: &str, aggregate_id: &str) -> AggregateError {
    AggregateError::rejected(aggregate_id, format!("{kind} {aggregate_id} does not exist"))
}

pub(crate) fn deleted(kind: &str, aggregate_id: &str) -> AggregateError {
    AggregateError::rejected(aggregate_id, format!("{kind} {aggregate_id} has been deleted"))
}

pub(crate) fn invalid_transition<T>(
    aggregate_id: &str,
    event: &impl Message,
    state: &State<T>,
) -> AggregateError {
    AggregateError::InvalidTransition {
        aggregate_id: aggregate_id.to_string(),
        event: event.tag().to_string(),
        state: state.tag().to_string(),
    }
}
