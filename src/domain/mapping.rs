//! Mapping aggregate: a named content type with properties.

use serde::{Deserialize, Serialize};

use super::{already_exists, deleted, invalid_transition, not_found, Properties};
use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::Result;
use crate::message::Message;
use crate::state::State;

const KIND: &str = "mapping";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$command", content = "data")]
pub enum MappingCommand {
    CreateMapping {
        name: String,
        #[serde(default)]
        properties: Properties,
    },
    SetMappingProperties {
        properties: Properties,
    },
    DeleteMapping,
}

impl Message for MappingCommand {
    fn tag(&self) -> &'static str {
        match self {
            MappingCommand::CreateMapping { .. } => "CreateMapping",
            MappingCommand::SetMappingProperties { .. } => "SetMappingProperties",
            MappingCommand::DeleteMapping => "DeleteMapping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$event", content = "data")]
pub enum MappingEvent {
    MappingCreated(Mapping),
    MappingPropertiesSet { properties: Properties },
    MappingDeleted,
}

impl Message for MappingEvent {
    fn tag(&self) -> &'static str {
        match self {
            MappingEvent::MappingCreated(_) => "MappingCreated",
            MappingEvent::MappingPropertiesSet { .. } => "MappingPropertiesSet",
            MappingEvent::MappingDeleted => "MappingDeleted",
        }
    }
}

pub struct MappingAggregate;

pub type MappingRoot = AggregateRoot<MappingAggregate>;

impl Aggregate for MappingAggregate {
    const KIND: &'static str = KIND;

    type State = Mapping;
    type Command = MappingCommand;
    type Event = MappingEvent;

    fn handle(
        aggregate_id: &str,
        state: &State<Mapping>,
        command: MappingCommand,
    ) -> Result<Option<MappingEvent>> {
        match command {
            MappingCommand::CreateMapping { name, properties } => match state {
                State::New => Ok(Some(MappingEvent::MappingCreated(Mapping {
                    uuid: aggregate_id.to_string(),
                    name,
                    properties,
                }))),
                _ => Err(already_exists(KIND, aggregate_id)),
            },
            MappingCommand::SetMappingProperties { properties } => match state {
                State::Active(_) => Ok(Some(MappingEvent::MappingPropertiesSet { properties })),
                State::New => Err(not_found(KIND, aggregate_id)),
                State::Deleted(_) => Err(deleted(KIND, aggregate_id)),
            },
            MappingCommand::DeleteMapping => match state {
                State::Active(_) => Ok(Some(MappingEvent::MappingDeleted)),
                State::Deleted(_) => Ok(None),
                State::New => Err(not_found(KIND, aggregate_id)),
            },
        }
    }

    fn apply(
        aggregate_id: &str,
        state: State<Mapping>,
        event: &MappingEvent,
    ) -> Result<State<Mapping>> {
        match (state, event) {
            (State::New, MappingEvent::MappingCreated(mapping)) => {
                Ok(State::Active(mapping.clone()))
            }
            (State::Active(mut mapping), MappingEvent::MappingPropertiesSet { properties }) => {
                mapping.properties = properties.clone();
                Ok(State::Active(mapping))
            }
            (State::Active(mapping), MappingEvent::MappingDeleted) => Ok(State::Deleted(mapping)),
            (state, event) => Err(invalid_transition(aggregate_id, event, &state)),
        }
    }
}
