//! Node aggregate: an instance of a Mapping.

use serde::{Deserialize, Serialize};

use super::{already_exists, deleted, invalid_transition, not_found, Properties};
use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::Result;
use crate::message::Message;
use crate::state::State;

const KIND: &str = "node";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    /// Id of the Mapping this node instantiates.
    pub mapping: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$command", content = "data")]
pub enum NodeCommand {
    CreateNode {
        mapping: String,
        #[serde(default)]
        properties: Properties,
    },
    SetNodeProperties {
        properties: Properties,
    },
    DeleteNode,
}

impl Message for NodeCommand {
    fn tag(&self) -> &'static str {
        match self {
            NodeCommand::CreateNode { .. } => "CreateNode",
            NodeCommand::SetNodeProperties { .. } => "SetNodeProperties",
            NodeCommand::DeleteNode => "DeleteNode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$event", content = "data")]
pub enum NodeEvent {
    NodeCreated(Node),
    NodePropertiesSet { properties: Properties },
    NodeDeleted,
}

impl Message for NodeEvent {
    fn tag(&self) -> &'static str {
        match self {
            NodeEvent::NodeCreated(_) => "NodeCreated",
            NodeEvent::NodePropertiesSet { .. } => "NodePropertiesSet",
            NodeEvent::NodeDeleted => "NodeDeleted",
        }
    }
}

pub struct NodeAggregate;

pub type NodeRoot = AggregateRoot<NodeAggregate>;

impl Aggregate for NodeAggregate {
    const KIND: &'static str = KIND;

    type State = Node;
    type Command = NodeCommand;
    type Event = NodeEvent;

    fn handle(
        aggregate_id: &str,
        state: &State<Node>,
        command: NodeCommand,
    ) -> Result<Option<NodeEvent>> {
        match (command, state) {
            (NodeCommand::CreateNode { mapping, properties }, State::New) => {
                Ok(Some(NodeEvent::NodeCreated(Node {
                    uuid: aggregate_id.to_string(),
                    mapping,
                    properties,
                })))
            }
            (NodeCommand::CreateNode { .. }, _) => Err(already_exists(KIND, aggregate_id)),

            (NodeCommand::SetNodeProperties { properties }, State::Active(_)) => {
                Ok(Some(NodeEvent::NodePropertiesSet { properties }))
            }
            (NodeCommand::SetNodeProperties { .. }, State::Deleted(_)) => {
                Err(deleted(KIND, aggregate_id))
            }

            (NodeCommand::DeleteNode, State::Active(_)) => Ok(Some(NodeEvent::NodeDeleted)),
            (NodeCommand::DeleteNode, State::Deleted(_)) => Ok(None),

            (NodeCommand::SetNodeProperties { .. } | NodeCommand::DeleteNode, State::New) => {
                Err(not_found(KIND, aggregate_id))
            }
        }
    }

    fn apply(aggregate_id: &str, state: State<Node>, event: &NodeEvent) -> Result<State<Node>> {
        match (state, event) {
            (State::New, NodeEvent::NodeCreated(node)) => Ok(State::Active(node.clone())),
            (State::Active(mut node), NodeEvent::NodePropertiesSet { properties }) => {
                node.properties = properties.clone();
                Ok(State::Active(node))
            }
            (State::Active(node), NodeEvent::NodeDeleted) => Ok(State::Deleted(node)),
            (state, event) => Err(invalid_transition(aggregate_id, event, &state)),
        }
    }
}
