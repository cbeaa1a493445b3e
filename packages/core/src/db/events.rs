//! Domain Events for Hierarchy Writes
//!
//! `HierarchyService` emits these after a write completes successfully, so
//! observers (a tree widget, a search indexer) can refresh without polling.
//!
//! # Architecture
//!
//! Events are emitted using tokio's broadcast channel, allowing multiple
//! subscribers. Lagging subscribers lose old events; only the current state
//! matters to them.

use crate::models::{Node, NodeId, Stage};
use serde::{Deserialize, Serialize};

/// Parent link change of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChange {
    pub node_id: NodeId,
    pub old_parent_id: Option<NodeId>,
    pub new_parent_id: Option<NodeId>,
}

/// Domain events emitted by `HierarchyService`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HierarchyEvent {
    /// A draft row was written for a record that had none
    NodeCreated { node: Node },

    /// An existing draft row was rewritten
    NodeUpdated { node: Node },

    /// The record now hangs under a different parent
    NodeMoved(ParentChange),

    /// The draft row was soft-deleted
    NodeDeleted { id: NodeId },

    /// A version was copied between tables
    NodePublished { id: NodeId, from: Stage, to: Stage },

    /// The live row was removed
    NodeUnpublished { id: NodeId },
}

impl HierarchyEvent {
    /// Get a string representation of the event type, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            HierarchyEvent::NodeCreated { .. } => "node_created",
            HierarchyEvent::NodeUpdated { .. } => "node_updated",
            HierarchyEvent::NodeMoved(_) => "node_moved",
            HierarchyEvent::NodeDeleted { .. } => "node_deleted",
            HierarchyEvent::NodePublished { .. } => "node_published",
            HierarchyEvent::NodeUnpublished { .. } => "node_unpublished",
        }
    }

    /// Id of the record the event concerns
    pub fn node_id(&self) -> NodeId {
        match self {
            HierarchyEvent::NodeCreated { node } | HierarchyEvent::NodeUpdated { node } => node.id,
            HierarchyEvent::NodeMoved(change) => change.node_id,
            HierarchyEvent::NodeDeleted { id }
            | HierarchyEvent::NodePublished { id, .. }
            | HierarchyEvent::NodeUnpublished { id } => *id,
        }
    }
}
