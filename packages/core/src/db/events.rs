//! Tree Events
//!
//! Events emitted by [`crate::services::TreeService`] after a unit of work commits.
//! Subscribers (cache invalidators, search indexers) learn which materialized
//! paths changed without polling the store.
//!
//! # Event Flow
//!
//! 1. `UnitOfWork::commit` finishes and the store transaction commits
//! 2. The commit report is turned into `TreeEvent`s
//! 3. Events go out on a tokio broadcast channel to every subscriber

use crate::models::NodeId;
use serde::{Deserialize, Serialize};

/// Domain events for materialized-path changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeEvent {
    /// A node was inserted and its path built
    #[serde(rename = "node:inserted", rename_all = "camelCase")]
    NodeInserted { id: NodeId, path: String },

    /// A node's path was rewritten (reparent, path-source change, cascade)
    #[serde(rename = "node:pathChanged", rename_all = "camelCase")]
    PathChanged {
        id: NodeId,
        old_path: Option<String>,
        new_path: String,
    },

    /// A node was removed from the tree
    #[serde(rename = "node:removed", rename_all = "camelCase")]
    NodeRemoved { id: NodeId },
}

impl TreeEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeInserted { .. } => "node:inserted",
            TreeEvent::PathChanged { .. } => "node:pathChanged",
            TreeEvent::NodeRemoved { .. } => "node:removed",
        }
    }

    pub fn node_id(&self) -> &NodeId {
        match self {
            TreeEvent::NodeInserted { id, .. }
            | TreeEvent::PathChanged { id, .. }
            | TreeEvent::NodeRemoved { id } => id,
        }
    }
}
