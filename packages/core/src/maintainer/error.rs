//! Path Maintenance Error Types

use crate::db::StoreError;
use crate::models::{ConfigError, NodeId};
use thiserror::Error;

/// Errors raised while building or propagating materialized paths
///
/// None of these are retried internally; retries belong to the host's
/// transaction policy.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Configuration or path source problem (e.g. separator inside the path source)
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Append-id mode or root value needs an id that is not available
    #[error("Missing identifier: {context}")]
    MissingIdentifier { context: String },

    /// Parent assignment would make a node its own ancestor
    #[error("Cycle detected: node '{node_id}' would become its own ancestor")]
    CycleDetected { node_id: String },

    /// Referenced parent does not exist
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: NodeId },

    /// Node does not exist
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: NodeId },

    /// Stored data contradicts the tree invariants
    #[error("Inconsistent tree state: {0}")]
    InconsistentState(String),

    /// Persistence layer failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TreeError {
    pub fn missing_identifier(context: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            context: context.into(),
        }
    }

    pub fn cycle_detected(node_id: impl ToString) -> Self {
        Self::CycleDetected {
            node_id: node_id.to_string(),
        }
    }

    pub fn parent_not_found(parent_id: NodeId) -> Self {
        Self::ParentNotFound { parent_id }
    }

    pub fn node_not_found(node_id: NodeId) -> Self {
        Self::NodeNotFound { node_id }
    }

    pub fn inconsistent_state(msg: impl Into<String>) -> Self {
        Self::InconsistentState(msg.into())
    }

    /// Whether this is the configuration class of error (fatal for the unit of work)
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
