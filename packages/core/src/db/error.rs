//! Store Error Types
//!
//! Errors reported by a [`crate::db::TreeStore`] implementation. The path core
//! never retries on these; they propagate to the unit of work, which rolls back.

use crate::models::NodeId;
use thiserror::Error;

/// Persistence operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Node id not present in the store
    #[error("Node not found in store: {id}")]
    NotFound { id: NodeId },

    /// Insert with an id that is already taken
    #[error("Duplicate node id: {id}")]
    DuplicateId { id: NodeId },

    /// `begin` called while a transaction is open
    #[error("A transaction is already open")]
    TransactionAlreadyOpen,

    /// `commit`/`rollback` called with no open transaction
    #[error("No open transaction")]
    NoTransaction,

    /// Any other backend failure, with context
    #[error("Store backend failed: {context}")]
    Backend { context: String },
}

impl StoreError {
    pub fn not_found(id: NodeId) -> Self {
        Self::NotFound { id }
    }

    pub fn duplicate_id(id: NodeId) -> Self {
        Self::DuplicateId { id }
    }

    pub fn backend(context: impl Into<String>) -> Self {
        Self::Backend {
            context: context.into(),
        }
    }
}
