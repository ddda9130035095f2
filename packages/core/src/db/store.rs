//! TreeStore Trait - Host Persistence Abstraction
//!
//! This module defines the `TreeStore` trait: everything the path core needs from
//! the surrounding persistence layer. The core never issues queries of its own;
//! hosts back these methods with whatever their storage provides.
//!
//! # Design Decisions
//!
//! 1. **Synchronous**: the core runs inside one unit-of-work commit boundary and
//!    never suspends; async hosts wrap a store the way [`crate::services::TreeService`] does
//! 2. **Prefix queries**: `descendants_by_path_prefix` must be backed by an ordered
//!    index on the path column (`LIKE 'prefix%'` or a range scan)
//! 3. **Identifier availability**: `next_identifier` tells the core whether ids
//!    exist before the first write
//! 4. **Transactions**: `begin`/`commit`/`rollback` bracket a unit of work so a
//!    failed batch leaves no partial writes

use crate::db::StoreError;
use crate::models::{ComputedFields, NodeId, TreeNode};
use serde_json::Value;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for the materialized-path core
pub trait TreeStore {
    //
    // IDENTITY & CRUD
    //

    /// Reserve an identifier before the first write
    ///
    /// Returns `None` when the backend only assigns ids on insert
    /// (auto-increment columns); the core then defers id-dependent work.
    fn next_identifier(&mut self) -> StoreResult<Option<NodeId>>;

    /// Write a new node, returning its (possibly freshly assigned) id
    fn insert_node(&mut self, node: TreeNode) -> StoreResult<NodeId>;

    /// Get node by ID; `Ok(None)` if it doesn't exist
    fn get_node(&self, id: &NodeId) -> StoreResult<Option<TreeNode>>;

    /// Resolve a node's parent
    fn get_parent(&self, node: &TreeNode) -> StoreResult<Option<TreeNode>> {
        match &node.parent_id {
            Some(parent_id) => self.get_node(parent_id),
            None => Ok(None),
        }
    }

    /// Change the parent reference only; computed columns are left alone
    fn set_parent_id(&mut self, id: &NodeId, parent_id: Option<NodeId>) -> StoreResult<()>;

    /// Overwrite one entity property
    fn set_property(&mut self, id: &NodeId, field: &str, value: Value) -> StoreResult<()>;

    /// Write path, hash, level and root value
    fn set_computed_fields(&mut self, id: &NodeId, fields: &ComputedFields) -> StoreResult<()>;

    /// Remove one node; returns whether it existed
    fn remove_node(&mut self, id: &NodeId) -> StoreResult<bool>;

    //
    // PATH QUERIES
    //

    /// Every node whose path starts with `prefix`, ordered by path
    ///
    /// The node owning `prefix` itself is included, as is any node of another
    /// subtree that happens to share the prefix; callers narrow by parent links.
    fn descendants_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<TreeNode>>;

    /// Direct children by parent reference
    fn children_of(&self, parent_id: &NodeId) -> StoreResult<Vec<TreeNode>>;

    /// Nodes with no parent, ordered by path
    fn root_nodes(&self) -> StoreResult<Vec<TreeNode>>;

    /// Every node sharing a root value, ordered by path
    fn nodes_with_root_value(&self, root_value: &str) -> StoreResult<Vec<TreeNode>>;

    /// Every node stored at exactly `path`
    ///
    /// Paths are not unique: nodes whose segments carry no id can share one.
    fn nodes_at_path(&self, path: &str) -> StoreResult<Vec<TreeNode>>;

    /// Every node whose path hash equals `hash`
    fn nodes_with_path_hash(&self, hash: &str) -> StoreResult<Vec<TreeNode>>;

    //
    // TRANSACTIONS
    //

    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;
}
