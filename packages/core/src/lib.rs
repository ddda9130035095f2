//! TreePath Core
//!
//! Materialized-path maintenance for hierarchical records. Each node carries a
//! path string built from its ancestors' path-source values, an optional hash of
//! that path, its depth and the identity of its tree root. Those columns are
//! kept consistent through inserts, reparents, path-source edits and removals.
//!
//! # Architecture
//!
//! - **Pure computation in the maintainer**: path building, root resolution and
//!   subtree propagation never touch the store except through [`db::TreeStore`]
//! - **Two-phase identifiers**: nodes whose segment needs an id the store only
//!   assigns on write are inserted first and built once the id exists
//! - **Prefix cascades**: a move rewrites descendants found by a single path
//!   prefix scan
//!
//! # Modules
//!
//! - [`models`] - Nodes, computed fields and configuration
//! - [`maintainer`] - Path building, root resolution and the lifecycle hooks
//! - [`db`] - Store trait, in-memory backend and tree events
//! - [`operations`] - Batched changes committed as one unit of work
//! - [`services`] - Async service with event broadcast and tree queries

pub mod db;
pub mod maintainer;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use db::{MemoryTreeStore, StoreError, TreeEvent, TreeStore};
pub use maintainer::{PathChange, PathMaintainer, TreeError};
pub use models::*;
pub use operations::{CommitReport, NodeHandle, NodeRef, UnitOfWork};
pub use services::TreeService;
