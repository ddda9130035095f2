//! Batched Tree Operations
//!
//! Changes to the tree are staged in a [`UnitOfWork`] and committed together,
//! so identifiers, paths and cascades are resolved in one pass against the store.

pub mod unit_of_work;

pub use unit_of_work::{CommitReport, NodeHandle, NodeRef, UnitOfWork};
