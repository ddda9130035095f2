//! Data Models
//!
//! - [`TreeNode`] - a tree-organized entity plus its computed columns
//! - [`TreeConfig`] - per-entity materialized-path configuration

pub mod config;
pub mod node;

pub use config::{ConfigError, DeletePolicy, TreeConfig};
pub use node::{ComputedFields, NodeId, PathSource, TreeNode};
