//! Services
//!
//! - `TreeService` - async facade that commits units of work, broadcasts
//!   [`crate::db::TreeEvent`]s and answers path-based tree queries

pub mod tree_service;

pub use tree_service::TreeService;
