//! Storage Layer
//!
//! The path maintainer never talks to a concrete database. It goes through the
//! [`TreeStore`] trait, which covers:
//!
//! - Node reads and writes (including the computed path columns)
//! - Identifier reservation for stores that assign ids before the write
//! - Prefix, hash and root-value lookups used by cascades and queries
//! - `begin` / `commit` / `rollback` around a unit of work
//!
//! # Architecture
//!
//! [`MemoryTreeStore`] is the bundled backend: a `HashMap` of rows plus an
//! ordered `(path, id)` index so a prefix scan is one range. Other backends
//! implement the same trait.

mod error;
pub mod events;
pub mod memory_store;
pub mod store;

pub use error::StoreError;
pub use events::TreeEvent;
pub use memory_store::{IdStrategy, MemoryTreeStore};
pub use store::{StoreResult, TreeStore};
