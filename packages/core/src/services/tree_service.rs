//! Tree Service
//!
//! Async facade over a [`TreeStore`] and a [`PathMaintainer`]. Every unit of
//! work runs under one store lock, and the resulting path changes are broadcast
//! to subscribers once the store has committed.
//!
//! # Design Decisions
//!
//! - The maintainer itself is synchronous; the service only adds serialization
//!   (`tokio::sync::Mutex`) and event fan-out (`tokio::sync::broadcast`)
//! - Events are emitted after commit only, so a rolled-back batch is never announced
//! - Tree queries resolve through the materialized path (prefix scans and
//!   path-hash lookups) instead of walking parent links

use crate::db::{TreeEvent, TreeStore};
use crate::maintainer::{PathMaintainer, TreeError};
use crate::models::{NodeId, TreeConfig, TreeNode};
use crate::operations::{CommitReport, UnitOfWork};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Broadcast channel capacity for tree events
const TREE_EVENT_CHANNEL_CAPACITY: usize = 128;

pub struct TreeService<S: TreeStore + Send> {
    store: Arc<Mutex<S>>,
    maintainer: Arc<PathMaintainer>,
    event_tx: broadcast::Sender<TreeEvent>,
}

impl<S: TreeStore + Send> Clone for TreeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            maintainer: Arc::clone(&self.maintainer),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<S: TreeStore + Send> TreeService<S> {
    /// Create a service; fails if `config` is invalid
    pub fn new(store: S, config: TreeConfig) -> Result<Self, TreeError> {
        let maintainer = PathMaintainer::new(config)?;
        let (event_tx, _) = broadcast::channel(TREE_EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            "TreeService ready (separator '{}', source field '{}')",
            maintainer.config().path_separator,
            maintainer.config().path_source_field
        );

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            maintainer: Arc::new(maintainer),
            event_tx,
        })
    }

    pub fn maintainer(&self) -> &PathMaintainer {
        &self.maintainer
    }

    /// Subscribe to tree events
    ///
    /// Returns a broadcast receiver that sees every insert, path rewrite and
    /// removal from units of work committed after the call.
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores errors if no subscribers
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run `f` against the locked store
    pub async fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let store = self.store.lock().await;
        f(&store)
    }

    //
    // WRITES
    //

    /// Commit a unit of work and broadcast what changed
    pub async fn commit(&self, uow: UnitOfWork) -> Result<CommitReport, TreeError> {
        if uow.is_empty() {
            return Ok(CommitReport::default());
        }

        let report = {
            let mut store = self.store.lock().await;
            uow.commit(&self.maintainer, &mut *store)?
        };

        for change in &report.inserted {
            self.emit_event(TreeEvent::NodeInserted {
                id: change.id.clone(),
                path: change.new_path.clone(),
            });
        }
        for change in &report.path_changes {
            self.emit_event(TreeEvent::PathChanged {
                id: change.id.clone(),
                old_path: change.old_path.clone(),
                new_path: change.new_path.clone(),
            });
        }
        for id in &report.removed {
            self.emit_event(TreeEvent::NodeRemoved { id: id.clone() });
        }

        Ok(report)
    }

    //
    // QUERIES
    //

    pub async fn get_node(&self, id: &NodeId) -> Result<Option<TreeNode>, TreeError> {
        let store = self.store.lock().await;
        Ok(store.get_node(id)?)
    }

    pub async fn root_nodes(&self) -> Result<Vec<TreeNode>, TreeError> {
        let store = self.store.lock().await;
        Ok(store.root_nodes()?)
    }

    /// Children of `id`: direct children only, or the whole subtree ordered by path
    pub async fn children(&self, id: &NodeId, direct_only: bool) -> Result<Vec<TreeNode>, TreeError> {
        let store = self.store.lock().await;
        let node = store
            .get_node(id)?
            .ok_or_else(|| TreeError::node_not_found(id.clone()))?;

        if direct_only {
            return Ok(store.children_of(id)?);
        }

        Ok(self
            .maintainer
            .subtree(&*store, &node)?
            .into_iter()
            .filter(|descendant| descendant.id.as_ref() != Some(id))
            .collect())
    }

    /// Ancestors of `id`, root first, resolved from the node's own path
    ///
    /// Each ancestor path is one index lookup. When several nodes share a path,
    /// the one the chain below points at is kept.
    pub async fn ancestors(&self, id: &NodeId) -> Result<Vec<TreeNode>, TreeError> {
        let store = self.store.lock().await;
        let node = store
            .get_node(id)?
            .ok_or_else(|| TreeError::node_not_found(id.clone()))?;

        let Some(path) = &node.path else {
            return Ok(Vec::new());
        };

        let builder = self.maintainer.builder();
        let mut ancestors = Vec::new();
        let mut expected = node.parent_id.clone();

        for ancestor_path in builder.ancestor_paths(path).into_iter().rev() {
            let candidates = match builder.hash(&ancestor_path) {
                Some(hash) => store.nodes_with_path_hash(&hash)?,
                None => store.nodes_at_path(&ancestor_path)?,
            };
            let ancestor = candidates
                .into_iter()
                .find(|candidate| candidate.id.is_some() && candidate.id == expected)
                .ok_or_else(|| {
                    TreeError::inconsistent_state(format!(
                        "no parent of the chain stored at ancestor path '{}' of node {}",
                        ancestor_path, id
                    ))
                })?;
            expected = ancestor.parent_id.clone();
            ancestors.push(ancestor);
        }

        ancestors.reverse();
        Ok(ancestors)
    }

    /// Every node of one tree, identified by its root value
    pub async fn tree(&self, root_value: &str) -> Result<Vec<TreeNode>, TreeError> {
        let store = self.store.lock().await;
        Ok(store.nodes_with_root_value(root_value)?)
    }
}

// Service-level tests in separate module
#[cfg(test)]
#[path = "tree_service_test.rs"]
mod tree_service_test;
