//! Unit of Work
//!
//! Collects one batch of tree changes and commits it against a [`TreeStore`]
//! in a fixed order:
//!
//! 1. **Validate** - path sources, parent references and cycles are checked
//!    before the first write, so a bad batch fails with nothing written
//! 2. **Phase 1: identifiers** - pending nodes are inserted in the order they were
//!    added; each either gets its fields built immediately or is deferred
//! 3. **Phase 2: paths** - deferred nodes are built parent-first once every id exists
//! 4. **Reparents, path-source changes and removals**, in the order they were recorded
//!
//! Steps 2-4 run inside `begin`/`commit`; any failure rolls the store back.
//!
//! # Examples
//!
//! ```rust
//! use treepath_core::db::MemoryTreeStore;
//! use treepath_core::maintainer::PathMaintainer;
//! use treepath_core::models::TreeConfig;
//! use treepath_core::operations::UnitOfWork;
//! use serde_json::json;
//!
//! let maintainer = PathMaintainer::new(TreeConfig::default())?;
//! let mut store = MemoryTreeStore::new();
//!
//! let mut uow = UnitOfWork::new();
//! let root = uow.insert(json!({ "title": "root" }));
//! let child = uow.insert(json!({ "title": "child" }));
//! uow.set_parent(child, Some(root.into()));
//!
//! let report = uow.commit(&maintainer, &mut store)?;
//! assert_eq!(report.inserted.len(), 2);
//! # Ok::<(), treepath_core::maintainer::TreeError>(())
//! ```

use crate::db::TreeStore;
use crate::maintainer::{InsertOutcome, PathChange, PathMaintainer, TreeError};
use crate::models::{NodeId, TreeNode};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Index of a node staged in a `UnitOfWork`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

/// Either a node staged in this unit of work or one already persisted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Pending(NodeHandle),
    Persisted(NodeId),
}

impl From<NodeHandle> for NodeRef {
    fn from(handle: NodeHandle) -> Self {
        NodeRef::Pending(handle)
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Persisted(id)
    }
}

impl From<&NodeId> for NodeRef {
    fn from(id: &NodeId) -> Self {
        NodeRef::Persisted(id.clone())
    }
}

#[derive(Debug, Clone)]
struct PendingInsert {
    properties: Value,
    parent: Option<NodeRef>,
    source_override: Option<Value>,
}

#[derive(Debug, Clone)]
enum Change {
    Reparent {
        id: NodeId,
        parent: Option<NodeRef>,
    },
    PathSource {
        id: NodeId,
        value: Value,
    },
    Remove(NodeId),
}

/// What a committed unit of work did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    /// Ids of staged nodes, indexed by `NodeHandle`
    pub ids: Vec<NodeId>,
    /// First builds of inserted nodes
    pub inserted: Vec<PathChange>,
    /// Rewrites of already-built nodes (reparent, path source, promotion)
    pub path_changes: Vec<PathChange>,
    pub removed: Vec<NodeId>,
}

impl CommitReport {
    pub fn id_of(&self, handle: NodeHandle) -> Option<&NodeId> {
        self.ids.get(handle.0)
    }

    fn record(&mut self, changes: Vec<PathChange>) {
        for change in changes {
            if change.old_path.is_some() {
                self.path_changes.push(change);
            } else {
                self.inserted.push(change);
            }
        }
    }
}

/// A batch of inserts, reparents, path-source changes and removals
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    inserts: Vec<PendingInsert>,
    changes: Vec<Change>,
    unknown_handles: Vec<NodeHandle>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing staged; a foreign handle still counts as content so commit reports it
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.changes.is_empty() && self.unknown_handles.is_empty()
    }

    /// Stage a new node; ids are handed out in staging order on commit
    pub fn insert(&mut self, properties: Value) -> NodeHandle {
        self.inserts.push(PendingInsert {
            properties,
            parent: None,
            source_override: None,
        });
        NodeHandle(self.inserts.len() - 1)
    }

    /// Set (or clear) the parent of a staged or persisted node
    pub fn set_parent(&mut self, node: impl Into<NodeRef>, parent: Option<NodeRef>) {
        match node.into() {
            NodeRef::Pending(handle) => match self.inserts.get_mut(handle.0) {
                Some(pending) => pending.parent = parent,
                None => self.unknown_handles.push(handle),
            },
            NodeRef::Persisted(id) => self.changes.push(Change::Reparent { id, parent }),
        }
    }

    /// Change the path-source value of a staged or persisted node
    pub fn set_path_source(&mut self, node: impl Into<NodeRef>, value: impl Into<Value>) {
        let value = value.into();
        match node.into() {
            NodeRef::Pending(handle) => match self.inserts.get_mut(handle.0) {
                Some(pending) => pending.source_override = Some(value),
                None => self.unknown_handles.push(handle),
            },
            NodeRef::Persisted(id) => self.changes.push(Change::PathSource { id, value }),
        }
    }

    /// Schedule removal; removing a node that no longer exists is a no-op
    pub fn remove(&mut self, id: NodeId) {
        self.changes.push(Change::Remove(id));
    }

    /// Validate and apply the batch atomically
    pub fn commit<S: TreeStore + ?Sized>(
        self,
        maintainer: &PathMaintainer,
        store: &mut S,
    ) -> Result<CommitReport, TreeError> {
        self.validate(maintainer, &*store)?;

        store.begin()?;
        match self.apply(maintainer, store) {
            Ok(report) => {
                store.commit()?;
                tracing::info!(
                    "Committed unit of work: {} inserted, {} path(s) rewritten, {} removed",
                    report.inserted.len(),
                    report.path_changes.len(),
                    report.removed.len()
                );
                Ok(report)
            }
            Err(err) => {
                tracing::warn!("Rolling back unit of work: {}", err);
                if let Err(rollback_err) = store.rollback() {
                    tracing::warn!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn staged_node(&self, maintainer: &PathMaintainer, pending: &PendingInsert) -> TreeNode {
        let mut node = TreeNode::new(pending.properties.clone());
        if let Some(value) = &pending.source_override {
            set_field(
                &mut node.properties,
                &maintainer.config().path_source_field,
                value.clone(),
            );
        }
        node
    }

    //
    // VALIDATION (no writes)
    //

    fn validate<S: TreeStore + ?Sized>(
        &self,
        maintainer: &PathMaintainer,
        store: &S,
    ) -> Result<(), TreeError> {
        if let Some(handle) = self.unknown_handles.first() {
            return Err(TreeError::inconsistent_state(format!(
                "handle #{} does not belong to this unit of work",
                handle.0
            )));
        }

        for pending in &self.inserts {
            maintainer.path_source(&self.staged_node(maintainer, pending))?;
            if let Some(parent) = &pending.parent {
                self.ensure_exists(store, parent)?;
            }
        }

        // Parent overlay: persisted nodes as they will look after the batch
        let mut overlay: HashMap<NodeId, Option<NodeRef>> = HashMap::new();

        for change in &self.changes {
            match change {
                Change::Reparent { id, parent } => {
                    self.ensure_exists(store, &NodeRef::Persisted(id.clone()))?;
                    if let Some(parent) = parent {
                        self.ensure_exists(store, parent)?;
                    }
                    overlay.insert(id.clone(), parent.clone());
                }
                Change::PathSource { id, value } => {
                    let mut node = store
                        .get_node(id)?
                        .ok_or_else(|| TreeError::node_not_found(id.clone()))?;
                    set_field(
                        &mut node.properties,
                        &maintainer.config().path_source_field,
                        value.clone(),
                    );
                    maintainer.path_source(&node)?;
                }
                Change::Remove(_) => {}
            }
        }

        let touched = (0..self.inserts.len())
            .map(|i| NodeRef::Pending(NodeHandle(i)))
            .chain(overlay.keys().cloned().map(NodeRef::Persisted));

        for start in touched {
            self.ensure_acyclic(store, &overlay, &start)?;
        }

        Ok(())
    }

    fn ensure_exists<S: TreeStore + ?Sized>(&self, store: &S, node: &NodeRef) -> Result<(), TreeError> {
        match node {
            NodeRef::Pending(handle) if handle.0 < self.inserts.len() => Ok(()),
            NodeRef::Pending(handle) => Err(TreeError::inconsistent_state(format!(
                "handle #{} does not belong to this unit of work",
                handle.0
            ))),
            NodeRef::Persisted(id) => match store.get_node(id)? {
                Some(_) => Ok(()),
                None => Err(TreeError::parent_not_found(id.clone())),
            },
        }
    }

    fn parent_of<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        overlay: &HashMap<NodeId, Option<NodeRef>>,
        node: &NodeRef,
    ) -> Result<Option<NodeRef>, TreeError> {
        match node {
            NodeRef::Pending(handle) => Ok(self
                .inserts
                .get(handle.0)
                .and_then(|pending| pending.parent.clone())),
            NodeRef::Persisted(id) => match overlay.get(id) {
                Some(parent) => Ok(parent.clone()),
                None => Ok(store
                    .get_node(id)?
                    .and_then(|node| node.parent_id)
                    .map(NodeRef::Persisted)),
            },
        }
    }

    fn ensure_acyclic<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        overlay: &HashMap<NodeId, Option<NodeRef>>,
        start: &NodeRef,
    ) -> Result<(), TreeError> {
        let mut visited = HashSet::new();
        let mut cursor = self.parent_of(store, overlay, start)?;

        while let Some(current) = cursor {
            if &current == start || !visited.insert(current.clone()) {
                return Err(TreeError::cycle_detected(describe(start)));
            }
            cursor = self.parent_of(store, overlay, &current)?;
        }
        Ok(())
    }

    /// Number of staged ancestors above a staged node
    fn staged_depth(&self, handle: usize) -> usize {
        let mut depth = 0;
        let mut cursor = self.inserts.get(handle).and_then(|p| p.parent.clone());
        while let Some(NodeRef::Pending(parent)) = cursor {
            depth += 1;
            // Validation already ruled out cycles; the bound is a backstop
            if depth > self.inserts.len() {
                break;
            }
            cursor = self.inserts.get(parent.0).and_then(|p| p.parent.clone());
        }
        depth
    }

    //
    // APPLY (inside the store transaction)
    //

    fn apply<S: TreeStore + ?Sized>(
        &self,
        maintainer: &PathMaintainer,
        store: &mut S,
    ) -> Result<CommitReport, TreeError> {
        let mut report = CommitReport::default();
        let mut deferred = Vec::new();
        let mut unlinked = Vec::new();

        // Phase 1: every staged node gets an id
        for (index, pending) in self.inserts.iter().enumerate() {
            let mut node = self.staged_node(maintainer, pending);
            node.id = store.next_identifier()?;

            let mut parent_known = true;
            node.parent_id = match &pending.parent {
                None => None,
                Some(NodeRef::Persisted(id)) => Some(id.clone()),
                Some(NodeRef::Pending(parent)) => match report.ids.get(parent.0) {
                    Some(id) => Some(id.clone()),
                    None => {
                        parent_known = false;
                        unlinked.push((index, parent.0));
                        None
                    }
                },
            };

            let outcome = if parent_known {
                maintainer.on_before_insert(&*store, &mut node)?
            } else {
                InsertOutcome::Deferred
            };

            let id = store.insert_node(node)?;
            match outcome {
                InsertOutcome::Built(fields) => report.inserted.push(PathChange {
                    id: id.clone(),
                    old_path: None,
                    new_path: fields.path,
                }),
                InsertOutcome::Deferred => deferred.push(index),
            }
            report.ids.push(id);
        }

        for (child, parent) in unlinked {
            let parent_id = report.ids.get(parent).cloned();
            if let Some(child_id) = report.ids.get(child) {
                store.set_parent_id(child_id, parent_id)?;
            }
        }

        // Phase 2: deferred builds, parents before children
        deferred.sort_by_key(|index| self.staged_depth(*index));
        for index in deferred {
            if let Some(id) = report.ids.get(index).cloned() {
                let changes = maintainer.on_identifier_assigned(store, &id)?;
                report.record(changes);
            }
        }

        for change in &self.changes {
            match change {
                Change::Reparent { id, parent } => {
                    let parent_id = match parent {
                        None => None,
                        Some(NodeRef::Persisted(pid)) => Some(pid.clone()),
                        Some(NodeRef::Pending(handle)) => report.ids.get(handle.0).cloned(),
                    };
                    store.set_parent_id(id, parent_id)?;
                    let changes = maintainer.on_parent_changed(store, id)?;
                    report.record(changes);
                }
                Change::PathSource { id, value } => {
                    store.set_property(id, &maintainer.config().path_source_field, value.clone())?;
                    let changes = maintainer.on_path_source_changed(store, id)?;
                    report.record(changes);
                }
                Change::Remove(id) => {
                    if store.get_node(id)?.is_none() {
                        continue;
                    }
                    let outcome = maintainer.on_before_delete(store, id)?;
                    report.record(outcome.changes);
                    report.removed.extend(outcome.removed);
                }
            }
        }

        Ok(report)
    }
}

fn set_field(properties: &mut Value, field: &str, value: Value) {
    if !properties.is_object() {
        *properties = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = properties.as_object_mut() {
        map.insert(field.to_string(), value);
    }
}

fn describe(node: &NodeRef) -> String {
    match node {
        NodeRef::Pending(handle) => format!("pending #{}", handle.0),
        NodeRef::Persisted(id) => id.to_string(),
    }
}
