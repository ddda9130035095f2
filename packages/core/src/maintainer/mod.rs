//! Materialized Path Maintenance
//!
//! `PathMaintainer` owns one entity type's [`TreeConfig`] and exposes the lifecycle
//! hooks a host persistence layer calls around its writes:
//!
//! - [`PathMaintainer::on_before_insert`] - build path, hash, level and root value
//!   for a new node, or defer until its identifier exists
//! - [`PathMaintainer::on_identifier_assigned`] - finish a deferred build
//! - [`PathMaintainer::on_parent_changed`] / [`PathMaintainer::on_path_source_changed`]
//!   - rebuild the node and cascade its new prefix to every descendant
//! - [`PathMaintainer::on_before_delete`] - remove or re-parent the subtree
//!
//! The host owns the maintainer and calls these explicitly; there is no global
//! listener registry. Everything runs synchronously inside the host's unit of work.

pub mod error;
pub mod path_builder;
pub mod propagator;
pub mod root_resolver;

pub use error::TreeError;
pub use path_builder::{digest, PathBuilder};
pub use propagator::SubtreePropagator;

use crate::db::TreeStore;
use crate::models::{ComputedFields, DeletePolicy, NodeId, PathSource, TreeConfig, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A node whose materialized path was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathChange {
    pub id: NodeId,
    /// `None` for a first build
    pub old_path: Option<String>,
    pub new_path: String,
}

/// Result of the insert hook
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Fields were computed and applied to the node before the write
    Built(ComputedFields),
    /// The identifier (or the parent's path) is not available yet;
    /// call `on_identifier_assigned` after the write
    Deferred,
}

/// Result of the delete hook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOutcome {
    /// Removed ids, deepest first
    pub removed: Vec<NodeId>,
    /// Paths rewritten by `DeletePolicy::PromoteChildren`
    pub changes: Vec<PathChange>,
}

/// Path core for one tree-organized entity type
#[derive(Debug, Clone)]
pub struct PathMaintainer {
    config: TreeConfig,
}

impl PathMaintainer {
    /// Create a maintainer, validating the configuration
    pub fn new(config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn builder(&self) -> PathBuilder<'_> {
        PathBuilder::new(&self.config)
    }

    /// Read and validate a node's path source
    pub fn path_source(&self, node: &TreeNode) -> Result<PathSource, TreeError> {
        let source = PathSource::from_properties(&node.properties, &self.config.path_source_field)?;
        self.builder().validate_source(&source)?;
        Ok(source)
    }

    /// Whether building `node` needs its own identifier
    ///
    /// Roots always do (their root value embeds the id); other nodes only in
    /// append-id mode.
    pub fn requires_identifier(&self, node: &TreeNode, is_root: bool) -> Result<bool, TreeError> {
        let source = self.path_source(node)?;
        Ok(is_root || self.builder().needs_identifier(&source))
    }

    /// Compute path, hash, level and root value for `node` under `parent`
    ///
    /// `parent` must already be built. Fails with `MissingIdentifier` when the
    /// node's id is needed but unset.
    pub fn compute_fields(
        &self,
        node: &TreeNode,
        parent: Option<&TreeNode>,
    ) -> Result<ComputedFields, TreeError> {
        let source = self.path_source(node)?;
        let builder = self.builder();

        let parent_path = match parent {
            Some(parent) => Some(parent.path.as_deref().ok_or_else(|| {
                TreeError::inconsistent_state(format!(
                    "parent {:?} of node {:?} has no path",
                    parent.id, node.id
                ))
            })?),
            None => None,
        };

        let path = builder.build(parent_path, &source, node.id.as_ref())?;
        let path_hash = builder.hash(&path);
        let level = root_resolver::compute_level(parent)?;
        let root_value = root_resolver::resolve_root_value(parent, &source, node.id.as_ref())?;

        Ok(ComputedFields {
            path,
            path_hash,
            level,
            root_value,
        })
    }

    /// The node and every descendant, parents before children
    ///
    /// Candidates come from one prefix scan on the node's path and are narrowed
    /// by parent links: other trees, or same-valued siblings without an id
    /// suffix, can store paths under the same prefix.
    pub fn subtree<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        node: &TreeNode,
    ) -> Result<Vec<TreeNode>, TreeError> {
        let (Some(id), Some(path)) = (&node.id, &node.path) else {
            return Ok(Vec::new());
        };

        // Path order puts every parent before its children
        let mut members = HashSet::from([id.clone()]);
        let mut subtree = Vec::new();
        for candidate in store.descendants_by_path_prefix(path)? {
            let Some(candidate_id) = candidate.id.clone() else {
                continue;
            };
            let belongs = &candidate_id == id
                || candidate
                    .parent_id
                    .as_ref()
                    .is_some_and(|parent| members.contains(parent));
            if belongs {
                members.insert(candidate_id);
                subtree.push(candidate);
            }
        }
        Ok(subtree)
    }

    /// Reject a parent assignment that would make `node_id` its own ancestor
    ///
    /// Walks the prospective parent's chain with a visited set, so a cycle that
    /// already exists in the store is reported instead of looping.
    pub fn ensure_acyclic<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        node_id: &NodeId,
        parent_id: Option<&NodeId>,
    ) -> Result<(), TreeError> {
        let mut visited = HashSet::new();
        let mut cursor = parent_id.cloned();

        while let Some(current) = cursor {
            if &current == node_id || !visited.insert(current.clone()) {
                return Err(TreeError::cycle_detected(node_id));
            }
            cursor = store
                .get_node(&current)?
                .ok_or_else(|| TreeError::parent_not_found(current.clone()))?
                .parent_id;
        }
        Ok(())
    }

    //
    // LIFECYCLE HOOKS
    //

    /// Build computed fields for a node about to be inserted
    ///
    /// The path source is validated first, so a bad value fails even when the
    /// build itself ends up deferred.
    pub fn on_before_insert<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        node: &mut TreeNode,
    ) -> Result<InsertOutcome, TreeError> {
        self.path_source(node)?;

        let parent = load_parent(store, node)?;

        if matches!(&parent, Some(p) if !p.is_built()) {
            return Ok(InsertOutcome::Deferred);
        }

        if node.id.is_none() && self.requires_identifier(node, parent.is_none())? {
            return Ok(InsertOutcome::Deferred);
        }

        let fields = self.compute_fields(node, parent.as_ref())?;
        tracing::debug!("Built path '{}' at level {}", fields.path, fields.level);
        node.apply_computed_fields(&fields);
        Ok(InsertOutcome::Built(fields))
    }

    /// Finish a deferred build once the store assigned `id`
    ///
    /// Any descendants already built under a previous path of this node are
    /// rewritten as well.
    pub fn on_identifier_assigned<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        id: &NodeId,
    ) -> Result<Vec<PathChange>, TreeError> {
        SubtreePropagator::new(self, store, id.clone()).run()
    }

    /// Rebuild a node whose parent reference was changed, then cascade
    ///
    /// The store must already hold the new `parent_id`; the old path is read
    /// from the node's stored computed fields.
    pub fn on_parent_changed<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        id: &NodeId,
    ) -> Result<Vec<PathChange>, TreeError> {
        let changes = SubtreePropagator::new(self, store, id.clone()).run()?;
        tracing::debug!("Parent change of {} rewrote {} path(s)", id, changes.len());
        Ok(changes)
    }

    /// Rebuild a node whose path source value changed, then cascade
    pub fn on_path_source_changed<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        id: &NodeId,
    ) -> Result<Vec<PathChange>, TreeError> {
        SubtreePropagator::new(self, store, id.clone()).run()
    }

    /// Remove `id` and handle its subtree according to the delete policy
    pub fn on_before_delete<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        id: &NodeId,
    ) -> Result<DeleteOutcome, TreeError> {
        let node = store
            .get_node(id)?
            .ok_or_else(|| TreeError::node_not_found(id.clone()))?;

        let outcome = match self.config.delete_policy {
            DeletePolicy::Cascade => self.remove_subtree(store, &node)?,
            DeletePolicy::PromoteChildren => self.promote_children(store, &node)?,
        };

        tracing::info!(
            "Removed node {} ({} node(s) removed, {} path(s) rewritten)",
            id,
            outcome.removed.len(),
            outcome.changes.len()
        );
        Ok(outcome)
    }

    fn remove_subtree<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        node: &TreeNode,
    ) -> Result<DeleteOutcome, TreeError> {
        let id = node
            .id
            .clone()
            .ok_or_else(|| TreeError::missing_identifier("cannot remove an unsaved node"))?;

        let mut doomed = self.subtree(&*store, node)?;
        // Deepest first, so no survivor ever points at a removed ancestor
        doomed.sort_by_key(|n| std::cmp::Reverse(n.path.as_ref().map_or(0, String::len)));

        let mut removed = Vec::with_capacity(doomed.len() + 1);
        for member in doomed {
            if let Some(member_id) = member.id {
                if member_id != id && store.remove_node(&member_id)? {
                    removed.push(member_id);
                }
            }
        }
        if store.remove_node(&id)? {
            removed.push(id);
        }

        Ok(DeleteOutcome {
            removed,
            changes: Vec::new(),
        })
    }

    fn promote_children<S: TreeStore + ?Sized>(
        &self,
        store: &mut S,
        node: &TreeNode,
    ) -> Result<DeleteOutcome, TreeError> {
        let id = node
            .id
            .clone()
            .ok_or_else(|| TreeError::missing_identifier("cannot remove an unsaved node"))?;

        let mut changes = Vec::new();
        for child in store.children_of(&id)? {
            let Some(child_id) = child.id else {
                continue;
            };
            store.set_parent_id(&child_id, node.parent_id.clone())?;
            changes.extend(self.on_parent_changed(store, &child_id)?);
        }

        let mut removed = Vec::new();
        if store.remove_node(&id)? {
            removed.push(id);
        }

        Ok(DeleteOutcome { removed, changes })
    }
}

/// Resolve `node`'s parent through [`TreeStore::get_parent`]
///
/// A parent reference with no stored node is `ParentNotFound`.
pub(crate) fn load_parent<S: TreeStore + ?Sized>(
    store: &S,
    node: &TreeNode,
) -> Result<Option<TreeNode>, TreeError> {
    match (store.get_parent(node)?, &node.parent_id) {
        (Some(parent), _) => Ok(Some(parent)),
        (None, Some(parent_id)) => Err(TreeError::parent_not_found(parent_id.clone())),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryTreeStore, StoreResult};
    use serde_json::json;

    fn maintainer() -> PathMaintainer {
        PathMaintainer::new(TreeConfig::default()).unwrap()
    }

    /// Insert through the hook, finishing a deferred build right away
    fn insert<S: TreeStore>(
        m: &PathMaintainer,
        store: &mut S,
        title: &str,
        parent: Option<&NodeId>,
    ) -> NodeId {
        let mut node = TreeNode::new(json!({ "title": title }));
        node.parent_id = parent.cloned();
        let outcome = m.on_before_insert(&*store, &mut node).unwrap();
        let id = store.insert_node(node).unwrap();
        if outcome == InsertOutcome::Deferred {
            m.on_identifier_assigned(store, &id).unwrap();
        }
        id
    }

    fn get(store: &MemoryTreeStore, id: &NodeId) -> TreeNode {
        store.get_node(id).unwrap().unwrap()
    }

    /// Counts parent lookups made through the store
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryTreeStore,
        parent_lookups: std::cell::Cell<usize>,
    }

    impl TreeStore for CountingStore {
        fn next_identifier(&mut self) -> StoreResult<Option<NodeId>> {
            self.inner.next_identifier()
        }
        fn insert_node(&mut self, node: TreeNode) -> StoreResult<NodeId> {
            self.inner.insert_node(node)
        }
        fn get_node(&self, id: &NodeId) -> StoreResult<Option<TreeNode>> {
            self.inner.get_node(id)
        }
        fn get_parent(&self, node: &TreeNode) -> StoreResult<Option<TreeNode>> {
            self.parent_lookups.set(self.parent_lookups.get() + 1);
            self.inner.get_parent(node)
        }
        fn set_parent_id(&mut self, id: &NodeId, parent_id: Option<NodeId>) -> StoreResult<()> {
            self.inner.set_parent_id(id, parent_id)
        }
        fn set_property(&mut self, id: &NodeId, field: &str, value: serde_json::Value) -> StoreResult<()> {
            self.inner.set_property(id, field, value)
        }
        fn set_computed_fields(&mut self, id: &NodeId, fields: &ComputedFields) -> StoreResult<()> {
            self.inner.set_computed_fields(id, fields)
        }
        fn remove_node(&mut self, id: &NodeId) -> StoreResult<bool> {
            self.inner.remove_node(id)
        }
        fn descendants_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<TreeNode>> {
            self.inner.descendants_by_path_prefix(prefix)
        }
        fn children_of(&self, parent_id: &NodeId) -> StoreResult<Vec<TreeNode>> {
            self.inner.children_of(parent_id)
        }
        fn root_nodes(&self) -> StoreResult<Vec<TreeNode>> {
            self.inner.root_nodes()
        }
        fn nodes_with_root_value(&self, root_value: &str) -> StoreResult<Vec<TreeNode>> {
            self.inner.nodes_with_root_value(root_value)
        }
        fn nodes_at_path(&self, path: &str) -> StoreResult<Vec<TreeNode>> {
            self.inner.nodes_at_path(path)
        }
        fn nodes_with_path_hash(&self, hash: &str) -> StoreResult<Vec<TreeNode>> {
            self.inner.nodes_with_path_hash(hash)
        }
        fn begin(&mut self) -> StoreResult<()> {
            self.inner.begin()
        }
        fn commit(&mut self) -> StoreResult<()> {
            self.inner.commit()
        }
        fn rollback(&mut self) -> StoreResult<()> {
            self.inner.rollback()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = TreeConfig {
            path_separator: 'x',
            ..Default::default()
        };
        assert!(PathMaintainer::new(config).unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_insert_defers_without_identifier() {
        let m = maintainer();
        let store = MemoryTreeStore::new();
        let mut node = TreeNode::new(json!({ "title": "a" }));

        assert_eq!(
            m.on_before_insert(&store, &mut node).unwrap(),
            InsertOutcome::Deferred
        );
        assert!(!node.is_built());
    }

    #[test]
    fn test_insert_builds_with_reserved_identifier() {
        let m = maintainer();
        let mut store = MemoryTreeStore::with_uuid_ids();
        let mut node = TreeNode::new(json!({ "title": "a" }));
        node.id = store.next_identifier().unwrap();
        let id = node.id.clone().unwrap();

        let outcome = m.on_before_insert(&store, &mut node).unwrap();
        assert!(matches!(outcome, InsertOutcome::Built(_)));
        assert_eq!(node.path.as_deref(), Some(format!("a-{},", id).as_str()));
        assert_eq!(node.root_value.as_deref(), Some(format!("a-{}", id).as_str()));
    }

    #[test]
    fn test_non_append_child_builds_before_its_id_exists() {
        let config = TreeConfig {
            path_source_field: "sort".to_string(),
            append_id: Some(false),
            ..Default::default()
        };
        let m = PathMaintainer::new(config).unwrap();
        let mut store = MemoryTreeStore::new();

        let mut root = TreeNode::new(json!({ "sort": 10 }));
        assert_eq!(
            m.on_before_insert(&store, &mut root).unwrap(),
            InsertOutcome::Deferred
        );
        let root_id = store.insert_node(root).unwrap();
        m.on_identifier_assigned(&mut store, &root_id).unwrap();

        let mut child = TreeNode::new(json!({ "sort": 20 })).with_parent(root_id.clone());
        let outcome = m.on_before_insert(&store, &mut child).unwrap();

        assert!(matches!(outcome, InsertOutcome::Built(_)));
        assert_eq!(child.path.as_deref(), Some("10,20,"));
        assert_eq!(child.level, Some(2));
        assert_eq!(child.root_value.as_deref(), Some("10-1"));
    }

    #[test]
    fn test_insert_rejects_separator_before_deferring() {
        let m = maintainer();
        let store = MemoryTreeStore::new();
        let mut node = TreeNode::new(json!({ "title": "1," }));

        let err = m.on_before_insert(&store, &mut node).unwrap_err();
        assert!(matches!(
            err,
            TreeError::Configuration(crate::models::ConfigError::SeparatorInPathSource { .. })
        ));
    }

    #[test]
    fn test_insert_with_unknown_parent() {
        let m = maintainer();
        let store = MemoryTreeStore::new();
        let mut node = TreeNode::new(json!({ "title": "a" })).with_parent(NodeId::from(42u64));

        assert!(matches!(
            m.on_before_insert(&store, &mut node),
            Err(TreeError::ParentNotFound { .. })
        ));
    }

    #[test]
    fn test_compute_fields_missing_identifier() {
        let m = maintainer();
        let node = TreeNode::new(json!({ "title": "a" }));

        assert!(matches!(
            m.compute_fields(&node, None),
            Err(TreeError::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn test_reparent_cascades_prefix() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));
        let c = insert(&m, &mut store, "c", Some(&b));
        let z = insert(&m, &mut store, "z", None);

        assert_eq!(get(&store, &c).path.as_deref(), Some("a-1,b-2,c-3,"));

        store.set_parent_id(&b, Some(z.clone())).unwrap();
        let changes = m.on_parent_changed(&mut store, &b).unwrap();
        assert_eq!(changes.len(), 2);

        let moved = get(&store, &b);
        let grandchild = get(&store, &c);
        assert_eq!(moved.path.as_deref(), Some("z-4,b-2,"));
        assert_eq!(grandchild.path.as_deref(), Some("z-4,b-2,c-3,"));
        assert_eq!(grandchild.level, Some(3));
        assert_eq!(grandchild.root_value.as_deref(), Some("z-4"));
        assert_eq!(
            grandchild.path_hash,
            Some(digest("z-4,b-2,c-3,"))
        );
        assert_eq!(get(&store, &a).path.as_deref(), Some("a-1,"));
    }

    #[test]
    fn test_rebuild_of_consistent_node_is_a_no_op() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));
        let before = get(&store, &b);

        assert!(m.on_parent_changed(&mut store, &b).unwrap().is_empty());
        assert!(m.on_path_source_changed(&mut store, &a).unwrap().is_empty());
        assert_eq!(get(&store, &b), before);
    }

    #[test]
    fn test_path_source_change_cascades() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));

        store.set_property(&a, "title", json!("renamed")).unwrap();
        m.on_path_source_changed(&mut store, &a).unwrap();

        assert_eq!(get(&store, &a).root_value.as_deref(), Some("renamed-1"));
        assert_eq!(get(&store, &b).path.as_deref(), Some("renamed-1,b-2,"));
        assert_eq!(get(&store, &b).root_value.as_deref(), Some("renamed-1"));
    }

    #[test]
    fn test_cycle_is_detected_before_any_write() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));

        assert!(matches!(
            m.ensure_acyclic(&store, &a, Some(&b)),
            Err(TreeError::CycleDetected { .. })
        ));
        assert!(matches!(
            m.ensure_acyclic(&store, &a, Some(&a)),
            Err(TreeError::CycleDetected { .. })
        ));

        store.set_parent_id(&a, Some(b.clone())).unwrap();
        assert!(matches!(
            m.on_parent_changed(&mut store, &a),
            Err(TreeError::CycleDetected { .. })
        ));
        assert_eq!(get(&store, &a).path.as_deref(), Some("a-1,"));
    }

    #[test]
    fn test_cascade_delete_removes_prefix_matches_only() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));
        let _c = insert(&m, &mut store, "c", Some(&b));
        let d = insert(&m, &mut store, "d", Some(&a));

        let outcome = m.on_before_delete(&mut store, &b).unwrap();

        assert_eq!(outcome.removed.len(), 2);
        assert_eq!(outcome.removed.last(), Some(&b));
        assert_eq!(store.len(), 2);
        assert_eq!(get(&store, &d).path.as_deref(), Some("a-1,d-4,"));
    }

    #[test]
    fn test_promote_children_on_delete() {
        let config = TreeConfig {
            delete_policy: DeletePolicy::PromoteChildren,
            ..Default::default()
        };
        let m = PathMaintainer::new(config).unwrap();
        let mut store = MemoryTreeStore::new();
        let a = insert(&m, &mut store, "a", None);
        let b = insert(&m, &mut store, "b", Some(&a));
        let c = insert(&m, &mut store, "c", Some(&b));

        let outcome = m.on_before_delete(&mut store, &a).unwrap();

        assert_eq!(outcome.removed, vec![a]);
        let promoted = get(&store, &b);
        assert_eq!(promoted.parent_id, None);
        assert_eq!(promoted.path.as_deref(), Some("b-2,"));
        assert_eq!(promoted.level, Some(1));
        assert_eq!(promoted.root_value.as_deref(), Some("b-2"));
        assert_eq!(get(&store, &c).path.as_deref(), Some("b-2,c-3,"));
        assert_eq!(get(&store, &c).root_value.as_deref(), Some("b-2"));
    }

    #[test]
    fn test_delete_unknown_node() {
        let m = maintainer();
        let mut store = MemoryTreeStore::new();

        assert!(matches!(
            m.on_before_delete(&mut store, &NodeId::from(1u64)),
            Err(TreeError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_parent_lookups_go_through_the_store() {
        let m = maintainer();
        let mut store = CountingStore::default();
        let root = insert(&m, &mut store, "root", None);
        let other = insert(&m, &mut store, "other", None);

        let before = store.parent_lookups.get();
        let child = insert(&m, &mut store, "child", Some(&root));
        let after_insert = store.parent_lookups.get();
        assert!(after_insert > before);

        store.set_parent_id(&child, Some(other.clone())).unwrap();
        m.on_parent_changed(&mut store, &child).unwrap();
        assert!(store.parent_lookups.get() > after_insert);
        assert_eq!(
            store.get_node(&child).unwrap().unwrap().path.as_deref(),
            Some("other-2,child-3,")
        );
    }

    #[test]
    fn test_subtree_ignores_other_trees_on_the_same_path() {
        let config = TreeConfig {
            path_source_field: "integerSort".to_string(),
            ..Default::default()
        };
        let m = PathMaintainer::new(config).unwrap();
        let mut store = MemoryTreeStore::new();
        let mut add = |value: u64, parent: Option<&NodeId>| {
            let mut node = TreeNode::new(json!({ "integerSort": value }));
            node.parent_id = parent.cloned();
            let outcome = m.on_before_insert(&store, &mut node).unwrap();
            let id = store.insert_node(node).unwrap();
            if outcome == InsertOutcome::Deferred {
                m.on_identifier_assigned(&mut store, &id).unwrap();
            }
            id
        };
        let r1 = add(10, None);
        let c1 = add(20, Some(&r1));
        let r2 = add(10, None);
        let c2 = add(20, Some(&r2));
        assert_eq!(get(&store, &c1).path, get(&store, &c2).path);

        let ids = |nodes: Vec<TreeNode>| nodes.into_iter().filter_map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(ids(m.subtree(&store, &get(&store, &r2)).unwrap()), vec![r2.clone(), c2.clone()]);

        store.set_property(&r2, "integerSort", json!(30)).unwrap();
        m.on_path_source_changed(&mut store, &r2).unwrap();
        assert_eq!(get(&store, &c2).path.as_deref(), Some("30,20,"));
        assert_eq!(get(&store, &c1).path.as_deref(), Some("10,20,"));

        let outcome = m.on_before_delete(&mut store, &r1).unwrap();
        assert_eq!(outcome.removed, vec![c1, r1]);
        assert!(store.get_node(&c2).unwrap().is_some());
    }
}
