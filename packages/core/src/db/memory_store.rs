//! In-memory TreeStore
//!
//! Reference host used by tests, benchmarks and the dev tools. It keeps:
//!
//! - the node table keyed by id
//! - an ordered `(path, id)` index so prefix queries are range scans
//! - a hash index for exact path-hash lookups
//!
//! Paths are not unique: same-valued siblings without an id suffix, or two
//! trees whose roots share a path source, legitimately store the same path.
//! - a snapshot for `begin`/`rollback`
//!
//! Ids come from one of two strategies, which exercises both sides of the
//! deferred-identifier protocol: a post-write sequence (like an auto-increment
//! column) or pre-write UUIDs.

use crate::db::{StoreError, StoreResult, TreeStore};
use crate::models::{ComputedFields, NodeId, TreeNode};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// When identifiers become available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// Sequence starting at 1, assigned on insert
    PostWriteSequence,
    /// UUID v4, reservable before insert
    PreWriteUuid,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    nodes: HashMap<NodeId, TreeNode>,
    by_path: BTreeSet<(String, NodeId)>,
    by_hash: HashMap<String, BTreeSet<NodeId>>,
    next_sequence: u64,
}

impl Tables {
    fn unindex(&mut self, id: &NodeId, node: &TreeNode) {
        if let Some(path) = &node.path {
            self.by_path.remove(&(path.clone(), id.clone()));
        }
        if let Some(hash) = &node.path_hash {
            if let Some(owners) = self.by_hash.get_mut(hash) {
                owners.remove(id);
                if owners.is_empty() {
                    self.by_hash.remove(hash);
                }
            }
        }
    }

    fn index(&mut self, id: &NodeId, node: &TreeNode) {
        if let Some(path) = &node.path {
            self.by_path.insert((path.clone(), id.clone()));
        }
        if let Some(hash) = &node.path_hash {
            self.by_hash
                .entry(hash.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    /// Index entries whose path starts with `prefix`, in path order
    fn paths_from<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a (String, NodeId)> + 'a {
        self.by_path
            .range((prefix.to_string(), NodeId::new(""))..)
            .take_while(move |(path, _)| path.starts_with(prefix))
    }

    fn lookup(&self, id: Option<&NodeId>) -> Option<TreeNode> {
        id.and_then(|id| self.nodes.get(id)).cloned()
    }

    fn node_mut(&mut self, id: &NodeId) -> StoreResult<&mut TreeNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id.clone()))
    }

    /// Unbuilt nodes sort last, by id
    fn sorted(mut nodes: Vec<TreeNode>) -> Vec<TreeNode> {
        nodes.sort_by(|a, b| match (&a.path, &b.path) {
            (Some(pa), Some(pb)) => pa.cmp(pb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.id.cmp(&b.id),
        });
        nodes
    }
}

/// HashMap-backed store with ordered path index
#[derive(Debug, Clone)]
pub struct MemoryTreeStore {
    tables: Tables,
    snapshot: Option<Tables>,
    strategy: IdStrategy,
}

impl Default for MemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTreeStore {
    /// Store whose ids are assigned on insert (1, 2, 3, ...)
    pub fn new() -> Self {
        Self::with_strategy(IdStrategy::PostWriteSequence)
    }

    /// Store whose ids can be reserved before insert
    pub fn with_uuid_ids() -> Self {
        Self::with_strategy(IdStrategy::PreWriteUuid)
    }

    pub fn with_strategy(strategy: IdStrategy) -> Self {
        Self {
            tables: Tables {
                next_sequence: 1,
                ..Default::default()
            },
            snapshot: None,
            strategy,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.nodes.is_empty()
    }

    /// Every node, ordered by path
    pub fn all_nodes(&self) -> Vec<TreeNode> {
        Tables::sorted(self.tables.nodes.values().cloned().collect())
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl TreeStore for MemoryTreeStore {
    fn next_identifier(&mut self) -> StoreResult<Option<NodeId>> {
        match self.strategy {
            IdStrategy::PostWriteSequence => Ok(None),
            IdStrategy::PreWriteUuid => Ok(Some(NodeId::new(Uuid::new_v4().to_string()))),
        }
    }

    fn insert_node(&mut self, mut node: TreeNode) -> StoreResult<NodeId> {
        let id = match node.id.clone() {
            Some(id) => id,
            None => {
                let id = NodeId::from(self.tables.next_sequence);
                self.tables.next_sequence += 1;
                id
            }
        };

        if self.tables.nodes.contains_key(&id) {
            return Err(StoreError::duplicate_id(id));
        }

        node.id = Some(id.clone());
        self.tables.index(&id, &node);
        self.tables.nodes.insert(id.clone(), node);
        Ok(id)
    }

    fn get_node(&self, id: &NodeId) -> StoreResult<Option<TreeNode>> {
        Ok(self.tables.nodes.get(id).cloned())
    }

    fn set_parent_id(&mut self, id: &NodeId, parent_id: Option<NodeId>) -> StoreResult<()> {
        self.tables.node_mut(id)?.parent_id = parent_id;
        Ok(())
    }

    fn set_property(&mut self, id: &NodeId, field: &str, value: Value) -> StoreResult<()> {
        let node = self.tables.node_mut(id)?;
        match node.properties.as_object_mut() {
            Some(map) => {
                map.insert(field.to_string(), value);
            }
            None => {
                let mut map = serde_json::Map::new();
                map.insert(field.to_string(), value);
                node.properties = Value::Object(map);
            }
        }
        Ok(())
    }

    fn set_computed_fields(&mut self, id: &NodeId, fields: &ComputedFields) -> StoreResult<()> {
        let previous = self
            .tables
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id.clone()))?;

        self.tables.unindex(id, &previous);
        let node = self.tables.node_mut(id)?;
        node.apply_computed_fields(fields);
        let updated = node.clone();
        self.tables.index(id, &updated);
        Ok(())
    }

    fn remove_node(&mut self, id: &NodeId) -> StoreResult<bool> {
        match self.tables.nodes.remove(id) {
            Some(node) => {
                self.tables.unindex(id, &node);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn descendants_by_path_prefix(&self, prefix: &str) -> StoreResult<Vec<TreeNode>> {
        Ok(self
            .tables
            .paths_from(prefix)
            .filter_map(|(_, id)| self.tables.lookup(Some(id)))
            .collect())
    }

    fn children_of(&self, parent_id: &NodeId) -> StoreResult<Vec<TreeNode>> {
        let children = self
            .tables
            .nodes
            .values()
            .filter(|node| node.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        Ok(Tables::sorted(children))
    }

    fn root_nodes(&self) -> StoreResult<Vec<TreeNode>> {
        let roots = self
            .tables
            .nodes
            .values()
            .filter(|node| node.parent_id.is_none())
            .cloned()
            .collect();
        Ok(Tables::sorted(roots))
    }

    fn nodes_with_root_value(&self, root_value: &str) -> StoreResult<Vec<TreeNode>> {
        let members = self
            .tables
            .nodes
            .values()
            .filter(|node| node.root_value.as_deref() == Some(root_value))
            .cloned()
            .collect();
        Ok(Tables::sorted(members))
    }

    fn nodes_at_path(&self, path: &str) -> StoreResult<Vec<TreeNode>> {
        Ok(self
            .tables
            .paths_from(path)
            .take_while(|(stored, _)| stored == path)
            .filter_map(|(_, id)| self.tables.lookup(Some(id)))
            .collect())
    }

    fn nodes_with_path_hash(&self, hash: &str) -> StoreResult<Vec<TreeNode>> {
        let owners = self
            .tables
            .by_hash
            .get(hash)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.tables.lookup(Some(id)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(owners)
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }
}
