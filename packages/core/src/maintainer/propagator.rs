//! Subtree Propagator
//!
//! Rebuilds one node after its parent or path source changed, then rewrites every
//! descendant found under the node's old path prefix. Descendants come from one
//! prefix scan, narrowed by parent links to the moved node's own subtree.
//!
//! The run is a small state machine:
//!
//! ```text
//! DetectingChange -> RebuildingSelf -> CascadingToDescendants -> Committing -> Done
//!        |                                                            ^
//!        +---------------- (fields unchanged) ------------------------+--> Done
//! ```
//!
//! Nothing is written before `Committing`, so a failure while rebuilding or
//! cascading leaves the node and its subtree untouched.

use crate::db::TreeStore;
use crate::maintainer::{load_parent, PathChange, PathMaintainer, TreeError};
use crate::models::{ComputedFields, NodeId, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropagationState {
    DetectingChange,
    RebuildingSelf,
    CascadingToDescendants,
    Committing,
    Done,
}

struct Rewrite {
    id: NodeId,
    old_path: Option<String>,
    fields: ComputedFields,
}

pub struct SubtreePropagator<'a, S: TreeStore + ?Sized> {
    maintainer: &'a PathMaintainer,
    store: &'a mut S,
    node_id: NodeId,
    state: PropagationState,
    node: Option<TreeNode>,
    rebuilt: Option<ComputedFields>,
    rewrites: Vec<Rewrite>,
}

impl<'a, S: TreeStore + ?Sized> SubtreePropagator<'a, S> {
    pub fn new(maintainer: &'a PathMaintainer, store: &'a mut S, node_id: NodeId) -> Self {
        Self {
            maintainer,
            store,
            node_id,
            state: PropagationState::DetectingChange,
            node: None,
            rebuilt: None,
            rewrites: Vec::new(),
        }
    }

    /// Drive the state machine to `Done`, returning every path that changed
    pub fn run(mut self) -> Result<Vec<PathChange>, TreeError> {
        let mut changes = Vec::new();

        loop {
            self.state = match self.state {
                PropagationState::DetectingChange => self.detect_change()?,
                PropagationState::RebuildingSelf => self.rebuild_self()?,
                PropagationState::CascadingToDescendants => self.cascade()?,
                PropagationState::Committing => {
                    changes = self.commit()?;
                    PropagationState::Done
                }
                PropagationState::Done => return Ok(changes),
            };
        }
    }

    fn detect_change(&mut self) -> Result<PropagationState, TreeError> {
        let node = self
            .store
            .get_node(&self.node_id)?
            .ok_or_else(|| TreeError::node_not_found(self.node_id.clone()))?;

        self.maintainer
            .ensure_acyclic(&*self.store, &self.node_id, node.parent_id.as_ref())?;

        let parent = load_parent(&*self.store, &node)?;

        let fields = self.maintainer.compute_fields(&node, parent.as_ref())?;

        if node.computed_fields().as_ref() == Some(&fields) {
            tracing::debug!("Node {} already consistent at '{}'", self.node_id, fields.path);
            return Ok(PropagationState::Done);
        }

        self.rebuilt = Some(fields);
        self.node = Some(node);
        Ok(PropagationState::RebuildingSelf)
    }

    fn rebuild_self(&mut self) -> Result<PropagationState, TreeError> {
        let (node, fields) = match (&self.node, &self.rebuilt) {
            (Some(node), Some(fields)) => (node, fields),
            _ => return Err(TreeError::inconsistent_state("rebuild without detected change")),
        };

        tracing::debug!(
            "Rebuilding node {}: {:?} -> '{}'",
            self.node_id,
            node.path,
            fields.path
        );

        self.rewrites.push(Rewrite {
            id: self.node_id.clone(),
            old_path: node.path.clone(),
            fields: fields.clone(),
        });
        Ok(PropagationState::CascadingToDescendants)
    }

    fn cascade(&mut self) -> Result<PropagationState, TreeError> {
        let (node, old_prefix, new) = match (&self.node, &self.rebuilt) {
            (Some(node), Some(new)) => match &node.path {
                Some(old_prefix) => (node, old_prefix.clone(), new.clone()),
                // Never built before: nothing can sit under it yet
                None => return Ok(PropagationState::Committing),
            },
            _ => return Ok(PropagationState::Committing),
        };

        // Descendants are revisited even when the path is unchanged: a new
        // root value or level still has to reach them
        let maintainer = self.maintainer;
        let builder = maintainer.builder();
        let descendants = maintainer.subtree(&*self.store, node)?;

        for descendant in descendants {
            let Some(id) = descendant.id.clone() else {
                continue;
            };
            if id == self.node_id {
                continue;
            }
            let Some(old_path) = descendant.path.clone() else {
                continue;
            };

            let (path, depth) = builder
                .rebase(&old_path, &old_prefix, &new.path)
                .ok_or_else(|| {
                    TreeError::inconsistent_state(format!(
                        "descendant {} path '{}' is not under '{}'",
                        id, old_path, old_prefix
                    ))
                })?;

            let fields = ComputedFields {
                path_hash: builder.hash(&path),
                level: new.level + depth,
                root_value: new.root_value.clone(),
                path,
            };

            if descendant.computed_fields().as_ref() == Some(&fields) {
                continue;
            }

            self.rewrites.push(Rewrite {
                id,
                old_path: Some(old_path),
                fields,
            });
        }

        Ok(PropagationState::Committing)
    }

    fn commit(&mut self) -> Result<Vec<PathChange>, TreeError> {
        let mut changes = Vec::with_capacity(self.rewrites.len());

        for rewrite in self.rewrites.drain(..) {
            self.store.set_computed_fields(&rewrite.id, &rewrite.fields)?;
            changes.push(PathChange {
                id: rewrite.id,
                old_path: rewrite.old_path,
                new_path: rewrite.fields.path,
            });
        }

        if changes.len() > 1 {
            tracing::debug!(
                "Cascaded node {} to {} descendant(s)",
                self.node_id,
                changes.len() - 1
            );
        }
        Ok(changes)
    }
}
