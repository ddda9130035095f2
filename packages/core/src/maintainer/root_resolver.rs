//! Root Resolver and Level Computer
//!
//! A root's value is `source + "-" + id` and every node below it inherits that
//! value unchanged, so a whole tree can be selected by one scalar. Levels count
//! from 1 at the root.

use crate::maintainer::TreeError;
use crate::models::{NodeId, PathSource, TreeNode};

/// Root value of a node that has no parent
pub fn root_value_of_root(source: &PathSource, id: Option<&NodeId>) -> Result<String, TreeError> {
    let id = id.ok_or_else(|| {
        TreeError::missing_identifier(format!(
            "root value for root '{}' needs its identifier",
            source
        ))
    })?;
    Ok(format!("{}-{}", source, id))
}

/// Root value for a node given its (already built) parent
pub fn resolve_root_value(
    parent: Option<&TreeNode>,
    source: &PathSource,
    id: Option<&NodeId>,
) -> Result<String, TreeError> {
    match parent {
        Some(parent) => parent.root_value.clone().ok_or_else(|| {
            TreeError::inconsistent_state(format!(
                "parent {} has no root value",
                describe(parent)
            ))
        }),
        None => root_value_of_root(source, id),
    }
}

/// `level(parent) + 1`, or 1 for a root
pub fn compute_level(parent: Option<&TreeNode>) -> Result<u32, TreeError> {
    match parent {
        Some(parent) => parent.level.map(|level| level + 1).ok_or_else(|| {
            TreeError::inconsistent_state(format!("parent {} has no level", describe(parent)))
        }),
        None => Ok(1),
    }
}

fn describe(node: &TreeNode) -> String {
    node.id
        .as_ref()
        .map(|id| format!("'{}'", id))
        .unwrap_or_else(|| "<unsaved>".to_string())
}
