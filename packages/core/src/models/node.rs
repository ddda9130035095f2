//! Tree Node Data Structures
//!
//! This module defines the `TreeNode` record maintained by the path core and the
//! small value types around it.
//!
//! # Architecture
//!
//! - **Host-owned identity**: `id` is assigned by the persistence layer, possibly only
//!   after the first write (see [`crate::db::TreeStore::next_identifier`])
//! - **Pure JSON properties**: entity data lives in `properties`; the configured
//!   `pathSourceField` selects which property feeds the path segment
//! - **Denormalized columns**: `path`, `path_hash`, `level` and `root_value` are
//!   written only by [`crate::maintainer::PathMaintainer`]
//!
//! # Examples
//!
//! ```rust
//! use treepath_core::models::TreeNode;
//! use serde_json::json;
//!
//! let node = TreeNode::new(json!({ "title": "Electronics" }));
//! assert!(node.id.is_none());
//! assert!(node.path.is_none());
//! ```

use crate::models::{ConfigError, TreeConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier assigned to a node by the persistence layer.
///
/// Sequence ids render as their decimal value, pre-write ids as UUID strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Value a node contributes to its own path segment.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSource {
    Text(String),
    Number(serde_json::Number),
}

impl PathSource {
    /// Read the path source out of a node's properties.
    ///
    /// Strings and numbers are accepted; anything else is a configuration error
    /// because it has no stable textual form.
    pub fn from_properties(properties: &Value, field: &str) -> Result<Self, ConfigError> {
        match properties.get(field) {
            None | Some(Value::Null) => Err(ConfigError::missing_path_source(field)),
            Some(Value::String(s)) => Ok(PathSource::Text(s.clone())),
            Some(Value::Number(n)) => Ok(PathSource::Number(n.clone())),
            Some(other) => Err(ConfigError::unsupported_path_source(
                field,
                json_type_name(other),
            )),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PathSource::Text(_))
    }
}

impl fmt::Display for PathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSource::Text(s) => f.write_str(s),
            PathSource::Number(n) => write!(f, "{}", n),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The four denormalized columns the path core maintains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedFields {
    pub path: String,
    /// `None` when hashing is disabled (`hashField = null`)
    pub path_hash: Option<String>,
    pub level: u32,
    pub root_value: String,
}

impl ComputedFields {
    /// Render the computed columns keyed by the configured column names.
    ///
    /// The hash is only emitted when `hashField` is configured.
    pub fn to_columns(&self, config: &TreeConfig) -> Map<String, Value> {
        let mut columns = Map::new();
        columns.insert("path".to_string(), Value::String(self.path.clone()));
        columns.insert("level".to_string(), Value::from(self.level));
        columns.insert(
            "treeRootValue".to_string(),
            Value::String(self.root_value.clone()),
        );
        if let (Some(field), Some(hash)) = (&config.hash_field, &self.path_hash) {
            columns.insert(field.clone(), Value::String(hash.clone()));
        }
        columns
    }
}

/// A tree-organized entity as seen by the path core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// `None` until the persistence layer assigns one
    pub id: Option<NodeId>,

    pub parent_id: Option<NodeId>,

    /// Entity data; the path source is one of these properties
    pub properties: Value,

    pub path: Option<String>,

    pub path_hash: Option<String>,

    /// Depth, root = 1
    pub level: Option<u32>,

    pub root_value: Option<String>,
}

impl TreeNode {
    /// Create a detached node with no id and no computed columns
    pub fn new(properties: Value) -> Self {
        Self {
            id: None,
            parent_id: None,
            properties,
            path: None,
            path_hash: None,
            level: None,
            root_value: None,
        }
    }

    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Whether the computed columns have been written at least once
    pub fn is_built(&self) -> bool {
        self.path.is_some()
    }

    pub fn computed_fields(&self) -> Option<ComputedFields> {
        Some(ComputedFields {
            path: self.path.clone()?,
            path_hash: self.path_hash.clone(),
            level: self.level?,
            root_value: self.root_value.clone()?,
        })
    }

    pub fn apply_computed_fields(&mut self, fields: &ComputedFields) {
        self.path = Some(fields.path.clone());
        self.path_hash = fields.path_hash.clone();
        self.level = Some(fields.level);
        self.root_value = Some(fields.root_value.clone());
    }

    pub fn property(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_source_from_string_and_number() {
        let props = json!({ "title": "Books", "sort": 40 });

        let title = PathSource::from_properties(&props, "title").unwrap();
        assert_eq!(title, PathSource::Text("Books".to_string()));
        assert!(title.is_text());

        let sort = PathSource::from_properties(&props, "sort").unwrap();
        assert_eq!(sort.to_string(), "40");
        assert!(!sort.is_text());
    }

    #[test]
    fn test_path_source_missing_or_unsupported() {
        let props = json!({ "title": null, "flags": [1, 2] });

        assert!(matches!(
            PathSource::from_properties(&props, "title"),
            Err(ConfigError::MissingPathSource { .. })
        ));
        assert!(matches!(
            PathSource::from_properties(&props, "nope"),
            Err(ConfigError::MissingPathSource { .. })
        ));
        assert!(matches!(
            PathSource::from_properties(&props, "flags"),
            Err(ConfigError::UnsupportedPathSource { .. })
        ));
    }

    #[test]
    fn test_computed_fields_round_trip_through_node() {
        let mut node = TreeNode::new(json!({ "title": "a" }));
        assert!(node.computed_fields().is_none());

        let fields = ComputedFields {
            path: "a-1,".to_string(),
            path_hash: Some("abc".to_string()),
            level: 1,
            root_value: "a-1".to_string(),
        };
        node.apply_computed_fields(&fields);

        assert!(node.is_built());
        assert_eq!(node.computed_fields(), Some(fields));
    }

    #[test]
    fn test_to_columns_respects_hash_field() {
        let fields = ComputedFields {
            path: "a-1,".to_string(),
            path_hash: Some("abc".to_string()),
            level: 1,
            root_value: "a-1".to_string(),
        };

        let config = TreeConfig {
            hash_field: Some("pathhash".to_string()),
            ..Default::default()
        };
        let columns = fields.to_columns(&config);
        assert_eq!(columns.get("pathhash"), Some(&json!("abc")));
        assert_eq!(columns.get("level"), Some(&json!(1)));

        let config = TreeConfig {
            hash_field: None,
            ..Default::default()
        };
        let columns = fields.to_columns(&config);
        assert!(!columns.contains_key("pathhash"));
        assert!(!columns.contains_key("pathHash"));
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::from(7u64).to_string(), "7");
        assert_eq!(NodeId::from("abc").as_str(), "abc");
    }
}
