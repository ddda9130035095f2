//! Tree Configuration
//!
//! The configuration surface a host exposes for one tree-organized entity type:
//! separator, append-id mode, and which fields feed and receive the path.

use crate::models::PathSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
///
/// Raised either while validating a `TreeConfig` or while reading a node's path
/// source. All of them abort the unit of work before anything is written.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Path source value contains the configured separator
    #[error("You can't use the path separator ('{separator}') as a character in the path source value '{value}'")]
    SeparatorInPathSource { separator: char, value: String },

    /// Path source property missing or null
    #[error("Path source field '{field}' has no value")]
    MissingPathSource { field: String },

    /// Path source property is not a string or number
    #[error("Path source field '{field}' must be a string or a number, found {found}")]
    UnsupportedPathSource { field: String, found: String },

    /// Separator unusable for materialized paths
    #[error("Invalid path separator '{separator}': {reason}")]
    InvalidSeparator { separator: char, reason: String },

    /// A field selector is empty
    #[error("Field selector '{0}' cannot be empty")]
    EmptyField(String),

    /// Failed to read a config file
    #[error("Failed to read tree config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a config document
    #[error("Failed to parse tree config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn separator_in_path_source(separator: char, value: impl Into<String>) -> Self {
        Self::SeparatorInPathSource {
            separator,
            value: value.into(),
        }
    }

    pub fn missing_path_source(field: impl Into<String>) -> Self {
        Self::MissingPathSource {
            field: field.into(),
        }
    }

    pub fn unsupported_path_source(field: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnsupportedPathSource {
            field: field.into(),
            found: found.into(),
        }
    }

    pub fn invalid_separator(separator: char, reason: impl Into<String>) -> Self {
        Self::InvalidSeparator {
            separator,
            reason: reason.into(),
        }
    }
}

/// What happens to the subtree of a removed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletePolicy {
    /// Remove every node under the removed node's path prefix
    #[default]
    Cascade,
    /// Re-parent direct children to the removed node's parent
    PromoteChildren,
}

/// Materialized-path configuration for one entity type
///
/// # Examples
///
/// ```rust
/// use treepath_core::models::TreeConfig;
///
/// let config = TreeConfig::from_json_str(r#"{ "pathSourceField": "integerSort", "appendId": true }"#)?;
/// assert_eq!(config.path_separator, ',');
/// assert_eq!(config.append_id, Some(true));
/// # Ok::<(), treepath_core::models::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeConfig {
    /// Terminates every path segment
    pub path_separator: char,

    /// `Some(true)` always appends `-<id>`, `Some(false)` never does,
    /// `None` appends only when the path source is a string
    pub append_id: Option<bool>,

    /// Prefix every path with the separator
    pub path_starts_with_separator: bool,

    /// Property feeding the path segment
    pub path_source_field: String,

    /// Column the path hash is exported under; `None` disables hashing
    pub hash_field: Option<String>,

    pub delete_policy: DeletePolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            path_separator: ',',
            append_id: None,
            path_starts_with_separator: false,
            path_source_field: "title".to_string(),
            hash_field: Some("pathHash".to_string()),
            delete_policy: DeletePolicy::Cascade,
        }
    }
}

impl TreeConfig {
    /// Parse and validate a JSON config document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sep = self.path_separator;

        if sep.is_alphanumeric() {
            return Err(ConfigError::invalid_separator(
                sep,
                "alphanumeric characters appear in ids and path sources",
            ));
        }

        if sep.is_whitespace() || sep.is_control() {
            return Err(ConfigError::invalid_separator(
                sep,
                "whitespace and control characters are not allowed",
            ));
        }

        // '-' joins a path source to its id
        if sep == '-' && self.append_id != Some(false) {
            return Err(ConfigError::invalid_separator(
                sep,
                "'-' is reserved for the id suffix when append-id can be active",
            ));
        }

        if self.path_source_field.trim().is_empty() {
            return Err(ConfigError::EmptyField("pathSourceField".to_string()));
        }

        if matches!(&self.hash_field, Some(field) if field.trim().is_empty()) {
            return Err(ConfigError::EmptyField("hashField".to_string()));
        }

        Ok(())
    }

    /// Whether `-<id>` is appended to the segment built from `source`
    pub fn appends_id(&self, source: &PathSource) -> bool {
        match self.append_id {
            Some(explicit) => explicit,
            None => source.is_text(),
        }
    }

    pub fn hashes_paths(&self) -> bool {
        self.hash_field.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.path_separator, ',');
        assert_eq!(config.delete_policy, DeletePolicy::Cascade);
    }

    #[test]
    fn test_auto_append_id_follows_source_type() {
        let config = TreeConfig::default();
        assert!(config.appends_id(&PathSource::Text("a".to_string())));
        assert!(!config.appends_id(&PathSource::Number(serde_json::Number::from(10u64))));

        let always = TreeConfig {
            append_id: Some(true),
            ..Default::default()
        };
        assert!(always.appends_id(&PathSource::Number(serde_json::Number::from(10u64))));

        let never = TreeConfig {
            append_id: Some(false),
            ..Default::default()
        };
        assert!(!never.appends_id(&PathSource::Text("a".to_string())));
    }

    #[test]
    fn test_rejects_bad_separators() {
        for sep in ['a', '7', ' ', '\n'] {
            let config = TreeConfig {
                path_separator: sep,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidSeparator { .. })
            ));
        }
    }

    #[test]
    fn test_dash_separator_only_without_append_id() {
        let config = TreeConfig {
            path_separator: '-',
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TreeConfig {
            path_separator: '-',
            append_id: Some(false),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_fields() {
        let config = TreeConfig {
            path_source_field: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyField(_))));

        let config = TreeConfig {
            hash_field: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyField(_))));
    }

    #[test]
    fn test_from_json_str_fills_defaults() {
        let config =
            TreeConfig::from_json_str(r#"{ "pathSeparator": "/", "deletePolicy": "promoteChildren" }"#)
                .unwrap();
        assert_eq!(config.path_separator, '/');
        assert_eq!(config.delete_policy, DeletePolicy::PromoteChildren);
        assert_eq!(config.path_source_field, "title");
        assert_eq!(config.hash_field.as_deref(), Some("pathHash"));
    }

    #[test]
    fn test_from_json_str_validates() {
        let err = TreeConfig::from_json_str(r#"{ "pathSeparator": "x" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSeparator { .. }));

        let err = TreeConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "pathSourceField": "integerSort", "appendId": true, "hashField": null }}"#
        )
        .unwrap();

        let config = TreeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.path_source_field, "integerSort");
        assert_eq!(config.append_id, Some(true));
        assert!(!config.hashes_paths());
    }

    #[test]
    fn test_from_missing_file() {
        let err = TreeConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
