//! Path Builder
//!
//! Computes a node's path string from its parent's path, its own path source and
//! (in append-id mode) its identifier:
//!
//! ```text
//! segment(N) = source(N) [+ "-" + id(N)] + separator
//! path(N)    = path(parent(N)) + segment(N)      // or just segment(N) for a root
//! ```
//!
//! Every segment ends with the separator, including the deepest one, so that
//! a prefix match on `"a-1,"` can never pick up a sibling stored as `"a-10,"`.

use crate::maintainer::TreeError;
use crate::models::{ConfigError, NodeId, PathSource, TreeConfig};
use sha2::{Digest, Sha256};

/// Stable fixed-width digest of a path (hex-encoded SHA-256)
pub fn digest(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

pub struct PathBuilder<'a> {
    config: &'a TreeConfig,
}

impl<'a> PathBuilder<'a> {
    pub fn new(config: &'a TreeConfig) -> Self {
        Self { config }
    }

    /// Fail fast if the source contains the separator
    pub fn validate_source(&self, source: &PathSource) -> Result<(), ConfigError> {
        let rendered = source.to_string();
        if rendered.contains(self.config.path_separator) {
            return Err(ConfigError::separator_in_path_source(
                self.config.path_separator,
                rendered,
            ));
        }
        Ok(())
    }

    /// Whether the segment for `source` needs the node's identifier
    pub fn needs_identifier(&self, source: &PathSource) -> bool {
        self.config.appends_id(source)
    }

    /// Build the node's own segment, trailing separator included
    pub fn segment(&self, source: &PathSource, id: Option<&NodeId>) -> Result<String, TreeError> {
        self.validate_source(source)?;

        let mut segment = source.to_string();
        if self.needs_identifier(source) {
            let id = id.ok_or_else(|| {
                TreeError::missing_identifier(format!(
                    "append-id mode needs an identifier for path source '{}'",
                    source
                ))
            })?;
            segment.push('-');
            segment.push_str(id.as_str());
        }
        segment.push(self.config.path_separator);
        Ok(segment)
    }

    /// Build the full path below `parent_path` (or as a root when `None`)
    pub fn build(
        &self,
        parent_path: Option<&str>,
        source: &PathSource,
        id: Option<&NodeId>,
    ) -> Result<String, TreeError> {
        let segment = self.segment(source, id)?;
        let path = match parent_path {
            Some(parent) => format!("{}{}", parent, segment),
            None if self.config.path_starts_with_separator => {
                format!("{}{}", self.config.path_separator, segment)
            }
            None => segment,
        };
        Ok(path)
    }

    /// Hash for `path`, or `None` when hashing is disabled
    pub fn hash(&self, path: &str) -> Option<String> {
        self.config.hashes_paths().then(|| digest(path))
    }

    /// Paths of every proper ancestor, root first
    pub fn ancestor_paths(&self, path: &str) -> Vec<String> {
        let sep = self.config.path_separator;
        let lead = if self.config.path_starts_with_separator && path.starts_with(sep) {
            sep.len_utf8()
        } else {
            0
        };

        path[lead..]
            .char_indices()
            .filter(|(_, c)| *c == sep)
            .map(|(i, c)| lead + i + c.len_utf8())
            .filter(|end| *end < path.len())
            .map(|end| path[..end].to_string())
            .collect()
    }

    /// Swap `old_prefix` for `new_prefix` on a descendant path
    ///
    /// Returns the new path and how many segments sit below the prefix, or
    /// `None` if `path` is not under `old_prefix`.
    pub fn rebase(&self, path: &str, old_prefix: &str, new_prefix: &str) -> Option<(String, u32)> {
        path.strip_prefix(old_prefix).map(|rest| {
            let depth = rest.matches(self.config.path_separator).count() as u32;
            (format!("{}{}", new_prefix, rest), depth)
        })
    }
}
