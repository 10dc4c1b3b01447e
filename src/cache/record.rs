//! Resolution records and the content-addressed keys they are stored under

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Suffix of checksum siblings served straight from the cache
pub const CHECKSUM_SUFFIX: &str = ".sha1";

/// Suffix of optional artifacts that get negative cache records
pub const SOURCES_SUFFIX: &str = "-sources.jar";

/// Derive the on-disk key for an artifact path.
///
/// Lowercase hex SHA-256 of the path bytes. Identical paths always map to the
/// same key; collisions are not handled.
pub fn cache_key(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `path` names a checksum sibling
pub fn is_checksum_path(path: &str) -> bool {
    path.ends_with(CHECKSUM_SUFFIX)
}

/// Whether `path` names an optional sources artifact
pub fn is_sources_path(path: &str) -> bool {
    path.ends_with(SOURCES_SUFFIX)
}

/// The artifact a checksum path belongs to, or `None` for ordinary paths
pub fn checksum_target(path: &str) -> Option<&str> {
    path.strip_suffix(CHECKSUM_SUFFIX)
}

/// Cached outcome of probing one artifact path
///
/// Field names on disk are `target`, `url`, `sha1`, `found` and `headers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    /// The artifact path this record answers for
    pub target: String,

    /// Upstream URL that served the artifact (empty when not found)
    #[serde(rename = "url")]
    pub resolved_url: String,

    /// Content of the `.sha1` sibling (empty when not found)
    #[serde(rename = "sha1")]
    pub checksum: String,

    /// Whether any repository had the artifact
    pub found: bool,

    /// Response headers captured from the discovery request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ResolutionRecord {
    /// Record a successful resolution
    pub fn found(
        target: impl Into<String>,
        resolved_url: impl Into<String>,
        checksum: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            target: target.into(),
            resolved_url: resolved_url.into(),
            checksum: checksum.into(),
            found: true,
            headers,
        }
    }

    /// Record that no repository has the artifact
    pub fn lost(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            resolved_url: String::new(),
            checksum: String::new(),
            found: false,
            headers: BTreeMap::new(),
        }
    }

    /// Name of the file this record is stored in
    pub fn file_name(&self) -> String {
        record_file_name(&self.target)
    }
}

/// File name for the record of `path`
pub fn record_file_name(path: &str) -> String {
    format!(".{}.json", cache_key(path))
}
