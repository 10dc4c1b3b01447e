//! Upstream repository descriptions
//!
//! Repositories arrive from configuration as name/URL pairs. Only the
//! HTTP-capable ones take part in probing; everything else is reported and
//! left alone.

use crate::realm::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One HTTP upstream candidate. Order in a list is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub base_url: String,
}

impl RepositoryInfo {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }

    /// Base URL with exactly one trailing `/`
    pub fn normalized_base(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    /// Candidate URL for an artifact path
    pub fn candidate_url(&self, path: &str) -> String {
        format!("{}{}", self.normalized_base(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for RepositoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}

/// A configured repository, classified by transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositorySource {
    /// Reachable over http/https; probed by the proxy
    Http {
        info: RepositoryInfo,
        credentials: Credentials,
    },
    /// Any other scheme (file://, s3://, ...); never probed
    Other { name: String, url: String },
}

impl RepositorySource {
    /// Classify a configured repository by its URL scheme
    pub fn classify(name: &str, url: &str, credentials: Credentials) -> Self {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());

        match scheme.as_deref() {
            Some("http") | Some("https") => Self::Http {
                info: RepositoryInfo::new(name, url),
                credentials,
            },
            _ => Self::Other {
                name: name.to_string(),
                url: url.to_string(),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Http { info, .. } => &info.name,
            Self::Other { name, .. } => name,
        }
    }
}

/// The HTTP subset of `sources`, in their configured order
pub fn http_repositories(sources: &[RepositorySource]) -> Vec<RepositoryInfo> {
    sources
        .iter()
        .filter_map(|source| match source {
            RepositorySource::Http { info, .. } => Some(info.clone()),
            RepositorySource::Other { .. } => None,
        })
        .collect()
}
