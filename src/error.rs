//! Error types for repoprobe
//!
//! All modules use `RepoProbeResult<T>` as their return type.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repoprobe operations
pub type RepoProbeResult<T> = Result<T, RepoProbeError>;

/// All errors that can occur in repoprobe
#[derive(Error, Debug)]
pub enum RepoProbeError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Upstream errors
    #[error("Cannot get the checksum from {url} (status {status})")]
    ChecksumFetch { url: String, status: u16 },

    #[error("Upstream request to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("Only HEAD and GET requests are accepted, got {0}")]
    InvalidMethod(String),

    // Cache errors
    #[error("No cache record for {0}")]
    RecordNotFound(String),

    #[error("Corrupt cache record {path}: {reason}")]
    RecordCorrupt { path: PathBuf, reason: String },

    // Server errors
    #[error("Cannot change the port of a started server")]
    ServerAlreadyStarted,

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepoProbeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an upstream transport error
    pub fn upstream(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Upstream {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from talking to a remote repository
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::ChecksumFetch { .. } | Self::Upstream { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Run: repoprobe config show"),
            Self::ServerAlreadyStarted => Some("Stop the proxy before changing its port"),
            Self::Bind { .. } => Some("Pick another port with: repoprobe serve --port <PORT>"),
            Self::RecordNotFound(_) => Some("The path has not been requested through the proxy yet"),
            _ => None,
        }
    }
}
