//! Outbound HTTP to remote repositories
//!
//! The [`Upstream`] trait is the seam between the probe/handler logic and the
//! network. [`UreqUpstream`] is the real blocking implementation; tests swap
//! in a scripted one.

pub mod checksum;
pub mod client;

pub use checksum::fetch_checksum;
pub use client::UreqUpstream;

use crate::error::RepoProbeResult;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

/// Request headers that describe the client connection rather than the
/// resource and so are never forwarded upstream
const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "proxy-connection",
    "proxy-authorization",
    "upgrade",
    "te",
    "trailer",
];

/// Whether a client request header may be forwarded on a discovery request
pub fn is_forwardable(name: &str) -> bool {
    !HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Result of a discovery (HEAD) request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// URL the request was sent to
    pub url: String,
    pub status: u16,
    /// First value of each response header
    pub headers: BTreeMap<String, String>,
}

impl Discovery {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A fully read text response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    pub status: u16,
    pub body: String,
}

/// An open upstream response whose body has not been read yet
pub struct Passthrough {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for Passthrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passthrough")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Blocking access to remote repositories.
///
/// Implementations apply realm credentials to every request whose URL a
/// registered realm covers. Non-2xx statuses are returned, not raised; errors
/// are reserved for transport failures.
pub trait Upstream: Send + Sync {
    /// Existence check with HEAD semantics, forwarding `headers`
    fn discover(&self, url: &str, headers: &[(String, String)]) -> RepoProbeResult<Discovery>;

    /// GET a small text resource
    fn fetch_text(&self, url: &str) -> RepoProbeResult<TextResponse>;

    /// GET a resource and hand back its body unread
    fn open(&self, url: &str) -> RepoProbeResult<Passthrough>;
}
