//! Checksum sibling retrieval

use super::Upstream;
use crate::cache::record::CHECKSUM_SUFFIX;
use crate::error::{RepoProbeError, RepoProbeResult};
use tracing::debug;

/// Fetch the `.sha1` sibling of a resolved artifact URL.
///
/// Anything other than a 200 is an error; nothing is retried.
pub fn fetch_checksum(upstream: &dyn Upstream, resolved_url: &str) -> RepoProbeResult<String> {
    let url = format!("{}{}", resolved_url, CHECKSUM_SUFFIX);
    let response = upstream.fetch_text(&url)?;

    if response.status != 200 {
        return Err(RepoProbeError::ChecksumFetch {
            url,
            status: response.status,
        });
    }

    debug!("Fetched checksum from {}", url);
    Ok(response.body)
}
