//! Multi-repository probing
//!
//! Finds the first configured repository that answers a discovery request
//! for a path with 200, and records the answer in the resolution cache.

use crate::cache::{is_sources_path, ProbeLocks, ResolutionCache, ResolutionRecord};
use crate::error::RepoProbeResult;
use crate::repository::RepositoryInfo;
use crate::upstream::Upstream;
use tracing::{debug, info, warn};

/// Probes repositories in order for one artifact path at a time
pub struct RepositoryProber<'a> {
    cache: &'a ResolutionCache,
    repositories: &'a [RepositoryInfo],
    upstream: &'a dyn Upstream,
    locks: &'a ProbeLocks,
}

impl<'a> RepositoryProber<'a> {
    pub fn new(
        cache: &'a ResolutionCache,
        repositories: &'a [RepositoryInfo],
        upstream: &'a dyn Upstream,
        locks: &'a ProbeLocks,
    ) -> Self {
        Self {
            cache,
            repositories,
            upstream,
            locks,
        }
    }

    /// Resolve `path`, probing upstream only if no record exists yet.
    ///
    /// Returns the positive record of the first repository that has the
    /// artifact, the negative record of an absent sources artifact, or `None`
    /// when nothing has it. Checksum failures on the winning repository are
    /// returned as errors; later repositories are not tried.
    pub fn probe(
        &self,
        path: &str,
        headers: &[(String, String)],
    ) -> RepoProbeResult<Option<ResolutionRecord>> {
        self.locks.with_lock(path, || {
            // A concurrent request may have resolved it while we waited
            if let Some(existing) = self.cache.get(path)? {
                debug!("{} resolved while waiting for probe lock", path);
                return Ok(Some(existing));
            }
            self.probe_unlocked(path, headers)
        })
    }

    fn probe_unlocked(
        &self,
        path: &str,
        headers: &[(String, String)],
    ) -> RepoProbeResult<Option<ResolutionRecord>> {
        for repository in self.repositories {
            let url = repository.candidate_url(path);
            debug!("Probing {}", url);

            match self.upstream.discover(&url, headers) {
                Ok(discovery) if discovery.is_ok() => {
                    info!("Resolved {} from {}", path, repository.name);
                    return self.cache.add(path, &discovery, self.upstream).map(Some);
                }
                Ok(discovery) => {
                    debug!("{} answered {} for {}", url, discovery.status, path);
                }
                Err(e) => {
                    warn!("Probe of {} failed: {}", url, e);
                }
            }
        }

        if is_sources_path(path) {
            self.cache.mark_lost(path)?;
            return self.cache.get(path);
        }

        warn!("No repository has {}", path);
        Ok(None)
    }
}
