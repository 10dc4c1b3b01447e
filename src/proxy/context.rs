//! Shared state for one proxy instance
//!
//! Built once before the server starts and shared read-only by every
//! request thread.

use crate::cache::{ProbeLocks, ResolutionCache};
use crate::config::{Config, ConfigManager};
use crate::error::RepoProbeResult;
use crate::prober::RepositoryProber;
use crate::realm::AuthRealmRegistry;
use crate::repository::{RepositoryInfo, RepositorySource};
use crate::upstream::{Upstream, UreqUpstream};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the request handler and prober need
pub struct ProxyContext {
    cache: ResolutionCache,
    repositories: Vec<RepositoryInfo>,
    realms: Arc<AuthRealmRegistry>,
    upstream: Arc<dyn Upstream>,
    locks: ProbeLocks,
}

impl ProxyContext {
    pub fn new(
        cache: ResolutionCache,
        repositories: Vec<RepositoryInfo>,
        realms: Arc<AuthRealmRegistry>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            cache,
            repositories,
            realms,
            upstream,
            locks: ProbeLocks::new(),
        }
    }

    /// Build a context from configuration.
    ///
    /// Non-HTTP repositories are skipped; credentials on HTTP repositories
    /// become realms keyed by the repository URL.
    pub fn from_config(config: &Config, cache_dir: Option<PathBuf>) -> RepoProbeResult<Self> {
        let cache_dir = cache_dir.unwrap_or_else(|| ConfigManager::cache_dir(config));
        let cache = ResolutionCache::open(cache_dir)?;

        let mut realms = AuthRealmRegistry::new();
        let mut repositories = Vec::new();
        for source in config.repository_sources() {
            match source {
                RepositorySource::Http { info, credentials } => {
                    realms.register(&info.base_url, &credentials);
                    repositories.push(info);
                }
                RepositorySource::Other { name, url } => {
                    warn!("repository {} ({}) is not http(s), not proxied", name, url);
                }
            }
        }

        info!("proxying {} repositories", repositories.len());
        let realms = Arc::new(realms);
        let upstream = Arc::new(UreqUpstream::new(&config.http, Arc::clone(&realms)));
        Ok(Self::new(cache, repositories, realms, upstream))
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn repositories(&self) -> &[RepositoryInfo] {
        &self.repositories
    }

    pub fn realms(&self) -> &AuthRealmRegistry {
        &self.realms
    }

    pub fn upstream(&self) -> &dyn Upstream {
        self.upstream.as_ref()
    }

    /// Prober over this context's repositories
    pub fn prober(&self) -> RepositoryProber<'_> {
        RepositoryProber::new(
            &self.cache,
            &self.repositories,
            self.upstream.as_ref(),
            &self.locks,
        )
    }
}
