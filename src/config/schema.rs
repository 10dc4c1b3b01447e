//! Configuration schema for repoprobe
//!
//! Configuration is stored at `~/.config/repoprobe/config.toml`

use crate::realm::Credentials;
use crate::repository::RepositorySource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Listener settings
    pub server: ServerConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,

    /// Resolution cache settings
    pub cache: CacheConfig,

    /// Upstream repositories, probed in order
    pub repositories: Vec<RepositoryConfig>,
}

impl Config {
    /// Classify every configured repository
    pub fn repository_sources(&self) -> Vec<RepositorySource> {
        self.repositories
            .iter()
            .map(|r| {
                RepositorySource::classify(
                    &r.name,
                    &r.url,
                    Credentials::new(r.username.clone(), r.password.clone()),
                )
            })
            .collect()
    }

    /// Copy with repository passwords masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for repo in &mut config.repositories {
            if repo.password.is_some() {
                repo.password = Some("********".to_string());
            }
        }
        config
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Fixed port; 0 picks one at random from the range below
    pub port: u16,

    /// First port of the random range (inclusive)
    pub port_range_start: u16,

    /// End of the random range (exclusive)
    pub port_range_end: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            port_range_start: 10000,
            port_range_end: 11000,
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect timeout per request
    pub connect_timeout_ms: u64,

    /// How long to wait for the response head
    pub read_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
        }
    }
}

/// Resolution cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (default: platform cache dir / repoprobe)
    pub dir: Option<PathBuf>,
}

/// One upstream repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}
