//! URL-scoped Basic credentials for upstream repositories
//!
//! A realm binds a repository URL prefix to a ready-made `Authorization`
//! header value. Realms are registered once before the proxy starts and are
//! read-only while requests are served.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use tracing::{debug, warn};
use url::Url;

/// Username/password pair as configured for a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

/// One registered realm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRealm {
    /// URL prefix the credentials apply to
    pub url_prefix: String,
    /// Full `Authorization` header value, e.g. `Basic dXNlcjpwYXNz`
    pub auth_header_value: String,
    scope: Scope,
}

/// Parsed form of a realm prefix used for matching
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Url {
        scheme: String,
        host: Option<String>,
        port: Option<u16>,
        path: String,
    },
    Raw(String),
}

impl Scope {
    fn parse(prefix: &str) -> Self {
        match Url::parse(prefix) {
            Ok(url) if url.has_host() => {
                let mut path = url.path().to_string();
                if !path.ends_with('/') {
                    path.push('/');
                }
                Self::Url {
                    scheme: url.scheme().to_string(),
                    host: url.host_str().map(str::to_ascii_lowercase),
                    port: url.port_or_known_default(),
                    path,
                }
            }
            _ => Self::Raw(prefix.to_string()),
        }
    }

    fn covers(&self, candidate: &str) -> bool {
        match self {
            Self::Raw(prefix) => candidate.starts_with(prefix.as_str()),
            Self::Url {
                scheme,
                host,
                port,
                path,
            } => {
                let Ok(url) = Url::parse(candidate) else {
                    return false;
                };
                url.scheme() == scheme
                    && url.host_str().map(str::to_ascii_lowercase) == *host
                    && url.port_or_known_default() == *port
                    && (url.path().starts_with(path.as_str())
                        || format!("{}/", url.path()) == *path)
            }
        }
    }
}

/// Encode a Basic `Authorization` header value
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let token = BASE64_STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", token)
}

/// Registry of realms keyed by URL prefix
#[derive(Debug, Clone, Default)]
pub struct AuthRealmRegistry {
    realms: Vec<AuthRealm>,
}

impl AuthRealmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials for every URL under `url_prefix`.
    ///
    /// No-op when both username and password are absent. Re-registering a
    /// prefix replaces its credentials.
    pub fn register(&mut self, url_prefix: &str, credentials: &Credentials) {
        if credentials.is_empty() {
            return;
        }
        if credentials.password.is_none() {
            warn!("Realm {} has no password", url_prefix);
        }

        let value = basic_auth_value(
            credentials.username.as_deref().unwrap_or_default(),
            credentials.password.as_deref().unwrap_or_default(),
        );
        let realm = AuthRealm {
            url_prefix: url_prefix.to_string(),
            auth_header_value: value,
            scope: Scope::parse(url_prefix),
        };

        debug!("Registered realm for {}", url_prefix);
        match self.realms.iter_mut().find(|r| r.url_prefix == url_prefix) {
            Some(existing) => *existing = realm,
            None => self.realms.push(realm),
        }
    }

    /// Whether any realm covers `url`
    pub fn matches(&self, url: &str) -> bool {
        self.realm_for(url).is_some()
    }

    /// `Authorization` value for `url`, first registered match wins
    pub fn header_for(&self, url: &str) -> Option<&str> {
        self.realm_for(url).map(|r| r.auth_header_value.as_str())
    }

    fn realm_for(&self, url: &str) -> Option<&AuthRealm> {
        self.realms.iter().find(|r| r.scope.covers(url))
    }

    pub fn len(&self) -> usize {
        self.realms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }
}
