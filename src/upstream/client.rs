//! Blocking upstream client built on ureq

use super::{Discovery, Passthrough, TextResponse, Upstream};
use crate::config::schema::HttpConfig;
use crate::error::{RepoProbeError, RepoProbeResult};
use crate::realm::AuthRealmRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ureq::http::header::{AUTHORIZATION, CONTENT_LENGTH};
use ureq::http::{HeaderMap, Response};
use ureq::{Agent, Body};

/// Real [`Upstream`] talking HTTP through a shared ureq agent
pub struct UreqUpstream {
    agent: Agent,
    realms: Arc<AuthRealmRegistry>,
}

impl UreqUpstream {
    /// Create a client with the configured timeouts.
    ///
    /// Redirects are followed; non-2xx statuses come back as responses.
    /// The read timeout bounds waiting for the response head only: a body
    /// streamed through the proxy may take as long as the upstream needs.
    pub fn new(http: &HttpConfig, realms: Arc<AuthRealmRegistry>) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(Duration::from_millis(http.connect_timeout_ms)))
            .timeout_recv_response(Some(Duration::from_millis(http.read_timeout_ms)))
            .build();

        Self {
            agent: Agent::new_with_config(config),
            realms,
        }
    }

    fn realm_header(&self, url: &str) -> Option<&str> {
        self.realms.header_for(url)
    }
}

/// Collapse a header map to the first value of each name
fn first_values(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// Client headers to send upstream. A realm credential replaces any
/// client-supplied `Authorization`, so that header is dropped here.
fn outbound_headers(
    headers: &[(String, String)],
    realm_applies: bool,
) -> impl Iterator<Item = (&str, &str)> {
    headers
        .iter()
        .filter(move |(name, _)| !(realm_applies && name.eq_ignore_ascii_case("authorization")))
        .map(|(name, value)| (name.as_str(), value.as_str()))
}

fn content_length(response: &Response<Body>) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl Upstream for UreqUpstream {
    fn discover(&self, url: &str, headers: &[(String, String)]) -> RepoProbeResult<Discovery> {
        let realm = self.realm_header(url);
        let mut request = self.agent.head(url);
        for (name, value) in outbound_headers(headers, realm.is_some()) {
            request = request.header(name, value);
        }
        if let Some(auth) = realm {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request
            .call()
            .map_err(|e| RepoProbeError::upstream(url, e))?;
        let status = response.status().as_u16();
        debug!("HEAD {} -> {}", url, status);

        Ok(Discovery {
            url: url.to_string(),
            status,
            headers: first_values(response.headers()),
        })
    }

    fn fetch_text(&self, url: &str) -> RepoProbeResult<TextResponse> {
        let mut request = self.agent.get(url);
        if let Some(auth) = self.realm_header(url) {
            request = request.header(AUTHORIZATION, auth);
        }

        let mut response = request
            .call()
            .map_err(|e| RepoProbeError::upstream(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RepoProbeError::upstream(url, e))?;

        Ok(TextResponse { status, body })
    }

    fn open(&self, url: &str) -> RepoProbeResult<Passthrough> {
        let mut request = self.agent.get(url);
        if let Some(auth) = self.realm_header(url) {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request
            .call()
            .map_err(|e| RepoProbeError::upstream(url, e))?;
        let status = response.status().as_u16();
        let content_length = content_length(&response);
        debug!("GET {} -> {} ({:?} bytes)", url, status, content_length);

        Ok(Passthrough {
            status,
            content_length,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}
