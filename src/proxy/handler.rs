//! Request handling
//!
//! [`RequestHandler::handle`] is the synchronous decision logic: it consults
//! the cache, probes on a miss and says what the client should get back as an
//! [`Outcome`]. [`dispatch`] is the axum entry point that runs it on the
//! blocking pool and turns the outcome into an HTTP response.

use super::context::ProxyContext;
use crate::cache::is_checksum_path;
use crate::error::{RepoProbeError, RepoProbeResult};
use crate::upstream::{is_forwardable, Passthrough};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Size of each chunk streamed from an authenticated upstream
const STREAM_CHUNK: usize = 64 * 1024;

/// Headers describing the upstream connection; never replayed to clients
const NOT_REPLAYED: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
];

/// What the client gets for one request
#[derive(Debug)]
pub enum Outcome {
    /// 200 with the captured discovery headers (HEAD)
    Headers(BTreeMap<String, String>),
    /// 200 with a cached checksum as the body
    Checksum(String),
    /// 302 to the resolved upstream URL
    Redirect(String),
    /// Upstream response relayed through the proxy
    Passthrough(Passthrough),
    /// Confirmed absent
    NotFound,
    /// No repository answered; left to the server's default
    Unhandled,
}

/// Interprets HEAD and GET requests against one [`ProxyContext`]
pub struct RequestHandler {
    ctx: Arc<ProxyContext>,
}

impl RequestHandler {
    pub fn new(ctx: Arc<ProxyContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ProxyContext {
        &self.ctx
    }

    /// Decide the outcome for `method path`.
    ///
    /// `headers` are the client's forwardable request headers, passed on to
    /// any discovery request this triggers. Blocks on network I/O.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
    ) -> RepoProbeResult<Outcome> {
        debug!("{} {}", method, path);
        match method {
            "HEAD" => self.head(path, headers),
            "GET" => self.get(path, headers),
            other => Err(RepoProbeError::InvalidMethod(other.to_string())),
        }
    }

    fn head(&self, path: &str, headers: &[(String, String)]) -> RepoProbeResult<Outcome> {
        if let Some(record) = self.ctx.cache().get(path)? {
            if record.found {
                debug!("cache hit for {}", path);
                return Ok(Outcome::Headers(record.headers));
            }
        }

        match self.ctx.prober().probe(path, headers)? {
            Some(record) if record.found => Ok(Outcome::Headers(record.headers)),
            _ => Ok(Outcome::Unhandled),
        }
    }

    fn get(&self, path: &str, headers: &[(String, String)]) -> RepoProbeResult<Outcome> {
        if is_checksum_path(path) {
            if let Some(checksum) = self.ctx.cache().get_checksum(path)? {
                debug!("serving cached checksum for {}", path);
                return Ok(Outcome::Checksum(checksum));
            }
        }

        let record = match self.ctx.cache().get(path)? {
            Some(record) => record,
            None => match self.ctx.prober().probe(path, headers)? {
                Some(record) => record,
                None => return Ok(Outcome::Unhandled),
            },
        };

        if !record.found {
            return Ok(Outcome::NotFound);
        }

        let location = record.resolved_url;
        if self.ctx.realms().matches(&location) {
            info!("streaming {} through the proxy", location);
            let upstream = self.ctx.upstream().open(&location)?;
            return Ok(Outcome::Passthrough(upstream));
        }

        info!("redirect to {}", location);
        Ok(Outcome::Redirect(location))
    }
}

/// axum fallback handler serving every path
pub async fn dispatch(
    State(handler): State<Arc<RequestHandler>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri
        .path()
        .strip_prefix('/')
        .unwrap_or(uri.path())
        .to_string();
    let forwarded = forwardable_headers(&headers);
    let method_name = method.as_str().to_string();

    let result = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || handler.handle(&method_name, &path, &forwarded)).await
    };

    match result {
        Ok(Ok(outcome)) => outcome_response(outcome),
        Ok(Err(RepoProbeError::InvalidMethod(m))) => {
            warn!("rejected {} {}", m, path);
            (
                StatusCode::METHOD_NOT_ALLOWED,
                "repoprobe only accepts HEAD or GET requests",
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!("{} {} failed: {}", method, path, e);
            let status = if e.is_upstream() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string()).into_response()
        }
        Err(join) => {
            error!("handler for {} panicked: {}", path, join);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn forwardable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| is_forwardable(name.as_str()))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Headers(captured) => {
            let mut response = StatusCode::OK.into_response();
            replay_headers(response.headers_mut(), &captured);
            response
        }
        Outcome::Checksum(checksum) => (StatusCode::OK, checksum).into_response(),
        Outcome::Redirect(location) => match HeaderValue::try_from(location) {
            Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
            Err(e) => {
                error!("resolved URL is not a valid Location: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Outcome::Passthrough(upstream) => passthrough_response(upstream),
        Outcome::NotFound | Outcome::Unhandled => StatusCode::NOT_FOUND.into_response(),
    }
}

fn replay_headers(target: &mut HeaderMap, captured: &BTreeMap<String, String>) {
    for (name, value) in captured {
        if NOT_REPLAYED.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            continue;
        }
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                target.insert(name, value);
            }
            _ => debug!("skipping unreplayable header {}", name),
        }
    }
}

fn passthrough_response(upstream: Passthrough) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if status != StatusCode::OK {
        warn!("authenticated upstream answered {}", upstream.status);
        return status.into_response();
    }

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(8);
    tokio::task::spawn_blocking(move || pump(upstream.body, tx));
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    if let Some(length) = upstream.content_length {
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    response
}

/// Copy a blocking reader into the response channel until EOF, a read error,
/// or the client going away
fn pump(mut body: Box<dyn Read + Send>, tx: mpsc::Sender<Result<Bytes, std::io::Error>>) {
    let mut buf = vec![0u8; STREAM_CHUNK];
    loop {
        match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!("client went away during passthrough");
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
}
