//! Listener lifecycle

use super::context::ProxyContext;
use super::handler::{dispatch, RequestHandler};
use crate::config::schema::ServerConfig;
use crate::error::{RepoProbeError, RepoProbeResult};
use axum::Router;
use rand::Rng;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `stop` waits for in-flight requests before aborting
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pick a port from `[start, end)`, or `start` for an empty range
pub fn random_port(start: u16, end: u16) -> u16 {
    if start >= end {
        return start;
    }
    rand::rng().random_range(start..end)
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Loopback HTTP server fronting the resolution cache
pub struct ProxyServer {
    context: Arc<ProxyContext>,
    port: u16,
    running: Option<Running>,
}

impl ProxyServer {
    /// Create a server on the configured port, or a random one from the
    /// configured range when the port is 0
    pub fn new(context: Arc<ProxyContext>, config: &ServerConfig) -> Self {
        let port = if config.port != 0 {
            config.port
        } else {
            random_port(config.port_range_start, config.port_range_end)
        };
        Self::with_port(context, port)
    }

    /// Create a server on `port`; 0 lets the OS choose at start
    pub fn with_port(context: Arc<ProxyContext>, port: u16) -> Self {
        Self {
            context,
            port,
            running: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Move to another port. Only allowed while stopped.
    pub fn change_port(&mut self, port: u16) -> RepoProbeResult<()> {
        if self.is_running() {
            return Err(RepoProbeError::ServerAlreadyStarted);
        }
        self.port = port;
        Ok(())
    }

    /// Base URL clients should use instead of the upstream repositories
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bind and start serving. No-op if already running.
    pub async fn start(&mut self) -> RepoProbeResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RepoProbeError::Bind { addr, source })?;
        self.port = listener
            .local_addr()
            .map_err(|e| RepoProbeError::io("reading bound address", e))?
            .port();

        let handler = Arc::new(RequestHandler::new(Arc::clone(&self.context)));
        let app = Router::new().fallback(dispatch).with_state(handler);

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    signal.await.ok();
                })
                .await
        });

        self.running = Some(Running { shutdown, task });
        info!("proxy listening on {}", self.endpoint());
        Ok(())
    }

    /// Stop serving. No-op if not running.
    pub async fn stop(&mut self) -> RepoProbeResult<()> {
        let Some(Running { shutdown, mut task }) = self.running.take() else {
            return Ok(());
        };

        info!("stopping proxy on {}", self.endpoint());
        let _ = shutdown.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(RepoProbeError::io("serving requests", e)),
            Ok(Err(join)) => Err(RepoProbeError::Internal(format!(
                "server task failed: {}",
                join
            ))),
            Err(_) => {
                warn!("server did not drain within {:?}, aborting", SHUTDOWN_GRACE);
                task.abort();
                Ok(())
            }
        }
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
        }
    }
}
