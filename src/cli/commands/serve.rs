//! Serve command - run the proxy in the foreground

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::{RepoProbeError, RepoProbeResult};
use crate::proxy::{ProxyContext, ProxyServer};
use crate::ui::{self, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> RepoProbeResult<()> {
    let ctx = UiContext::detect();

    let context = Arc::new(ProxyContext::from_config(config, args.cache_dir)?);
    let mut server = match args.port {
        Some(port) => ProxyServer::with_port(Arc::clone(&context), port),
        None => ProxyServer::new(Arc::clone(&context), &config.server),
    };

    server.start().await?;

    ui::serve_banner(&ctx, &server.endpoint(), &context);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| RepoProbeError::io("waiting for Ctrl-C", e))?;
    debug!("interrupt received");

    server.stop().await?;
    ui::serve_stopped(&ctx);
    Ok(())
}
