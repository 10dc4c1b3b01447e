//! repoprobe - caching reverse proxy for Maven repositories
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use repoprobe::cli::{Cli, Commands};
use repoprobe::config::ConfigManager;
use repoprobe::error::RepoProbeResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RepoProbeResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("repoprobe=warn"),
        1 => EnvFilter::new("repoprobe=info"),
        _ => EnvFilter::new("repoprobe=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .without_time()
            .init();
    }

    match cli.command {
        Commands::Serve(args) => repoprobe::cli::commands::serve(args, &config).await,
        Commands::Config(args) => {
            repoprobe::cli::commands::config(args, &config, &config_manager).await
        }
        Commands::Cache(args) => repoprobe::cli::commands::cache(args, &config).await,
    }
}
