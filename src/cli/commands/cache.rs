//! Cache command - inspect the resolution cache

use crate::cache::{ResolutionCache, ResolutionRecord};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{RepoProbeError, RepoProbeResult};
use crate::ui::{self, Tone, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> RepoProbeResult<()> {
    let dir = args
        .cache_dir
        .unwrap_or_else(|| ConfigManager::cache_dir(config));

    match args.action {
        CacheAction::Path => {
            println!("{}", dir.display());
            Ok(())
        }
        CacheAction::List { format } => list_records(&ResolutionCache::open(dir)?, format),
        CacheAction::Show { path } => show_record(&ResolutionCache::open(dir)?, &path),
    }
}

fn list_records(cache: &ResolutionCache, format: OutputFormat) -> RepoProbeResult<()> {
    let records = cache.list()?;

    if records.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::notice(&ctx, Tone::Info, "Resolution cache is empty", None);
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&records),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain => print_plain(&records),
    }

    Ok(())
}

fn print_table(records: &[ResolutionRecord]) {
    println!(
        "{:<60} {:<8} {}",
        style("PATH").bold(),
        style("STATE").bold(),
        style("URL").bold()
    );
    println!("{}", "-".repeat(100));

    for record in records {
        let state = if record.found {
            style("found").green()
        } else {
            style("lost").dim()
        };
        println!("{:<60} {:<8} {}", record.target, state, record.resolved_url);
    }

    let found = records.iter().filter(|r| r.found).count();
    println!();
    println!(
        "Total: {} record(s), {} found, {} lost",
        records.len(),
        found,
        records.len() - found
    );
}

fn print_plain(records: &[ResolutionRecord]) {
    for record in records {
        if record.found {
            println!("{}\t{}", record.target, record.resolved_url);
        } else {
            println!("{}\t-", record.target);
        }
    }
}

fn show_record(cache: &ResolutionCache, path: &str) -> RepoProbeResult<()> {
    let path = path.trim_start_matches('/');
    let record = cache
        .get(path)?
        .ok_or_else(|| RepoProbeError::RecordNotFound(path.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
