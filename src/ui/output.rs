//! What the commands print: status notices and the `serve` banner

use super::context::UiContext;
use crate::proxy::ProxyContext;
use crate::repository::RepositoryInfo;
use console::{style, StyledObject};

/// Severity of a one-line notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Info,
}

impl Tone {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Tone::Success => style("[OK]").green(),
            Tone::Warning => style("[WARN]").yellow(),
            Tone::Info => style("[INFO]").cyan(),
        }
    }
}

fn with_detail(message: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{} ({})", message, style(detail).dim()),
        None => message.to_string(),
    }
}

/// Print a status line, with an optional dimmed detail such as a path or hint
pub fn notice(ctx: &UiContext, tone: Tone, message: &str, detail: Option<&str>) {
    let text = with_detail(message, detail);
    if !ctx.use_fancy_output() {
        println!("  {} {}", tone.tag(), text);
        return;
    }

    let _ = match tone {
        Tone::Success => cliclack::log::success(text),
        Tone::Warning => cliclack::log::warning(text),
        Tone::Info => cliclack::log::info(text),
    };
}

/// How requests for a repository's artifacts reach the client
fn delivery(authenticated: bool) -> &'static str {
    if authenticated {
        "streamed"
    } else {
        "redirect"
    }
}

fn repository_line(position: usize, repo: &RepositoryInfo, authenticated: bool) -> String {
    format!(
        "{:>3}. {} {} {}",
        position,
        style(&repo.name).bold(),
        repo.base_url,
        style(format!("[{}]", delivery(authenticated))).dim()
    )
}

/// Startup banner: endpoint, cache location and the probe order
pub fn serve_banner(ctx: &UiContext, endpoint: &str, context: &ProxyContext) {
    let title = style("repoprobe").cyan().bold();
    if ctx.use_fancy_output() {
        let _ = cliclack::intro(title);
    } else {
        println!("{}\n", title);
    }

    notice(ctx, Tone::Success, "Proxy listening", Some(endpoint));
    println!("  cache: {}", context.cache().dir().display());

    if context.repositories().is_empty() {
        notice(
            ctx,
            Tone::Warning,
            "No repositories configured",
            Some("add [[repositories]] entries to the config file"),
        );
    }
    for (index, repo) in context.repositories().iter().enumerate() {
        let authenticated = context.realms().matches(&repo.normalized_base());
        println!("{}", repository_line(index + 1, repo, authenticated));
    }

    println!("  {}", style("Press Ctrl-C to stop").dim());
}

/// Closing line once the listener has shut down
pub fn serve_stopped(ctx: &UiContext) {
    let message = "Proxy stopped";
    if ctx.use_fancy_output() {
        let _ = cliclack::outro(style(message).green().bold());
    } else {
        println!("\n{} {}", Tone::Success.tag(), message);
    }
}
