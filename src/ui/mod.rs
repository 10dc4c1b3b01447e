//! Console output for the CLI
//!
//! Decorated with `cliclack` in an interactive terminal; plain bracketed lines
//! when piped or under CI.

mod context;
mod output;

pub use context::UiContext;
pub use output::{notice, serve_banner, serve_stopped, Tone};
