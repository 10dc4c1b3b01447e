//! The HTTP face of the proxy
//!
//! `ProxyServer` owns the loopback listener, `RequestHandler` decides each
//! response, and `ProxyContext` holds the state both share.

pub mod context;
pub mod handler;
pub mod server;

pub use context::ProxyContext;
pub use handler::{Outcome, RequestHandler};
pub use server::ProxyServer;
