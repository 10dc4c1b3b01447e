//! repoprobe - caching reverse proxy for Maven-style repositories
//!
//! Sits between a dependency resolver and its upstream repositories,
//! remembers which repository holds each artifact path, and answers later
//! requests for the same path without probing every repository again.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod prober;
pub mod proxy;
pub mod realm;
pub mod repository;
pub mod ui;
pub mod upstream;

pub use error::{RepoProbeError, RepoProbeResult};
