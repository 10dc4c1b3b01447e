//! Persistent resolution cache
//!
//! Remembers which upstream repository served each artifact path so later
//! requests skip probing entirely.
//!
//! # Record States
//!
//! | State | `found` | Written by | Description |
//! |-------|---------|------------|-------------|
//! | Miss | - | - | No file; the next request probes |
//! | Found | true | `add` | URL, checksum and headers confirmed upstream |
//! | Lost | false | `mark_lost` | Optional artifact absent everywhere |
//!
//! Records are never rewritten once present; there is no expiry.

pub mod locks;
pub mod record;
pub mod store;

pub use locks::ProbeLocks;
pub use record::{
    cache_key, checksum_target, is_checksum_path, is_sources_path, ResolutionRecord,
    CHECKSUM_SUFFIX, SOURCES_SUFFIX,
};
pub use store::ResolutionCache;
