//! Per-path mutual exclusion for cache population
//!
//! Concurrent misses on the same artifact path queue up behind one lock so
//! only the first caller probes upstream; the rest find the record it wrote.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// In-process lock table keyed by artifact path
#[derive(Debug, Default)]
pub struct ProbeLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProbeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// Blocks the calling thread until the lock is free. A panic inside a
    /// previous holder does not poison the path.
    pub fn with_lock<T>(&self, path: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(path.to_string()).or_default())
        };

        let out = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Drop the slot once nobody else holds or waits on it
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(path);
        }
        out
    }

    /// Number of paths with a live lock
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
