//! Subscriber identity.
//!
//! A subscriber is any computation that depends on reactive values: render
//! passes, computed values and user watchers. Deps only see this trait, so
//! they never need to know which kind of watcher they are notifying.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a watcher.
///
/// Ids are handed out in creation order, which the scheduler relies on:
/// a watcher created earlier (a parent before its children) flushes first
/// within its priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A subscriber to reactive values.
pub trait Subscriber {
    fn subscriber_id(&self) -> WatcherId;

    /// Invoked by `Dep::notify` when a dependency changed.
    fn update(&self);
}
