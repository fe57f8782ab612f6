//! Computed Values
//!
//! A computed value is a lazy watcher with a cache. It re-evaluates only when
//! read after one of its dependencies changed; reads in between return the
//! cached value.
//!
//! When a computed value is read inside another evaluation, the reader is
//! made to depend on everything the computed value depends on. A render pass
//! that reads a computed value is therefore re-run when the computed value's
//! inputs change, without the computed value having to notify anyone itself.

use std::fmt;

use super::context::ReactiveContext;
use super::watcher::{Watcher, WatcherKind, WatcherOptions};
use crate::error::Result;
use crate::value::Value;

#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    /// Create a computed value. The getter does not run until first read.
    pub fn new<G>(expression: impl Into<String>, getter: G) -> Self
    where
        G: Fn() -> Result<Value> + 'static,
    {
        Self {
            watcher: Watcher::new(
                WatcherKind::Computed,
                expression,
                getter,
                None,
                WatcherOptions::default().lazy(),
            ),
        }
    }

    /// The current value, re-evaluating first if a dependency changed.
    pub fn value(&self) -> Result<Value> {
        if self.watcher.is_dirty() {
            self.watcher.evaluate()?;
        }
        if ReactiveContext::is_active() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    pub fn teardown(&self) {
        self.watcher.teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("expression", &self.watcher.expression())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
