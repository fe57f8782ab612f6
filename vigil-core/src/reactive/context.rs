//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables automatic dependency tracking: when a reactive slot is read,
//! its dep registers the current watcher as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering an evaluation pushes the watcher;
//! the returned guard pops it when dropped, on every exit path including
//! early error returns and unwinding.
//!
//! The stack supports nested evaluation (a computed value read during a
//! render pass). Only the top entry is ever consulted. An empty entry
//! suspends tracking for its extent, which is how callbacks that must not
//! collect dependencies are run.

use std::cell::RefCell;

use super::watcher::Watcher;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given watcher.
    ///
    /// While this context is active, any reactive reads register the
    /// watcher as a dependent.
    pub fn enter(watcher: Watcher) -> Self {
        Self::push(Some(watcher))
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(entry: Option<Watcher>) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(entry);
            stack.len()
        });
        Self { depth }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// The watcher currently being evaluated, if any.
    pub fn current() -> Option<Watcher> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of nested contexts, tracked or not.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Take the entry out before dropping it: dropping the last handle
        // of a watcher may touch deps, never this stack, but keep the
        // borrow short regardless.
        let popped = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext dropped out of order"
            );
            stack.pop()
        });
        drop(popped);
    }
}
