//! Dependency Publisher
//!
//! A [`Dep`] is the subscriber list of one reactive slot (a property) or one
//! container (an observed object or array). Reading the slot inside a watcher
//! evaluation calls [`Dep::depend`]; writing it calls [`Dep::notify`].
//!
//! Subscribers are held weakly. A dep never keeps a watcher alive; entries
//! whose watcher has been dropped are skipped and pruned on the next notify.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, WatcherId};

/// Unique identifier for a dep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(u64);

impl DepId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

struct DepInner {
    id: DepId,
    subs: RefCell<Vec<(WatcherId, Weak<dyn Subscriber>)>>,
}

/// A publisher with an ordered list of subscribers.
///
/// Cloning a `Dep` yields another handle to the same subscriber list.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: DepId::new(),
            subs: RefCell::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> DepId {
        self.0.id
    }

    /// Register the currently evaluating watcher, if any, as a subscriber.
    ///
    /// The link is made in both directions through the watcher, which
    /// de-duplicates repeated reads within one evaluation.
    pub fn depend(&self) {
        if let Some(watcher) = ReactiveContext::current() {
            watcher.add_dep(self);
        }
    }

    /// Notify every subscriber, in subscription order.
    ///
    /// The list is snapshotted first, so subscribers added or removed while
    /// notifying do not affect this round.
    pub fn notify(&self) {
        let snapshot: Vec<Weak<dyn Subscriber>> = {
            let mut subs = self.0.subs.borrow_mut();
            subs.retain(|(_, sub)| sub.strong_count() > 0);
            subs.iter().map(|(_, sub)| sub.clone()).collect()
        };
        tracing::trace!(dep = %self.0.id, subscribers = snapshot.len(), "notify");
        for sub in snapshot {
            if let Some(sub) = sub.upgrade() {
                sub.update();
            }
        }
    }

    pub(crate) fn add_sub(&self, id: WatcherId, sub: Weak<dyn Subscriber>) {
        tracing::trace!(dep = %self.0.id, watcher = %id, "subscribe");
        self.0.subs.borrow_mut().push((id, sub));
    }

    /// Subscribe an arbitrary subscriber directly, bypassing evaluation.
    pub fn subscribe<S>(&self, subscriber: &Rc<S>)
    where
        S: Subscriber + 'static,
    {
        let weak: Weak<S> = Rc::downgrade(subscriber);
        self.add_sub(subscriber.subscriber_id(), weak);
    }

    pub fn remove_sub(&self, id: WatcherId) {
        self.0.subs.borrow_mut().retain(|(sub_id, _)| *sub_id != id);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.0
            .subs
            .borrow()
            .iter()
            .filter(|(_, sub)| sub.strong_count() > 0)
            .count()
    }

    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.0.subs.borrow().iter().any(|(sub_id, sub)| *sub_id == id && sub.strong_count() > 0)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
