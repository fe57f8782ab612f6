//! Tick Queue
//!
//! Deferred callbacks run together at the next tick: the next time the host
//! drains the queue, after the current synchronous work has unwound. The
//! watcher queue schedules its flush here, so any number of synchronous
//! mutations coalesce into one flush.
//!
//! A host either calls [`run_pending`] from its own loop, or spawns [`drive`]
//! on a tokio `LocalSet`, which drains the queue whenever something is
//! scheduled.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tokio::sync::{oneshot, Notify};

type Callback = Box<dyn FnOnce()>;

thread_local! {
    static CALLBACKS: RefCell<Vec<Callback>> = const { RefCell::new(Vec::new()) };
    static WAKER: Rc<Notify> = Rc::new(Notify::new());
}

/// Schedule `callback` for the next tick.
pub fn next_tick(callback: impl FnOnce() + 'static) {
    CALLBACKS.with(|callbacks| callbacks.borrow_mut().push(Box::new(callback)));
    WAKER.with(|waker| waker.notify_one());
}

/// Run the callbacks scheduled so far, in scheduling order.
///
/// Callbacks scheduled while draining wait for the next call. Returns how
/// many callbacks ran.
pub fn run_pending() -> usize {
    let callbacks = CALLBACKS.with(|callbacks| std::mem::take(&mut *callbacks.borrow_mut()));
    let count = callbacks.len();
    if count > 0 {
        tracing::trace!(callbacks = count, "tick");
    }
    for callback in callbacks {
        callback();
    }
    count
}

pub fn has_pending() -> bool {
    CALLBACKS.with(|callbacks| !callbacks.borrow().is_empty())
}

/// Drain the tick queue forever, waking whenever a callback is scheduled.
///
/// Must run on the thread that schedules callbacks, e.g. via
/// `tokio::task::spawn_local`.
pub async fn drive() {
    let waker = WAKER.with(Rc::clone);
    loop {
        waker.notified().await;
        run_pending();
    }
}

/// A future that resolves once the next tick has run.
///
/// The tick is scheduled when this function is called, not when the future
/// is first polled.
pub fn next_tick_async() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        let _ = tx.send(());
    });
    async move {
        let _ = rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            next_tick(move || log.borrow_mut().push(i));
        }
        assert!(has_pending());
        assert_eq!(run_pending(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!has_pending());
    }

    #[test]
    fn callbacks_scheduled_while_draining_wait() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outer = log.clone();
        next_tick(move || {
            outer.borrow_mut().push("first");
            let inner = outer.clone();
            next_tick(move || inner.borrow_mut().push("second"));
        });

        assert_eq!(run_pending(), 1);
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(run_pending(), 1);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn drive_resolves_next_tick_async() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let driver = tokio::task::spawn_local(drive());
                let ran = Rc::new(RefCell::new(false));
                let flag = ran.clone();
                next_tick(move || *flag.borrow_mut() = true);
                next_tick_async().await;
                assert!(*ran.borrow());
                driver.abort();
            })
            .await;
    }
}
