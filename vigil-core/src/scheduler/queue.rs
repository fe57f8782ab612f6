//! Watcher Queue
//!
//! Notified watchers are batched and flushed once per tick.
//!
//! # Algorithm
//!
//! 1. `queue_watcher` adds a watcher unless it is already pending, and
//!    schedules a flush on the next tick if none is scheduled.
//! 2. `flush` sorts the queue by `(tier, id)`: user and computed watchers
//!    before render watchers, and within a tier in creation order (parents
//!    before children).
//! 3. Watchers run in order. A watcher queued while the flush is running is
//!    spliced into the unprocessed remainder at its sorted position, so it
//!    still runs in this flush.
//! 4. After the queue drains, `after_update` hooks of the render watchers
//!    that ran are called, in reverse order.
//!
//! A failing watcher is reported and skipped; the rest of the flush proceeds.
//! A panicking watcher aborts the flush and the remaining queue is dropped.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::tick;
use crate::config;
use crate::error::ReactiveError;
use crate::reactive::{Watcher, WatcherId, WatcherKind};

#[derive(Default)]
struct QueueState {
    queue: Vec<Watcher>,
    /// Ids currently pending in `queue`.
    has: HashSet<WatcherId>,
    /// Re-queue counts per watcher within the running flush.
    circular: HashMap<WatcherId, u32>,
    /// A flush has been scheduled and not yet finished.
    waiting: bool,
    flushing: bool,
    /// Position of the watcher currently running.
    index: usize,
}

thread_local! {
    static STATE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Resets the queue if a flush unwinds before finishing.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let stale = STATE.with(|state| {
            let mut state = state.borrow_mut();
            if state.flushing {
                Some(std::mem::take(&mut *state))
            } else {
                None
            }
        });
        if let Some(stale) = stale {
            tracing::warn!(dropped = stale.queue.len().saturating_sub(stale.index), "flush aborted");
        }
    }
}

/// Queue a watcher for the next flush.
///
/// A watcher already pending is not queued twice.
pub fn queue_watcher(watcher: Watcher) {
    let id = watcher.id();
    let schedule = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if !state.has.insert(id) {
            return false;
        }
        if state.flushing {
            let key = watcher.sort_key();
            let mut position = state.queue.len();
            while position > state.index + 1 && state.queue[position - 1].sort_key() > key {
                position -= 1;
            }
            tracing::debug!(watcher = %id, position, "queued during flush");
            state.queue.insert(position, watcher);
        } else {
            state.queue.push(watcher);
        }
        !std::mem::replace(&mut state.waiting, true)
    });

    if schedule {
        if config::current().async_flush {
            tick::next_tick(flush);
        } else {
            flush();
        }
    }
}

/// Run every queued watcher.
///
/// Normally called from the tick queue; calling it directly flushes
/// synchronously. A nested call while a flush is running does nothing.
pub fn flush() {
    let started = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.flushing {
            return None;
        }
        state.flushing = true;
        state.queue.sort_by_key(Watcher::sort_key);
        Some(state.queue.len())
    });
    let Some(queued) = started else {
        return;
    };
    let _guard = FlushGuard;
    tracing::debug!(watchers = queued, "flush start");

    let limit = config::current().max_update_count;
    let mut index = 0;
    loop {
        let next = STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.index = index;
            state.queue.get(index).cloned()
        });
        let Some(watcher) = next else {
            break;
        };
        let id = watcher.id();

        watcher.call_before();
        STATE.with(|state| state.borrow_mut().has.remove(&id));
        if let Err(error) = watcher.run() {
            config::report_error(&watcher.wrap_error(error));
        }

        let runaway = STATE.with(|state| {
            let mut state = state.borrow_mut();
            if !state.has.contains(&id) {
                return false;
            }
            let count = state.circular.entry(id).or_insert(0);
            *count += 1;
            *count > limit
        });
        if runaway {
            config::report_error(&ReactiveError::CircularUpdate {
                expression: watcher.expression().to_string(),
                limit,
            });
            break;
        }
        index += 1;
    }

    let processed = STATE.with(|state| {
        let mut state = state.borrow_mut();
        let processed = std::mem::take(&mut state.queue);
        *state = QueueState::default();
        processed
    });
    tracing::debug!(watchers = processed.len(), "flush end");

    for watcher in processed.iter().rev() {
        if watcher.kind() == WatcherKind::Render && watcher.is_active() {
            watcher.call_after_update();
        }
    }
}

/// Number of watchers waiting in the queue.
pub fn pending_len() -> usize {
    STATE.with(|state| {
        let state = state.borrow();
        state.queue.len().saturating_sub(if state.flushing { state.index + 1 } else { 0 })
    })
}

pub fn is_flushing() -> bool {
    STATE.with(|state| state.borrow().flushing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{watch, WatcherOptions};
    use crate::value::Value;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_watcher(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str, kind: WatcherKind) -> Watcher {
        let log = log.clone();
        Watcher::new(
            kind,
            name,
            move || {
                log.borrow_mut().push(name);
                Ok(Value::Undefined)
            },
            None,
            WatcherOptions::default(),
        )
    }

    #[test]
    fn duplicates_run_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let watcher = counting_watcher(&log, "w", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(watcher.clone());
        queue_watcher(watcher.clone());
        queue_watcher(watcher);
        assert_eq!(pending_len(), 1);

        flush();
        assert_eq!(*log.borrow(), vec!["w"]);
        assert_eq!(pending_len(), 0);
        assert!(!is_flushing());
    }

    #[test]
    fn user_watchers_run_before_render_watchers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let render = counting_watcher(&log, "render", WatcherKind::Render);
        let user = counting_watcher(&log, "user", WatcherKind::User);
        let child = counting_watcher(&log, "child-render", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(child);
        queue_watcher(render);
        queue_watcher(user);
        flush();

        assert_eq!(*log.borrow(), vec!["user", "render", "child-render"]);
    }

    #[test]
    fn watcher_queued_mid_flush_runs_in_same_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let late = counting_watcher(&log, "late", WatcherKind::Render);
        let trigger_log = log.clone();
        let target = late.clone();
        let early = Watcher::new(
            WatcherKind::User,
            "early",
            move || {
                trigger_log.borrow_mut().push("early");
                if is_flushing() {
                    queue_watcher(target.clone());
                }
                Ok(Value::Undefined)
            },
            None,
            WatcherOptions::default(),
        );
        log.borrow_mut().clear();

        queue_watcher(early);
        flush();
        assert_eq!(*log.borrow(), vec!["early", "late"]);
    }

    #[test]
    fn hooks_wrap_render_watchers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = |name: &'static str| {
            let run_log = log.clone();
            let before_log = log.clone();
            let after_log = log.clone();
            Watcher::render(
                name,
                move || {
                    run_log.borrow_mut().push(format!("run {name}"));
                    Ok(Value::Undefined)
                },
                WatcherOptions::default()
                    .before(move || before_log.borrow_mut().push(format!("before {name}")))
                    .after_update(move || after_log.borrow_mut().push(format!("updated {name}"))),
            )
        };
        let parent = make("parent");
        let child = make("child");
        log.borrow_mut().clear();

        queue_watcher(child);
        queue_watcher(parent);
        flush();

        assert_eq!(
            *log.borrow(),
            vec![
                "before parent",
                "run parent",
                "before child",
                "run child",
                "updated child",
                "updated parent",
            ]
        );
    }

    #[test]
    fn failing_watcher_does_not_stop_the_flush() {
        let errors = Rc::new(Cell::new(0));
        let counter = errors.clone();
        config::set_error_handler(Some(Rc::new(move |_: &ReactiveError| counter.set(counter.get() + 1))));

        let attempts = Rc::new(Cell::new(0));
        let attempt_counter = attempts.clone();
        let failing = Watcher::render(
            "failing",
            move || {
                attempt_counter.set(attempt_counter.get() + 1);
                if attempt_counter.get() > 1 {
                    Err(ReactiveError::evaluation("render failed"))
                } else {
                    Ok(Value::Undefined)
                }
            },
            WatcherOptions::default(),
        );
        let log = Rc::new(RefCell::new(Vec::new()));
        let healthy = counting_watcher(&log, "healthy", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(failing);
        queue_watcher(healthy);
        flush();

        assert_eq!(errors.get(), 1);
        assert_eq!(*log.borrow(), vec!["healthy"]);
        config::set_error_handler(None);
    }

    #[test]
    fn panicking_watcher_does_not_wedge_the_queue() {
        let attempts = Rc::new(Cell::new(0));
        let attempt_counter = attempts.clone();
        let exploding = Watcher::render(
            "exploding",
            move || {
                attempt_counter.set(attempt_counter.get() + 1);
                if attempt_counter.get() > 1 {
                    panic!("render exploded");
                }
                Ok(Value::Undefined)
            },
            WatcherOptions::default(),
        );
        let log = Rc::new(RefCell::new(Vec::new()));
        let healthy = counting_watcher(&log, "healthy", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(exploding);
        assert!(std::panic::catch_unwind(flush).is_err());
        assert_eq!(attempts.get(), 2);
        assert!(!is_flushing());
        assert_eq!(pending_len(), 0);

        queue_watcher(healthy);
        tick::run_pending();
        assert_eq!(*log.borrow(), vec!["healthy"]);
        assert!(!is_flushing());
        assert!(!tick::has_pending());
    }

    #[test]
    fn self_requeueing_watcher_is_stopped() {
        config::configure(config::Config {
            max_update_count: 5,
            ..config::Config::default()
        });
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        config::set_error_handler(Some(Rc::new(move |error: &ReactiveError| {
            sink.borrow_mut().push(error.to_string());
        })));

        let slot: Rc<RefCell<Option<Watcher>>> = Rc::new(RefCell::new(None));
        let handle = slot.clone();
        let runs = Rc::new(Cell::new(0));
        let run_counter = runs.clone();
        let looping = watch(
            "loop",
            move || {
                run_counter.set(run_counter.get() + 1);
                Ok(Value::from(run_counter.get()))
            },
            move |_, _| {
                if let Some(me) = handle.borrow().as_ref() {
                    queue_watcher(me.clone());
                }
                Ok(())
            },
            WatcherOptions::default(),
        );
        *slot.borrow_mut() = Some(looping.clone());

        queue_watcher(looping);
        flush();

        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("infinite update loop"));
        assert_eq!(runs.get(), 1 + 6);
        assert!(!is_flushing());

        *slot.borrow_mut() = None;
        config::set_error_handler(None);
        config::configure(config::Config::default());
    }

    #[test]
    fn sync_config_flushes_immediately() {
        config::configure(config::Config {
            async_flush: false,
            ..config::Config::default()
        });
        let log = Rc::new(RefCell::new(Vec::new()));
        let watcher = counting_watcher(&log, "w", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(watcher);
        assert_eq!(*log.borrow(), vec!["w"]);
        assert!(!tick::has_pending());
        config::configure(config::Config::default());
    }

    #[test]
    fn async_config_defers_to_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let watcher = counting_watcher(&log, "w", WatcherKind::Render);
        log.borrow_mut().clear();

        queue_watcher(watcher);
        assert!(log.borrow().is_empty());
        assert!(tick::has_pending());

        tick::run_pending();
        assert_eq!(*log.borrow(), vec!["w"]);
    }
}
