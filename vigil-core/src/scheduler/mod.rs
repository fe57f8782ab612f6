//! Scheduler
//!
//! Watchers notified by a dep are not re-run on the spot. They are queued and
//! flushed together on the next tick, in priority order.

mod queue;
pub mod tick;

pub use queue::{flush, is_flushing, pending_len, queue_watcher};
pub use tick::{drive, has_pending, next_tick, next_tick_async, run_pending};
