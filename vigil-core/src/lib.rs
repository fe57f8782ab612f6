//! Vigil Core
//!
//! Fine-grained reactive dependency tracking over plain, mutable object
//! graphs. It implements:
//!
//! - A dynamic data model of objects, arrays and primitives
//! - In-place observation that turns properties into reactive slots
//! - Automatic dependency collection during watcher evaluation
//! - Tracked array mutation and reactive key addition/removal
//! - A tick-batched scheduler with priority tiers
//!
//! # Architecture
//!
//! - `value`: the data model ([`Value`], [`Object`], [`Array`])
//! - `reactive`: observers, deps, watchers and computed values
//! - `scheduler`: the watcher queue and the tick queue
//! - `config` / `error`: per-thread configuration and the error type
//!
//! # Example
//!
//! ```rust
//! use vigil_core::reactive::{observe, Watcher, WatcherOptions};
//! use vigil_core::scheduler;
//! use vigil_core::{Object, Value};
//!
//! let state = Object::from_pairs([("count", 1)]);
//! observe(&Value::from(state.clone()), false);
//!
//! let reader = state.clone();
//! let view = Watcher::render("count", move || Ok(reader.get("count")), WatcherOptions::default());
//! assert_eq!(view.value(), Value::from(1));
//!
//! state.set("count", 2);
//! // The re-render is queued until the next tick.
//! assert_eq!(view.value(), Value::from(1));
//! scheduler::run_pending();
//! assert_eq!(view.value(), Value::from(2));
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;
pub mod value;

pub use config::Config;
pub use error::{Diagnosed, ReactiveError, Result};
pub use value::{Array, Key, Object, Value};
