//! Reactive Core
//!
//! This module implements dependency tracking over plain data: observers,
//! reactive properties, the array interceptor, and the watchers that consume
//! them.
//!
//! # Concepts
//!
//! ## Observation
//!
//! [`observe`] converts a container in place. Every enumerable key of an
//! object becomes a reactive property, and every element of an array is
//! observed in turn. The conversion is recursive and happens once per
//! container.
//!
//! ## Deps
//!
//! Each reactive property owns a [`Dep`], and so does each observed container.
//! Reading a property inside a watcher evaluation subscribes the watcher to
//! the property's dep (and to the dep of the container it holds); writing a
//! different value notifies every subscriber.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter under the reactive context, so the deps it
//! reads are discovered automatically. Render and user watchers are queued
//! on the scheduler when notified; [`Computed`] values are lazy and only
//! re-evaluate when read.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded. Containers, deps and watchers are
//! `Rc`-shared with interior mutability, and deps hold their subscribers
//! weakly so that a dropped watcher disappears from every subscriber list.

mod computed;
mod context;
mod dep;
mod intercept;
mod mutate;
mod observer;
mod property;
mod subscriber;
mod traverse;
mod watcher;

pub use computed::Computed;
pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use intercept::{intercept, ArrayMethod, Comparator};
pub use mutate::{delete, set};
pub use observer::{
    define_reactive, observe, should_observe, toggle_observing, without_observing, DefineOptions, Observer,
};
pub use property::{CustomSetter, ReactiveProperty};
pub use subscriber::{Subscriber, WatcherId};
pub use traverse::traverse;
pub use watcher::{watch, Callback, Hook, Watcher, WatcherKind, WatcherOptions};
