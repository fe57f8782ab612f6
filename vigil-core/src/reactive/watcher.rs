//! Watcher Implementation
//!
//! A watcher is one reactive computation: a render pass, a computed value, or
//! a user watch expression with a callback.
//!
//! # How Watchers Work
//!
//! 1. `get()` evaluates the getter with the watcher on top of the reactive
//!    context. Every dep read during evaluation calls back into
//!    [`Watcher::add_dep`], which records it in `new_deps`.
//!
//! 2. After evaluation, `cleanup_deps()` swaps `new_deps` into `deps` and
//!    unsubscribes from any dep that was not read this time.
//!
//! 3. When a dep notifies, `update()` marks a lazy watcher dirty, runs a sync
//!    watcher immediately, and queues everything else on the scheduler.
//!
//! Deps hold watchers weakly. Dropping the last [`Watcher`] handle
//! unsubscribes it everywhere, as does an explicit [`Watcher::teardown`].

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::subscriber::{Subscriber, WatcherId};
use super::traverse::traverse;
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::scheduler;
use crate::value::Value;

/// A lifecycle hook attached to a watcher.
pub type Hook = Rc<dyn Fn()>;

/// Callback of a user watcher, invoked with `(new, old)`.
pub type Callback = Box<dyn Fn(&Value, &Value) -> Result<()>>;

type Getter = Box<dyn Fn() -> Result<Value>>;

/// What a watcher is for. Determines its flush priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    Render,
    Computed,
    User,
}

impl WatcherKind {
    /// Flush tier. Lower tiers run first.
    pub fn tier(self) -> u8 {
        match self {
            WatcherKind::User | WatcherKind::Computed => 0,
            WatcherKind::Render => 1,
        }
    }
}

#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Depend on every nested value of the result.
    pub deep: bool,
    /// Do not evaluate until asked; notifications only mark the watcher dirty.
    pub lazy: bool,
    /// Re-run synchronously on notification instead of queueing.
    pub sync: bool,
    /// Invoke the callback with the initial value.
    pub immediate: bool,
    /// Runs just before a queued re-run.
    pub before: Option<Hook>,
    /// Runs after the flush that re-ran this watcher completes.
    pub after_update: Option<Hook>,
}

impl WatcherOptions {
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn before(mut self, hook: impl Fn() + 'static) -> Self {
        self.before = Some(Rc::new(hook));
        self
    }

    pub fn after_update(mut self, hook: impl Fn() + 'static) -> Self {
        self.after_update = Some(Rc::new(hook));
        self
    }
}

struct WatcherInner {
    id: WatcherId,
    kind: WatcherKind,
    expression: String,
    this: Weak<WatcherInner>,

    getter: Getter,
    callback: Option<Callback>,

    deep: bool,
    lazy: bool,
    sync: bool,
    before: Option<Hook>,
    after_update: Option<Hook>,

    value: RefCell<Value>,
    dirty: Cell<bool>,
    active: Cell<bool>,

    deps: RefCell<SmallVec<[Dep; 4]>>,
    new_deps: RefCell<SmallVec<[Dep; 4]>>,
    dep_ids: RefCell<HashSet<DepId>>,
    new_dep_ids: RefCell<HashSet<DepId>>,

    /// Number of completed evaluations.
    run_count: Cell<usize>,
}

/// A shared handle to a watcher.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

impl Watcher {
    /// Create a watcher.
    ///
    /// Unless `options.lazy` is set, the getter runs immediately to collect
    /// the initial dependencies. A failing first evaluation is reported and
    /// leaves the value undefined.
    pub fn new<G>(
        kind: WatcherKind,
        expression: impl Into<String>,
        getter: G,
        callback: Option<Callback>,
        options: WatcherOptions,
    ) -> Self
    where
        G: Fn() -> Result<Value> + 'static,
    {
        let inner = Rc::new_cyclic(|this| WatcherInner {
            id: WatcherId::new(),
            kind,
            expression: expression.into(),
            this: this.clone(),
            getter: Box::new(getter),
            callback,
            deep: options.deep,
            lazy: options.lazy,
            sync: options.sync,
            before: options.before,
            after_update: options.after_update,
            value: RefCell::new(Value::Undefined),
            dirty: Cell::new(options.lazy),
            active: Cell::new(true),
            deps: RefCell::new(SmallVec::new()),
            new_deps: RefCell::new(SmallVec::new()),
            dep_ids: RefCell::new(HashSet::new()),
            new_dep_ids: RefCell::new(HashSet::new()),
            run_count: Cell::new(0),
        });
        let watcher = Self(inner);
        tracing::trace!(watcher = %watcher.id(), kind = ?kind, expression = %watcher.0.expression, "watcher created");

        if !watcher.0.lazy {
            match watcher.get() {
                Ok(value) => *watcher.0.value.borrow_mut() = value,
                Err(error) => config::report_error(&watcher.wrap_error(error)),
            }
        }
        watcher
    }

    /// Create a render watcher. Its getter is the render pass.
    pub fn render<G>(expression: impl Into<String>, getter: G, options: WatcherOptions) -> Self
    where
        G: Fn() -> Result<Value> + 'static,
    {
        Self::new(WatcherKind::Render, expression, getter, None, options)
    }

    pub fn id(&self) -> WatcherId {
        self.0.id
    }

    pub fn kind(&self) -> WatcherKind {
        self.0.kind
    }

    pub fn expression(&self) -> &str {
        &self.0.expression
    }

    /// The value produced by the last evaluation.
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn is_lazy(&self) -> bool {
        self.0.lazy
    }

    /// Number of deps this watcher is subscribed to.
    pub fn dep_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Flush ordering key: tier first, then creation order.
    pub fn sort_key(&self) -> (u8, WatcherId) {
        (self.0.kind.tier(), self.0.id)
    }

    /// Evaluate the getter and re-collect dependencies.
    pub fn get(&self) -> Result<Value> {
        let result = {
            let _ctx = ReactiveContext::enter(self.clone());
            let result = (self.0.getter)();
            if self.0.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();
        self.0.run_count.set(self.0.run_count.get() + 1);
        result
    }

    /// Record a dep read during the current evaluation.
    pub fn add_dep(&self, dep: &Dep) {
        let inner = &self.0;
        if !inner.active.get() {
            return;
        }
        let id = dep.id();
        if !inner.new_dep_ids.borrow_mut().insert(id) {
            return;
        }
        inner.new_deps.borrow_mut().push(dep.clone());
        if !inner.dep_ids.borrow().contains(&id) {
            let weak: Weak<dyn Subscriber> = inner.this.clone();
            dep.add_sub(inner.id, weak);
        }
    }

    /// Swap the freshly collected deps in and unsubscribe from stale ones.
    pub(crate) fn cleanup_deps(&self) {
        let inner = &self.0;
        let new_ids = inner.new_dep_ids.take();
        let new_deps = inner.new_deps.take();
        let old_deps = inner.deps.replace(new_deps);

        if !inner.active.get() {
            // Torn down mid-evaluation.
            for dep in old_deps.iter().chain(inner.deps.take().iter()) {
                dep.remove_sub(inner.id);
            }
            inner.dep_ids.borrow_mut().clear();
            return;
        }

        for dep in &old_deps {
            if !new_ids.contains(&dep.id()) {
                dep.remove_sub(inner.id);
            }
        }
        *inner.dep_ids.borrow_mut() = new_ids;
    }

    /// React to a dependency change.
    pub fn update(&self) {
        if !self.0.active.get() {
            return;
        }
        if self.0.lazy {
            self.0.dirty.set(true);
        } else if self.0.sync {
            if let Err(error) = self.run() {
                config::report_error(&self.wrap_error(error));
            }
        } else {
            scheduler::queue_watcher(self.clone());
        }
    }

    /// Re-evaluate and invoke the callback when the value changed.
    ///
    /// Container values and deep watchers always count as changed, since
    /// their contents may differ behind an unchanged identity.
    pub fn run(&self) -> Result<()> {
        if !self.0.active.get() {
            return Ok(());
        }
        let value = self.get()?;
        let changed = value != *self.0.value.borrow() || value.is_container() || self.0.deep;
        if changed {
            let old = self.0.value.replace(value.clone());
            if let Some(callback) = &self.0.callback {
                callback(&value, &old)?;
            }
        }
        Ok(())
    }

    /// Evaluate a lazy watcher and clear its dirty flag.
    pub fn evaluate(&self) -> Result<()> {
        let value = self.get()?;
        *self.0.value.borrow_mut() = value;
        self.0.dirty.set(false);
        Ok(())
    }

    /// Make the currently evaluating watcher depend on every dep of this one.
    pub fn depend(&self) {
        let deps = self.0.deps.borrow().clone();
        for dep in &deps {
            dep.depend();
        }
    }

    /// Unsubscribe from every dep. The watcher never runs again.
    pub fn teardown(&self) {
        let inner = &self.0;
        if !inner.active.replace(false) {
            return;
        }
        let deps = inner.deps.take();
        let new_deps = inner.new_deps.take();
        for dep in deps.iter().chain(new_deps.iter()) {
            dep.remove_sub(inner.id);
        }
        inner.dep_ids.borrow_mut().clear();
        inner.new_dep_ids.borrow_mut().clear();
        tracing::debug!(watcher = %inner.id, expression = %inner.expression, "watcher torn down");
    }

    pub(crate) fn call_before(&self) {
        if let Some(hook) = &self.0.before {
            hook();
        }
    }

    pub(crate) fn call_after_update(&self) {
        if let Some(hook) = &self.0.after_update {
            hook();
        }
    }

    pub(crate) fn wrap_error(&self, source: ReactiveError) -> ReactiveError {
        ReactiveError::WatcherEvaluation {
            id: self.0.id,
            expression: self.0.expression.clone(),
            source: Box::new(source),
        }
    }
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> WatcherId {
        self.id
    }

    fn update(&self) {
        if let Some(inner) = self.this.upgrade() {
            Watcher(inner).update();
        }
    }
}

impl Drop for WatcherInner {
    fn drop(&mut self) {
        for dep in self.deps.get_mut().iter().chain(self.new_deps.get_mut().iter()) {
            dep.remove_sub(self.id);
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("expression", &self.0.expression)
            .field("dirty", &self.0.dirty.get())
            .field("active", &self.0.active.get())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// Watch `getter` and invoke `callback(new, old)` whenever its value changes.
///
/// With `options.immediate`, the callback also runs once right away with the
/// initial value and an undefined old value. That call collects no
/// dependencies.
pub fn watch<G, C>(expression: impl Into<String>, getter: G, callback: C, options: WatcherOptions) -> Watcher
where
    G: Fn() -> Result<Value> + 'static,
    C: Fn(&Value, &Value) -> Result<()> + 'static,
{
    let immediate = options.immediate;
    let watcher = Watcher::new(WatcherKind::User, expression, getter, Some(Box::new(callback)), options);
    if immediate {
        let _quiet = ReactiveContext::untracked();
        if let Some(callback) = &watcher.0.callback {
            if let Err(error) = callback(&watcher.value(), &Value::Undefined) {
                config::report_error(&watcher.wrap_error(error));
            }
        }
    }
    watcher
}
