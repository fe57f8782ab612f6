//! Reactive Property
//!
//! A reactive property is the getter/setter pair installed on one
//! (object, key). It owns the dep for that slot, caches the value (unless a
//! user getter owns it), and remembers the observer of the value it currently
//! holds so that readers can also depend on that container.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{observe, Observer};
use crate::value::{Array, GetterFn, Object, SetterFn, Value};

/// Hook run before a changed value is stored.
pub type CustomSetter = Rc<dyn Fn()>;

pub struct ReactiveProperty {
    dep: Dep,
    value: RefCell<Value>,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    child: RefCell<Option<Observer>>,
    shallow: bool,
    custom_setter: Option<CustomSetter>,
    configurable: Cell<bool>,
}

impl ReactiveProperty {
    pub(crate) fn new(
        value: Value,
        getter: Option<GetterFn>,
        setter: Option<SetterFn>,
        shallow: bool,
        custom_setter: Option<CustomSetter>,
    ) -> Self {
        let child = if shallow { None } else { observe(&value, false) };
        Self {
            dep: Dep::new(),
            value: RefCell::new(value),
            getter,
            setter,
            child: RefCell::new(child),
            shallow,
            custom_setter,
            configurable: Cell::new(true),
        }
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Observer of the value currently held, if it is an observed container.
    pub fn child_observer(&self) -> Option<Observer> {
        self.child.borrow().clone()
    }

    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    pub(crate) fn is_configurable(&self) -> bool {
        self.configurable.get()
    }

    pub(crate) fn mark_non_configurable(&self) {
        self.configurable.set(false);
    }

    fn current(&self, object: &Object) -> Value {
        match &self.getter {
            Some(getter) => getter(object),
            None => self.value.borrow().clone(),
        }
    }

    pub(crate) fn get(&self, object: &Object) -> Value {
        let value = self.current(object);
        if ReactiveContext::is_active() {
            self.dep.depend();
            if let Some(child) = self.child_observer() {
                child.dep().depend();
                if let Value::Array(array) = &value {
                    depend_array(array, &mut HashSet::new());
                }
            }
        }
        value
    }

    pub(crate) fn set(&self, object: &Object, new_value: Value) {
        let old = self.current(object);
        if !Value::has_changed(&old, &new_value) {
            return;
        }
        if let Some(custom_setter) = &self.custom_setter {
            custom_setter();
        }
        // An accessor without a setter is read-only.
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }
        match &self.setter {
            Some(setter) => setter(object, new_value.clone()),
            None => *self.value.borrow_mut() = new_value.clone(),
        }
        let child = if self.shallow { None } else { observe(&new_value, false) };
        *self.child.borrow_mut() = child;
        self.dep.notify();
    }
}

/// Depend on every observed element of an array, recursing into nested
/// arrays.
///
/// Element reads through an array bypass per-property interception, so the
/// container-level dependency has to be propagated at read time.
fn depend_array(array: &Array, seen: &mut HashSet<usize>) {
    if !seen.insert(array.addr()) {
        return;
    }
    let items = array.snapshot();
    for item in &items {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = item {
            depend_array(nested, seen);
        }
    }
}
