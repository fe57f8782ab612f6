//! Observer
//!
//! An [`Observer`] is attached to each observed container. Once attached, it
//! converts the object's keys into reactive properties, or observes the
//! elements of an array, and owns the dep that signals whole-container
//! changes (a key added or removed, an array mutated).
//!
//! The observer is carried by the container itself, so observing the same
//! container twice returns the same observer and cyclic graphs terminate:
//! the observer is attached before the walk descends into children.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::dep::Dep;
use super::property::{CustomSetter, ReactiveProperty};
use crate::value::{Array, GetterFn, Object, Property, SetterFn, Value, WeakContainer};

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable automatic observation of new values.
///
/// While disabled, [`observe`] only returns observers that already exist.
/// Used when merging pre-existing data that must stay plain.
pub fn toggle_observing(value: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(value));
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Run `f` with observation disabled, restoring the previous setting after.
pub fn without_observing<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            toggle_observing(self.0);
        }
    }

    let _restore = Restore(should_observe());
    toggle_observing(false);
    f()
}

struct ObserverInner {
    dep: Dep,
    vm_count: Cell<u32>,
    target: WeakContainer,
}

/// Per-container reactive state.
#[derive(Clone)]
pub struct Observer(Rc<ObserverInner>);

impl Observer {
    fn new(target: WeakContainer) -> Self {
        Self(Rc::new(ObserverInner {
            dep: Dep::new(),
            vm_count: Cell::new(0),
            target,
        }))
    }

    fn attach_object(object: &Object) -> Self {
        let observer = Self::new(object.downgrade());
        object.attach_observer(observer.clone());
        observer.walk(object);
        observer
    }

    fn attach_array(array: &Array) -> Self {
        let observer = Self::new(array.downgrade());
        array.attach_observer(observer.clone());
        observer.observe_array(&array.snapshot());
        observer
    }

    /// The whole-container dep.
    pub fn dep(&self) -> &Dep {
        &self.0.dep
    }

    /// How many components use this container as their root data.
    pub fn vm_count(&self) -> u32 {
        self.0.vm_count.get()
    }

    /// The observed container, while it is alive.
    pub fn value(&self) -> Option<Value> {
        self.0.target.upgrade()
    }

    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Convert every enumerable own property into a reactive property.
    pub fn walk(&self, object: &Object) {
        for key in object.own_enumerable_keys() {
            define_reactive(object, &key, None, DefineOptions::default());
        }
    }

    /// Observe each item.
    pub fn observe_array(&self, items: &[Value]) {
        for item in items {
            observe(item, false);
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", &self.0.dep)
            .field("vm_count", &self.0.vm_count.get())
            .finish()
    }
}

/// Attempt to observe a value.
///
/// Returns the existing observer when the value already has one, a new one
/// when the value is an extensible container and observation is enabled,
/// and `None` otherwise. Non-extensible containers are skipped silently and
/// stay plain data. `as_root` marks the container as a component's root
/// data.
pub fn observe(value: &Value, as_root: bool) -> Option<Observer> {
    let observer = match value {
        Value::Object(object) => match object.observer() {
            Some(existing) => existing,
            None if should_observe() && object.is_extensible() => Observer::attach_object(object),
            None => return None,
        },
        Value::Array(array) => match array.observer() {
            Some(existing) => existing,
            None if should_observe() && array.is_extensible() => Observer::attach_array(array),
            None => return None,
        },
        _ => return None,
    };
    if as_root {
        observer.0.vm_count.set(observer.0.vm_count.get() + 1);
    }
    Some(observer)
}

/// Options for [`define_reactive`].
#[derive(Clone, Default)]
pub struct DefineOptions {
    /// Do not observe the value held by the slot.
    pub shallow: bool,
    /// Run before a changed value is stored.
    pub custom_setter: Option<CustomSetter>,
}

impl DefineOptions {
    pub fn shallow() -> Self {
        Self {
            shallow: true,
            custom_setter: None,
        }
    }

    pub fn with_custom_setter(mut self, hook: impl Fn() + 'static) -> Self {
        self.custom_setter = Some(Rc::new(hook));
        self
    }
}

/// Install a reactive property for `key` on `object`.
///
/// A non-configurable property cannot be intercepted and is left as is, as
/// is a new key on a non-extensible object. A pre-existing accessor pair is
/// kept: the reactive slot delegates to it. When `value` is `None` the
/// current value is used, except for getter-only accessors, which are not
/// read eagerly.
///
/// Returns whether a reactive property was installed.
pub fn define_reactive(object: &Object, key: &str, value: Option<Value>, options: DefineOptions) -> bool {
    let existing = object.property(key);
    match &existing {
        Some(property) if !property.is_configurable() => return false,
        None if !object.is_extensible() => return false,
        _ => {}
    }

    let (getter, setter): (Option<GetterFn>, Option<SetterFn>) = match &existing {
        Some(Property::Accessor { get, set, .. }) => (get.clone(), set.clone()),
        Some(Property::Reactive(slot)) => {
            let read = slot.clone();
            let write = slot.clone();
            (
                Some(Rc::new(move |object: &Object| read.get(object))),
                Some(Rc::new(move |object: &Object, value| write.set(object, value))),
            )
        }
        _ => (None, None),
    };

    let value = match (value, &existing) {
        (Some(value), _) => value,
        (None, Some(Property::Data { value, .. })) => value.clone(),
        (None, Some(_)) if getter.is_none() || setter.is_some() => object.get(key),
        (None, _) => Value::Undefined,
    };

    let slot = ReactiveProperty::new(value, getter, setter, options.shallow, options.custom_setter);
    object.put_property(key, Property::Reactive(Rc::new(slot)));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Watcher, WatcherOptions};
    use std::cell::RefCell;

    fn reader(object: &Object, key: &'static str) -> Watcher {
        let object = object.clone();
        Watcher::render(key, move || Ok(object.get(key)), WatcherOptions::default().sync())
    }

    #[test]
    fn observe_is_idempotent() {
        let value = Value::from(Object::from_pairs([("a", 1)]));
        let first = observe(&value, false).unwrap();
        let second = observe(&value, false).unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn primitives_are_not_observed() {
        assert!(observe(&Value::from(1), false).is_none());
        assert!(observe(&Value::from("s"), false).is_none());
        assert!(observe(&Value::Null, false).is_none());
    }

    #[test]
    fn walk_converts_nested_containers() {
        let inner = Object::from_pairs([("x", 1)]);
        let list = Array::from_values([Value::from(Object::new())]);
        let outer = Object::from_pairs([("inner", Value::from(inner.clone())), ("list", Value::from(list.clone()))]);

        observe(&Value::from(outer.clone()), false);

        assert!(outer.is_reactive("inner"));
        assert!(inner.is_reactive("x"));
        assert!(list.observer().is_some());
        assert!(list.get(0).observer().is_some());
    }

    #[test]
    fn cyclic_graph_terminates() {
        let a = Object::new();
        let b = Object::from_pairs([("a", Value::from(a.clone()))]);
        a.set("b", b.clone());

        let observer = observe(&Value::from(a.clone()), false).unwrap();
        assert!(b.observer().is_some());
        assert!(a.get("b").as_object().unwrap().get("a").observer().unwrap().ptr_eq(&observer));
    }

    #[test]
    fn frozen_object_stays_plain() {
        let object = Object::from_pairs([("a", 1)]);
        object.freeze();
        assert!(observe(&Value::from(object.clone()), false).is_none());
        assert!(!object.is_reactive("a"));
        assert_eq!(object.get("a"), Value::from(1));
    }

    #[test]
    fn toggle_suppresses_new_observers() {
        let object = Object::from_pairs([("a", 1)]);
        let result = without_observing(|| observe(&Value::from(object.clone()), false));
        assert!(result.is_none());
        assert!(should_observe());
        assert!(observe(&Value::from(object), false).is_some());
    }

    #[test]
    fn root_usage_is_counted() {
        let value = Value::from(Object::new());
        observe(&value, true);
        let observer = observe(&value, true).unwrap();
        assert_eq!(observer.vm_count(), 2);
    }

    #[test]
    fn non_configurable_property_is_skipped() {
        let object = Object::new();
        object.define_property(
            "fixed",
            Property::Data {
                value: Value::from(1),
                writable: true,
                enumerable: true,
                configurable: false,
            },
        );
        assert!(!define_reactive(&object, "fixed", None, DefineOptions::default()));
        assert!(!object.is_reactive("fixed"));

        observe(&Value::from(object.clone()), false);
        assert!(!object.is_reactive("fixed"));
        object.set("fixed", 2);
        assert_eq!(object.get("fixed"), Value::from(2));
    }

    #[test]
    fn existing_accessor_is_preserved() {
        let backing = Rc::new(RefCell::new(Value::from(1)));
        let read = backing.clone();
        let write = backing.clone();
        let object = Object::new();
        object.define_property(
            "n",
            Property::accessor(
                Some(Rc::new(move |_: &Object| read.borrow().clone())),
                Some(Rc::new(move |_: &Object, v: Value| *write.borrow_mut() = v)),
            ),
        );
        observe(&Value::from(object.clone()), false);
        assert!(object.is_reactive("n"));

        let watcher = reader(&object, "n");
        assert_eq!(watcher.value(), Value::from(1));

        object.set("n", 5);
        assert_eq!(*backing.borrow(), Value::from(5));
        assert_eq!(watcher.value(), Value::from(5));
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn getter_only_accessor_is_read_only() {
        let object = Object::new();
        object.define_property("constant", Property::accessor(Some(Rc::new(|_: &Object| Value::from(7))), None));
        observe(&Value::from(object.clone()), false);

        let watcher = reader(&object, "constant");
        object.set("constant", 8);
        assert_eq!(object.get("constant"), Value::from(7));
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn custom_setter_runs_on_change() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let object = Object::new();
        define_reactive(
            &object,
            "prop",
            Some(Value::from(1)),
            DefineOptions::default().with_custom_setter(move || counter.set(counter.get() + 1)),
        );

        object.set("prop", 1);
        assert_eq!(calls.get(), 0);
        object.set("prop", 2);
        assert_eq!(calls.get(), 1);
        assert_eq!(object.get("prop"), Value::from(2));
    }

    #[test]
    fn shallow_slot_does_not_observe_value() {
        let inner = Object::from_pairs([("x", 1)]);
        let object = Object::new();
        define_reactive(&object, "inner", Some(Value::from(inner.clone())), DefineOptions::shallow());
        assert!(object.is_reactive("inner"));
        assert!(inner.observer().is_none());
    }

    #[test]
    fn assigned_container_is_observed() {
        let object = Object::from_pairs([("slot", Value::Null)]);
        observe(&Value::from(object.clone()), false);

        let fresh = Object::from_pairs([("y", 2)]);
        object.set("slot", fresh.clone());
        assert!(fresh.observer().is_some());
        assert!(fresh.is_reactive("y"));
    }
}
