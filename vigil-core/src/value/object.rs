//! Objects
//!
//! An [`Object`] is an ordered map of own properties. Each property is either
//! plain data, a user accessor pair, or a reactive slot installed by the
//! observer. Property attributes (writable, enumerable, configurable) and
//! object extensibility follow the usual JavaScript rules, because reactive
//! conversion must respect them: a non-configurable property cannot be
//! intercepted and a non-extensible object cannot be observed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Value, WeakContainer};
use crate::reactive::{Dep, Observer, ReactiveProperty};

/// A user getter. Receives the object the property is read from.
pub type GetterFn = Rc<dyn Fn(&Object) -> Value>;

/// A user setter. Receives the object the property is written on.
pub type SetterFn = Rc<dyn Fn(&Object, Value)>;

/// One own property of an object.
#[derive(Clone)]
pub enum Property {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<GetterFn>,
        set: Option<SetterFn>,
        enumerable: bool,
        configurable: bool,
    },
    /// A reactive slot. Always enumerable.
    Reactive(Rc<ReactiveProperty>),
}

impl Property {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Property::Data {
            value: value.into(),
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// An enumerable, configurable accessor property.
    pub fn accessor(get: Option<GetterFn>, set: Option<SetterFn>) -> Self {
        Property::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            Property::Data { configurable, .. } | Property::Accessor { configurable, .. } => {
                *configurable
            }
            Property::Reactive(slot) => slot.is_configurable(),
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            Property::Data { enumerable, .. } | Property::Accessor { enumerable, .. } => *enumerable,
            Property::Reactive(_) => true,
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Property::Reactive(_))
    }

    fn seal(&mut self, make_read_only: bool) {
        match self {
            Property::Data {
                writable,
                configurable,
                ..
            } => {
                *configurable = false;
                if make_read_only {
                    *writable = false;
                }
            }
            Property::Accessor { configurable, .. } => *configurable = false,
            Property::Reactive(slot) => slot.mark_non_configurable(),
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => f
                .debug_struct("Data")
                .field("value", value)
                .field("writable", writable)
                .field("enumerable", enumerable)
                .field("configurable", configurable)
                .finish(),
            Property::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => f
                .debug_struct("Accessor")
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .field("enumerable", enumerable)
                .field("configurable", configurable)
                .finish(),
            Property::Reactive(slot) => f.debug_tuple("Reactive").field(&slot.dep().id()).finish(),
        }
    }
}

pub(crate) struct ObjectCell {
    props: RefCell<IndexMap<String, Property>>,
    extensible: Cell<bool>,
    observer: RefCell<Option<Observer>>,
}

/// A shared handle to an object.
#[derive(Clone)]
pub struct Object(Rc<ObjectCell>);

impl Object {
    pub fn new() -> Self {
        Self(Rc::new(ObjectCell {
            props: RefCell::new(IndexMap::new()),
            extensible: Cell::new(true),
            observer: RefCell::new(None),
        }))
    }

    /// Build an object with plain data properties, in iteration order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let object = Self::new();
        {
            let mut props = object.0.props.borrow_mut();
            for (key, value) in pairs {
                props.insert(key.into(), Property::data(value));
            }
        }
        object
    }

    pub(crate) fn from_cell(cell: Rc<ObjectCell>) -> Self {
        Self(cell)
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer::Object(Rc::downgrade(&self.0))
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property.
    ///
    /// Reading a reactive slot inside a watcher evaluation registers the
    /// watcher as a dependent of that slot. Missing keys read as undefined.
    pub fn get(&self, key: &str) -> Value {
        // Clone the property out so getters may re-enter this object.
        let property = self.0.props.borrow().get(key).cloned();
        match property {
            None => Value::Undefined,
            Some(Property::Data { value, .. }) => value,
            Some(Property::Accessor { get, .. }) => get.map_or(Value::Undefined, |get| get(self)),
            Some(Property::Reactive(slot)) => slot.get(self),
        }
    }

    /// Assign a property.
    ///
    /// Assigning a missing key creates a plain data property; it is not
    /// reactive (use [`crate::reactive::set`] for that). Writes that the
    /// property or object forbids are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let property = self.0.props.borrow().get(key).cloned();
        match property {
            Some(Property::Data { writable: true, .. }) => {
                if let Some(Property::Data { value: slot, .. }) = self.0.props.borrow_mut().get_mut(key) {
                    *slot = value;
                }
            }
            Some(Property::Data { .. }) | Some(Property::Accessor { set: None, .. }) => {}
            Some(Property::Accessor { set: Some(set), .. }) => set(self, value),
            Some(Property::Reactive(slot)) => slot.set(self, value),
            None => {
                if self.is_extensible() {
                    self.0.props.borrow_mut().insert(key.to_string(), Property::data(value));
                }
            }
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    pub(crate) fn has_own_enumerable(&self, key: &str) -> bool {
        self.0.props.borrow().get(key).is_some_and(Property::is_enumerable)
    }

    /// Enumerable own keys, in insertion order.
    ///
    /// On an observed object this depends on the whole-object dep, so an
    /// evaluation that enumerates keys sees keys added or removed through
    /// the reactive helpers.
    pub fn keys(&self) -> Vec<String> {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
        self.own_enumerable_keys()
    }

    pub(crate) fn own_enumerable_keys(&self) -> Vec<String> {
        self.0
            .props
            .borrow()
            .iter()
            .filter(|(_, property)| property.is_enumerable())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.props.borrow().is_empty()
    }

    /// The own property stored under `key`.
    pub fn property(&self, key: &str) -> Option<Property> {
        self.0.props.borrow().get(key).cloned()
    }

    /// Define or redefine an own property.
    ///
    /// Returns false, leaving the object untouched, when the existing
    /// property is non-configurable or the key is new and the object is not
    /// extensible.
    pub fn define_property(&self, key: &str, property: Property) -> bool {
        let mut props = self.0.props.borrow_mut();
        match props.get(key) {
            Some(existing) if !existing.is_configurable() => false,
            None if !self.0.extensible.get() => false,
            _ => {
                props.insert(key.to_string(), property);
                true
            }
        }
    }

    /// Remove an own property. Non-configurable properties stay.
    pub fn delete(&self, key: &str) -> bool {
        let mut props = self.0.props.borrow_mut();
        match props.get(key) {
            Some(property) if !property.is_configurable() => false,
            Some(_) => {
                props.shift_remove(key);
                true
            }
            None => true,
        }
    }

    pub fn prevent_extensions(&self) {
        self.0.extensible.set(false);
    }

    /// Make the object non-extensible and every property non-configurable
    /// and read-only. A frozen object is never observed.
    pub fn freeze(&self) {
        self.0.extensible.set(false);
        for property in self.0.props.borrow_mut().values_mut() {
            property.seal(true);
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.get()
    }

    pub fn is_frozen(&self) -> bool {
        !self.is_extensible()
            && self.0.props.borrow().values().all(|property| match property {
                Property::Data {
                    writable,
                    configurable,
                    ..
                } => !writable && !configurable,
                other => !other.is_configurable(),
            })
    }

    pub fn observer(&self) -> Option<Observer> {
        self.0.observer.borrow().clone()
    }

    pub(crate) fn attach_observer(&self, observer: Observer) {
        *self.0.observer.borrow_mut() = Some(observer);
    }

    /// The dep of the reactive slot under `key`, if the key is reactive.
    pub fn reactive_dep(&self, key: &str) -> Option<Dep> {
        match self.0.props.borrow().get(key) {
            Some(Property::Reactive(slot)) => Some(slot.dep().clone()),
            _ => None,
        }
    }

    pub fn is_reactive(&self, key: &str) -> bool {
        self.0.props.borrow().get(key).is_some_and(Property::is_reactive)
    }

    /// Install a property without attribute checks. The caller has checked.
    pub(crate) fn put_property(&self, key: &str, property: Property) {
        self.0.props.borrow_mut().insert(key.to_string(), property);
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("keys", &self.0.props.borrow().keys().collect::<Vec<_>>())
            .field("observed", &self.0.observer.borrow().is_some())
            .finish()
    }
}
