//! Dynamic Values
//!
//! Reactive conversion works over an arbitrary, mutable, possibly cyclic graph
//! of plain data. This module provides that data model: a [`Value`] is either
//! a primitive or a shared handle to a container ([`Object`] or [`Array`]).
//!
//! Containers have identity. Cloning a `Value::Object` clones the handle, not
//! the object, and two handles compare equal only if they point at the same
//! container. Primitives compare by value, with the usual IEEE exception that
//! NaN is not equal to itself.

mod array;
mod object;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub use array::Array;
pub use object::{GetterFn, Object, Property, SetterFn};

pub(crate) use array::ArrayCell;
pub(crate) use object::ObjectCell;

use crate::reactive::Observer;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Array(Array),
}

impl Value {
    /// Whether a slot holding `old` must notify when assigned `new`.
    ///
    /// Values are unchanged when strictly equal or when both are NaN.
    /// Structurally equal but distinct containers are a change.
    pub fn has_changed(old: &Value, new: &Value) -> bool {
        if old == new {
            return false;
        }
        !matches!((old, new), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Undefined or null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// The observer attached to this value, if it is an observed container.
    pub fn observer(&self) -> Option<Observer> {
        match self {
            Value::Object(object) => object.observer(),
            Value::Array(array) => array.observer(),
            _ => None,
        }
    }

    /// Address of the container, used as an identity key for cycle guards.
    pub(crate) fn container_addr(&self) -> Option<usize> {
        match self {
            Value::Object(object) => Some(object.addr()),
            Value::Array(array) => Some(array.addr()),
            _ => None,
        }
    }

    /// Build a fresh, unobserved value tree from JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::Array(Array::from_vec(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(Object::from_pairs(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Snapshot this value as JSON without registering dependencies.
    ///
    /// Undefined, NaN, infinities and back-references of cycles become null.
    /// Accessor properties are read through their getters.
    pub fn to_json(&self) -> serde_json::Value {
        let _untracked = crate::reactive::ReactiveContext::untracked();
        let mut path = Vec::new();
        self.to_json_inner(&mut path)
    }

    fn to_json_inner(&self, path: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::Value as Json;

        if let Some(addr) = self.container_addr() {
            if path.contains(&addr) {
                return Json::Null;
            }
            path.push(addr);
        }
        let json = match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Json::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(array) => Json::Array(
                array
                    .snapshot()
                    .iter()
                    .map(|item| item.to_json_inner(path))
                    .collect(),
            ),
            Value::Object(object) => Json::Object(
                object
                    .own_enumerable_keys()
                    .into_iter()
                    .map(|key| {
                        let value = object.get(&key).to_json_inner(path);
                        (key, value)
                    })
                    .collect(),
            ),
        };
        if self.is_container() {
            path.pop();
        }
        json
    }
}

/// Strict equality.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(object) => fmt::Debug::fmt(object, f),
            Value::Array(array) => fmt::Debug::fmt(array, f),
        }
    }
}

thread_local! {
    // Arrays currently being stringified; a cyclic array renders as empty.
    static JOINING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// `ToString` conversion, used by the default array sort.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Array(array) => {
                let addr = array.addr();
                let entered = JOINING.with(|j| {
                    let mut joining = j.borrow_mut();
                    if joining.contains(&addr) {
                        false
                    } else {
                        joining.push(addr);
                        true
                    }
                });
                if !entered {
                    return Ok(());
                }
                let mut result = Ok(());
                for (i, item) in array.snapshot().iter().enumerate() {
                    if i > 0 {
                        result = result.and_then(|_| f.write_str(","));
                    }
                    if !item.is_nullish() {
                        result = result.and_then(|_| write!(f, "{item}"));
                    }
                }
                JOINING.with(|j| j.borrow_mut().pop());
                result
            }
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else {
        write!(f, "{n}")
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A property key: an array index or a property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The array index this key denotes, if it is a valid one.
    ///
    /// Names qualify when they parse as a finite, non-negative integer.
    pub fn array_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => {
                let n: f64 = name.trim().parse().ok()?;
                (n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64)
                    .then_some(n as usize)
            }
        }
    }

    /// The property name this key denotes on an object.
    pub fn to_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        usize::try_from(i).map_or_else(|_| Key::Name(i.to_string()), Key::Index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// A non-owning reference to a container, held by its observer.
#[derive(Clone)]
pub(crate) enum WeakContainer {
    Object(Weak<ObjectCell>),
    Array(Weak<ArrayCell>),
}

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Value> {
        match self {
            WeakContainer::Object(weak) => weak.upgrade().map(|cell| Value::Object(Object::from_cell(cell))),
            WeakContainer::Array(weak) => weak.upgrade().map(|cell| Value::Array(Array::from_cell(cell))),
        }
    }
}
