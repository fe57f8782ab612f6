//! Array Interceptor
//!
//! The single shared table of the seven operations that change an array's
//! contents or length. Every [`Array`] mutator dispatches through
//! [`intercept`], which
//!
//! 1. applies the native operation,
//! 2. observes any newly inserted elements,
//! 3. notifies the array's whole-value dep once,
//! 4. returns the native result unchanged.
//!
//! Steps 2 and 3 only happen for observed arrays; an unobserved array behaves
//! exactly like a plain one.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::value::{Array, Value};

/// Comparator for [`ArrayMethod::Sort`].
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> Ordering>;

/// One of the seven tracked array operations, with its arguments.
#[derive(Clone)]
pub enum ArrayMethod {
    Push(Vec<Value>),
    Pop,
    Shift,
    Unshift(Vec<Value>),
    Splice {
        start: isize,
        delete_count: Option<usize>,
        items: Vec<Value>,
    },
    Sort(Option<Comparator>),
    Reverse,
}

impl ArrayMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ArrayMethod::Push(_) => "push",
            ArrayMethod::Pop => "pop",
            ArrayMethod::Shift => "shift",
            ArrayMethod::Unshift(_) => "unshift",
            ArrayMethod::Splice { .. } => "splice",
            ArrayMethod::Sort(_) => "sort",
            ArrayMethod::Reverse => "reverse",
        }
    }

    /// Result of the operation on an array that refuses mutation.
    fn refused(&self, array: &Array) -> Value {
        match self {
            ArrayMethod::Push(_) | ArrayMethod::Unshift(_) => Value::from(array.snapshot().len()),
            ArrayMethod::Pop | ArrayMethod::Shift => Value::Undefined,
            ArrayMethod::Splice { .. } => Value::Array(Array::new()),
            ArrayMethod::Sort(_) | ArrayMethod::Reverse => Value::Array(array.clone()),
        }
    }
}

impl fmt::Debug for ArrayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply a tracked operation to `array`.
pub fn intercept(array: &Array, method: ArrayMethod) -> Value {
    if array.is_frozen() {
        return method.refused(array);
    }
    let name = method.name();
    let (result, inserted) = apply_native(array, method);
    if let Some(observer) = array.observer() {
        if !inserted.is_empty() {
            observer.observe_array(&inserted);
        }
        tracing::trace!(method = name, inserted = inserted.len(), "array mutation");
        observer.dep().notify();
    }
    result
}

/// Run the operation without any reactive side effect.
///
/// Returns the operation's result and the elements it inserted.
fn apply_native(array: &Array, method: ArrayMethod) -> (Value, Vec<Value>) {
    match method {
        ArrayMethod::Push(items) => {
            let len = array.with_items_mut(|v| {
                v.extend(items.iter().cloned());
                v.len()
            });
            (Value::from(len), items)
        }
        ArrayMethod::Pop => (array.with_items_mut(Vec::pop).unwrap_or_default(), Vec::new()),
        ArrayMethod::Shift => {
            let removed = array.with_items_mut(|v| if v.is_empty() { None } else { Some(v.remove(0)) });
            (removed.unwrap_or_default(), Vec::new())
        }
        ArrayMethod::Unshift(items) => {
            let len = array.with_items_mut(|v| {
                v.splice(0..0, items.iter().cloned());
                v.len()
            });
            (Value::from(len), items)
        }
        ArrayMethod::Splice {
            start,
            delete_count,
            items,
        } => {
            let removed: Vec<Value> = array.with_items_mut(|v| {
                let (start, end) = splice_range(v.len(), start, delete_count);
                v.splice(start..end, items.iter().cloned()).collect()
            });
            (Value::Array(Array::from_vec(removed)), items)
        }
        ArrayMethod::Sort(comparator) => {
            // Sort a copy outside the borrow: the comparator may read the
            // array, and a panicking comparator must leave it untouched.
            let sorted = sort_values(array.snapshot(), comparator.as_deref());
            array.with_items_mut(|v| *v = sorted);
            (Value::Array(array.clone()), Vec::new())
        }
        ArrayMethod::Reverse => {
            array.with_items_mut(|v| v.reverse());
            (Value::Array(array.clone()), Vec::new())
        }
    }
}

/// Resolve splice arguments against `len`: a negative start counts from the
/// end, and both ends are clamped to the array.
fn splice_range(len: usize, start: isize, delete_count: Option<usize>) -> (usize, usize) {
    let start = if start < 0 {
        len.saturating_sub(start.unsigned_abs())
    } else {
        (start as usize).min(len)
    };
    let count = delete_count.unwrap_or(len - start).min(len - start);
    (start, start + count)
}

/// Stable sort with undefined elements moved to the end.
///
/// Without a comparator, elements are ordered by their string conversion.
fn sort_values(items: Vec<Value>, comparator: Option<&dyn Fn(&Value, &Value) -> Ordering>) -> Vec<Value> {
    let (mut defined, undefined): (Vec<Value>, Vec<Value>) =
        items.into_iter().partition(|item| !item.is_undefined());
    match comparator {
        Some(compare) => defined.sort_by(|a, b| compare(a, b)),
        None => defined.sort_by_cached_key(|item| item.to_string()),
    }
    defined.extend(undefined);
    defined
}
