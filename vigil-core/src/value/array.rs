//! Arrays
//!
//! Element reads and writes through an array cannot be intercepted per slot
//! the way object properties can. [`Array`] is therefore a tracked
//! collection: its only mutators are the seven audited operations, each of
//! which is routed through the array interceptor so that an observed array
//! always notifies its dependents. There is no untracked index assignment;
//! use [`crate::reactive::set`] to replace an element.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt;
use std::rc::Rc;

use super::{Value, WeakContainer};
use crate::reactive::{intercept, ArrayMethod, Observer};

pub(crate) struct ArrayCell {
    items: RefCell<Vec<Value>>,
    frozen: Cell<bool>,
    observer: RefCell<Option<Observer>>,
}

/// A shared handle to an array.
#[derive(Clone)]
pub struct Array(Rc<ArrayCell>);

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayCell {
            items: RefCell::new(items),
            frozen: Cell::new(false),
            observer: RefCell::new(None),
        }))
    }

    pub fn from_values<T, I>(values: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        Self::from_vec(values.into_iter().map(Into::into).collect())
    }

    pub(crate) fn from_cell(cell: Rc<ArrayCell>) -> Self {
        Self(cell)
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer::Array(Rc::downgrade(&self.0))
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ------------------------------------------------------------------
    // Tracked reads
    // ------------------------------------------------------------------

    fn track(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }

    /// The element at `index`, or undefined when out of range.
    pub fn get(&self, index: usize) -> Value {
        self.track();
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.track();
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track();
        self.snapshot()
    }

    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Tracked mutation
    // ------------------------------------------------------------------

    /// Dispatch one of the seven tracked operations.
    pub fn apply(&self, method: ArrayMethod) -> Value {
        intercept(self, method)
    }

    /// Append an element; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        length_of(self.apply(ArrayMethod::Push(vec![value.into()])))
    }

    /// Append several elements in one operation; returns the new length.
    pub fn push_all(&self, values: Vec<Value>) -> usize {
        length_of(self.apply(ArrayMethod::Push(values)))
    }

    /// Remove the last element.
    pub fn pop(&self) -> Value {
        self.apply(ArrayMethod::Pop)
    }

    /// Remove the first element.
    pub fn shift(&self) -> Value {
        self.apply(ArrayMethod::Shift)
    }

    /// Insert an element at the front; returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        length_of(self.apply(ArrayMethod::Unshift(vec![value.into()])))
    }

    /// Remove `delete_count` elements at `start` (all remaining when `None`)
    /// and insert `items` in their place. A negative `start` counts from the
    /// end. Returns the removed elements.
    pub fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Array {
        match self.apply(ArrayMethod::Splice {
            start,
            delete_count,
            items,
        }) {
            Value::Array(removed) => removed,
            _ => Array::new(),
        }
    }

    /// Sort by string conversion, undefined last.
    pub fn sort(&self) -> &Self {
        self.apply(ArrayMethod::Sort(None));
        self
    }

    /// Sort with a comparator, undefined last.
    pub fn sort_by<F>(&self, compare: F) -> &Self
    where
        F: Fn(&Value, &Value) -> Ordering + 'static,
    {
        self.apply(ArrayMethod::Sort(Some(Rc::new(compare))));
        self
    }

    pub fn reverse(&self) -> &Self {
        self.apply(ArrayMethod::Reverse);
        self
    }

    pub(crate) fn with_items_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        f(&mut self.0.items.borrow_mut())
    }

    /// Grow to at least `len` elements, padding with undefined. Not tracked.
    pub(crate) fn extend_to(&self, len: usize) -> Result<(), TryReserveError> {
        self.with_items_mut(|items| {
            if items.len() < len {
                items.try_reserve(len - items.len())?;
                items.resize(len, Value::Undefined);
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Extensibility
    // ------------------------------------------------------------------

    /// Freeze the array. A frozen array is never observed and its mutators
    /// leave it untouched.
    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub fn is_extensible(&self) -> bool {
        !self.is_frozen()
    }

    pub fn observer(&self) -> Option<Observer> {
        self.0.observer.borrow().clone()
    }

    pub(crate) fn attach_observer(&self, observer: Observer) {
        *self.0.observer.borrow_mut() = Some(observer);
    }
}

fn length_of(result: Value) -> usize {
    result.as_number().map_or(0, |n| n as usize)
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.0.items.borrow().len())
            .field("observed", &self.0.observer.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(array: &Array) -> Vec<f64> {
        array.to_vec().iter().filter_map(Value::as_number).collect()
    }

    #[test]
    fn unobserved_mutators_behave_natively() {
        let array = Array::from_values([3, 1, 2]);
        assert_eq!(array.push(4), 4);
        assert_eq!(array.unshift(0), 5);
        assert_eq!(numbers(&array), vec![0.0, 3.0, 1.0, 2.0, 4.0]);

        assert_eq!(array.pop(), Value::from(4));
        assert_eq!(array.shift(), Value::from(0));
        array.sort();
        assert_eq!(numbers(&array), vec![1.0, 2.0, 3.0]);
        array.reverse();
        assert_eq!(numbers(&array), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn pop_and_shift_on_empty_are_undefined() {
        let array = Array::new();
        assert_eq!(array.pop(), Value::Undefined);
        assert_eq!(array.shift(), Value::Undefined);
        assert!(array.is_empty());
    }

    #[test]
    fn frozen_array_ignores_mutation() {
        let array = Array::from_values([1, 2]);
        array.freeze();
        assert_eq!(array.push(3), 2);
        assert_eq!(array.pop(), Value::Undefined);
        assert!(array.splice(0, None, vec![]).is_empty());
        assert_eq!(numbers(&array), vec![1.0, 2.0]);
    }

    #[test]
    fn get_out_of_range_is_undefined() {
        let array = Array::from_values(["a"]);
        assert_eq!(array.get(0), Value::from("a"));
        assert_eq!(array.get(5), Value::Undefined);
    }
}
