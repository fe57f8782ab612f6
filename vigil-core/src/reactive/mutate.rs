//! Reactive Set / Delete
//!
//! Property interception only sees keys that existed when an object was
//! observed, and arrays only see their seven tracked operations. These two
//! helpers cover the remaining mutations: adding or removing an object key,
//! and replacing or removing an array element by index.
//!
//! Neither helper fails hard. A refused or questionable call is described by
//! the returned [`Diagnosed`] and also reported through the warning channel.

use crate::error::{Diagnosed, MutationKind, ReactiveError};
use crate::value::{Key, Value};

use super::observer::{define_reactive, DefineOptions};

/// Set `key` on `target`, making the property reactive if it is new.
///
/// Returns the value that was set.
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Diagnosed<Value> {
    let key = key.into();
    let value = value.into();
    match target {
        Value::Array(array) => match splice_start(&key) {
            Some((index, start)) => {
                if array.extend_to(index).is_err() {
                    let error = ReactiveError::ArrayAllocation { len: index + 1 };
                    return Diagnosed::flagged(value, error);
                }
                array.splice(start, Some(1), vec![value.clone()]);
                Diagnosed::clean(value)
            }
            None => Diagnosed::flagged(value, ReactiveError::InvalidKey { key: key.to_string() }),
        },
        Value::Object(object) => {
            let name = key.to_name();
            if object.has_own_enumerable(&name) {
                object.set(&name, value.clone());
                return Diagnosed::clean(value);
            }
            let observer = object.observer();
            if observer.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                return Diagnosed::flagged(
                    value,
                    ReactiveError::RootMutation {
                        operation: MutationKind::Set,
                        key: name,
                    },
                );
            }
            let Some(observer) = observer else {
                object.set(&name, value.clone());
                return Diagnosed::clean(value);
            };
            if define_reactive(object, &name, Some(value.clone()), DefineOptions::default()) {
                tracing::trace!(key = %name, "reactive key added");
                observer.dep().notify();
            }
            Diagnosed::clean(value)
        }
        other => Diagnosed::flagged(
            value,
            ReactiveError::InvalidTarget {
                operation: MutationKind::Set,
                target: other.to_string(),
            },
        ),
    }
}

/// Delete `key` from `target`, notifying dependents of the container.
pub fn delete(target: &Value, key: impl Into<Key>) -> Diagnosed<()> {
    let key = key.into();
    match target {
        Value::Array(array) => match splice_start(&key) {
            Some((_, start)) => {
                // Past the end this removes nothing but still notifies.
                array.splice(start, Some(1), Vec::new());
                Diagnosed::clean(())
            }
            None => Diagnosed::flagged((), ReactiveError::InvalidKey { key: key.to_string() }),
        },
        Value::Object(object) => {
            let name = key.to_name();
            let observer = object.observer();
            if observer.as_ref().is_some_and(|ob| ob.vm_count() > 0) {
                return Diagnosed::flagged(
                    (),
                    ReactiveError::RootMutation {
                        operation: MutationKind::Delete,
                        key: name,
                    },
                );
            }
            if !object.has_own_enumerable(&name) || !object.delete(&name) {
                return Diagnosed::clean(());
            }
            if let Some(observer) = observer {
                tracing::trace!(key = %name, "reactive key removed");
                observer.dep().notify();
            }
            Diagnosed::clean(())
        }
        other => Diagnosed::flagged(
            (),
            ReactiveError::InvalidTarget {
                operation: MutationKind::Delete,
                target: other.to_string(),
            },
        ),
    }
}

/// Arrays hold at most `u32::MAX` elements, so the last valid index is one less.
const MAX_ARRAY_LEN: usize = u32::MAX as usize;

/// Resolve `key` to an array index and its splice start.
fn splice_start(key: &Key) -> Option<(usize, isize)> {
    let index = key.array_index().filter(|&index| index < MAX_ARRAY_LEN)?;
    let start = isize::try_from(index).ok()?;
    Some((index, start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Watcher, WatcherOptions};
    use crate::value::{Array, Object};

    fn sync_watcher(getter: impl Fn() -> Value + 'static) -> Watcher {
        Watcher::render("test", move || Ok(getter()), WatcherOptions::default().sync())
    }

    #[test]
    fn set_on_primitive_is_diagnosed() {
        let outcome = set(&Value::from(3), "a", 1);
        assert!(matches!(
            outcome.diagnostic(),
            Some(ReactiveError::InvalidTarget {
                operation: MutationKind::Set,
                ..
            })
        ));
        assert_eq!(outcome.value, Value::from(1));

        let outcome = delete(&Value::Undefined, "a");
        assert!(matches!(outcome.diagnostic(), Some(ReactiveError::InvalidTarget { .. })));
    }

    #[test]
    fn set_new_key_is_tracked() {
        let object = Object::new();
        let target = Value::from(object.clone());
        let root = Object::from_pairs([("inner", target.clone())]);
        observe(&Value::from(root.clone()), false);

        // Reading through the parent slot depends on the child's whole dep.
        let watcher = sync_watcher(move || match root.get("inner") {
            Value::Object(inner) => inner.get("late"),
            _ => Value::Undefined,
        });
        assert_eq!(watcher.value(), Value::Undefined);

        assert!(set(&target, "late", 1).is_clean());
        assert!(object.is_reactive("late"));
        assert_eq!(watcher.value(), Value::from(1));

        object.set("late", 2);
        assert_eq!(watcher.value(), Value::from(2));
    }

    #[test]
    fn set_existing_key_uses_the_slot() {
        let object = Object::from_pairs([("a", 1)]);
        let target = Value::from(object.clone());
        observe(&target, false);
        let dep = object.reactive_dep("a").unwrap();

        set(&target, "a", 5);
        assert_eq!(object.get("a"), Value::from(5));
        assert_eq!(object.reactive_dep("a").unwrap().id(), dep.id());
    }

    #[test]
    fn set_on_unobserved_object_is_plain() {
        let object = Object::new();
        let outcome = set(&Value::from(object.clone()), "k", 1);
        assert!(outcome.is_clean());
        assert_eq!(object.get("k"), Value::from(1));
        assert!(!object.is_reactive("k"));
    }

    #[test]
    fn root_data_mutation_is_refused() {
        let object = Object::from_pairs([("a", 1)]);
        let target = Value::from(object.clone());
        observe(&target, true);

        let outcome = set(&target, "fresh", 1);
        assert!(matches!(outcome.diagnostic(), Some(ReactiveError::RootMutation { .. })));
        assert!(!object.has_own("fresh"));

        let outcome = delete(&target, "a");
        assert!(matches!(outcome.diagnostic(), Some(ReactiveError::RootMutation { .. })));
        assert!(object.has_own("a"));

        // Existing keys still go through their slot.
        assert!(set(&target, "a", 2).is_clean());
        assert_eq!(object.get("a"), Value::from(2));
    }

    #[test]
    fn delete_key_notifies_and_stops_tracking() {
        let object = Object::from_pairs([("a", 1), ("b", 2)]);
        let target = Value::from(object.clone());
        observe(&target, false);

        let reader = object.clone();
        let watcher = sync_watcher(move || Value::from(reader.keys().len()));
        assert_eq!(watcher.value(), Value::from(2));

        assert!(delete(&target, "a").is_clean());
        assert!(!object.has_own("a"));
        assert_eq!(watcher.value(), Value::from(1));
        assert_eq!(watcher.run_count(), 2);

        // Missing keys are a silent no-op.
        assert!(delete(&target, "missing").is_clean());
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn array_index_set_extends() {
        let array = Array::from_values([1]);
        let target = Value::from(array.clone());
        observe(&target, false);

        let reader = array.clone();
        let watcher = sync_watcher(move || Value::from(reader.len()));

        set(&target, 3, "x");
        assert_eq!(
            array.to_vec(),
            vec![Value::from(1), Value::Undefined, Value::Undefined, Value::from("x")]
        );
        assert_eq!(watcher.run_count(), 2);
    }

    #[test]
    fn array_index_beyond_length_limit_is_refused() {
        let array = Array::from_values([1, 2]);
        let target = Value::from(array.clone());
        observe(&target, false);

        let reader = array.clone();
        let watcher = sync_watcher(move || Value::from(reader.len()));

        for index in [MAX_ARRAY_LEN, 1 << 40, usize::MAX] {
            let outcome = set(&target, Key::Index(index), 9);
            assert!(matches!(outcome.diagnostic(), Some(ReactiveError::InvalidKey { .. })));
            assert!(matches!(
                delete(&target, Key::Index(index)).diagnostic(),
                Some(ReactiveError::InvalidKey { .. })
            ));
        }
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(watcher.run_count(), 1);
    }

    #[test]
    fn delete_past_the_end_still_notifies() {
        let array = Array::from_values([1, 2]);
        let target = Value::from(array.clone());
        observe(&target, false);

        let reader = array.clone();
        let watcher = sync_watcher(move || Value::from(reader.len()));

        assert!(delete(&target, 5).is_clean());
        assert_eq!(array.to_vec(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(watcher.run_count(), 2);

        assert!(delete(&target, 0).is_clean());
        assert_eq!(array.to_vec(), vec![Value::from(2)]);
        assert_eq!(watcher.run_count(), 3);
    }

    #[test]
    fn array_with_name_key_is_diagnosed() {
        let target = Value::from(Array::new());
        let outcome = set(&target, "length", 0);
        assert!(matches!(outcome.diagnostic(), Some(ReactiveError::InvalidKey { .. })));
        assert!(set(&target, "2", 0).is_clean());
    }
}
