//! Deep traversal for deep watchers.

use std::collections::HashSet;

use crate::value::Value;

/// Read every nested value reachable from `value` so that the evaluating
/// watcher depends on all of it. Frozen containers are skipped, and each
/// container is visited once, so cyclic graphs terminate.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
}

fn visit(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Array(array) if !array.is_frozen() => {
            if !seen.insert(array.addr()) {
                return;
            }
            for item in array.to_vec() {
                visit(&item, seen);
            }
        }
        Value::Object(object) if !object.is_frozen() => {
            if !seen.insert(object.addr()) {
                return;
            }
            for key in object.keys() {
                visit(&object.get(&key), seen);
            }
        }
        _ => {}
    }
}
