//! Change detection for sampled values.

use crate::value::{Object, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How the sampler decides that a value changed between two reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityPolicy {
    /// Primitives by value, containers and functions by identity.
    #[default]
    Strict,
    /// Structural comparison of containers. Snapshots are deep copies, so
    /// every sample costs a full traversal of the value.
    Deep,
}

impl EqualityPolicy {
    /// The value to remember as "last seen".
    pub fn snapshot(&self, value: &Value) -> Value {
        match self {
            EqualityPolicy::Strict => value.clone(),
            EqualityPolicy::Deep => deep_copy(value, &mut HashMap::new()),
        }
    }

    pub fn equal(&self, last: &Value, current: &Value) -> bool {
        match self {
            EqualityPolicy::Strict => last == current,
            EqualityPolicy::Deep => deep_equal(last, current),
        }
    }
}

fn deep_copy(value: &Value, memo: &mut HashMap<usize, Object>) -> Value {
    let Some(source) = value.as_object() else {
        return value.clone();
    };
    if let Some(copy) = memo.get(&source.id()) {
        return Value::from(copy.clone());
    }
    let copy = if source.is_array() {
        Object::array()
    } else {
        Object::new()
    };
    memo.insert(source.id(), copy.clone());
    for (key, child) in source.entries() {
        // A fresh plain object accepts every write.
        let _ = copy.set(key, deep_copy(&child, memo));
    }
    Value::from(copy)
}

/// Structural equality; cycles compare equal once their shapes line up.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    deep_equal_inner(a, b, &mut HashSet::new())
}

fn deep_equal_inner(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    let (left, right) = match (a, b) {
        (Value::Object(l), Value::Object(r)) | (Value::Array(l), Value::Array(r)) => (l, r),
        _ => return a == b,
    };
    if left.ptr_eq(right) || !seen.insert((left.id(), right.id())) {
        return true;
    }

    let left_entries = left.entries();
    let right_entries = right.entries();
    left_entries.len() == right_entries.len()
        && left_entries
            .iter()
            .zip(right_entries.iter())
            .all(|((lk, lv), (rk, rv))| lk == rk && deep_equal_inner(lv, rv, seen))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_uses_identity_for_containers() {
        let a = Object::new().with("x", 1);
        let b = Object::new().with("x", 1);
        let policy = EqualityPolicy::Strict;

        assert!(policy.equal(&Value::from(a.clone()), &Value::from(a)));
        assert!(!policy.equal(&Value::from(Object::new()), &Value::from(b)));
        assert!(policy.equal(&Value::from("s"), &Value::from("s")));
    }

    #[test]
    fn test_deep_detects_in_place_mutation() {
        let live = Object::new().with("x", 1);
        let policy = EqualityPolicy::Deep;
        let snapshot = policy.snapshot(&Value::from(live.clone()));

        assert!(policy.equal(&snapshot, &Value::from(live.clone())));
        live.set("x", 2).unwrap();
        assert!(!policy.equal(&snapshot, &Value::from(live)));
    }

    #[test]
    fn test_deep_handles_cycles() {
        let a = Object::new().with("id", 1);
        a.set("self", a.clone()).unwrap();
        let b = Object::new().with("id", 1);
        b.set("self", b.clone()).unwrap();

        assert!(deep_equal(&Value::from(a.clone()), &Value::from(b)));

        let copy = EqualityPolicy::Deep.snapshot(&Value::from(a.clone()));
        assert!(deep_equal(&copy, &Value::from(a)));
    }
}
