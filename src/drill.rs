//! Recursive enumeration of composite values.

use crate::types::Key;
use crate::value::{Object, Value};
use std::collections::HashMap;

/// Identities of containers visited during one traversal.
///
/// Holds a handle to every visited node so addresses stay unique for the
/// lifetime of the traversal.
#[derive(Default)]
pub struct Visited {
    nodes: HashMap<usize, Object>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `object`; false if it was already seen.
    pub fn insert(&mut self, object: &Object) -> bool {
        if self.nodes.contains_key(&object.id()) {
            return false;
        }
        self.nodes.insert(object.id(), object.clone());
        true
    }

    pub fn contains(&self, object: &Object) -> bool {
        self.nodes.contains_key(&object.id())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DrillOptions {
    /// Descend into arrays instead of treating them as leaves.
    pub allow_arrays: bool,
}

/// What the walker reports for each child.
#[derive(Debug)]
pub struct DrillInfo<'a> {
    /// Path relative to the drill root, ending with this child's key.
    pub path: &'a [Key],
    /// True when the walker descends into this child next.
    pub pass: bool,
}

/// The container the walker may descend into, if any.
pub(crate) fn descendable<'a>(value: &'a Value, options: &DrillOptions) -> Option<&'a Object> {
    let object = match value {
        Value::Object(o) => o,
        Value::Array(o) if options.allow_arrays => o,
        _ => return None,
    };
    (!object.has_inspectable()).then_some(object)
}

/// Visit every enumerable named child of `value`, depth first.
///
/// Containers already in `visited` are reported as leaves (`pass == false`)
/// and not entered again, so cyclic graphs terminate.
pub fn drill<F>(value: &Value, visited: &mut Visited, options: &DrillOptions, visit: &mut F)
where
    F: FnMut(&Key, &Value, &DrillInfo<'_>),
{
    let Some(root) = value.as_object() else {
        return;
    };
    visited.insert(root);
    let mut path = Vec::new();
    walk(root, &mut path, visited, options, visit);
}

fn walk<F>(
    object: &Object,
    path: &mut Vec<Key>,
    visited: &mut Visited,
    options: &DrillOptions,
    visit: &mut F,
) where
    F: FnMut(&Key, &Value, &DrillInfo<'_>),
{
    for (key, child) in object.entries() {
        if key.is_symbol() {
            continue;
        }
        path.push(key.clone());

        let next = descendable(&child, options).filter(|o| visited.insert(o)).cloned();
        visit(
            &key,
            &child,
            &DrillInfo {
                path: path.as_slice(),
                pass: next.is_some(),
            },
        );
        if let Some(next) = next {
            walk(&next, path, visited, options, visit);
        }

        path.pop();
    }
}
