//! Path normalization and resolution.

use crate::error::{ObserveError, Result};
use crate::types::{Key, Symbol};
use crate::value::{Object, Value};

/// Default separator for string paths.
pub const DEFAULT_SEPARATOR: &str = ".";

/// Joiner for internal path keys. Segments are length-prefixed, so a name
/// containing it cannot forge a boundary.
const INTERNAL_JOINER: char = '\u{1f}';

/// The accepted shapes of a path.
#[derive(Clone, Debug)]
pub enum PathSpec {
    /// Separator-delimited string.
    Text(String),
    Segments(Vec<Key>),
    /// A single opaque segment.
    Symbol(Symbol),
}

impl From<&str> for PathSpec {
    fn from(s: &str) -> Self {
        PathSpec::Text(s.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(s: String) -> Self {
        PathSpec::Text(s)
    }
}

impl From<Symbol> for PathSpec {
    fn from(sym: Symbol) -> Self {
        PathSpec::Symbol(sym)
    }
}

impl From<Key> for PathSpec {
    fn from(key: Key) -> Self {
        PathSpec::Segments(vec![key])
    }
}

impl From<Vec<Key>> for PathSpec {
    fn from(keys: Vec<Key>) -> Self {
        PathSpec::Segments(keys)
    }
}

impl From<&[Key]> for PathSpec {
    fn from(keys: &[Key]) -> Self {
        PathSpec::Segments(keys.to_vec())
    }
}

impl From<Vec<&str>> for PathSpec {
    fn from(parts: Vec<&str>) -> Self {
        PathSpec::Segments(parts.into_iter().map(Key::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathSpec {
    fn from(parts: [&str; N]) -> Self {
        PathSpec::Segments(parts.into_iter().map(Key::from).collect())
    }
}

/// Turn any accepted path shape into an ordered segment list.
///
/// An empty string is the empty path (the root itself).
pub fn normalize(spec: impl Into<PathSpec>, separator: &str) -> Vec<Key> {
    match spec.into() {
        PathSpec::Text(text) if text.is_empty() => Vec::new(),
        PathSpec::Text(text) if separator.is_empty() => vec![Key::Name(text)],
        PathSpec::Text(text) => text.split(separator).map(Key::from).collect(),
        PathSpec::Segments(keys) => keys,
        PathSpec::Symbol(sym) => vec![Key::Symbol(sym)],
    }
}

/// Options for [`resolve`] and [`set_from_path`].
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    /// Create missing intermediate containers.
    pub create: bool,
    /// Keys of alternate containers tried, in order, when a segment is
    /// missing at some level.
    pub fallbacks: Vec<Key>,
}

fn fallback_holding(container: &Object, key: &Key, fallbacks: &[Key]) -> Option<Object> {
    fallbacks.iter().find_map(|fallback| {
        let alternate = container.get(fallback.clone())?;
        let alternate = alternate.as_object()?;
        alternate.has(key.clone()).then(|| alternate.clone())
    })
}

fn step(container: &Object, key: &Key, options: &ResolveOptions) -> Option<Value> {
    if let Some(value) = container.get(key.clone()) {
        return Some(value);
    }
    if let Some(alternate) = fallback_holding(container, key, &options.fallbacks) {
        return alternate.get(key.clone());
    }
    if options.create {
        let created = Object::new();
        container.set(key.clone(), created.clone()).ok()?;
        return Some(Value::Object(created));
    }
    None
}

/// Resolve `segments` against `root`.
///
/// Missing segments yield `None`; the graph is only touched when
/// `options.create` is set.
pub fn resolve(root: &Value, segments: &[Key], options: &ResolveOptions) -> Option<Value> {
    let mut current = root.clone();
    for key in segments {
        let container = current.as_object()?.clone();
        current = step(&container, key, options)?;
    }
    Some(current)
}

/// Find the container and key that own the final segment.
///
/// The key need not exist yet; only its parent must resolve.
pub fn resolve_slot(root: &Value, segments: &[Key], options: &ResolveOptions) -> Option<(Object, Key)> {
    let (last, parents) = segments.split_last()?;
    let parent = resolve(root, parents, options)?;
    let container = parent.as_object()?.clone();
    if container.has(last.clone()) {
        return Some((container, last.clone()));
    }
    match fallback_holding(&container, last, &options.fallbacks) {
        Some(alternate) => Some((alternate, last.clone())),
        None => Some((container, last.clone())),
    }
}

/// Write `value` at `segments` through [`Object::set`].
pub fn set_from_path(
    root: &Value,
    segments: &[Key],
    value: Value,
    options: &ResolveOptions,
) -> Result<()> {
    let (container, key) = resolve_slot(root, segments, options)
        .ok_or_else(|| ObserveError::ReferenceMissing(public_path(segments, DEFAULT_SEPARATOR)))?;
    container.set(key, value)
}

/// Segments as seen by clients: symbols removed.
pub fn public_segments(segments: &[Key]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|k| k.as_name().map(str::to_string))
        .collect()
}

pub fn public_path(segments: &[Key], separator: &str) -> String {
    public_segments(segments).join(separator)
}

/// Collision-free key for pools and lookup tables.
pub(crate) fn path_key(segments: &[Key]) -> String {
    let mut key = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            key.push(INTERNAL_JOINER);
        }
        key.push_str(&segment.internal());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let inner = Object::new().with("leaf", 3);
        Value::from(Object::new().with("branch", inner).with("top", 1))
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(
            normalize("a.b.c", "."),
            vec![Key::from("a"), Key::from("b"), Key::from("c")]
        );
        assert_eq!(normalize("a/b", "/"), vec![Key::from("a"), Key::from("b")]);
        assert_eq!(normalize(["x", "y"], "."), vec![Key::from("x"), Key::from("y")]);
        assert!(normalize("", ".").is_empty());

        let sym = Symbol::new("only");
        assert_eq!(normalize(sym.clone(), "."), vec![Key::Symbol(sym)]);
    }

    #[test]
    fn test_resolve_nested_and_missing() {
        let root = sample();
        let found = resolve(&root, &normalize("branch.leaf", "."), &ResolveOptions::default());
        assert_eq!(found, Some(Value::Int(3)));

        let missing = resolve(&root, &normalize("branch.nope.deeper", "."), &ResolveOptions::default());
        assert!(missing.is_none());

        let through_leaf = resolve(&root, &normalize("top.more", "."), &ResolveOptions::default());
        assert!(through_leaf.is_none());
    }

    #[test]
    fn test_resolve_with_create_builds_containers() {
        let root = Value::from(Object::new());
        let options = ResolveOptions {
            create: true,
            ..Default::default()
        };
        set_from_path(&root, &normalize("a.b.c", "."), Value::from(9), &options).unwrap();

        let found = resolve(&root, &normalize("a.b.c", "."), &ResolveOptions::default());
        assert_eq!(found, Some(Value::Int(9)));
    }

    #[test]
    fn test_set_without_create_reports_missing_parent() {
        let root = Value::from(Object::new());
        let result = set_from_path(&root, &normalize("a.b", "."), Value::from(1), &ResolveOptions::default());
        assert!(matches!(result, Err(ObserveError::ReferenceMissing(_))));
    }

    #[test]
    fn test_fallback_containers() {
        let children = Object::new().with("child", 5);
        let root = Value::from(Object::new().with("__children", children.clone()));
        let options = ResolveOptions {
            fallbacks: vec![Key::from("__children")],
            ..Default::default()
        };

        let found = resolve(&root, &normalize("child", "."), &options);
        assert_eq!(found, Some(Value::Int(5)));

        let (owner, key) = resolve_slot(&root, &normalize("child", "."), &options).unwrap();
        assert!(owner.ptr_eq(&children));
        assert_eq!(key, Key::from("child"));
    }

    #[test]
    fn test_public_path_strips_symbols_but_keys_do_not() {
        let a = Symbol::new("s");
        let b = Symbol::new("s");
        let left = vec![Key::from("x"), Key::from(&a)];
        let right = vec![Key::from("x"), Key::from(&b)];

        assert_eq!(public_path(&left, "."), "x");
        assert_eq!(public_path(&left, "."), public_path(&right, "."));
        assert_ne!(path_key(&left), path_key(&right));
    }

    #[test]
    fn test_path_keys_are_injective() {
        let joined = format!("a{INTERNAL_JOINER}b");
        let one = vec![Key::from(joined.as_str())];
        let two = vec![Key::from("a"), Key::from("b")];
        assert_ne!(path_key(&one), path_key(&two));

        let sym = Symbol::new("s");
        let forged = Key::from(&sym).internal();
        assert_ne!(
            path_key(&[Key::from(forged.as_str())]),
            path_key(&[Key::from(&sym)])
        );
    }
}
