//! Core types shared across the engine.

use crate::error::CallError;
use crate::value::{Function, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique key.
///
/// Two symbols are equal only if one is a clone of the other; the description
/// is informational.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: Some(Arc::from(description.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "Symbol({d})"),
            None => write!(f, "Symbol(#{})", self.id),
        }
    }
}

/// A single path segment: a property name or an opaque symbol.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Symbol(Symbol),
}

impl Key {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            Key::Symbol(_) => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Key::Symbol(_))
    }

    /// Internal form that keeps symbols distinct. Names are length-prefixed
    /// so no name can spell a symbol or a joined path.
    pub(crate) fn internal(&self) -> String {
        match self {
            Key::Name(name) => format!("n{}:{name}", name.len()),
            Key::Symbol(sym) => format!("s{}", sym.id),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{name:?}"),
            Key::Symbol(sym) => write!(f, "{sym:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Symbol(sym) => write!(f, "{sym:?}"),
        }
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

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Name(index.to_string())
    }
}

impl From<Symbol> for Key {
    fn from(sym: Symbol) -> Self {
        Key::Symbol(sym)
    }
}

impl From<&Symbol> for Key {
    fn from(sym: &Symbol) -> Self {
        Key::Symbol(sym.clone())
    }
}

/// Identifier a root is registered under.
pub type RootId = Key;

/// Opaque handle for one subscription.
///
/// Tokens are minted only by a listener registry, remember which registry
/// issued them, and are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token {
    registry: u64,
    seq: u64,
}

impl Token {
    pub(crate) fn new(registry: u64, seq: u64) -> Self {
        Self { registry, seq }
    }

    pub(crate) fn registry(&self) -> u64 {
        self.registry
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}:{})", self.registry, self.seq)
    }
}

/// How a subscription observes its path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Write hook on the owning slot.
    Setter,
    /// Forwarding wrapper around a callable slot.
    Function,
    /// Periodic re-reads by the sampler.
    Sampled,
    /// Events delivered by an attached inspectable.
    Deferred,
}

/// Shape of the path string handed to callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFormat {
    /// Includes the root id as the first segment.
    Absolute,
    /// Relative to the root.
    #[default]
    Relative,
}

/// Extra information requested by the update hook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoOptions {
    /// Measure the duration of intercepted function calls.
    pub performance: bool,
}

/// Context delivered with every notification.
///
/// `on_init` receives this with every field unset except `id`.
#[derive(Clone, Debug, Default)]
pub struct ActiveInfo {
    pub id: Option<RootId>,
    /// The original (unwrapped) function, for function interception.
    pub function: Option<Function>,
    pub arguments: Option<Vec<Value>>,
    pub info: InfoOptions,
    /// Call duration, when `info.performance` is set.
    pub performance: Option<Duration>,
    /// Error returned by the wrapped function, if any.
    pub error: Option<CallError>,
}

impl ActiveInfo {
    pub fn for_root(id: &RootId) -> Self {
        Self {
            id: Some(id.clone()),
            ..Default::default()
        }
    }
}

/// Notification callback: `(path, info, update)`.
pub type UpdateCallback = Arc<dyn Fn(&str, &ActiveInfo, &Value) + Send + Sync>;

/// Initialization callback: `(path, info)`.
pub type InitCallback = Arc<dyn Fn(&str, &ActiveInfo) + Send + Sync>;

/// Global update hook with the information it wants collected.
#[derive(Clone)]
pub struct UpdateHook {
    pub callback: UpdateCallback,
    pub info: InfoOptions,
}

impl UpdateHook {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str, &ActiveInfo, &Value) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            info: InfoOptions::default(),
        }
    }

    pub fn with_performance(mut self) -> Self {
        self.info.performance = true;
        self
    }
}

impl fmt::Debug for UpdateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHook").field("info", &self.info).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_unique() {
        let a = Symbol::new("same");
        let b = Symbol::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(Key::from(&a).internal(), Key::from(&b).internal());
    }

    #[test]
    fn test_names_never_spell_a_symbol() {
        let sym = Symbol::new("s");
        let spelled = [
            format!("@@symbol:{}", sym.id),
            format!("s{}", sym.id),
            Key::from(&sym).internal(),
        ];
        for name in spelled {
            assert_ne!(Key::from(name.as_str()).internal(), Key::from(&sym).internal());
        }
    }

    #[test]
    fn test_tokens_order_by_sequence() {
        let first = Token::new(7, 1);
        let second = Token::new(7, 2);
        assert!(first < second);
        assert_eq!(first.registry(), 7);
    }
}
