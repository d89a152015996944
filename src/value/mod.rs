//! Value model for observable graphs.
//!
//! Values form a closed tagged variant. Containers and functions are shared
//! handles compared by identity; everything else is compared by value.

mod function;
mod object;

pub use function::Function;
pub use object::{Descriptor, Getter, Object, ObjectKind, Setter, Slot};

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Host-owned value the engine never looks inside.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::as_ptr(&self.inner) as *const () == Arc::as_ptr(&other.inner) as *const ()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

/// Classification the graph walker and interceptors consult.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Keyed container.
    Composite,
    /// Indexed container.
    Array,
    Callable,
    Opaque,
    /// Null and primitives.
    Leaf,
}

/// A node in an observable graph.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Object(Object),
    Array(Object),
    Function(Function),
    Opaque(Opaque),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Object(_) => Kind::Composite,
            Value::Array(_) => Kind::Array,
            Value::Function(_) => Kind::Callable,
            Value::Opaque(_) => Kind::Opaque,
            _ => Kind::Leaf,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The container behind an object or array value.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) | Value::Array(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Build a value tree from JSON. Objects and arrays become fresh containers.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(Object::from_values(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(map) => Value::Object(Object::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Render as JSON. Functions, opaque values, non-finite floats and
    /// back-references in cycles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = HashSet::new();
        self.to_json_inner(&mut stack)
    }

    fn to_json_inner(&self, stack: &mut HashSet<usize>) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) | Value::Opaque(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(o) | Value::Array(o) => {
                if !stack.insert(o.id()) {
                    return serde_json::Value::Null;
                }
                let rendered = if o.is_array() {
                    serde_json::Value::Array(
                        o.entries()
                            .into_iter()
                            .map(|(_, v)| v.to_json_inner(stack))
                            .collect(),
                    )
                } else {
                    serde_json::Value::Object(
                        o.entries()
                            .into_iter()
                            .filter_map(|(k, v)| {
                                k.as_name().map(|name| (name.to_string(), v.to_json_inner(stack)))
                            })
                            .collect(),
                    )
                };
                stack.remove(&o.id());
                rendered
            }
        }
    }
}

/// Strict equality: primitives by value, shared handles by identity.
///
/// NaN equals NaN here so a sampled NaN does not report a change on every tick.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) | (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(o) | Value::Array(o) => write!(f, "{o:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Opaque(o) => write!(f, "{o:?}"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        match o.kind() {
            ObjectKind::Map => Value::Object(o),
            ObjectKind::Array => Value::Array(o),
        }
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}
