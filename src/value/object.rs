//! Observable containers.
//!
//! An [`Object`] is a shared, ordered set of slots. Every read and write goes
//! through its accessor methods, which is what lets the engine attach write
//! hooks without the holder's code changing.

use super::{Function, Value};
use crate::error::{ObserveError, Result};
use crate::intercept::Inspectable;
use crate::types::Key;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Getter half of an accessor slot.
pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// Setter half of an accessor slot.
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// Runs after a successful write through [`Object::set`].
pub(crate) type WriteHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// Storage behind a slot.
#[derive(Clone)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
}

/// Full description of a slot.
#[derive(Clone)]
pub struct Descriptor {
    pub slot: Slot,
    pub configurable: bool,
    pub enumerable: bool,
}

impl Descriptor {
    /// Plain writable, configurable, enumerable value.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data {
                value: value.into(),
                writable: true,
            },
            configurable: true,
            enumerable: true,
        }
    }

    /// Accessor slot backed by the given getter and optional setter.
    pub fn accessor(get: Getter, set: Option<Setter>) -> Self {
        Self {
            slot: Slot::Accessor { get: Some(get), set },
            configurable: true,
            enumerable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        if let Slot::Data { writable, .. } = &mut self.slot {
            *writable = false;
        }
        self
    }

    pub fn non_configurable(mut self) -> Self {
        self.configurable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.enumerable = false;
        self
    }

    /// The stored value, for data slots.
    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data { value, .. } => Some(value),
            Slot::Accessor { .. } => None,
        }
    }

    /// Whether a write through [`Object::set`] can succeed.
    pub fn accepts_writes(&self) -> bool {
        match &self.slot {
            Slot::Data { writable, .. } => *writable,
            Slot::Accessor { set, .. } => set.is_some(),
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.slot, Slot::Accessor { .. })
    }
}

fn same_arc<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const (),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        let slots_match = match (&self.slot, &other.slot) {
            (
                Slot::Data {
                    value: a,
                    writable: wa,
                },
                Slot::Data {
                    value: b,
                    writable: wb,
                },
            ) => a == b && wa == wb,
            (
                Slot::Accessor { get: ga, set: sa },
                Slot::Accessor { get: gb, set: sb },
            ) => same_arc(ga, gb) && same_arc(sa, sb),
            _ => false,
        };
        slots_match && self.configurable == other.configurable && self.enumerable == other.enumerable
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Descriptor");
        match &self.slot {
            Slot::Data { value, writable } => {
                s.field("value", value).field("writable", writable);
            }
            Slot::Accessor { get, set } => {
                s.field("get", &get.is_some()).field("set", &set.is_some());
            }
        }
        s.field("configurable", &self.configurable)
            .field("enumerable", &self.enumerable)
            .finish()
    }
}

/// Whether an object behaves as a keyed map or an indexed array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Map,
    Array,
}

struct ObjectData {
    kind: ObjectKind,
    /// Insertion order of `slots`.
    order: Vec<Key>,
    slots: HashMap<Key, Descriptor>,
    hooks: HashMap<Key, WriteHook>,
    inspectable: Option<Arc<dyn Inspectable>>,
}

/// Shared observable container with reference identity.
#[derive(Clone)]
pub struct Object {
    inner: Arc<RwLock<ObjectData>>,
}

impl Object {
    pub fn new() -> Self {
        Self::with_kind(ObjectKind::Map)
    }

    pub fn array() -> Self {
        Self::with_kind(ObjectKind::Array)
    }

    fn with_kind(kind: ObjectKind) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ObjectData {
                kind,
                order: Vec::new(),
                slots: HashMap::new(),
                hooks: HashMap::new(),
                inspectable: None,
            })),
        }
    }

    /// Build a map from `(key, value)` pairs.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let object = Self::new();
        for (key, value) in entries {
            object.put(key.into(), Descriptor::data(value));
        }
        object
    }

    /// Build an array from values.
    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let array = Self::array();
        for (index, value) in values.into_iter().enumerate() {
            array.put(Key::from(index), Descriptor::data(value));
        }
        array
    }

    /// Builder-style insertion of a plain data slot.
    pub fn with(self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.put(key.into(), Descriptor::data(value));
        self
    }

    fn put(&self, key: Key, descriptor: Descriptor) {
        let mut data = self.inner.write();
        if data.slots.insert(key.clone(), descriptor).is_none() {
            data.order.push(key);
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.inner.read().kind
    }

    pub fn is_array(&self) -> bool {
        self.kind() == ObjectKind::Array
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address-based identity, stable while the object is alive.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.inner.read().slots.contains_key(&key.into())
    }

    /// Enumerable keys in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        let data = self.inner.read();
        data.order
            .iter()
            .filter(|k| data.slots.get(*k).map_or(false, |d| d.enumerable))
            .cloned()
            .collect()
    }

    pub fn descriptor(&self, key: impl Into<Key>) -> Option<Descriptor> {
        self.inner.read().slots.get(&key.into()).cloned()
    }

    /// Read a slot. Getters run without the object lock held.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let getter = {
            let data = self.inner.read();
            match &data.slots.get(&key)?.slot {
                Slot::Data { value, .. } => return Some(value.clone()),
                Slot::Accessor { get, .. } => get.clone(),
            }
        };
        Some(getter.map_or(Value::Null, |get| get()))
    }

    /// Enumerable `(key, value)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(key.clone()).map(|value| (key, value)))
            .collect()
    }

    /// Write a slot, then run its write hook if one is installed.
    ///
    /// Missing keys are created as plain data slots. Read-only slots reject
    /// the write and the hook does not run.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let (setter, hook) = {
            let mut data = self.inner.write();
            let hook = data.hooks.get(&key).cloned();
            let setter = match data.slots.get_mut(&key) {
                Some(descriptor) => match &mut descriptor.slot {
                    Slot::Data {
                        value: current,
                        writable: true,
                    } => {
                        *current = value.clone();
                        None
                    }
                    Slot::Accessor { set: Some(set), .. } => Some(set.clone()),
                    _ => return Err(ObserveError::ReadOnly(key.to_string())),
                },
                None => {
                    data.slots.insert(key.clone(), Descriptor::data(value.clone()));
                    data.order.push(key.clone());
                    None
                }
            };
            (setter, hook)
        };

        if let Some(set) = setter {
            set(value.clone());
        }
        if let Some(hook) = hook {
            hook(&value);
        }
        Ok(())
    }

    /// Replace a slot's descriptor. Write hooks do not run.
    pub fn define(&self, key: impl Into<Key>, descriptor: Descriptor) -> Result<()> {
        let key = key.into();
        let mut data = self.inner.write();
        match data.slots.get(&key) {
            Some(existing) if !existing.configurable => {
                Err(ObserveError::NotConfigurable(key.to_string()))
            }
            Some(_) => {
                data.slots.insert(key, descriptor);
                Ok(())
            }
            None => {
                data.slots.insert(key.clone(), descriptor);
                data.order.push(key);
                Ok(())
            }
        }
    }

    /// Remove a slot. Returns false if it did not exist.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        let mut data = self.inner.write();
        match data.slots.get(&key) {
            None => Ok(false),
            Some(existing) if !existing.configurable => {
                Err(ObserveError::NotConfigurable(key.to_string()))
            }
            Some(_) => {
                data.slots.remove(&key);
                data.order.retain(|k| k != &key);
                Ok(true)
            }
        }
    }

    /// Append to an array (or a map, keyed by its current length).
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let index = self.len();
        self.set(index, value)
    }

    /// Invoke the function stored at `key`.
    pub fn call(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        let key = key.into();
        match self.get(key.clone()) {
            Some(Value::Function(function)) => Ok(function.call(args)?),
            _ => Err(ObserveError::NotCallable(key.to_string())),
        }
    }

    /// Attach a cooperating inspectable that already publishes changes for
    /// this object.
    pub fn attach_inspectable(&self, inspectable: Arc<dyn Inspectable>) {
        self.inner.write().inspectable = Some(inspectable);
    }

    pub fn inspectable(&self) -> Option<Arc<dyn Inspectable>> {
        self.inner.read().inspectable.clone()
    }

    pub fn has_inspectable(&self) -> bool {
        self.inner.read().inspectable.is_some()
    }

    // --- Instrumentation (engine only) ---

    pub(crate) fn has_hook(&self, key: &Key) -> bool {
        self.inner.read().hooks.contains_key(key)
    }

    pub(crate) fn install_hook(&self, key: &Key, hook: WriteHook) -> Result<()> {
        let mut data = self.inner.write();
        if data.hooks.contains_key(key) {
            return Err(ObserveError::InterceptionFailure {
                path: key.to_string(),
                reason: "slot already has a write hook".to_string(),
            });
        }
        data.hooks.insert(key.clone(), hook);
        Ok(())
    }

    pub(crate) fn remove_hook(&self, key: &Key) -> bool {
        self.inner.write().hooks.remove(key).is_some()
    }

    /// Swap the value of a data slot in place, keeping its flags.
    /// Replace the function at `key` with `wrapper`, only if the slot still
    /// holds `expected`.
    pub(crate) fn swap_function(&self, key: &Key, expected: &Function, wrapper: Function) -> Result<()> {
        let mut data = self.inner.write();
        let descriptor = data
            .slots
            .get_mut(key)
            .ok_or_else(|| ObserveError::ReferenceMissing(key.to_string()))?;
        let configurable = descriptor.configurable;
        match &mut descriptor.slot {
            Slot::Data {
                value: Value::Function(current),
                writable,
            } if current.ptr_eq(expected) => {
                if !*writable && !configurable {
                    return Err(ObserveError::NotConfigurable(key.to_string()));
                }
                *current = wrapper;
                Ok(())
            }
            _ => Err(ObserveError::InterceptionFailure {
                path: key.to_string(),
                reason: "slot no longer holds the inspected function".to_string(),
            }),
        }
    }

    /// Put `original` back if the slot still holds `wrapper`.
    pub(crate) fn restore_function(&self, key: &Key, wrapper: &Function, original: Function) -> bool {
        let mut data = self.inner.write();
        match data.slots.get_mut(key).map(|d| &mut d.slot) {
            Some(Slot::Data {
                value: Value::Function(current),
                ..
            }) if current.ptr_eq(wrapper) => {
                *current = original;
                true
            }
            _ => false,
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.read();
        let label = match data.kind {
            ObjectKind::Map => "Object",
            ObjectKind::Array => "Array",
        };
        write!(f, "{}({:#x}, len={})", label, self.id(), data.order.len())
    }
}
