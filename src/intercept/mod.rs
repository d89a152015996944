//! Direct interception of slots.
//!
//! - [`setter`]: write hooks that publish after every write
//! - [`function`]: forwarding wrappers around callable slots
//! - [`can_create`]: decides whether a slot can be intercepted at all
//!
//! Anything that cannot be intercepted is left to the sampler.

pub(crate) mod function;
pub(crate) mod setter;

use crate::listeners::Publisher;
use crate::types::{ActiveInfo, Key, UpdateCallback};
use crate::value::{Function, Object, Slot, Value};
use std::fmt;
use std::sync::Arc;

/// A cooperating layer that already publishes changes for an object.
///
/// When an object carries one, the engine does not instrument it; it routes
/// the inspectable's events to its subscribers through this callback slot
/// instead, and clears the slot when the last subscriber leaves.
pub trait Inspectable: Send + Sync {
    /// Route every change to `callback` (path relative to the object).
    /// `None` detaches. Must not deliver events before returning.
    fn set_global_callback(&self, callback: Option<UpdateCallback>);
}

/// Why a slot cannot be intercepted directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ineligible {
    /// Someone already hooked or wrapped it.
    AlreadyInstrumented,
    Null,
    Opaque,
    /// No write through the slot can succeed, or writes would not reflect
    /// the value read back (getter-only accessor).
    Locked,
}

/// Outcome of the eligibility check.
#[derive(Clone, Debug)]
pub enum Eligibility {
    /// Install a write hook.
    Setter,
    /// Wrap the function currently stored in the slot.
    Function(Function),
    Ineligible(Ineligible),
}

/// Decide how `(owner, key)` can be intercepted.
///
/// Keys that do not exist yet are eligible for a write hook so their first
/// assignment is observed.
///
/// Accessor slots with a setter get a write hook even when their getter
/// yields a function: assigning a new function is published, calls made
/// through the slot are not. Only functions stored in data slots are wrapped.
pub fn can_create(owner: &Object, key: &Key) -> Eligibility {
    if owner.has_hook(key) {
        return Eligibility::Ineligible(Ineligible::AlreadyInstrumented);
    }
    let Some(descriptor) = owner.descriptor(key.clone()) else {
        return Eligibility::Setter;
    };

    match &descriptor.slot {
        Slot::Data {
            value: Value::Function(function),
            writable,
        } => {
            if function.is_instrumented() {
                Eligibility::Ineligible(Ineligible::AlreadyInstrumented)
            } else if !writable && !descriptor.configurable {
                Eligibility::Ineligible(Ineligible::Locked)
            } else {
                Eligibility::Function(function.clone())
            }
        }
        Slot::Data {
            value: Value::Null, ..
        } => Eligibility::Ineligible(Ineligible::Null),
        Slot::Data {
            value: Value::Opaque(_),
            ..
        } => Eligibility::Ineligible(Ineligible::Opaque),
        Slot::Data { writable: false, .. } if !descriptor.configurable => {
            Eligibility::Ineligible(Ineligible::Locked)
        }
        Slot::Accessor { set: None, .. } => Eligibility::Ineligible(Ineligible::Locked),
        _ => Eligibility::Setter,
    }
}

/// Route an inspectable's own events to the subscribers of its path.
pub(crate) fn defer(inspectable: Arc<dyn Inspectable>, publisher: Publisher) -> Restoration {
    inspectable.set_global_callback(Some(Arc::new(
        move |path: &str, info: &ActiveInfo, value: &Value| {
            publisher.publish(info.clone(), value, Some(path))
        },
    )));
    Restoration::Deferred { inspectable }
}

/// What it takes to undo an interception.
pub(crate) enum Restoration {
    Setter {
        owner: Object,
        key: Key,
    },
    Function {
        owner: Object,
        key: Key,
        original: Function,
        wrapper: Function,
    },
    Deferred {
        inspectable: Arc<dyn Inspectable>,
    },
}

impl Restoration {
    /// Put the slot back the way it was before interception.
    pub(crate) fn restore(self) {
        match self {
            Restoration::Setter { owner, key } => {
                owner.remove_hook(&key);
            }
            Restoration::Function {
                owner,
                key,
                original,
                wrapper,
            } => {
                // A slot reassigned since keeps its new value.
                owner.restore_function(&key, &wrapper, original);
            }
            Restoration::Deferred { inspectable } => inspectable.set_global_callback(None),
        }
    }
}

impl fmt::Debug for Restoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restoration::Setter { key, .. } => write!(f, "Restoration::Setter({key})"),
            Restoration::Function { key, .. } => write!(f, "Restoration::Function({key})"),
            Restoration::Deferred { .. } => f.write_str("Restoration::Deferred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Descriptor, Opaque};

    fn check(owner: &Object, key: &str) -> Eligibility {
        can_create(owner, &Key::from(key))
    }

    #[test]
    fn test_plain_and_missing_slots_take_setters() {
        let owner = Object::new().with("n", 1);
        assert!(matches!(check(&owner, "n"), Eligibility::Setter));
        assert!(matches!(check(&owner, "absent"), Eligibility::Setter));
    }

    #[test]
    fn test_functions_take_wrappers() {
        let f = Function::new("f", |_| Ok(Value::Null));
        let owner = Object::new().with("f", f.clone());
        match check(&owner, "f") {
            Eligibility::Function(found) => assert!(found.ptr_eq(&f)),
            other => panic!("Expected function eligibility, got {:?}", other),
        }
    }

    #[test]
    fn test_ineligible_slots() {
        let owner = Object::new()
            .with("nothing", Value::Null)
            .with("host", Opaque::new("window"));
        owner
            .define("frozen", Descriptor::data(1).read_only().non_configurable())
            .unwrap();
        owner
            .define("live", Descriptor::accessor(Arc::new(|| Value::Int(1)), None))
            .unwrap();

        assert!(matches!(check(&owner, "nothing"), Eligibility::Ineligible(Ineligible::Null)));
        assert!(matches!(check(&owner, "host"), Eligibility::Ineligible(Ineligible::Opaque)));
        assert!(matches!(check(&owner, "frozen"), Eligibility::Ineligible(Ineligible::Locked)));
        assert!(matches!(check(&owner, "live"), Eligibility::Ineligible(Ineligible::Locked)));
    }

    #[test]
    fn test_configurable_read_only_slot_is_still_eligible() {
        let owner = Object::new();
        owner.define("ro", Descriptor::data(1).read_only()).unwrap();
        assert!(matches!(check(&owner, "ro"), Eligibility::Setter));
    }

    #[test]
    fn test_hooked_slot_is_already_instrumented() {
        let owner = Object::new().with("n", 1);
        owner.install_hook(&Key::from("n"), Arc::new(|_| {})).unwrap();
        assert!(matches!(
            check(&owner, "n"),
            Eligibility::Ineligible(Ineligible::AlreadyInstrumented)
        ));
    }
}
