//! # graphwatch
//!
//! Change observation for object graphs.
//!
//! Register a root value with a [`Monitor`], subscribe to a path inside it,
//! and get a callback whenever the value at that path changes.
//!
//! ## Core Concepts
//!
//! - **Objects**: shared containers whose reads and writes go through
//!   [`Object::get`] and [`Object::set`]; this is where interception happens
//! - **Interception**: write hooks on slots and forwarding wrappers around
//!   functions, both removed again when the last subscriber leaves
//! - **Sampling**: slots that cannot be intercepted are re-read periodically
//! - **Drilling**: subscribing to a composite subscribes every leaf below it,
//!   cycles included
//!
//! ## Example
//!
//! ```
//! use graphwatch::{Monitor, Object, Value};
//! use std::sync::{Arc, Mutex};
//!
//! let monitor = Monitor::default();
//! let one = Object::new().with("test", 1).with("active", false);
//! monitor.register("one", one.clone())?;
//!
//! let history = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&history);
//! monitor.listen("one", move |path, _, update| {
//!     sink.lock().unwrap().push((path.to_string(), update.clone()));
//! }, "")?;
//!
//! one.set("test", 2)?;
//! assert_eq!(history.lock().unwrap()[0], ("test".to_string(), Value::Int(2)));
//!
//! monitor.remove(None);
//! # Ok::<(), graphwatch::ObserveError>(())
//! ```

pub mod drill;
pub mod error;
pub mod intercept;
pub mod listeners;
pub mod monitor;
pub mod path;
pub mod sampler;
pub mod types;
pub mod value;

// Re-exports
pub use drill::{drill, DrillInfo, DrillOptions, Visited};
pub use error::{CallError, ObserveError, Result};
pub use intercept::{can_create, Eligibility, Ineligible, Inspectable};
pub use listeners::{ListenerRegistry, Subscription, TokenInfo, Unregistered};
pub use monitor::{Monitor, MonitorConfig, RemoveSummary, SetOptions, Subscriptions};
pub use path::{normalize, resolve, resolve_slot, set_from_path, PathSpec, ResolveOptions};
pub use sampler::{deep_equal, Accessor, EqualityPolicy, PollingConfig, Sampler};
pub use types::{
    ActiveInfo, InfoOptions, InitCallback, Key, Mode, PathFormat, RootId, Symbol, Token,
    UpdateCallback, UpdateHook,
};
pub use value::{Descriptor, Function, Getter, Kind, Object, ObjectKind, Opaque, Setter, Slot, Value};
