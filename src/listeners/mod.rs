//! Listener bookkeeping.
//!
//! The registry owns one pool per direct interception mode (setter, function,
//! deferred) keyed by root id and path, plus reverse lookups:
//! - token → root, path and mode (for unsubscribe)
//! - path → root → tokens (for detecting and enumerating active paths)
//!
//! Sampled subscriptions live in the [`Sampler`](crate::sampler::Sampler) but
//! are indexed here too, so every token has exactly one lookup entry.

mod registry;
mod types;

pub(crate) use registry::Publisher;
pub use registry::{ListenerRegistry, Unregistered};
pub use types::{Subscription, TokenInfo};
