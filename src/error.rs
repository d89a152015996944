//! Error types for the observation engine.

use crate::types::Token;
use thiserror::Error;

/// Failure raised by a user-supplied function held in an object slot.
///
/// Function wrappers forward this unchanged to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Main error type for monitor operations.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("Reference not found: {0}")]
    ReferenceMissing(String),

    #[error("Cannot intercept {path}: {reason}")]
    InterceptionFailure { path: String, reason: String },

    #[error("Subscription does not exist: {0:?}")]
    UnknownSubscription(Token),

    #[error("Invalid subscription for {0}")]
    InvalidSubscriptionKey(String),

    #[error("Property is read-only: {0}")]
    ReadOnly(String),

    #[error("Property is not configurable: {0}")]
    NotConfigurable(String),

    #[error("Not a container: {0}")]
    NotAContainer(String),

    #[error("Not callable: {0}")]
    NotCallable(String),

    #[error("Call failed: {0}")]
    Call(#[from] CallError),
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, ObserveError>;
