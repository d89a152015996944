//! Listener pool types.

use crate::intercept::Restoration;
use crate::types::{ActiveInfo, Key, Mode, RootId, Token, UpdateCallback};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One listener's interest in one path.
#[derive(Clone)]
pub struct Subscription {
    pub token: Token,
    pub root: RootId,
    /// Path below the root.
    pub path: Vec<Key>,
    /// Path string handed to the callback.
    pub output_path: String,
    /// Separator used to append paths reported by an inspectable.
    pub separator: String,
    pub callback: UpdateCallback,
}

impl Subscription {
    /// Invoke the callback. `suffix` is a path below this subscription's path.
    pub fn deliver(&self, info: &ActiveInfo, value: &Value, suffix: Option<&str>) {
        match suffix {
            Some(rest) if !rest.is_empty() => {
                let path = if self.output_path.is_empty() {
                    rest.to_string()
                } else {
                    format!("{}{}{}", self.output_path, self.separator, rest)
                };
                (self.callback)(&path, info, value)
            }
            _ => (self.callback)(&self.output_path, info, value),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("root", &self.root)
            .field("output_path", &self.output_path)
            .finish()
    }
}

/// All subscriptions sharing one interception.
pub(crate) struct PathEntry {
    pub restoration: Restoration,
    /// Ordered by token, which is registration order.
    pub subscriptions: BTreeMap<Token, Subscription>,
}

/// rootId → path key → entry.
pub(crate) type Pool = HashMap<RootId, HashMap<String, PathEntry>>;

/// Reverse lookup record for a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub root: RootId,
    /// Public absolute path (root id first, symbols stripped).
    pub path: String,
    pub mode: Mode,
    /// Internal pool key.
    pub(crate) key: String,
}
