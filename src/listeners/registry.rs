//! Listener registry for intercepted paths.

use crate::intercept::Restoration;
use crate::types::{ActiveInfo, Mode, RootId, Token};
use crate::value::Value;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::types::{PathEntry, Pool, Subscription, TokenInfo};

/// Distinguishes tokens minted by different registries.
static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Pools and reverse lookup tables.
///
/// Every mutation goes through the single state lock; this is the boundary
/// to split per root if pools ever need concurrent writers.
#[derive(Default)]
pub(crate) struct RegistryState {
    setters: Pool,
    functions: Pool,
    deferred: Pool,
    /// token → where it lives.
    tokens: HashMap<Token, TokenInfo>,
    /// path key → root → tokens on that path.
    paths: HashMap<String, HashMap<RootId, BTreeSet<Token>>>,
}

impl RegistryState {
    fn pool(&self, mode: Mode) -> Option<&Pool> {
        match mode {
            Mode::Setter => Some(&self.setters),
            Mode::Function => Some(&self.functions),
            Mode::Deferred => Some(&self.deferred),
            Mode::Sampled => None,
        }
    }

    fn pool_mut(&mut self, mode: Mode) -> Option<&mut Pool> {
        match mode {
            Mode::Setter => Some(&mut self.setters),
            Mode::Function => Some(&mut self.functions),
            Mode::Deferred => Some(&mut self.deferred),
            Mode::Sampled => None,
        }
    }

    /// The mode already serving `(root, key)`, if any. A path with sampled
    /// tokens reports `Sampled` so later subscriptions keep sampling it.
    pub(crate) fn active_mode(&self, root: &RootId, key: &str) -> Option<Mode> {
        let intercepted = [Mode::Setter, Mode::Function, Mode::Deferred]
            .into_iter()
            .find(|mode| {
                self.pool(*mode)
                    .and_then(|pool| pool.get(root))
                    .map_or(false, |paths| paths.contains_key(key))
            });
        intercepted.or_else(|| {
            self.paths
                .get(key)
                .and_then(|roots| roots.get(root))
                .and_then(|tokens| tokens.iter().find_map(|t| self.tokens.get(t)))
                .filter(|info| info.mode == Mode::Sampled)
                .map(|_| Mode::Sampled)
        })
    }

    /// Add a subscription to an existing interception. False if there is none.
    pub(crate) fn join(&mut self, info: TokenInfo, subscription: Subscription) -> bool {
        let token = subscription.token;
        let entry = self
            .pool_mut(info.mode)
            .and_then(|pool| pool.get_mut(&info.root))
            .and_then(|paths| paths.get_mut(&info.key));
        match entry {
            Some(entry) => {
                entry.subscriptions.insert(token, subscription);
                self.index(token, info);
                true
            }
            None => false,
        }
    }

    /// Record a freshly installed interception with its first subscription.
    pub(crate) fn open(&mut self, info: TokenInfo, restoration: Restoration, subscription: Subscription) {
        let token = subscription.token;
        let Some(pool) = self.pool_mut(info.mode) else {
            debug_assert!(false, "sampled subscriptions are owned by the sampler");
            return;
        };
        let mut entry = PathEntry {
            restoration,
            subscriptions: Default::default(),
        };
        entry.subscriptions.insert(token, subscription);
        let previous = pool
            .entry(info.root.clone())
            .or_default()
            .insert(info.key.clone(), entry);
        debug_assert!(previous.is_none(), "interception opened twice for {}", info.path);
        self.index(token, info);
    }

    /// Index a token whose subscription lives in the sampler.
    pub(crate) fn track(&mut self, token: Token, info: TokenInfo) {
        self.index(token, info);
    }

    fn index(&mut self, token: Token, info: TokenInfo) {
        self.paths
            .entry(info.key.clone())
            .or_default()
            .entry(info.root.clone())
            .or_default()
            .insert(token);
        let previous = self.tokens.insert(token, info);
        debug_assert!(previous.is_none(), "token {token:?} registered twice");
    }

    fn unindex(&mut self, token: Token) -> Option<TokenInfo> {
        let info = self.tokens.remove(&token)?;
        if let Some(roots) = self.paths.get_mut(&info.key) {
            if let Some(tokens) = roots.get_mut(&info.root) {
                tokens.remove(&token);
                if tokens.is_empty() {
                    roots.remove(&info.root);
                }
            }
            if roots.is_empty() {
                self.paths.remove(&info.key);
            }
        }
        Some(info)
    }

    /// Remove `token` from its pool. Returns the restoration record when the
    /// token was the last one on its path.
    fn detach(&mut self, info: &TokenInfo, token: Token) -> Option<Restoration> {
        let pool = self.pool_mut(info.mode)?;
        let paths = pool.get_mut(&info.root)?;
        let entry = paths.get_mut(&info.key)?;
        entry.subscriptions.remove(&token);
        if !entry.subscriptions.is_empty() {
            return None;
        }
        let entry = paths.remove(&info.key)?;
        if paths.is_empty() {
            pool.remove(&info.root);
        }
        Some(entry.restoration)
    }
}

struct RegistryInner {
    id: u64,
    next_seq: AtomicU64,
    state: Mutex<RegistryState>,
}

/// Result of removing a token.
#[derive(Debug)]
pub struct Unregistered {
    pub info: TokenInfo,
    /// True when this removal emptied the path and the original state was
    /// put back.
    pub restored: bool,
}

/// Owns the setter, function and deferred pools plus the lookup tables.
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
                next_seq: AtomicU64::new(1),
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Create a token no other registration has used.
    pub fn mint(&self) -> Token {
        Token::new(self.inner.id, self.inner.next_seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Whether `token` was minted by this registry.
    pub fn owns(&self, token: Token) -> bool {
        token.registry() == self.inner.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.state.lock()
    }

    /// Fan-out handle for an interception on `(root, key)`.
    pub(crate) fn publisher(&self, mode: Mode, root: RootId, key: String) -> Publisher {
        Publisher {
            registry: Arc::downgrade(&self.inner),
            mode,
            root,
            key,
        }
    }

    pub fn lookup(&self, token: Token) -> Option<TokenInfo> {
        self.lock().tokens.get(&token).cloned()
    }

    /// Remove a token and, if it was the last on its path, restore the
    /// original slot before dropping the pool entry.
    ///
    /// Unknown tokens return `None` and touch nothing.
    pub fn unregister(&self, token: Token) -> Option<Unregistered> {
        let mut state = self.lock();
        let info = state.unindex(token)?;
        let restored = match state.detach(&info, token) {
            Some(restoration) => {
                debug!(path = %info.path, mode = ?info.mode, "restoring original slot");
                restoration.restore();
                true
            }
            None => false,
        };
        Some(Unregistered { info, restored })
    }

    /// Snapshot of every registered token, in registration order.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.lock().tokens.keys().copied().collect();
        tokens.sort();
        tokens
    }

    /// Tokens registered on a path key for `root`.
    pub(crate) fn tokens_on(&self, root: &RootId, key: &str) -> Vec<Token> {
        self.lock()
            .paths
            .get(key)
            .and_then(|roots| roots.get(root))
            .map(|tokens| tokens.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers events from an installed interception to its subscriptions.
///
/// Holds the registry weakly so instrumented objects do not keep it alive.
#[derive(Clone)]
pub(crate) struct Publisher {
    registry: Weak<RegistryInner>,
    mode: Mode,
    root: RootId,
    key: String,
}

impl Publisher {
    /// Invoke every subscription on the path, in registration order.
    ///
    /// The registry lock is released before any callback runs.
    pub(crate) fn publish(&self, mut info: ActiveInfo, value: &Value, suffix: Option<&str>) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        if info.id.is_none() {
            info.id = Some(self.root.clone());
        }

        let targets: Vec<Subscription> = {
            let state = inner.state.lock();
            state
                .pool(self.mode)
                .and_then(|pool| pool.get(&self.root))
                .and_then(|paths| paths.get(&self.key))
                .map(|entry| entry.subscriptions.values().cloned().collect())
                .unwrap_or_default()
        };

        trace!(root = %self.root, count = targets.len(), "publishing update");
        for subscription in &targets {
            subscription.deliver(&info, value, suffix);
        }
    }
}
