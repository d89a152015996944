//! The monitor: root registration, subscription and teardown.

use crate::drill::{drill, DrillOptions, Visited};
use crate::error::{ObserveError, Result};
use crate::intercept::{self, can_create, Eligibility, Inspectable};
use crate::listeners::{ListenerRegistry, Subscription, TokenInfo};
use crate::path::{
    normalize, path_key, public_path, resolve, resolve_slot, set_from_path, PathSpec,
    ResolveOptions, DEFAULT_SEPARATOR,
};
use crate::sampler::{Accessor, PollingConfig, Sampler};
use crate::types::{
    ActiveInfo, InfoOptions, InitCallback, Key, Mode, PathFormat, RootId, Token, UpdateCallback,
    UpdateHook,
};
use crate::value::{Object, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Monitor configuration.
#[derive(Clone)]
pub struct MonitorConfig {
    /// Shape of the path handed to callbacks.
    pub path_format: PathFormat,

    /// Separator for string paths, both parsed and reported.
    pub key_separator: String,

    /// Keys of alternate containers tried when a segment is missing.
    pub fallbacks: Vec<Key>,

    pub polling: PollingConfig,

    /// Treat arrays as composites (drilled) rather than leaves.
    pub allow_arrays: bool,

    /// Called once per successful leaf subscription.
    pub on_init: Option<InitCallback>,

    /// Called for every delivered update, after the subscription's own
    /// callback.
    pub on_update: Option<UpdateHook>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            path_format: PathFormat::default(),
            key_separator: DEFAULT_SEPARATOR.to_string(),
            fallbacks: Vec::new(),
            polling: PollingConfig::default(),
            allow_arrays: false,
            on_init: None,
            on_update: None,
        }
    }
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("path_format", &self.path_format)
            .field("key_separator", &self.key_separator)
            .field("fallbacks", &self.fallbacks)
            .field("polling", &self.polling)
            .field("allow_arrays", &self.allow_arrays)
            .field("on_init", &self.on_init.is_some())
            .field("on_update", &self.on_update)
            .finish()
    }
}

/// Options for [`Monitor::set`].
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Create missing intermediate containers.
    pub create: bool,
    /// Overrides the monitor's separator for this call.
    pub key_separator: Option<String>,
}

/// Tokens created by one subscribe call, keyed by absolute path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subscriptions {
    entries: Vec<(String, Token)>,
}

impl Subscriptions {
    fn push(&mut self, path: String, token: Token) {
        self.entries.push((path, token));
    }

    /// Token subscribed at `path` (absolute, monitor separator).
    pub fn get(&self, path: &str) -> Option<Token> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, token)| *token)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.entries.iter().map(|(_, token)| *token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Token)> {
        self.entries.iter().map(|(p, token)| (p.as_str(), *token))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a token that did not come from a subscribe call.
    pub fn insert(&mut self, path: impl Into<String>, token: Token) {
        self.push(path.into(), token);
    }
}

/// Outcome of a bulk removal.
#[derive(Debug, Default)]
pub struct RemoveSummary {
    pub removed: usize,
    /// Keys that could not be removed, with the reason.
    pub failed: Vec<(String, ObserveError)>,
}

impl RemoveSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Watches registered roots and notifies subscribers of changes.
///
/// Each leaf path is observed one of four ways:
/// - a write hook on the owning slot
/// - a forwarding wrapper around a function
/// - the owning object's [`Inspectable`], for objects that publish their own changes
/// - periodic sampling, for everything else
///
/// Dropping the monitor removes every subscription and restores every slot.
pub struct Monitor {
    config: MonitorConfig,

    /// Roots, stored as slots so root-level writes are observable too.
    references: Object,

    registry: ListenerRegistry,

    sampler: Sampler,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        let sampler = Sampler::new(config.polling.clone());
        Self {
            config,
            references: Object::new(),
            registry: ListenerRegistry::new(),
            sampler,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The container holding every registered root.
    pub fn references(&self) -> &Object {
        &self.references
    }

    fn resolve_options(&self, create: bool) -> ResolveOptions {
        ResolveOptions {
            create,
            fallbacks: self.config.fallbacks.clone(),
        }
    }

    fn root_value(&self) -> Value {
        Value::Object(self.references.clone())
    }

    // --- References ---

    /// Register (or replace) the root stored under `id`.
    pub fn register(&self, id: impl Into<RootId>, value: impl Into<Value>) -> Result<()> {
        let id = id.into();
        debug!(root = %id, "registering root");
        self.references.set(id, value)
    }

    /// Resolve an absolute path (root id first).
    pub fn get(&self, path: impl Into<PathSpec>) -> Option<Value> {
        let segments = normalize(path, &self.config.key_separator);
        resolve(&self.root_value(), &segments, &self.resolve_options(false))
    }

    /// Write `value` at an absolute path. Installed hooks fire.
    pub fn set(&self, path: impl Into<PathSpec>, value: impl Into<Value>, options: SetOptions) -> Result<()> {
        let separator = options
            .key_separator
            .as_deref()
            .unwrap_or(&self.config.key_separator);
        let segments = normalize(path, separator);
        set_from_path(
            &self.root_value(),
            &segments,
            value.into(),
            &self.resolve_options(options.create),
        )
    }

    // --- Subscribing ---

    /// Subscribe to an absolute path whose first segment names the root.
    pub fn on<F>(&self, path: impl Into<PathSpec>, callback: F) -> Result<Subscriptions>
    where
        F: Fn(&str, &ActiveInfo, &Value) + Send + Sync + 'static,
    {
        let segments = normalize(path, &self.config.key_separator);
        let Some((id, rest)) = segments.split_first() else {
            error!("cannot subscribe to an empty path");
            return Err(ObserveError::ReferenceMissing(String::new()));
        };
        self.listen(id.clone(), callback, rest)
    }

    /// Subscribe to `path` below the root registered as `id`.
    ///
    /// Composite targets are drilled and every leaf below them subscribed
    /// individually. Returns the created tokens keyed by absolute path.
    pub fn listen<F>(
        &self,
        id: impl Into<RootId>,
        callback: F,
        path: impl Into<PathSpec>,
    ) -> Result<Subscriptions>
    where
        F: Fn(&str, &ActiveInfo, &Value) + Send + Sync + 'static,
    {
        let id = id.into();
        let path = normalize(path, &self.config.key_separator);
        if !self.references.has(id.clone()) {
            error!(root = %id, "reference does not exist");
            return Err(ObserveError::ReferenceMissing(id.to_string()));
        }

        let callback = self.compose(Arc::new(callback));
        let mut created = Subscriptions::default();
        match self.subscribe_path(&id, &path, &callback, &mut created) {
            Ok(()) => Ok(created),
            Err(e) => {
                for token in created.tokens() {
                    self.unsubscribe(token);
                }
                Err(e)
            }
        }
    }

    /// Chain the global update hook after a subscription's callback.
    fn compose(&self, callback: UpdateCallback) -> UpdateCallback {
        match &self.config.on_update {
            Some(hook) => {
                let global = Arc::clone(&hook.callback);
                Arc::new(move |path: &str, info: &ActiveInfo, value: &Value| {
                    callback(path, info, value);
                    global(path, info, value);
                })
            }
            None => callback,
        }
    }

    fn info_options(&self) -> InfoOptions {
        self.config
            .on_update
            .as_ref()
            .map(|hook| hook.info)
            .unwrap_or_default()
    }

    fn composite<'a>(&self, value: &'a Value) -> Option<&'a Object> {
        match value {
            Value::Object(object) => Some(object),
            Value::Array(object) if self.config.allow_arrays => Some(object),
            _ => None,
        }
    }

    fn subscribe_path(
        &self,
        id: &RootId,
        path: &[Key],
        callback: &UpdateCallback,
        created: &mut Subscriptions,
    ) -> Result<()> {
        let full = absolute(id, path);
        let Some(target) = resolve(&self.root_value(), &full, &self.resolve_options(false)) else {
            return self.subscribe_leaf(id, path, callback, created);
        };
        let Some(object) = self.composite(&target) else {
            return self.subscribe_leaf(id, path, callback, created);
        };
        if let Some(inspectable) = object.inspectable() {
            return self.subscribe_deferred(id, path, inspectable, callback, created);
        }

        let mut leaves = Vec::new();
        let options = DrillOptions {
            allow_arrays: self.config.allow_arrays,
        };
        drill(&target, &mut Visited::new(), &options, &mut |_, value, info| {
            if !info.pass {
                leaves.push((info.path.to_vec(), value.clone()));
            }
        });
        debug!(root = %id, leaves = leaves.len(), "drilled composite");

        for (suffix, value) in leaves {
            let mut leaf = path.to_vec();
            leaf.extend(suffix);
            match value.as_object().and_then(Object::inspectable) {
                Some(inspectable) => {
                    self.subscribe_deferred(id, &leaf, inspectable, callback, created)?
                }
                None => self.subscribe_leaf(id, &leaf, callback, created)?,
            }
        }
        Ok(())
    }

    fn output_path(&self, id: &RootId, path: &[Key]) -> String {
        match self.config.path_format {
            PathFormat::Absolute => public_path(&absolute(id, path), &self.config.key_separator),
            PathFormat::Relative => public_path(path, &self.config.key_separator),
        }
    }

    fn subscription(&self, id: &RootId, path: &[Key], callback: &UpdateCallback) -> Subscription {
        Subscription {
            token: self.registry.mint(),
            root: id.clone(),
            path: path.to_vec(),
            output_path: self.output_path(id, path),
            separator: self.config.key_separator.clone(),
            callback: Arc::clone(callback),
        }
    }

    fn token_info(&self, id: &RootId, path: &[Key], mode: Mode) -> TokenInfo {
        TokenInfo {
            root: id.clone(),
            path: public_path(&absolute(id, path), &self.config.key_separator),
            mode,
            key: path_key(path),
        }
    }

    fn subscribe_leaf(
        &self,
        id: &RootId,
        path: &[Key],
        callback: &UpdateCallback,
        created: &mut Subscriptions,
    ) -> Result<()> {
        let full = absolute(id, path);
        let Some((owner, key)) = resolve_slot(&self.root_value(), &full, &self.resolve_options(false))
        else {
            let missing = public_path(&full, &self.config.key_separator);
            error!(path = %missing, "reference does not exist");
            return Err(ObserveError::ReferenceMissing(missing));
        };

        let subscription = self.subscription(id, path, callback);
        let token = subscription.token;
        let output = subscription.output_path.clone();

        let mode = match self.intercept(id, path, &owner, &key, subscription.clone()) {
            Some(mode) => mode,
            None => {
                let accessor: Accessor = Arc::new(move || owner.get(key.clone()).unwrap_or(Value::Null));
                self.sampler.add(subscription, accessor);
                self.registry
                    .lock()
                    .track(token, self.token_info(id, path, Mode::Sampled));
                Mode::Sampled
            }
        };

        let info = self.token_info(id, path, mode);
        debug!(path = %info.path, ?mode, "subscribed");
        created.push(info.path, token);
        self.notify_init(id, &output);
        Ok(())
    }

    /// Join or install a direct interception. `None` means sample instead.
    fn intercept(
        &self,
        id: &RootId,
        path: &[Key],
        owner: &Object,
        key: &Key,
        subscription: Subscription,
    ) -> Option<Mode> {
        if self.config.polling.force {
            return None;
        }

        let pool_key = path_key(path);
        let mut state = self.registry.lock();
        if let Some(mode) = state.active_mode(id, &pool_key) {
            // A sampled path stays sampled even if the slot became hookable.
            if mode != Mode::Sampled
                && state.join(self.token_info(id, path, mode), subscription)
            {
                return Some(mode);
            }
            return None;
        }

        let installed = match can_create(owner, key) {
            Eligibility::Setter => {
                let publisher = self.registry.publisher(Mode::Setter, id.clone(), pool_key);
                intercept::setter::install(owner, key, publisher).map(|r| (Mode::Setter, r))
            }
            Eligibility::Function(original) => {
                let publisher = self.registry.publisher(Mode::Function, id.clone(), pool_key);
                intercept::function::install(owner, key, original, publisher, self.info_options())
                    .map(|r| (Mode::Function, r))
            }
            Eligibility::Ineligible(reason) => {
                debug!(root = %id, key = %key, ?reason, "not interceptable, sampling");
                return None;
            }
        };

        match installed {
            Ok((mode, restoration)) => {
                state.open(self.token_info(id, path, mode), restoration, subscription);
                Some(mode)
            }
            Err(e) => {
                debug!(root = %id, key = %key, error = %e, "interception failed, sampling");
                None
            }
        }
    }

    fn subscribe_deferred(
        &self,
        id: &RootId,
        path: &[Key],
        inspectable: Arc<dyn Inspectable>,
        callback: &UpdateCallback,
        created: &mut Subscriptions,
    ) -> Result<()> {
        let subscription = self.subscription(id, path, callback);
        let token = subscription.token;
        let output = subscription.output_path.clone();
        let info = self.token_info(id, path, Mode::Deferred);
        let pool_key = path_key(path);

        {
            let mut state = self.registry.lock();
            let joined = state.active_mode(id, &pool_key) == Some(Mode::Deferred)
                && state.join(info.clone(), subscription.clone());
            if !joined {
                let publisher = self.registry.publisher(Mode::Deferred, id.clone(), pool_key);
                let restoration = intercept::defer(inspectable, publisher);
                state.open(info.clone(), restoration, subscription);
            }
        }

        debug!(path = %info.path, "deferring to inspectable");
        created.push(info.path, token);
        self.notify_init(id, &output);
        Ok(())
    }

    fn notify_init(&self, id: &RootId, output: &str) {
        if let Some(on_init) = &self.config.on_init {
            on_init(output, &ActiveInfo::for_root(id));
        }
    }

    // --- Unsubscribing ---

    /// Remove one subscription. Restores the slot when it was the last one on
    /// its path. Returns false for unknown tokens.
    pub fn unsubscribe(&self, token: Token) -> bool {
        let Some(removed) = self.registry.unregister(token) else {
            warn!(?token, "subscription does not exist");
            return false;
        };
        if removed.info.mode == Mode::Sampled {
            self.sampler.remove(token);
        }
        debug!(
            path = %removed.info.path,
            mode = ?removed.info.mode,
            restored = removed.restored,
            "unsubscribed"
        );
        true
    }

    /// Remove the given subscriptions, or every subscription when `None`.
    ///
    /// The set of tokens is fixed before anything is removed.
    pub fn remove(&self, subscriptions: Option<&Subscriptions>) -> RemoveSummary {
        let targets: Vec<(String, Token)> = match subscriptions {
            Some(subs) => subs.iter().map(|(p, t)| (p.to_string(), t)).collect(),
            None => self
                .registry
                .tokens()
                .into_iter()
                .filter_map(|token| self.registry.lookup(token).map(|info| (info.path, token)))
                .collect(),
        };

        let mut summary = RemoveSummary::default();
        for (path, token) in targets {
            if !self.registry.owns(token) {
                error!(path = %path, ?token, "invalid subscription for this monitor");
                summary
                    .failed
                    .push((path.clone(), ObserveError::InvalidSubscriptionKey(path)));
            } else if self.unsubscribe(token) {
                summary.removed += 1;
            } else {
                summary
                    .failed
                    .push((path, ObserveError::UnknownSubscription(token)));
            }
        }
        summary
    }

    // --- Introspection ---

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    pub fn mode_of(&self, token: Token) -> Option<Mode> {
        self.registry.lookup(token).map(|info| info.mode)
    }

    /// Tokens subscribed at `path` below root `id`, in registration order.
    pub fn subscriptions_at(&self, id: impl Into<RootId>, path: impl Into<PathSpec>) -> Vec<Token> {
        let id = id.into();
        let path = normalize(path, &self.config.key_separator);
        self.registry.tokens_on(&id, &path_key(&path))
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Run one sampling pass now. See [`Sampler::tick`].
    pub fn poll_now(&self) -> Option<usize> {
        self.sampler.tick()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.remove(None);
        }
        self.sampler.stop();
    }
}

fn absolute(id: &RootId, path: &[Key]) -> Vec<Key> {
    let mut full = Vec::with_capacity(path.len() + 1);
    full.push(id.clone());
    full.extend_from_slice(path);
    full
}
