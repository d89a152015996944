//! Periodic sampling of values that cannot be intercepted.

use super::PollingConfig;
use crate::listeners::Subscription;
use crate::path::path_key;
use crate::types::{ActiveInfo, RootId, Token};
use crate::value::Value;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Reads the current value of a sampled location.
pub type Accessor = Arc<dyn Fn() -> Value + Send + Sync>;

struct Sample {
    subscription: Subscription,
    accessor: Accessor,
    last: Value,
}

#[derive(Default)]
struct SamplerState {
    /// Ordered by token, which is registration order.
    samples: BTreeMap<Token, Sample>,
    /// rootId → path key → tokens, mirroring the listener pools.
    index: HashMap<RootId, HashMap<String, BTreeSet<Token>>>,
}

struct SamplerShared {
    config: PollingConfig,
    state: Mutex<SamplerState>,
    /// Held for the duration of a tick.
    tick_guard: Mutex<()>,
}

impl SamplerShared {
    fn tick(&self) -> Option<usize> {
        let _guard = self.tick_guard.try_lock()?;
        let tokens: Vec<Token> = self.state.lock().samples.keys().copied().collect();

        let mut published = 0;
        for token in tokens {
            // Removed earlier in this tick: skip.
            let (accessor, last) = {
                let state = self.state.lock();
                match state.samples.get(&token) {
                    Some(sample) => (Arc::clone(&sample.accessor), sample.last.clone()),
                    None => continue,
                }
            };

            let current = accessor();
            if self.config.equality.equal(&last, &current) {
                continue;
            }

            let subscription = {
                let mut state = self.state.lock();
                match state.samples.get_mut(&token) {
                    Some(sample) => {
                        sample.last = self.config.equality.snapshot(&current);
                        sample.subscription.clone()
                    }
                    None => continue,
                }
            };

            trace!(token = ?token, path = %subscription.output_path, "sampled change");
            subscription.deliver(&ActiveInfo::for_root(&subscription.root), &current, None);
            published += 1;
        }
        Some(published)
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

fn run(shared: Weak<SamplerShared>, period: Duration, stop: Receiver<()>) {
    let ticker = crossbeam_channel::tick(period);
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => match shared.upgrade() {
                Some(shared) => {
                    shared.tick();
                }
                None => break,
            },
        }
    }
}

/// Re-reads registered accessors at a fixed rate and publishes changes.
///
/// Ticks never overlap. With `background` enabled a timer thread runs while
/// at least one sample is registered; [`Sampler::tick`] can always be called
/// directly.
pub struct Sampler {
    shared: Arc<SamplerShared>,
    worker: Mutex<Option<Worker>>,
}

impl Sampler {
    pub fn new(config: PollingConfig) -> Self {
        Self {
            shared: Arc::new(SamplerShared {
                config,
                state: Mutex::new(SamplerState::default()),
                tick_guard: Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.shared.config
    }

    /// Start sampling `accessor` for `subscription`. The first read becomes
    /// the baseline; it is not published.
    pub fn add(&self, subscription: Subscription, accessor: Accessor) -> Token {
        let token = subscription.token;
        let last = self.shared.config.equality.snapshot(&accessor());
        let key = path_key(&subscription.path);
        {
            let mut state = self.shared.state.lock();
            state
                .index
                .entry(subscription.root.clone())
                .or_default()
                .entry(key)
                .or_default()
                .insert(token);
            state.samples.insert(
                token,
                Sample {
                    subscription,
                    accessor,
                    last,
                },
            );
        }

        if self.shared.config.background {
            self.start();
        }
        token
    }

    /// Stop sampling `token`. False if it was not registered.
    pub fn remove(&self, token: Token) -> bool {
        let now_empty = {
            let mut state = self.shared.state.lock();
            let Some(sample) = state.samples.remove(&token) else {
                return false;
            };
            let root = &sample.subscription.root;
            let key = path_key(&sample.subscription.path);
            if let Some(paths) = state.index.get_mut(root) {
                if let Some(tokens) = paths.get_mut(&key) {
                    tokens.remove(&token);
                    if tokens.is_empty() {
                        paths.remove(&key);
                    }
                }
                if paths.is_empty() {
                    state.index.remove(root);
                }
            }
            state.samples.is_empty()
        };

        if now_empty {
            self.stop();
        }
        true
    }

    pub fn contains(&self, token: Token) -> bool {
        self.shared.state.lock().samples.contains_key(&token)
    }

    /// Tokens sampled for `(root, key)`.
    pub(crate) fn tokens_on(&self, root: &RootId, key: &str) -> Vec<Token> {
        self.shared
            .state
            .lock()
            .index
            .get(root)
            .and_then(|paths| paths.get(key))
            .map(|tokens| tokens.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample everything once. Returns the number of changes published, or
    /// `None` if another tick was already running.
    pub fn tick(&self) -> Option<usize> {
        self.shared.tick()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::downgrade(&self.shared);
        let period = self.shared.config.period();
        let spawned = thread::Builder::new()
            .name("graphwatch-sampler".to_string())
            .spawn(move || run(shared, period, stop_rx));

        match spawned {
            Ok(handle) => {
                debug!(?period, "sampler started");
                *worker = Some(Worker {
                    stop: stop_tx,
                    handle,
                });
            }
            Err(e) => error!(error = %e, "failed to start sampler thread"),
        }
    }

    /// Stop the timer thread, if running. Registered samples are kept.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.stop.try_send(());
        // Stopping from inside a sampled callback must not join itself.
        if worker.handle.thread().id() != thread::current().id() {
            let _ = worker.handle.join();
        }
        debug!("sampler stopped");
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}
