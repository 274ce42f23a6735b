//! Time-bounded in-process cache.
//!
//! One map behind one mutex: every `get`, `set`, `invalidate` and `sweep`
//! is atomic with respect to the others. The cache is a disposable view of
//! storage and is never consulted as a source of truth.
//!
//! Every invalidation advances a generation counter. A value computed from
//! storage is admitted with [`Cache::set_if_current`] only when no
//! invalidation happened since the computation started, so a slow reader can
//! never put back a body that a completed write already made stale.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::counter;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    generation: u64,
}

impl State {
    fn advance(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Opaque invalidation generation observed before computing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Process-wide response cache, constructed once and shared by handle.
pub struct Cache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a live entry.
    ///
    /// Returns `None` when the key was never set, when the stored value has a
    /// different type, or when the entry expired; an expired entry is evicted
    /// by the lookup.
    pub fn get<V>(&self, key: &CacheKey) -> Option<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut state = mutex_lock(&self.state, SOURCE, "get");
        let entry = state.entries.get(key)?;

        if now >= entry.expires_at {
            state.entries.remove(key);
            counter!("sharenote_cache_expired_total").increment(1);
            debug!(cache_key = %key, outcome = "expired", "cache entry expired");
            return None;
        }

        entry.value.downcast_ref::<V>().cloned()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<V>(&self, key: CacheKey, value: V, ttl: Duration)
    where
        V: Send + Sync + 'static,
    {
        let expires_at = self.clock.now() + ttl;
        let entry = Entry {
            value: Arc::new(value),
            expires_at,
        };
        mutex_lock(&self.state, SOURCE, "set")
            .entries
            .insert(key, entry);
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> Generation {
        Generation(mutex_lock(&self.state, SOURCE, "generation").generation)
    }

    /// Store `value` only if nothing was invalidated since `observed`.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_current<V>(
        &self,
        key: CacheKey,
        value: V,
        ttl: Duration,
        observed: Generation,
    ) -> bool
    where
        V: Send + Sync + 'static,
    {
        let expires_at = self.clock.now() + ttl;
        let mut state = mutex_lock(&self.state, SOURCE, "set_if_current");
        if state.generation != observed.0 {
            return false;
        }
        state.entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                expires_at,
            },
        );
        true
    }

    /// Drop a single entry. Returns whether one was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = {
            let mut state = mutex_lock(&self.state, SOURCE, "invalidate");
            state.advance();
            state.entries.remove(key).is_some()
        };
        if removed {
            counter!("sharenote_cache_invalidated_total").increment(1);
            debug!(cache_key = %key, "cache entry invalidated");
        }
        removed
    }

    /// Drop every listed entry under a single lock acquisition.
    pub fn invalidate_all<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate_all");
        state.advance();
        let removed = keys
            .into_iter()
            .filter(|key| state.entries.remove(*key).is_some())
            .count();
        drop(state);
        if removed > 0 {
            counter!("sharenote_cache_invalidated_total").increment(removed as u64);
        }
        removed
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut state = mutex_lock(&self.state, SOURCE, "invalidate_prefix");
        state.advance();
        let before = state.entries.len();
        state
            .entries
            .retain(|key, _| !key.as_str().starts_with(prefix));
        let removed = before - state.entries.len();
        drop(state);
        if removed > 0 {
            counter!("sharenote_cache_invalidated_total").increment(removed as u64);
            debug!(prefix, removed, "cache prefix invalidated");
        }
        removed
    }

    /// Remove every expired entry, independent of reads.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut state = mutex_lock(&self.state, SOURCE, "sweep");
        let before = state.entries.len();
        state.entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - state.entries.len();
        drop(state);
        if removed > 0 {
            counter!("sharenote_cache_expired_total").increment(removed as u64);
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = mutex_lock(&self.state, SOURCE, "clear");
        state.advance();
        state.entries.clear();
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        mutex_lock(&self.state, SOURCE, "contains")
            .entries
            .contains_key(key)
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
