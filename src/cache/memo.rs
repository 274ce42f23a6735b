//! Explicit call-site memoization.
//!
//! Callers wrap an expensive read with [`Cache::memoize`], naming the
//! operation, how its arguments become a key, the TTL and the computation.
//! The computation classifies its own result with [`Cacheable`], so a value
//! that must not be replayed (a streamed file, for example) is skipped by a
//! match arm rather than by inspecting its runtime type.

use std::time::Duration;

use metrics::counter;
use tracing::debug;

use super::keys::CacheKey;
use super::store::Cache;

/// Result of a memoized computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cacheable<V> {
    /// A reproducible value; admitted into the cache.
    Store(V),
    /// A pass-through value (streamed or otherwise single-use); returned but never cached.
    Bypass(V),
}

impl<V> Cacheable<V> {
    pub fn into_inner(self) -> V {
        match self {
            Self::Store(value) | Self::Bypass(value) => value,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl Cache {
    /// Return the cached value for `op(args)`, or compute, store and return it.
    ///
    /// Errors from `compute` are returned as-is and never cached. A value is
    /// returned but not stored when an invalidation ran while it was being
    /// computed.
    pub fn memoize<A, V, E, K, F>(
        &self,
        op: &'static str,
        args: &A,
        key: K,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        A: ?Sized,
        V: Clone + Send + Sync + 'static,
        K: FnOnce(&A) -> String,
        F: FnOnce(&A) -> Result<Cacheable<V>, E>,
    {
        if !self.is_enabled() {
            return compute(args).map(Cacheable::into_inner);
        }

        let cache_key = CacheKey::call(op, &key(args));
        if let Some(hit) = self.get::<V>(&cache_key) {
            counter!("sharenote_cache_hit_total", "op" => op).increment(1);
            debug!(op, cache_key = %cache_key, outcome = "hit", "serving cached value");
            return Ok(hit);
        }

        counter!("sharenote_cache_miss_total", "op" => op).increment(1);
        debug!(op, cache_key = %cache_key, outcome = "miss", "computing value");

        let observed = self.generation();
        match compute(args)? {
            Cacheable::Store(value) => {
                if !self.set_if_current(cache_key.clone(), value.clone(), ttl, observed) {
                    debug!(op, cache_key = %cache_key, outcome = "stale", "invalidated while computing");
                }
                Ok(value)
            }
            Cacheable::Bypass(value) => {
                counter!("sharenote_cache_bypass_total", "op" => op).increment(1);
                debug!(op, cache_key = %cache_key, outcome = "bypass", "value not cacheable");
                Ok(value)
            }
        }
    }
}
