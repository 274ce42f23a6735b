//! Cache configuration.
//!
//! Controls TTLs and sweeping of the response cache via `sharenote.toml`.

use std::time::Duration;

const DEFAULT_NOTE_TTL_SECS: u64 = 300;
const DEFAULT_TREE_TTL_SECS: u64 = 300;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_CACHED_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Memoize reads at all; when false every lookup recomputes.
    pub enabled: bool,
    /// TTL for note documents and static files.
    pub note_ttl: Duration,
    /// TTL for the document tree listing.
    pub tree_ttl: Duration,
    /// Cadence of the background sweep.
    pub sweep_interval: Duration,
    /// Payloads larger than this are streamed and never cached.
    pub max_cached_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            note_ttl: Duration::from_secs(DEFAULT_NOTE_TTL_SECS),
            tree_ttl: Duration::from_secs(DEFAULT_TREE_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_cached_bytes: DEFAULT_MAX_CACHED_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            note_ttl: settings.note_ttl,
            tree_ttl: settings.tree_ttl,
            sweep_interval: settings.sweep_interval,
            max_cached_bytes: settings.max_cached_bytes,
        }
    }
}
