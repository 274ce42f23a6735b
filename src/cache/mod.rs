//! Sharenote Cache Layer
//!
//! A single time-bounded cache per process, shared by handle:
//!
//! - **Entries** are keyed `<op>:<args>` and expire after a per-call TTL.
//! - **Memoization** is explicit at each call site through [`Cache::memoize`].
//! - **Invalidation** is explicit as well: every storage mutation names the
//!   keys it made stale. There is no dependency tracking.
//!
//! ```toml
//! [cache]
//! enabled = true
//! note_ttl_seconds = 300
//! tree_ttl_seconds = 300
//! sweep_interval_seconds = 60
//! max_cached_bytes = 1048576
//! ```

mod clock;
mod config;
mod keys;
mod lock;
mod memo;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use keys::{CacheKey, DOC_TREE_OP, NOTE_OP, STATIC_OP};
pub use memo::Cacheable;
pub use store::{Cache, Generation};

pub(crate) use lock::mutex_lock;
