//! Cache Module
//!
//! Provides a sharded in-memory cache with TTL expiration and LRU eviction.
//!
//! Layering, leaf first: [`EntryStore`] owns the entries, [`expiry`] decides
//! liveness and sweeps, [`EvictionPolicy`] picks victims, and
//! [`CacheEngine`] composes them behind `get` / `set` / `delete` / `stats`.

mod clock;
mod engine;
mod entry;
pub mod eviction;
pub mod expiry;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CacheConfig, CacheEngine};
pub use entry::CacheEntry;
pub use eviction::{EvictionPolicy, LruPolicy, Victim};
pub use stats::{CacheStats, StatsCounters};
pub use store::{Capacity, EntryStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Default number of store shards
pub const DEFAULT_SHARDS: usize = 16;
