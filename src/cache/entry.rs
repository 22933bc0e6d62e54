//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and recency
//! metadata.

use std::sync::Arc;
use std::time::Duration;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Entries are never mutated field-by-field from outside the store: a write
/// replaces the whole entry, and a read touch only rewrites `last_access`
/// while the shard lock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: Arc<str>,
    /// Creation timestamp (monotonic milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (monotonic milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Insertion stamp, unique per write
    pub seq: u64,
    /// Logical recency stamp, refreshed on every touch
    pub last_access: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry written at `now` with optional TTL.
    ///
    /// `seq` doubles as the initial recency stamp. A TTL shorter than one
    /// millisecond is rounded up so that `expires_at > created_at` holds.
    pub fn new(value: Arc<str>, now: u64, ttl: Option<Duration>, seq: u64) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| now.saturating_add(ttl_to_ms(ttl))),
            seq,
            last_access: seq,
        }
    }

    // == Recency ==
    /// Ordering key used by LRU: least recent access first, then oldest write.
    pub fn recency(&self) -> (u64, u64) {
        (self.last_access, self.seq)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds at `now`, or None if no
    /// expiration is set. Returns `Some(0)` once the entry has expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }
}

// == Utility Functions ==
/// Converts a TTL to whole milliseconds, rounding up and never below 1.
pub fn ttl_to_ms(ttl: Duration) -> u64 {
    let ms = ttl.as_nanos().saturating_add(999_999) / 1_000_000;
    u64::try_from(ms).unwrap_or(u64::MAX).max(1)
}
