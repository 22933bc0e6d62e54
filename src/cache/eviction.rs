//! Eviction Policy Module
//!
//! Chooses which entry to remove when a write would push the store over
//! its capacity.

use crate::cache::{CacheEntry, EntryStore};
use crate::error::{CacheError, Result};

// == Victim ==
/// An entry chosen for eviction, identified by key and the recency stamp it
/// had when chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    pub key: String,
    pub recency: (u64, u64),
}

impl Victim {
    /// True if `entry` is still exactly the entry that was chosen: neither
    /// overwritten nor touched since.
    pub fn matches(&self, entry: &CacheEntry) -> bool {
        entry.recency() == self.recency
    }
}

// == Eviction Policy ==
/// Victim selection strategy.
pub trait EvictionPolicy: Send + Sync + std::fmt::Debug {
    /// Picks the next entry to evict.
    ///
    /// Fails with `EmptyStore` when there is nothing to evict.
    fn select_victim(&self, store: &EntryStore) -> Result<Victim>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

// == LRU Policy ==
/// Least recently used first; equal access stamps fall back to the oldest
/// write.
#[derive(Debug, Default, Clone, Copy)]
pub struct LruPolicy;

impl LruPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl EvictionPolicy for LruPolicy {
    fn select_victim(&self, store: &EntryStore) -> Result<Victim> {
        (0..store.shard_count())
            .filter_map(|index| store.oldest_in_shard(index))
            .min_by_key(|(recency, _)| *recency)
            .map(|(recency, key)| Victim { key, recency })
            .ok_or(CacheError::EmptyStore)
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}
