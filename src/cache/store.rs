//! Entry Store Module
//!
//! Sharded key -> entry mapping. Each shard is an independent
//! `parking_lot::Mutex` over a `HashMap` and a recency index, so operations on
//! keys in different shards never contend.

use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Capacity ==
/// Bound on the store's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// At most this many entries
    Entries(usize),
    /// At most this many bytes of key + value
    Bytes(usize),
}

impl Capacity {
    /// Returns the numeric limit regardless of unit.
    pub fn limit(&self) -> usize {
        match self {
            Capacity::Entries(n) | Capacity::Bytes(n) => *n,
        }
    }

    /// Returns the unit name reported in statistics.
    pub fn unit(&self) -> &'static str {
        match self {
            Capacity::Entries(_) => "entries",
            Capacity::Bytes(_) => "bytes",
        }
    }

    /// Returns what a key/value pair costs against this capacity.
    pub fn weight(&self, key: &str, value: &str) -> usize {
        match self {
            Capacity::Entries(_) => 1,
            Capacity::Bytes(_) => key.len() + value.len(),
        }
    }
}

// == Shard ==
#[derive(Debug, Default)]
struct Shard {
    entries: HashMap<String, CacheEntry>,
    /// (last_access, seq) -> key, least recent first
    recency: BTreeMap<(u64, u64), String>,
    /// (expires_at, seq) -> key, soonest deadline first
    deadlines: BTreeMap<(u64, u64), String>,
}

impl Shard {
    fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.recency.insert(entry.recency(), key.clone());
        if let Some(expires) = entry.expires_at {
            self.deadlines.insert((expires, entry.seq), key.clone());
        }
        let old = self.entries.insert(key, entry);
        if let Some(old) = &old {
            self.unindex(old);
        }
        old
    }

    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.unindex(&entry);
        Some(entry)
    }

    fn unindex(&mut self, entry: &CacheEntry) {
        self.recency.remove(&entry.recency());
        if let Some(expires) = entry.expires_at {
            self.deadlines.remove(&(expires, entry.seq));
        }
    }
}

// == Entry Store ==
/// Exclusive owner of all cache entries.
///
/// The store does not filter expired entries; that is the expiration
/// tracker's job. It does keep the accounted weight of its contents current
/// so the engine can enforce capacity. The `len` and `weight` counters are
/// adjusted while the owning shard is still locked, so a shard that reads
/// empty is never still counted.
#[derive(Debug)]
pub struct EntryStore {
    shards: Box<[Mutex<Shard>]>,
    hasher: RandomState,
    capacity: Capacity,
    max_value_size: usize,
    /// Source of recency and insertion stamps
    ticks: AtomicU64,
    len: AtomicUsize,
    weight: AtomicUsize,
}

impl EntryStore {
    // == Constructor ==
    /// Creates an empty store with `shards` partitions (at least one).
    pub fn new(shards: usize, capacity: Capacity, max_value_size: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(Shard::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            hasher: RandomState::new(),
            capacity,
            max_value_size,
            ticks: AtomicU64::new(0),
            len: AtomicUsize::new(0),
            weight: AtomicUsize::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn shard_for(&self, key: &str) -> &Mutex<Shard> {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    // == Put ==
    /// Inserts or replaces the entry for `key`, written at `now`.
    ///
    /// Returns the replaced entry, if any. Fails only with `ValueTooLarge`,
    /// in which case the previous entry is untouched.
    pub fn put(
        &self,
        key: String,
        value: Arc<str>,
        ttl: Option<Duration>,
        now: u64,
    ) -> Result<Option<CacheEntry>> {
        if value.len() > self.max_value_size {
            return Err(CacheError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_size,
            });
        }

        let added = self.capacity.weight(&key, &value);
        let mut shard = self.shard_for(&key).lock();
        let entry = CacheEntry::new(value, now, ttl, self.next_tick());
        let old = shard.insert(key.clone(), entry);

        self.weight.fetch_add(added, Ordering::SeqCst);
        match &old {
            Some(old) => {
                self.weight
                    .fetch_sub(self.capacity.weight(&key, &old.value), Ordering::SeqCst);
            }
            None => {
                self.len.fetch_add(1, Ordering::SeqCst);
            }
        }

        Ok(old)
    }

    // == Get ==
    /// Returns the entry for `key` and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut shard = self.shard_for(key).lock();
        let tick = self.next_tick();
        let Shard { entries, recency, .. } = &mut *shard;

        let entry = entries.get_mut(key)?;
        if let Some(indexed) = recency.remove(&entry.recency()) {
            entry.last_access = tick;
            recency.insert(entry.recency(), indexed);
        }
        Some(entry.clone())
    }

    // == Peek ==
    /// Returns the entry for `key` without touching its recency.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.shard_for(key).lock().entries.get(key).cloned()
    }

    // == Remove ==
    /// Removes `key`, returning the removed entry.
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.remove_if(key, |_| true)
    }

    /// Removes `key` only if its live entry still satisfies `pred`.
    ///
    /// Sweeps and evictions select candidates and remove them under separate
    /// lock acquisitions; the predicate re-checks the candidate so an entry
    /// overwritten or touched in between is left alone.
    pub fn remove_if<F>(&self, key: &str, pred: F) -> Option<CacheEntry>
    where
        F: FnOnce(&CacheEntry) -> bool,
    {
        let mut shard = self.shard_for(key).lock();
        let removed = if shard.entries.get(key).is_some_and(pred) {
            shard.take(key)
        } else {
            None
        };

        if let Some(entry) = &removed {
            self.forget(key, entry);
        }
        removed
    }

    fn forget(&self, key: &str, entry: &CacheEntry) {
        self.len.fetch_sub(1, Ordering::SeqCst);
        self.weight
            .fetch_sub(self.capacity.weight(key, &entry.value), Ordering::SeqCst);
    }

    // == Shard Access ==
    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Least recently used entry of shard `index` as `(recency, key)`.
    pub fn oldest_in_shard(&self, index: usize) -> Option<((u64, u64), String)> {
        let shard = self.shards.get(index)?.lock();
        shard
            .recency
            .iter()
            .next()
            .map(|(recency, key)| (*recency, key.clone()))
    }

    /// Collects `(key, seq)` of the entries of shard `index` whose deadline
    /// is at or before `now`.
    ///
    /// Reads the deadline index, so the cost is proportional to the number of
    /// expired entries rather than the size of the shard.
    pub fn expired_in_shard(&self, index: usize, now: u64) -> Vec<(String, u64)> {
        match self.shards.get(index) {
            Some(shard) => shard
                .lock()
                .deadlines
                .range(..=(now, u64::MAX))
                .map(|((_, seq), key)| (key.clone(), *seq))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The entry of shard `index` with the soonest deadline, if that deadline
    /// is at or before `now`.
    pub fn first_expired_in_shard(&self, index: usize, now: u64) -> Option<(String, u64)> {
        let shard = self.shards.get(index)?.lock();
        shard
            .deadlines
            .iter()
            .next()
            .filter(|((expires, _), _)| *expires <= now)
            .map(|((_, seq), key)| (key.clone(), *seq))
    }

    // == Size ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total weight of the stored entries under the configured capacity unit.
    pub fn weight(&self) -> usize {
        self.weight.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntryStore {
        EntryStore::new(4, Capacity::Entries(100), 64)
    }

    fn put(store: &EntryStore, key: &str, value: &str) -> Option<CacheEntry> {
        store
            .put(key.to_string(), Arc::from(value), None, 0)
            .unwrap()
    }

    #[test]
    fn test_store_new() {
        let store = store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.shard_count(), 4);
    }

    #[test]
    fn test_zero_shards_rounds_up_to_one() {
        let store = EntryStore::new(0, Capacity::Entries(1), 1);
        assert_eq!(store.shard_count(), 1);
    }

    #[test]
    fn test_put_and_get() {
        let store = store();
        assert!(put(&store, "key1", "value1").is_none());

        let entry = store.get("key1").unwrap();
        assert_eq!(&*entry.value, "value1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_replaces_entry() {
        let store = store();
        put(&store, "key1", "value1");
        let old = put(&store, "key1", "value2").unwrap();

        assert_eq!(&*old.value, "value1");
        assert_eq!(&*store.peek("key1").unwrap().value, "value2");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_sets_expiry() {
        let store = store();
        store
            .put("k".into(), Arc::from("v"), Some(Duration::from_secs(2)), 500)
            .unwrap();

        let entry = store.peek("k").unwrap();
        assert_eq!(entry.created_at, 500);
        assert_eq!(entry.expires_at, Some(2_500));
    }

    #[test]
    fn test_put_value_too_large_keeps_previous() {
        let store = store();
        put(&store, "k", "small");

        let result = store.put("k".into(), Arc::from("x".repeat(65)), None, 0);
        assert!(matches!(
            result,
            Err(CacheError::ValueTooLarge { size: 65, max: 64 })
        ));
        assert_eq!(&*store.peek("k").unwrap().value, "small");
    }

    #[test]
    fn test_get_touches_recency_peek_does_not() {
        let store = store();
        put(&store, "k", "v");
        let before = store.peek("k").unwrap();

        let peeked = store.peek("k").unwrap();
        assert_eq!(peeked.last_access, before.last_access);

        let touched = store.get("k").unwrap();
        assert!(touched.last_access > before.last_access);
        assert_eq!(touched.seq, before.seq);
    }

    #[test]
    fn test_get_nonexistent() {
        assert!(store().get("missing").is_none());
    }

    #[test]
    fn test_remove() {
        let store = store();
        put(&store, "k", "v");

        assert_eq!(&*store.remove("k").unwrap().value, "v");
        assert!(store.remove("k").is_none());
        assert!(store.is_empty());
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_remove_if_ignores_newer_write() {
        let store = store();
        put(&store, "k", "v1");
        let stale_seq = store.peek("k").unwrap().seq;
        put(&store, "k", "v2");

        assert!(store.remove_if("k", |e| e.seq == stale_seq).is_none());
        assert_eq!(&*store.peek("k").unwrap().value, "v2");

        let seq = store.peek("k").unwrap().seq;
        assert!(store.remove_if("k", |e| e.seq == seq).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_byte_weight_accounting() {
        let store = EntryStore::new(2, Capacity::Bytes(1_000), 100);
        put(&store, "ab", "1234");
        assert_eq!(store.weight(), 6);

        put(&store, "ab", "12");
        assert_eq!(store.weight(), 4);

        put(&store, "c", "1");
        assert_eq!(store.weight(), 6);

        store.remove("ab");
        assert_eq!(store.weight(), 2);
    }

    #[test]
    fn test_entry_weight_accounting() {
        let store = store();
        put(&store, "a", "1");
        put(&store, "b", "2");
        put(&store, "a", "3");
        assert_eq!(store.weight(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_oldest_in_shard_follows_access() {
        let store = EntryStore::new(1, Capacity::Entries(10), 10);
        put(&store, "a", "1");
        put(&store, "b", "2");

        assert_eq!(store.oldest_in_shard(0).unwrap().1, "a");
        store.get("a");
        assert_eq!(store.oldest_in_shard(0).unwrap().1, "b");
        assert!(store.oldest_in_shard(1).is_none());
    }

    #[test]
    fn test_expired_in_shard_uses_inclusive_deadline() {
        let store = EntryStore::new(1, Capacity::Entries(10), 10);
        let ttl = |secs| Some(Duration::from_secs(secs));
        store.put("a".into(), Arc::from("1"), ttl(1), 0).unwrap();
        store.put("b".into(), Arc::from("2"), ttl(2), 0).unwrap();
        put(&store, "forever", "3");

        assert!(store.expired_in_shard(0, 999).is_empty());
        let keys: Vec<String> = store
            .expired_in_shard(0, 1_000)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["a"]);
        assert_eq!(store.expired_in_shard(0, u64::MAX).len(), 2);
    }

    #[test]
    fn test_first_expired_in_shard_tracks_overwrite_and_remove() {
        let store = EntryStore::new(1, Capacity::Entries(10), 10);
        store
            .put("a".into(), Arc::from("1"), Some(Duration::from_secs(1)), 0)
            .unwrap();
        assert_eq!(store.first_expired_in_shard(0, 1_000).unwrap().0, "a");

        // Overwriting without a TTL drops the old deadline.
        put(&store, "a", "2");
        assert!(store.first_expired_in_shard(0, u64::MAX).is_none());

        store
            .put("b".into(), Arc::from("1"), Some(Duration::from_secs(1)), 0)
            .unwrap();
        store.remove("b");
        assert!(store.first_expired_in_shard(0, u64::MAX).is_none());
    }
}
