//! Cache Engine Module
//!
//! Public facade over the entry store: validation, lazy expiration on read,
//! eviction on admission, and statistics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::cache::{
    expiry, CacheStats, Capacity, Clock, EntryStore, EvictionPolicy, LruPolicy, StatsCounters,
    SystemClock, DEFAULT_SHARDS, MAX_KEY_LENGTH, MAX_VALUE_SIZE,
};
use crate::error::{CacheError, Result};

/// Policy scans that may come back empty while entries move between shards
/// before the failure is reported.
const MAX_VICTIM_ATTEMPTS: usize = 64;

// == Cache Config ==
/// Parameters consumed by the engine at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Entry-count or byte bound
    pub capacity: Capacity,
    /// Largest accepted value, in bytes
    pub max_value_size: usize,
    /// TTL applied to writes that do not carry one; None = never expire
    pub default_ttl: Option<Duration>,
    /// Background sweep period; None = lazy expiration only
    pub sweep_interval: Option<Duration>,
    /// Number of independently locked store partitions
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::Entries(1000),
            max_value_size: MAX_VALUE_SIZE,
            default_ttl: None,
            sweep_interval: Some(Duration::from_secs(1)),
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CacheConfig {
    /// Rejects configurations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.capacity.limit() == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_value_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max value size must be greater than zero".to_string(),
            ));
        }
        if let Capacity::Bytes(limit) = self.capacity {
            if self.max_value_size > limit {
                return Err(CacheError::InvalidConfig(format!(
                    "max value size {} exceeds byte capacity {}",
                    self.max_value_size, limit
                )));
            }
        }
        if self.shards == 0 {
            return Err(CacheError::InvalidConfig(
                "shard count must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// == Cache Engine ==
/// Concurrent in-memory cache with TTL expiration and pluggable eviction.
///
/// The engine is `Send + Sync`; share it as `Arc<CacheEngine>`. Writers to
/// different keys only contend when they land in the same shard.
#[derive(Debug)]
pub struct CacheEngine {
    store: EntryStore,
    policy: Box<dyn EvictionPolicy>,
    clock: Arc<dyn Clock>,
    stats: StatsCounters,
    /// Capacity claimed by writers that have not inserted yet
    reserved: AtomicUsize,
    config: CacheConfig,
}

impl CacheEngine {
    // == Constructors ==
    /// Creates an engine on the system clock with LRU eviction.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Creates an engine reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let store = EntryStore::new(config.shards, config.capacity, config.max_value_size);
        info!(
            "Cache engine created: capacity={} {}, shards={}, max_value_size={}",
            config.capacity.limit(),
            config.capacity.unit(),
            store.shard_count(),
            config.max_value_size
        );

        Ok(Self {
            store,
            policy: Box::new(LruPolicy::new()),
            clock,
            stats: StatsCounters::new(),
            reserved: AtomicUsize::new(0),
            config,
        })
    }

    /// Replaces the eviction policy.
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: EvictionPolicy + 'static,
    {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Get ==
    /// Returns the live value for `key`, marking it most recently used.
    ///
    /// An expired entry is reported as absent and removed on the spot.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.get_with_ttl(key).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also returning the remaining lifetime read
    /// from the same entry (`None` if it never expires).
    pub fn get_with_ttl(&self, key: &str) -> Option<(Arc<str>, Option<Duration>)> {
        let now = self.clock.now_ms();

        match self.store.get(key) {
            Some(entry) if expiry::is_expired(&entry, now) => {
                if self
                    .store
                    .remove_if(key, |live| live.seq == entry.seq)
                    .is_some()
                {
                    self.stats.record_expirations(1);
                    debug!(key, "Removed expired entry on read");
                }
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                self.stats.record_hit();
                let ttl = entry.ttl_remaining_ms(now).map(Duration::from_millis);
                Some((entry.value, ttl))
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` falls back to the configured default. When the write would
    /// exceed capacity, expired entries are reclaimed and then live ones
    /// evicted, before insertion. A rejected write leaves the previous value
    /// in place.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<Arc<str>>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();

        validate_key(&key)?;
        if value.len() > self.config.max_value_size {
            return Err(CacheError::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            });
        }
        let ttl = match ttl {
            Some(ttl) if ttl.is_zero() => {
                return Err(CacheError::InvalidTtl(
                    "TTL must be greater than zero".to_string(),
                ))
            }
            Some(ttl) => Some(ttl),
            None => self.config.default_ttl,
        };

        let capacity = self.store.capacity();
        let added = capacity.weight(&key, &value);
        if added > capacity.limit() {
            return Err(CacheError::ValueTooLarge {
                size: value.len(),
                max: capacity.limit().saturating_sub(key.len()),
            });
        }

        // The entry being replaced becomes most recent so other entries are
        // evicted to make room for its new value.
        self.store.get(&key);

        let reserved = self.reserve(&key, added)?;
        let result = self.store.put(key, value, ttl, self.clock.now_ms());
        self.reserved.fetch_sub(reserved, Ordering::SeqCst);
        result?;

        self.enforce_capacity()
    }

    // == Delete ==
    /// Removes `key`, returning whether a live entry was present.
    ///
    /// An expired entry is removed as well but reported as absent, matching
    /// what `get` would have returned.
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now_ms();

        match self.store.remove(key) {
            Some(entry) if expiry::is_expired(&entry, now) => {
                self.stats.record_expirations(1);
                debug!(key, "Removed expired entry on delete");
                false
            }
            Some(_) => {
                debug!(key, "Deleted entry");
                true
            }
            None => false,
        }
    }

    // == TTL ==
    /// Remaining lifetime of a live key without touching it.
    ///
    /// `None` if the key is absent or expired, `Some(None)` if it never
    /// expires.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let now = self.clock.now_ms();
        let entry = self.store.peek(key)?;
        if expiry::is_expired(&entry, now) {
            return None;
        }
        Some(entry.ttl_remaining_ms(now).map(Duration::from_millis))
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let capacity = self.store.capacity();
        self.stats.snapshot(
            self.store.len(),
            self.store.weight(),
            capacity.limit(),
            capacity.unit(),
        )
    }

    /// Current number of entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Sweep ==
    /// Removes every expired entry now and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let removed = expiry::sweep(&self.store, self.clock.now_ms()).len();
        self.stats.record_expirations(removed as u64);
        removed
    }

    // == Capacity Management ==
    /// Claims room for writing `added` units under `key`, freeing entries
    /// until they fit. Returns the amount claimed.
    ///
    /// The weight of the entry being replaced counts as free room. It is
    /// re-read on every pass because freeing may have removed it.
    fn reserve(&self, key: &str, added: usize) -> Result<usize> {
        let capacity = self.store.capacity();
        let limit = capacity.limit();

        loop {
            let replaced = self
                .store
                .peek(key)
                .map(|entry| capacity.weight(key, &entry.value))
                .unwrap_or(0);
            let needed = added.saturating_sub(replaced);

            let reserved = self.reserved.load(Ordering::SeqCst);
            if self.store.weight() + reserved + needed <= limit {
                if self
                    .reserved
                    .compare_exchange(
                        reserved,
                        reserved + needed,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return Ok(needed);
                }
                continue;
            }

            if !self.free_one()? {
                // Nothing left to evict: the room is held by in-flight
                // writers. Admit now; their trailing pass restores the bound.
                self.reserved.fetch_add(needed, Ordering::SeqCst);
                return Ok(needed);
            }
        }
    }

    /// Frees until the committed weight is back within capacity.
    fn enforce_capacity(&self) -> Result<()> {
        let limit = self.store.capacity().limit();
        while self.store.weight() > limit {
            if !self.free_one()? {
                break;
            }
        }
        Ok(())
    }

    /// Removes one entry to make room: an expired one if any shard holds
    /// one, otherwise the eviction policy's victim.
    ///
    /// Returns `Ok(false)` when the store is empty.
    fn free_one(&self) -> Result<bool> {
        if let Some(key) = expiry::reclaim_one(&self.store, self.clock.now_ms()) {
            self.stats.record_expirations(1);
            debug!(key = %key, "Reclaimed expired entry for capacity");
            return Ok(true);
        }
        self.evict_one()
    }

    /// Evicts one victim chosen by the policy.
    ///
    /// A victim touched or overwritten after selection is skipped; the
    /// caller loops. A scan that finds nothing while the store holds entries
    /// raced with writers moving entries between shards and is retried.
    fn evict_one(&self) -> Result<bool> {
        for _ in 0..MAX_VICTIM_ATTEMPTS {
            match self.policy.select_victim(&self.store) {
                Ok(victim) => {
                    if self
                        .store
                        .remove_if(&victim.key, |entry| victim.matches(entry))
                        .is_some()
                    {
                        self.stats.record_eviction();
                        debug!(key = %victim.key, policy = self.policy.name(), "Evicted entry");
                    }
                    return Ok(true);
                }
                Err(CacheError::EmptyStore) if self.store.is_empty() => return Ok(false),
                Err(CacheError::EmptyStore) => std::thread::yield_now(),
                Err(err) => {
                    error!(
                        policy = self.policy.name(),
                        entries = self.store.len(),
                        "Eviction failed: {}",
                        err
                    );
                    return Err(err);
                }
            }
        }

        error!(
            policy = self.policy.name(),
            entries = self.store.len(),
            "Eviction policy found no victim in a non-empty store"
        );
        Err(CacheError::EmptyStore)
    }
}

// == Key Validation ==
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
