//! Expiration Tracker Module
//!
//! Decides entry liveness and sweeps expired entries out of the store one
//! entry at a time.

use crate::cache::{CacheEntry, EntryStore};

// == Is Expired ==
/// Checks whether `entry` has expired at `now`.
///
/// The boundary is inclusive: an entry expiring exactly at `now` is expired.
pub fn is_expired(entry: &CacheEntry, now: u64) -> bool {
    match entry.expires_at {
        Some(expires) => now >= expires,
        None => false,
    }
}

// == Sweep ==
/// Removes every entry expired at `now` and returns the removed keys.
///
/// Each shard is locked only while collecting candidates. Candidates are
/// then removed one by one, each under its own short lock, and only if the
/// live entry is still the one that was found expired.
pub fn sweep(store: &EntryStore, now: u64) -> Vec<String> {
    let mut removed = Vec::new();

    for index in 0..store.shard_count() {
        for (key, seq) in store.expired_in_shard(index, now) {
            if remove_expired(store, &key, seq, now) {
                removed.push(key);
            }
        }
    }

    removed
}

// == Reclaim ==
/// Removes a single expired entry, if any shard holds one.
///
/// Used under capacity pressure so dead entries give up their room before a
/// live entry is evicted.
pub fn reclaim_one(store: &EntryStore, now: u64) -> Option<String> {
    (0..store.shard_count()).find_map(|index| {
        let (key, seq) = store.first_expired_in_shard(index, now)?;
        remove_expired(store, &key, seq, now).then_some(key)
    })
}

fn remove_expired(store: &EntryStore, key: &str, seq: u64, now: u64) -> bool {
    store
        .remove_if(key, |entry| entry.seq == seq && is_expired(entry, now))
        .is_some()
}
