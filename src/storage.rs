//! Internal storage implementation for the cache.
//!
//! One `Mutex` guards the whole key → entry map. Every insert schedules a
//! one-shot expiration on the injected [`Scheduler`]; the callback holds only
//! a weak reference to the store and removes the key only if the entry still
//! carries the generation it was scheduled for.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::entry::{CacheKey, Entry};
use crate::error::{CacheError, CacheResult};
use crate::stats::CacheStats;
use crate::timer::Scheduler;

/// Thread-safe file store. Users should go through `FileCache` instead.
pub struct Store {
    entries: Mutex<HashMap<CacheKey, Entry>>,

    /// Fires the expirations.
    scheduler: Arc<dyn Scheduler>,

    /// TTL applied to future inserts, in nanoseconds.
    ttl_nanos: AtomicU64,

    /// Source of per-insert generations.
    generations: AtomicU64,

    stats: Arc<CacheStats>,
}

impl Store {
    pub fn new(config: CacheConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            scheduler,
            ttl_nanos: AtomicU64::new(duration_nanos(config.ttl)),
            generations: AtomicU64::new(0),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Store `value` under `key` unless the key is already present.
    pub fn insert(self: &Arc<Self>, key: CacheKey, value: Bytes) -> CacheResult<()> {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            self.stats.record_rejected_insert();
            trace!(%key, "insert rejected, key already cached");
            return Err(CacheError::DuplicateKey(key));
        }

        let ttl = self.ttl();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        // Scheduling under the map lock is safe: no scheduler runs a callback
        // from inside `schedule`, and the callback blocks on this lock until
        // the entry below is in place.
        let store = Arc::downgrade(self);
        let expiring = key.clone();
        let timer = self.scheduler.schedule(
            ttl,
            Box::new(move || expire(&store, &expiring, generation)),
        );

        debug!(%key, bytes = value.len(), ttl_secs = ttl.as_secs_f64(), "cached file");
        entries.insert(key, Entry::new(value, generation, timer));
        self.stats.record_insert();
        Ok(())
    }

    /// The cached contents for `key`, if present. Does not extend the TTL.
    pub fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let value = self.lock().get(key).map(|entry| entry.value.clone());
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Remove `key` now and cancel its pending expiration.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(entry) => {
                self.scheduler.cancel(entry.timer);
                self.stats.record_removals(1);
                true
            }
            None => false,
        }
    }

    /// Remove every entry and cancel every pending expiration.
    pub fn clear(&self) -> usize {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            self.scheduler.cancel(entry.timer);
        }
        self.stats.record_removals(drained.len() as u64);
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_nanos(self.ttl_nanos.load(Ordering::Relaxed))
    }

    /// Change the TTL for future inserts; existing entries keep theirs.
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_nanos.store(duration_nanos(ttl), Ordering::Relaxed);
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Remove `key` if it still holds the entry from `generation`.
    fn expire_generation(&self, key: &CacheKey, generation: u64) -> bool {
        let mut entries = self.lock();
        let current = entries
            .get(key)
            .is_some_and(|entry| entry.is_generation(generation));
        if current {
            entries.remove(key);
            drop(entries);
            self.stats.record_expiration();
            debug!(%key, "evicted expired file from cache");
        }
        current
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expire(store: &Weak<Store>, key: &CacheKey, generation: u64) {
    if let Some(store) = store.upgrade() {
        if !store.expire_generation(key, generation) {
            trace!(%key, generation, "stale expiration ignored");
        }
    }
}

fn duration_nanos(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX)
}

impl Drop for Store {
    fn drop(&mut self) {
        let entries = self
            .entries
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values() {
            self.scheduler.cancel(entry.timer);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .field("ttl", &self.ttl())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualScheduler;

    fn store_with_ttl(ttl: Duration) -> (Arc<Store>, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let store = Arc::new(Store::new(
            CacheConfig::new().ttl(ttl).build(),
            Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        ));
        (store, scheduler)
    }

    #[test]
    fn test_insert_then_lookup() {
        let (store, _) = store_with_ttl(Duration::from_secs(10));
        let key = CacheKey::new("a.txt");

        store.insert(key.clone(), Bytes::from("hello")).unwrap();
        assert_eq!(store.lookup(&key), Some(Bytes::from("hello")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_keeps_original() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        let key = CacheKey::new("a.txt");

        store.insert(key.clone(), Bytes::from("v1")).unwrap();
        let err = store.insert(key.clone(), Bytes::from("v2")).unwrap_err();

        assert!(matches!(err, CacheError::DuplicateKey(k) if k == key));
        assert_eq!(store.lookup(&key), Some(Bytes::from("v1")));
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(store.stats().rejected_inserts(), 1);
    }

    #[test]
    fn test_expiration_removes_entry() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        let key = CacheKey::new("a.txt");
        store.insert(key.clone(), Bytes::from("hello")).unwrap();

        scheduler.advance(Duration::from_secs(9));
        assert!(store.contains(&key));

        scheduler.advance(Duration::from_secs(1));
        assert!(!store.contains(&key));
        assert_eq!(store.stats().expirations(), 1);
        assert_eq!(store.stats().size(), 0);
    }

    #[test]
    fn test_stale_expiration_spares_reinserted_entry() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        let key = CacheKey::new("a.txt");
        store.insert(key.clone(), Bytes::from("old")).unwrap();
        let stale_generation = store.lock()[&key].generation;

        // Bypass `remove` so the old timer stays armed.
        store.lock().remove(&key);
        scheduler.advance(Duration::from_secs(5));
        store.insert(key.clone(), Bytes::from("new")).unwrap();

        assert!(!store.expire_generation(&key, stale_generation));
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(store.lookup(&key), Some(Bytes::from("new")));

        scheduler.advance(Duration::from_secs(5));
        assert!(!store.contains(&key));
    }

    #[test]
    fn test_remove_cancels_timer() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        let key = CacheKey::new("a.txt");
        store.insert(key.clone(), Bytes::from("hello")).unwrap();

        assert!(store.remove(&key));
        assert!(!store.remove(&key));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(store.stats().removals(), 1);
    }

    #[test]
    fn test_clear_cancels_all_timers() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        for name in ["a", "b", "c"] {
            store.insert(CacheKey::new(name), Bytes::from(name)).unwrap();
        }

        assert_eq!(store.clear(), 3);
        assert!(store.is_empty());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(store.stats().size(), 0);
    }

    #[test]
    fn test_set_ttl_applies_to_future_inserts_only() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        store.insert(CacheKey::new("early"), Bytes::from("1")).unwrap();

        store.set_ttl(Duration::from_secs(100));
        store.insert(CacheKey::new("late"), Bytes::from("2")).unwrap();

        scheduler.advance(Duration::from_secs(10));
        assert!(!store.contains(&CacheKey::new("early")));
        assert!(store.contains(&CacheKey::new("late")));
    }

    #[test]
    fn test_zero_ttl_expires_on_next_tick() {
        let (store, scheduler) = store_with_ttl(Duration::ZERO);
        let key = CacheKey::new("a.txt");
        store.insert(key.clone(), Bytes::from("x")).unwrap();

        assert_eq!(scheduler.advance(Duration::ZERO), 1);
        assert!(!store.contains(&key));
    }

    #[test]
    fn test_dropping_store_cancels_timers() {
        let (store, scheduler) = store_with_ttl(Duration::from_secs(10));
        store.insert(CacheKey::new("a"), Bytes::from("1")).unwrap();
        drop(store);

        assert_eq!(scheduler.pending(), 0);
    }
}
