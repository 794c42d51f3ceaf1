//! The main cache interface.
//!
//! [`FileCache`] maps file paths to file contents. Each entry lives for a
//! fixed TTL measured from its insertion and is removed by a timer, not on
//! access.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ttl_from_secs, CacheConfig};
use crate::entry::CacheKey;
use crate::error::CacheResult;
use crate::stats::{CacheStats, StatsSnapshot};
use crate::storage::Store;
use crate::timer::{Scheduler, ThreadScheduler};

/// A thread-safe, timer-expired cache of file contents.
///
/// Cloning a `FileCache` creates another handle to the same entries.
///
/// # Example
/// ```
/// use static_cache_server::{CacheConfig, FileCache};
/// use std::time::Duration;
///
/// let cache = FileCache::new(CacheConfig::new().ttl(Duration::from_secs(60)).build());
///
/// assert!(cache.insert("content/a.txt", "hello"));
/// assert!(!cache.insert("content/a.txt", "ignored"));
/// assert_eq!(cache.lookup("content/a.txt").as_deref(), Some(&b"hello"[..]));
/// ```
#[derive(Debug, Clone)]
pub struct FileCache {
    store: Arc<Store>,
}

impl FileCache {
    /// Create a cache whose expirations run on a dedicated timer thread.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_scheduler(config, Arc::new(ThreadScheduler::new()))
    }

    /// Create a cache that schedules expirations on `scheduler`.
    ///
    /// ```
    /// use static_cache_server::timer::ManualScheduler;
    /// use static_cache_server::{CacheConfig, FileCache};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let clock = Arc::new(ManualScheduler::new());
    /// let cache = FileCache::with_scheduler(
    ///     CacheConfig::new().ttl(Duration::from_secs(2)).build(),
    ///     clock.clone(),
    /// );
    ///
    /// cache.insert("a.txt", "hello");
    /// clock.advance(Duration::from_secs(3));
    /// assert!(cache.lookup("a.txt").is_none());
    /// ```
    pub fn with_scheduler(config: CacheConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            store: Arc::new(Store::new(config, scheduler)),
        }
    }

    /// Cache `content` under `path`.
    ///
    /// Returns `false`, changing nothing, if `path` is already cached. The
    /// entry expires one TTL after this call.
    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Bytes>) -> bool {
        self.try_insert(path, content).is_ok()
    }

    /// Like [`insert`](Self::insert) but reports the collision as
    /// [`CacheError::DuplicateKey`](crate::CacheError::DuplicateKey).
    pub fn try_insert(&self, path: impl AsRef<Path>, content: impl Into<Bytes>) -> CacheResult<()> {
        self.store.insert(CacheKey::new(path), content.into())
    }

    /// The cached contents of `path`, if present.
    ///
    /// Lookups never extend an entry's lifetime.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.store.lookup(&CacheKey::new(path))
    }

    /// Check for `path` without counting a hit or miss.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.store.contains(&CacheKey::new(path))
    }

    /// Drop `path` ahead of its TTL and cancel its expiration timer.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.store.remove(&CacheKey::new(path))
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// TTL given to entries inserted from now on.
    pub fn ttl(&self) -> Duration {
        self.store.ttl()
    }

    /// Change the TTL of future inserts. Entries already cached keep the
    /// lifetime they were inserted with.
    pub fn set_ttl(&self, ttl: Duration) {
        self.store.set_ttl(ttl);
    }

    /// [`set_ttl`](Self::set_ttl) in whole seconds; zero or negative means
    /// entries expire as soon as the scheduler gets to them.
    pub fn set_ttl_secs(&self, secs: i64) {
        self.set_ttl(ttl_from_secs(secs));
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot()
    }

    /// Shared handle to the live counters.
    pub fn stats_ref(&self) -> Arc<CacheStats> {
        self.store.stats()
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
