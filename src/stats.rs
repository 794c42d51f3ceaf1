//! Statistics for the file cache.
//!
//! Atomic counters updated on every cache operation, plus a plain snapshot
//! type for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache operations.
///
/// All counters are atomic and can be safely accessed from multiple threads,
/// including the timer thread that records expirations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups that found an entry.
    hits: AtomicU64,

    /// Lookups that found nothing.
    misses: AtomicU64,

    /// Successful inserts.
    inserts: AtomicU64,

    /// Inserts refused because the key was already cached.
    rejected_inserts: AtomicU64,

    /// Entries removed by their expiration timer.
    expirations: AtomicU64,

    /// Entries removed explicitly (`remove` or `clear`).
    removals: AtomicU64,

    /// Current number of entries.
    size: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        self.size.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_insert(&self) {
        self.rejected_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
        self.size.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_removals(&self, count: u64) {
        self.removals.fetch_add(count, Ordering::Relaxed);
        self.size.fetch_sub(count, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn rejected_inserts(&self) -> u64 {
        self.rejected_inserts.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    /// Hit rate as a percentage (0.0 to 100.0); 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            inserts: self.inserts(),
            rejected_inserts: self.rejected_inserts(),
            expirations: self.expirations(),
            removals: self.removals(),
            size: self.size(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub rejected_inserts: u64,
    pub expirations: u64,
    pub removals: u64,
    pub size: u64,
    pub hit_rate: f64,
}
