//! TTL + capacity-bounded memoization cache.
//!
//! Entries are lazily evicted on read when their TTL has elapsed, the way
//! the rest of the engine's in-memory state behaves. Eviction under
//! capacity pressure prunes expired entries first and then drops the single
//! oldest-by-creation entry.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// A single cached value with its creation and expiry deadlines.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Configuration for a [`QuoteCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without an override.
    pub default_ttl: Duration,
    /// Upper bound on stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(30),
            max_entries: 1000,
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total stored entries, including expired ones not yet evicted.
    pub size: usize,
    /// Entries still within their TTL.
    pub valid: usize,
    /// Entries past their TTL awaiting eviction.
    pub expired: usize,
    /// Mean age of all entries in milliseconds.
    pub avg_age_ms: f64,
}

/// TTL + capacity-bounded cache keyed by fingerprint strings.
///
/// Expired reads return `None`; the cache never errors. Concurrent misses
/// on the same key may both invoke the factory in [`get_or_set`] — an
/// accepted race, documented in the engine's concurrency model.
///
/// [`get_or_set`]: QuoteCache::get_or_set
#[derive(Debug)]
pub struct QuoteCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    config: CacheConfig,
}

impl<T: Clone> QuoteCache<T> {
    /// Create an empty cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Get the value for a key. Returns `None` if absent or expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return None;
            }
            return Some(entry.value.clone());
        }
        None
    }

    /// Store a value, overwriting any previous entry for the key.
    ///
    /// When the cache is at capacity, expired entries are pruned first; if
    /// it is still full, the single oldest-by-creation entry is evicted.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            let pruned = self.prune();
            if pruned == 0 && self.entries.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Return the cached value for `key`, or invoke `factory` to produce,
    /// store, and return it.
    ///
    /// The factory is invoked at most once per cache generation for a key,
    /// except under the documented concurrent-miss race. Factory errors are
    /// propagated unchanged and nothing is stored.
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, factory: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = factory().await?;
        self.set(key, value.clone(), None);
        Ok(value)
    }

    /// Remove all expired entries and return the count removed.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "pruned expired cache entries");
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut valid = 0usize;
        let mut expired = 0usize;
        let mut total_age_ms = 0.0f64;
        for entry in &self.entries {
            if entry.is_expired() {
                expired += 1;
            } else {
                valid += 1;
            }
            total_age_ms += now.duration_since(entry.created_at).as_secs_f64() * 1000.0;
        }
        let size = valid + expired;
        CacheStats {
            size,
            valid,
            expired,
            #[allow(clippy::cast_precision_loss)]
            avg_age_ms: if size == 0 { 0.0 } else { total_age_ms / size as f64 },
        }
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict the single oldest-by-creation entry.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            debug!(%key, "evicting oldest cache entry at capacity");
            self.entries.remove(&key);
        }
    }
}

impl<T: Clone> Default for QuoteCache<T> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
