//! In-memory query result cache
//!
//! Memoizes read-endpoint responses for a short window. Entries age out after
//! the cache's TTL and writers can drop everything at once with
//! [`QueryCache::clear`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;
use url::form_urlencoded;

use super::clock::{Clock, SystemClock};

/// Default time-to-live for cached query results
pub const DEFAULT_TTL_SECS: u64 = 60;

/// A cached value and the time it was stored
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// Snapshot of the value at insertion time
    value: V,
    /// When the entry was stored
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    /// An entry is valid while its age is strictly below the TTL
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Keyed, time-limited cache for query results
///
/// The cache is explicitly constructed and shared through `Arc` between the
/// read path and any writer that needs to invalidate it. All operations are
/// total: a missing or expired key is reported as `None`, never as an error.
#[derive(Debug)]
pub struct QueryCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> QueryCache<V> {
    /// Creates a cache with the default 60 second TTL and the system clock
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Creates a cache with a custom TTL and the system clock
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache with a custom TTL and time source
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// The TTL entries are judged against
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave the map half-written
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the value stored under `key` if it is younger than the TTL
    ///
    /// Expired entries are never returned; they stay in the map until they are
    /// overwritten, cleared, or removed by [`QueryCache::purge_expired`].
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                trace!(key, "query cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                trace!(key, "query cache entry expired");
                None
            }
            None => {
                trace!(key, "query cache miss");
                None
            }
        }
    }

    /// Stores `value` under `key`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
        };
        self.entries().insert(key.into(), entry);
    }

    /// Removes every entry regardless of age
    pub fn clear(&self) {
        let mut entries = self.entries();
        let dropped = entries.len();
        entries.clear();
        trace!(dropped, "query cache cleared");
    }

    /// Evicts entries whose age has reached the TTL, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, ttl));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the cache holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a cache key from a path and query parameters
///
/// Parameters are sorted by name (then value) so the same logical query always
/// yields the same key, whatever order the caller listed them in. Names and
/// values are form-encoded, so the key is also a valid request target and no
/// value can smuggle in another parameter or a fragment.
pub fn cache_key(path: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort();

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (name, value) in sorted {
        query.append_pair(name, value);
    }

    format!("{}?{}", path, query.finish())
}
