//! Expiring key-value cache over a pluggable storage backend
//!
//! Entries are stored as JSON envelopes holding the data, the write time and
//! a time-to-live. Expired entries are dropped lazily on read, and in bulk
//! when a write runs into the storage quota.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::storage::{Storage, StorageError};

/// Prefix applied to every key this cache writes
pub const CACHE_PREFIX: &str = "omdb_cache_";

/// Default lifetime of a cache entry (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Separator used by [`make_key`]
const KEY_SEPARATOR: &str = "_";

/// Envelope written to storage for every cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// Epoch milliseconds when the entry was written
    timestamp: i64,
    /// Lifetime of the entry in milliseconds
    ttl: u64,
}

impl<T> CacheEntry<T> {
    /// An entry is expired once more than `ttl` ms have passed since it was written
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) > i64::try_from(self.ttl).unwrap_or(i64::MAX)
    }
}

/// Builds a cache key by joining the non-empty parts with `_`
///
/// `make_key(["search", "batman", "1"])` gives `"search_batman_1"`.
pub fn make_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|part| !part.as_ref().is_empty())
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Best-effort response cache with TTL expiry
///
/// Storage failures are logged and swallowed: a read that fails is a miss,
/// a write that fails is dropped. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct CacheManager {
    storage: Arc<dyn Storage>,
    default_ttl: Duration,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Creates a cache over `storage` with the 30 minute default TTL
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Overrides the TTL used by [`CacheManager::set`]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The TTL applied by [`CacheManager::set`]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    /// Reads a live entry
    ///
    /// Returns `None` when the entry is missing, expired, or cannot be
    /// decoded as `T`. Expired entries are removed from storage.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = Self::storage_key(key);

        let raw = match self.storage.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Cache read error for {}: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Cache read error for {}: {}", key, e);
                return None;
            }
        };

        if entry.is_expired(Utc::now().timestamp_millis()) {
            debug!("Cache entry {} expired", key);
            if let Err(e) = self.storage.remove_item(&storage_key) {
                error!("Failed to remove expired cache entry {}: {}", key, e);
            }
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => Some(data),
            Err(e) => {
                error!("Cache entry {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Writes `data` with the default TTL
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        self.set_with_ttl(key, data, self.default_ttl);
    }

    /// Writes `data` with an explicit TTL
    ///
    /// If storage reports its quota is exhausted, expired entries are swept
    /// and the write is retried once. Any remaining failure is logged and
    /// the write is dropped.
    pub fn set_with_ttl<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) {
        let storage_key = Self::storage_key(key);

        let serialized = match self.serialize_entry(data, ttl) {
            Ok(json) => json,
            Err(e) => {
                error!("Cache write error for {}: {}", key, e);
                return;
            }
        };

        match self.storage.set_item(&storage_key, &serialized) {
            Ok(()) => {}
            Err(e @ StorageError::QuotaExceeded { .. }) => {
                warn!("Cache write error for {}: {}; evicting expired entries", key, e);
                self.evict_expired();

                let retry = self
                    .serialize_entry(data, ttl)
                    .map_err(|e| StorageError::Backend(e.to_string()))
                    .and_then(|json| self.storage.set_item(&storage_key, &json));
                if let Err(e) = retry {
                    error!("Cache write retry failed for {}: {}", key, e);
                }
            }
            Err(e) => error!("Cache write error for {}: {}", key, e),
        }
    }

    fn serialize_entry<T: Serialize>(&self, data: &T, ttl: Duration) -> serde_json::Result<String> {
        let entry = CacheEntry {
            data,
            timestamp: Utc::now().timestamp_millis(),
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        serde_json::to_string(&entry)
    }

    /// Removes every entry under the cache prefix, leaving other keys alone
    pub fn clear(&self) {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("Cache clear error: {}", e);
                return;
            }
        };

        for key in keys.iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            if let Err(e) = self.storage.remove_item(key) {
                error!("Cache clear error for {}: {}", key, e);
            }
        }
    }

    /// Sweeps the cache prefix once, removing expired or unreadable entries
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("Clear old cache error: {}", e);
                return 0;
            }
        };

        let now = Utc::now().timestamp_millis();
        let mut removed = 0;

        for key in keys.iter().filter(|k| k.starts_with(CACHE_PREFIX)) {
            let stale = match self.storage.get_item(key) {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry<Value>>(&raw)
                    .map(|entry| entry.is_expired(now))
                    .unwrap_or(true),
                Ok(None) => false,
                Err(e) => {
                    error!("Clear old cache error for {}: {}", key, e);
                    false
                }
            };

            if stale {
                match self.storage.remove_item(key) {
                    Ok(()) => removed += 1,
                    Err(e) => error!("Clear old cache error for {}: {}", key, e),
                }
            }
        }

        debug!("Evicted {} expired cache entries", removed);
        removed
    }
}
