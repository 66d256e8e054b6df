//! In-memory response cache with a fixed TTL.
//!
//! Keys are opaque strings derived from the logical request (see
//! [`cache_key`]). Expired entries read as absent and are dropped lazily
//! when the entry bound is reached. The cache is best effort: a poisoned
//! lock reads as a miss and skips the write.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Build a cache key from an operation name and its parameters.
///
/// Parameters are hashed so keys stay short whatever the input, while the
/// operation name stays readable in logs.
pub fn cache_key(operation: &str, params: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(param.as_bytes());
    }
    let result = hasher.finalize();
    format!("{}:{}", operation, hex::encode(&result[..8]))
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL cache safe for concurrent `get`/`set`.
#[derive(Debug)]
pub struct ResponseCache<V = Value> {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Store a value, expiring `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Response cache lock poisoned; treating {} as a miss", key);
                return None;
            }
        };

        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    fn set_at(&self, key: String, value: V, now: Instant) {
        let expires_at = match now.checked_add(self.ttl) {
            Some(at) => at,
            None => {
                warn!("Cache TTL {:?} overflows the clock; not caching {}", self.ttl, key);
                return;
            }
        };

        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Response cache lock poisoned; not caching {}", key);
                return;
            }
        };

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
            debug!(
                "Response cache full, evicted {} entries",
                before - entries.len()
            );
        }

        entries.insert(
            key,
            CacheEntry { value, expires_at },
        );
    }

    /// Number of stored entries, live or expired.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
