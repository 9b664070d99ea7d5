//! # Cache
//!
//! Named keyed cache regions with TTL expiry, bounded size, and prefix
//! eviction. Values are stored as JSON snapshots so readers never observe
//! a partially written structure. Eviction is synchronous; writers run
//! their invalidation row before returning (see [`invalidation`]).

pub mod invalidation;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::constants::CACHE_REGION_CAPACITY;
use crate::observability::metrics;

pub const CONFIG_CONTENT: &str = "config-content";
pub const COMMIT_HISTORY: &str = "commit-history";
pub const LATEST_COMMIT: &str = "latest-commit";
pub const COMMIT_DETAILS: &str = "commit-details";
pub const VAULT_SECRETS: &str = "vault-secrets";
pub const NAMESPACES: &str = "namespaces";
pub const DIRECTORY_LISTING: &str = "directory-listing";
pub const NAMESPACE_EVENTS: &str = "namespace-events";
pub const NAMESPACE_NOTIFICATIONS: &str = "namespace-notifications";

const REGIONS: [&str; 9] = [
    CONFIG_CONTENT,
    COMMIT_HISTORY,
    LATEST_COMMIT,
    COMMIT_DETAILS,
    VAULT_SECRETS,
    NAMESPACES,
    DIRECTORY_LISTING,
    NAMESPACE_EVENTS,
    NAMESPACE_NOTIFICATIONS,
];

struct Entry {
    value: Value,
    inserted_at: Instant,
}

#[derive(Default)]
struct Region {
    entries: RwLock<HashMap<String, Entry>>,
}

/// Process-wide cache with one store per named region.
pub struct Cache {
    ttl: Duration,
    capacity: usize,
    regions: HashMap<&'static str, Region>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Cache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, CACHE_REGION_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let regions = REGIONS
            .iter()
            .map(|name| (*name, Region::default()))
            .collect();
        Self {
            ttl,
            capacity,
            regions,
        }
    }

    fn region(&self, name: &str) -> &Region {
        self.regions
            .get(name)
            .unwrap_or_else(|| panic!("unknown cache region: {name}"))
    }

    /// Look up a snapshot, deserializing into the caller's type.
    /// Expired entries are removed on access and count as misses.
    pub fn get<T: DeserializeOwned>(&self, region: &str, key: &str) -> Option<T> {
        let store = self.region(region);
        let expired = {
            let entries = store.entries.read().expect("cache lock poisoned");
            match entries.get(key) {
                Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                    let value = serde_json::from_value(entry.value.clone()).ok();
                    if value.is_some() {
                        metrics::record_cache_hit(region);
                    }
                    return value;
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            store
                .entries
                .write()
                .expect("cache lock poisoned")
                .remove(key);
        }
        metrics::record_cache_miss(region);
        None
    }

    /// Store a snapshot. At capacity the oldest entry in the region is
    /// dropped first.
    pub fn put<T: Serialize>(&self, region: &str, key: &str, value: &T) {
        let Ok(snapshot) = serde_json::to_value(value) else {
            debug!("value for {region}[{key}] is not serializable; skipping cache");
            return;
        };
        let store = self.region(region);
        let mut entries = store.entries.write().expect("cache lock poisoned");
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: snapshot,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove a single key from a region.
    pub fn evict_key(&self, region: &str, key: &str) {
        let removed = self
            .region(region)
            .entries
            .write()
            .expect("cache lock poisoned")
            .remove(key)
            .is_some();
        if removed {
            metrics::record_cache_eviction(region);
        }
    }

    /// Clear an entire region.
    pub fn evict_all(&self, region: &str) {
        let mut entries = self
            .region(region)
            .entries
            .write()
            .expect("cache lock poisoned");
        let count = entries.len();
        entries.clear();
        if count > 0 {
            metrics::record_cache_eviction(region);
        }
    }

    /// Remove every key starting with `prefix`. Linear scan over the
    /// region's key set.
    pub fn evict_by_prefix(&self, region: &str, prefix: &str) {
        self.evict_matching(region, |key| key.starts_with(prefix));
    }

    /// Remove every key ending with `suffix`. Used for regions whose keys
    /// embed the namespace at the tail (`commit-details` keys are
    /// `<commitId>_<namespace>`).
    pub fn evict_by_suffix(&self, region: &str, suffix: &str) {
        self.evict_matching(region, |key| key.ends_with(suffix));
    }

    fn evict_matching(&self, region: &str, predicate: impl Fn(&str) -> bool) {
        let mut entries = self
            .region(region)
            .entries
            .write()
            .expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        if entries.len() < before {
            metrics::record_cache_eviction(region);
        }
    }

    /// Number of live entries in a region (expired entries included until
    /// touched). Exposed for tests and diagnostics.
    pub fn len(&self, region: &str) -> usize {
        self.region(region)
            .entries
            .read()
            .expect("cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self, region: &str) -> bool {
        self.len(region) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Cache {
        Cache::new(Duration::from_secs(600))
    }

    #[test]
    fn put_get_round_trip() {
        let cache = cache();
        cache.put(CONFIG_CONTENT, "prod/app.yml", &"content".to_string());
        assert_eq!(
            cache.get::<String>(CONFIG_CONTENT, "prod/app.yml"),
            Some("content".to_string())
        );
        assert_eq!(cache.get::<String>(CONFIG_CONTENT, "other"), None);
    }

    #[test]
    fn ttl_expiry() {
        let cache = Cache::new(Duration::from_millis(0));
        cache.put(NAMESPACES, "all", &vec!["prod".to_string()]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<Vec<String>>(NAMESPACES, "all"), None);
        assert!(cache.is_empty(NAMESPACES));
    }

    #[test]
    fn capacity_drops_oldest() {
        let cache = Cache::with_capacity(Duration::from_secs(600), 2);
        cache.put(LATEST_COMMIT, "a", &1);
        std::thread::sleep(Duration::from_millis(2));
        cache.put(LATEST_COMMIT, "b", &2);
        std::thread::sleep(Duration::from_millis(2));
        cache.put(LATEST_COMMIT, "c", &3);
        assert_eq!(cache.len(LATEST_COMMIT), 2);
        assert_eq!(cache.get::<i32>(LATEST_COMMIT, "a"), None);
        assert_eq!(cache.get::<i32>(LATEST_COMMIT, "c"), Some(3));
    }

    #[test]
    fn prefix_and_suffix_eviction() {
        let cache = cache();
        cache.put(CONFIG_CONTENT, "prod/app.yml", &"a".to_string());
        cache.put(CONFIG_CONTENT, "prod/other.yml", &"b".to_string());
        cache.put(CONFIG_CONTENT, "staging/app.yml", &"c".to_string());
        cache.evict_by_prefix(CONFIG_CONTENT, "prod/");
        assert_eq!(cache.len(CONFIG_CONTENT), 1);
        assert!(cache.get::<String>(CONFIG_CONTENT, "staging/app.yml").is_some());

        cache.put(COMMIT_DETAILS, "abc1234_prod", &"d".to_string());
        cache.put(COMMIT_DETAILS, "abc1234_staging", &"e".to_string());
        cache.evict_by_suffix(COMMIT_DETAILS, "_prod");
        assert_eq!(cache.len(COMMIT_DETAILS), 1);
    }

    #[test]
    #[should_panic(expected = "unknown cache region")]
    fn unknown_region_panics() {
        cache().evict_all("no-such-region");
    }
}
