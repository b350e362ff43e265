//! Bounded in-memory cache backend.
//!
//! Holds live values keyed by the normalized key string, so no
//! serialization scheme is involved. Capacity is enforced on insertion by
//! evicting the least recently used entry; TTL expiry is checked lazily at
//! read time against the injected logical clock. This backend has no I/O
//! and therefore never returns a backend fault.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::clock::{LogicalClock, SystemClock};
use crate::error::CacheResult;
use crate::telemetry;

use super::{CacheEntry, CacheKey, CacheLookup, CacheStrategy, sanitize_ttl};

/// Configuration for [`InMemoryCache`].
///
/// ```rust
/// # use priceopt::cache::InMemoryCacheConfig;
/// let config = InMemoryCacheConfig::new()
///     .max_element_count(100)
///     .default_ttl_ms(900_000);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries. Inserting a new key beyond this evicts
    /// the least recently used entry. Default: 1,000.
    pub max_element_count: usize,
    /// TTL applied when a write supplies a non-positive one.
    /// Default: 15 minutes.
    pub default_ttl_ms: i64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_element_count: 1_000,
            default_ttl_ms: 900_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Create a new config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries (at least 1).
    pub fn max_element_count(mut self, n: usize) -> Self {
        self.max_element_count = n.max(1);
        self
    }

    /// Set the default TTL; non-positive values keep the current default.
    pub fn default_ttl_ms(mut self, ms: i64) -> Self {
        if ms > 0 {
            self.default_ttl_ms = ms;
        }
        self
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    last_used: u64,
}

struct Store<V> {
    slots: HashMap<String, Slot<V>>,
    /// Monotonic access counter; recency is ordered by these stamps.
    tick: u64,
}

impl<V> Store<V> {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.slots.remove(&key);
        }
    }
}

/// Bounded in-memory store implementing [`CacheStrategy`].
pub struct InMemoryCache<V> {
    store: Mutex<Store<V>>,
    config: InMemoryCacheConfig,
    clock: Arc<dyn LogicalClock>,
}

impl<V> InMemoryCache<V> {
    /// Create a cache that reads logical time from the system clock.
    pub fn new(config: InMemoryCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with an injected logical clock.
    pub fn with_clock(config: InMemoryCacheConfig, clock: Arc<dyn LogicalClock>) -> Self {
        Self {
            store: Mutex::new(Store {
                slots: HashMap::new(),
                tick: 0,
            }),
            config,
            clock,
        }
    }

    /// Number of entries currently held, including not-yet-compacted
    /// expired ones.
    pub async fn len(&self) -> usize {
        self.store.lock().await.slots.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V: Clone> InMemoryCache<V> {
    fn lookup(
        &self,
        store: &mut Store<V>,
        key: &CacheKey,
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheLookup<V> {
        let stamp = store.touch();
        let now = self.clock.now();
        match store.slots.get_mut(&key.encode()) {
            Some(slot) if slot.entry.is_live(now, evict_if_before) => {
                slot.last_used = stamp;
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "backend" => "in_memory")
                    .increment(1);
                CacheLookup::Hit(slot.entry.value.clone())
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "backend" => "in_memory")
                    .increment(1);
                CacheLookup::Miss(key.clone())
            }
        }
    }

    fn insert(&self, store: &mut Store<V>, key: &CacheKey, value: V, ttl_ms: i64, date_added: DateTime<Utc>) {
        let stamp = store.touch();
        let encoded = key.encode();
        let entry = CacheEntry {
            value,
            date_added,
            ttl_ms: sanitize_ttl(ttl_ms, self.config.default_ttl_ms),
        };
        if !store.slots.contains_key(&encoded) && store.slots.len() >= self.config.max_element_count
        {
            store.evict_lru();
        }
        store.slots.insert(
            encoded,
            Slot {
                entry,
                last_used: stamp,
            },
        );
    }
}

#[async_trait]
impl<V> CacheStrategy<V> for InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(
        &self,
        key: &CacheKey,
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<CacheLookup<V>> {
        let mut store = self.store.lock().await;
        Ok(self.lookup(&mut store, key, evict_if_before))
    }

    async fn get_many(
        &self,
        keys: &[CacheKey],
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<Vec<CacheLookup<V>>> {
        let mut store = self.store.lock().await;
        Ok(keys
            .iter()
            .map(|key| self.lookup(&mut store, key, evict_if_before))
            .collect())
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: V,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()> {
        let mut store = self.store.lock().await;
        self.insert(&mut store, key, value, ttl_ms, date_added);
        Ok(())
    }

    async fn set_many(
        &self,
        entries: Vec<(CacheKey, V)>,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()> {
        let mut store = self.store.lock().await;
        for (key, value) in entries {
            self.insert(&mut store, &key, value, ttl_ms, date_added);
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut store = self.store.lock().await;
        store.slots.remove(&key.encode());
        Ok(())
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
        let mut store = self.store.lock().await;
        for key in keys {
            store.slots.remove(&key.encode());
        }
        Ok(())
    }
}
