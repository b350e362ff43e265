//! Caching subsystem.
//!
//! A cache-aside layer with logical-time eviction, shared by every backend:
//!
//! - [`CacheKey`] — structured key (flat string fields) with one
//!   deterministic string encoding used by all backends.
//! - [`CacheEntry`] — the stored envelope: value, logical `date_added`,
//!   TTL.
//! - [`CacheStrategy`] — the storage contract (`get`/`get_many`/`set`/
//!   `set_many`/`delete`/`delete_many`) every backend implements.
//! - [`memory::InMemoryCache`] — bounded LRU store holding live values.
//! - [`redis::RedisCache`] — network store behind the same contract,
//!   round-tripping values through a [`SerializationScheme`].
//!
//! TTL math runs on *logical* time: `date_added` is supplied by the caller
//! at write time and compared against the backend's injected
//! [`LogicalClock`](crate::clock::LogicalClock) at read time, so processes
//! sharing a store also share one eviction reference frame.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::{InMemoryCache, InMemoryCacheConfig};
#[cfg(feature = "redis")]
pub use redis::{RedisCache, RedisCacheConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Structured cache key: a flat map from field name to string value.
///
/// Two keys are equal iff their field-sorted encodings are equal; insertion
/// order never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    fields: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) one field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Deterministic string encoding: a JSON object with lexicographically
    /// sorted field names. The single source of truth for key equality
    /// across backends.
    pub fn encode(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }
}

/// Stored envelope shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Logical timestamp supplied by the writer.
    pub date_added: DateTime<Utc>,
    pub ttl_ms: i64,
}

impl<V> CacheEntry<V> {
    /// Whether the entry is live at logical time `now`, under an optional
    /// forced-eviction boundary.
    ///
    /// Expiry is inclusive: an entry whose lifetime ends exactly at `now`
    /// is already expired. The boundary is inclusive too: `date_added`
    /// equal to `evict_if_before` counts as evicted.
    pub fn is_live(&self, now: DateTime<Utc>, evict_if_before: Option<DateTime<Utc>>) -> bool {
        if let Some(boundary) = evict_if_before {
            if self.date_added <= boundary {
                return false;
            }
        }
        now < self.date_added + Duration::milliseconds(self.ttl_ms)
    }
}

/// Replace a non-positive TTL with the backend's configured default. A TTL
/// may never mean "never expire".
pub(crate) fn sanitize_ttl(ttl_ms: i64, default_ttl_ms: i64) -> i64 {
    if ttl_ms <= 0 { default_ttl_ms } else { ttl_ms }
}

/// Outcome of a cache read.
///
/// Backend faults are the `Err` arm of the surrounding
/// [`CacheResult`](crate::error::CacheResult), never a lookup variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    /// A live entry was found.
    Hit(V),
    /// No live entry. Carries the requested key so batch callers can
    /// re-associate misses with their source request without a second
    /// lookup.
    Miss(CacheKey),
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    /// The hit value, if any.
    pub fn into_hit(self) -> Option<V> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss(_) => None,
        }
    }
}

/// Serializer/deserializer pair for backends that persist outside the
/// process.
///
/// Values stored beyond process memory must round-trip through strings;
/// structural types do not survive naive string storage without a
/// deliberate scheme. In-process backends hold live values and ignore
/// this entirely.
pub struct SerializationScheme<V> {
    pub serialize: fn(&V) -> CacheResult<String>,
    pub deserialize: fn(&str) -> CacheResult<V>,
}

impl<V> SerializationScheme<V>
where
    V: Serialize + DeserializeOwned,
{
    /// JSON round-trip scheme, the default for serde-friendly values.
    pub fn json() -> Self {
        Self {
            serialize: |value| Ok(serde_json::to_string(value)?),
            deserialize: |raw| Ok(serde_json::from_str(raw)?),
        }
    }
}

impl<V> Clone for SerializationScheme<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for SerializationScheme<V> {}

/// Storage contract shared by all cache backends.
///
/// Failure semantics: an operation that cannot complete due to an
/// I/O/storage fault returns `Err` and never panics past this boundary.
/// Callers treat `Err` as "the cache is currently unusable for this call"
/// and fall back to the origin source of truth.
#[async_trait]
pub trait CacheStrategy<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    /// Look up one key at the backend's current logical time.
    ///
    /// Returns [`CacheLookup::Hit`] only if an entry exists, is not
    /// TTL-expired, and (when `evict_if_before` is given) was written
    /// strictly after that boundary.
    async fn get(
        &self,
        key: &CacheKey,
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<CacheLookup<V>>;

    /// Look up many keys.
    ///
    /// The result has exactly the same length and order as `keys`; each
    /// element is evaluated independently. The call itself fails only when
    /// the backend cannot respond at all.
    async fn get_many(
        &self,
        keys: &[CacheKey],
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<Vec<CacheLookup<V>>>;

    /// Store one value. Overwrites any existing entry unconditionally
    /// (last-writer-wins). A non-positive `ttl_ms` is replaced by the
    /// backend's default TTL.
    async fn set(
        &self,
        key: &CacheKey,
        value: V,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Store many values with one shared TTL and logical timestamp.
    async fn set_many(
        &self,
        entries: Vec<(CacheKey, V)>,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()>;

    /// Remove one key. Deleting an absent key is not an error; a
    /// subsequent `get` is a miss.
    async fn delete(&self, key: &CacheKey) -> CacheResult<()>;

    /// Remove many keys. Idempotent like [`delete`](Self::delete).
    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()>;

    /// Install the serializer/deserializer pair used by out-of-process
    /// backends. In-process backends hold live values; the default
    /// implementation is a no-op.
    fn set_serialization_scheme(&mut self, _scheme: SerializationScheme<V>) {}
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn encode_is_field_order_independent() {
        let a = CacheKey::new().field("keyA", "A").field("keyB", "B");
        let b = CacheKey::new().field("keyB", "B").field("keyA", "A");
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.encode(), r#"{"keyA":"A","keyB":"B"}"#);
    }

    #[test]
    fn encode_distinguishes_values() {
        let a = CacheKey::new().field("itemId", "1");
        let b = CacheKey::new().field("itemId", "2");
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn entry_live_until_ttl_elapses() {
        let entry = CacheEntry {
            value: 7u32,
            date_added: at(1_000),
            ttl_ms: 500,
        };
        assert!(entry.is_live(at(1_499), None));
        // Inclusive expiry boundary.
        assert!(!entry.is_live(at(1_500), None));
        assert!(!entry.is_live(at(2_000), None));
    }

    #[test]
    fn eviction_boundary_is_inclusive() {
        let entry = CacheEntry {
            value: 7u32,
            date_added: at(1_000),
            ttl_ms: 10_000,
        };
        assert!(entry.is_live(at(1_001), Some(at(999))));
        assert!(!entry.is_live(at(1_001), Some(at(1_000))));
        assert!(!entry.is_live(at(1_001), Some(at(1_500))));
    }

    #[test]
    fn non_positive_ttl_gets_default() {
        assert_eq!(sanitize_ttl(-1, 900), 900);
        assert_eq!(sanitize_ttl(0, 900), 900);
        assert_eq!(sanitize_ttl(1, 900), 1);
    }

    #[test]
    fn json_scheme_round_trips() {
        let scheme = SerializationScheme::<Vec<String>>::json();
        let raw = (scheme.serialize)(&vec!["a".to_string(), "b".to_string()]).unwrap();
        let back = (scheme.deserialize)(&raw).unwrap();
        assert_eq!(back, vec!["a".to_string(), "b".to_string()]);
    }
}
