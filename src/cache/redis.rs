//! Redis cache backend.
//!
//! Values round-trip through the configured [`SerializationScheme`] (JSON
//! by default) inside an envelope carrying the logical `date_added` and
//! TTL. The same TTL is also applied as a server-side `PX` expiry, so
//! entries vanish from Redis even if never read again; the read-time check
//! against the logical clock stays authoritative.
//!
//! The connection is a lazily established multiplexed connection, shared
//! and cloned per operation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::clock::{LogicalClock, SystemClock};
use crate::error::CacheResult;
use crate::telemetry;

use super::{CacheEntry, CacheKey, CacheLookup, CacheStrategy, SerializationScheme, sanitize_ttl};

/// Configuration for [`RedisCache`].
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Namespace prepended to every encoded key. Default: `"priceopt"`.
    pub key_prefix: String,
    /// TTL applied when a write supplies a non-positive one.
    /// Default: 15 minutes.
    pub default_ttl_ms: i64,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "priceopt".to_string(),
            default_ttl_ms: 900_000,
        }
    }
}

impl RedisCacheConfig {
    /// Create a new config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
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

/// Redis-backed store implementing [`CacheStrategy`].
pub struct RedisCache<V> {
    client: Arc<Client>,
    connection: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
    scheme: SerializationScheme<V>,
    config: RedisCacheConfig,
    clock: Arc<dyn LogicalClock>,
}

impl<V> RedisCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a backend against `redis_url` with the JSON serialization
    /// scheme. The connection is established on first use.
    pub fn new(redis_url: &str, config: RedisCacheConfig) -> CacheResult<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            connection: Arc::new(RwLock::new(None)),
            scheme: SerializationScheme::json(),
            config,
            clock: Arc::new(SystemClock),
        })
    }
}

impl<V> RedisCache<V> {
    /// Replace the logical clock used for read-time TTL checks.
    pub fn with_clock(mut self, clock: Arc<dyn LogicalClock>) -> Self {
        self.clock = clock;
        self
    }

    async fn connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        {
            let guard = self.connection.read().await;
            if let Some(connection) = guard.as_ref() {
                return Ok(connection.clone());
            }
        }

        let mut guard = self.connection.write().await;
        // Another caller may have connected while we waited for the lock.
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(connection.clone());
        Ok(connection)
    }

    fn redis_key(&self, key: &CacheKey) -> String {
        format!("{}:{}", self.config.key_prefix, key.encode())
    }

    /// Map one raw Redis reply to a lookup result.
    ///
    /// An unparseable or expired envelope reads as a miss, never an error;
    /// only transport faults fail the surrounding call.
    fn decode(
        &self,
        key: &CacheKey,
        raw: Option<String>,
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheLookup<V> {
        let hit = raw
            .and_then(|raw| serde_json::from_str::<CacheEntry<String>>(&raw).ok())
            .filter(|envelope| envelope.is_live(self.clock.now(), evict_if_before))
            .and_then(|envelope| (self.scheme.deserialize)(&envelope.value).ok());

        match hit {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "backend" => "redis").increment(1);
                CacheLookup::Hit(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "backend" => "redis").increment(1);
                CacheLookup::Miss(key.clone())
            }
        }
    }

    fn encode_envelope(
        &self,
        value: &V,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<(String, u64)> {
        let ttl = sanitize_ttl(ttl_ms, self.config.default_ttl_ms);
        let envelope = CacheEntry {
            value: (self.scheme.serialize)(value)?,
            date_added,
            ttl_ms: ttl,
        };
        Ok((serde_json::to_string(&envelope)?, ttl as u64))
    }
}

#[async_trait]
impl<V> CacheStrategy<V> for RedisCache<V>
where
    V: Send + Sync + 'static,
{
    async fn get(
        &self,
        key: &CacheKey,
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<CacheLookup<V>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.redis_key(key)).await?;
        Ok(self.decode(key, raw, evict_if_before))
    }

    async fn get_many(
        &self,
        keys: &[CacheKey],
        evict_if_before: Option<DateTime<Utc>>,
    ) -> CacheResult<Vec<CacheLookup<V>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let redis_keys: Vec<String> = keys.iter().map(|key| self.redis_key(key)).collect();
        // MGET replies in the exact order of the requested keys.
        let raws: Vec<Option<String>> = conn.mget(redis_keys).await?;
        Ok(keys
            .iter()
            .zip(raws)
            .map(|(key, raw)| self.decode(key, raw, evict_if_before))
            .collect())
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: V,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()> {
        let (payload, ttl) = self.encode_envelope(&value, ttl_ms, date_added)?;
        let mut conn = self.connection().await?;
        let _: () = conn.pset_ex(self.redis_key(key), payload, ttl).await?;
        Ok(())
    }

    async fn set_many(
        &self,
        entries: Vec<(CacheKey, V)>,
        ttl_ms: i64,
        date_added: DateTime<Utc>,
    ) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            let (payload, ttl) = self.encode_envelope(value, ttl_ms, date_added)?;
            pipe.pset_ex(self.redis_key(key), payload, ttl).ignore();
        }
        let mut conn = self.connection().await?;
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(self.redis_key(key)).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let redis_keys: Vec<String> = keys.iter().map(|key| self.redis_key(key)).collect();
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(redis_keys).await?;
        Ok(())
    }

    fn set_serialization_scheme(&mut self, scheme: SerializationScheme<V>) {
        self.scheme = scheme;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::clock::ManualClock;

    use super::*;

    fn key() -> CacheKey {
        CacheKey::new().field("itemId", "000001").field("deviceId", "d1")
    }

    fn cache_at(start: DateTime<Utc>) -> (RedisCache<Vec<String>>, ManualClock) {
        let clock = ManualClock::new(start);
        let cache = RedisCache::new("redis://127.0.0.1:6379", RedisCacheConfig::new())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (cache, clock)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()
    }

    fn envelope(value: &Vec<String>, date_added: DateTime<Utc>, ttl_ms: i64) -> String {
        serde_json::to_string(&CacheEntry {
            value: serde_json::to_string(value).unwrap(),
            date_added,
            ttl_ms,
        })
        .unwrap()
    }

    #[test]
    fn redis_key_namespaces_the_shared_encoding() {
        let (cache, _) = cache_at(start());
        assert_eq!(
            cache.redis_key(&key()),
            r#"priceopt:{"deviceId":"d1","itemId":"000001"}"#
        );
    }

    #[test]
    fn decode_absent_is_a_miss() {
        let (cache, _) = cache_at(start());
        assert_eq!(cache.decode(&key(), None, None), CacheLookup::Miss(key()));
    }

    #[test]
    fn decode_corrupt_envelope_is_a_miss() {
        let (cache, _) = cache_at(start());
        let result = cache.decode(&key(), Some("not json".to_string()), None);
        assert_eq!(result, CacheLookup::Miss(key()));
    }

    #[test]
    fn decode_live_envelope_is_a_hit() {
        let (cache, clock) = cache_at(start());
        let raw = envelope(&vec!["a".to_string()], clock.now(), 1_000);

        clock.advance(Duration::milliseconds(999));
        let result = cache.decode(&key(), Some(raw), None);
        assert_eq!(result, CacheLookup::Hit(vec!["a".to_string()]));
    }

    #[test]
    fn decode_expired_envelope_is_a_miss() {
        let (cache, clock) = cache_at(start());
        let raw = envelope(&vec!["a".to_string()], clock.now(), 1_000);

        clock.advance(Duration::milliseconds(1_000));
        let result = cache.decode(&key(), Some(raw), None);
        assert_eq!(result, CacheLookup::Miss(key()));
    }

    #[test]
    fn decode_honours_eviction_boundary() {
        let (cache, clock) = cache_at(start());
        let written_at = clock.now();
        let raw = envelope(&vec!["a".to_string()], written_at, 60_000);

        clock.advance(Duration::milliseconds(1));
        let result = cache.decode(&key(), Some(raw), Some(written_at));
        assert_eq!(result, CacheLookup::Miss(key()));
    }

    #[test]
    fn custom_scheme_overrides_json() {
        let (mut cache, clock) = cache_at(start());
        cache.set_serialization_scheme(SerializationScheme {
            serialize: |value: &Vec<String>| Ok(value.join(",")),
            deserialize: |raw| Ok(raw.split(',').map(str::to_string).collect()),
        });

        let raw = serde_json::to_string(&CacheEntry {
            value: "a,b".to_string(),
            date_added: clock.now(),
            ttl_ms: 60_000,
        })
        .unwrap();

        let result = cache.decode(&key(), Some(raw), None);
        assert_eq!(
            result,
            CacheLookup::Hit(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn envelope_sanitizes_non_positive_ttl() {
        let (cache, clock) = cache_at(start());
        let (_, ttl) = cache
            .encode_envelope(&vec!["a".to_string()], -1, clock.now())
            .unwrap();
        assert_eq!(ttl, 900_000);
    }
}
