//! Cache contract tests, run through `dyn CacheStrategy` the way the
//! pricing client consumes backends.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use priceopt::{LogicalClock, ManualClock};
use priceopt::cache::{CacheKey, CacheLookup, CacheStrategy, InMemoryCache, InMemoryCacheConfig};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()
}

fn key(item: &str) -> CacheKey {
    CacheKey::new().field("itemId", item)
}

fn cache_with_clock(
    config: InMemoryCacheConfig,
) -> (Arc<dyn CacheStrategy<String>>, ManualClock) {
    let clock = ManualClock::new(start());
    let cache = InMemoryCache::with_clock(config, Arc::new(clock.clone()));
    (Arc::new(cache), clock)
}

#[tokio::test]
async fn stored_values_hit_until_expiry() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    cache
        .set(&key("a"), "priced".to_string(), 60_000, clock.now())
        .await
        .unwrap();

    clock.advance(Duration::milliseconds(59_999));
    assert_eq!(
        cache.get(&key("a"), None).await.unwrap(),
        CacheLookup::Hit("priced".to_string())
    );

    clock.advance(Duration::milliseconds(1));
    assert_eq!(
        cache.get(&key("a"), None).await.unwrap(),
        CacheLookup::Miss(key("a"))
    );
}

#[tokio::test]
async fn miss_carries_the_requested_key() {
    let (cache, _clock) = cache_with_clock(InMemoryCacheConfig::new());
    let result = cache.get(&key("absent"), None).await.unwrap();
    assert_eq!(result, CacheLookup::Miss(key("absent")));
}

#[tokio::test]
async fn field_order_never_affects_identity() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());

    let forward = CacheKey::new().field("itemId", "sku-1").field("deviceId", "d-1");
    let reversed = CacheKey::new().field("deviceId", "d-1").field("itemId", "sku-1");

    cache
        .set(&forward, "priced".to_string(), 60_000, clock.now())
        .await
        .unwrap();
    assert_eq!(
        cache.get(&reversed, None).await.unwrap(),
        CacheLookup::Hit("priced".to_string())
    );
}

#[tokio::test]
async fn forced_eviction_boundary_is_inclusive() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    let written_at = clock.now();
    cache
        .set(&key("a"), "priced".to_string(), 60_000, written_at)
        .await
        .unwrap();
    clock.advance(Duration::milliseconds(5));

    let earlier = written_at - Duration::milliseconds(1);
    assert!(cache.get(&key("a"), Some(earlier)).await.unwrap().is_hit());
    assert!(!cache.get(&key("a"), Some(written_at)).await.unwrap().is_hit());
}

#[tokio::test]
async fn capacity_one_keeps_only_the_most_recent_entry() {
    let (cache, clock) =
        cache_with_clock(InMemoryCacheConfig::new().max_element_count(1));

    cache
        .set(&key("a"), "first".to_string(), 60_000, clock.now())
        .await
        .unwrap();
    cache
        .set(&key("b"), "second".to_string(), 60_000, clock.now())
        .await
        .unwrap();

    assert_eq!(
        cache.get(&key("a"), None).await.unwrap(),
        CacheLookup::Miss(key("a"))
    );
    assert_eq!(
        cache.get(&key("b"), None).await.unwrap(),
        CacheLookup::Hit("second".to_string())
    );
}

#[tokio::test]
async fn set_many_shares_one_ttl_and_timestamp() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    cache
        .set_many(
            vec![
                (key("a"), "valA".to_string()),
                (key("b"), "valB".to_string()),
            ],
            1_000,
            clock.now(),
        )
        .await
        .unwrap();

    clock.advance(Duration::milliseconds(999));
    let live = cache.get_many(&[key("a"), key("b")], None).await.unwrap();
    assert!(live.iter().all(CacheLookup::is_hit));

    clock.advance(Duration::milliseconds(1));
    let expired = cache.get_many(&[key("a"), key("b")], None).await.unwrap();
    assert!(expired.iter().all(|lookup| !lookup.is_hit()));
}

#[tokio::test]
async fn get_many_keeps_request_order() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    cache
        .set(&key("b"), "valB".to_string(), 60_000, clock.now())
        .await
        .unwrap();

    let results = cache
        .get_many(&[key("a"), key("b"), key("c")], None)
        .await
        .unwrap();
    assert_eq!(
        results,
        vec![
            CacheLookup::Miss(key("a")),
            CacheLookup::Hit("valB".to_string()),
            CacheLookup::Miss(key("c")),
        ]
    );
}

#[tokio::test]
async fn deletes_are_idempotent() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    cache
        .set(&key("a"), "valA".to_string(), 60_000, clock.now())
        .await
        .unwrap();

    cache.delete(&key("a")).await.unwrap();
    cache.delete(&key("a")).await.unwrap();
    cache.delete_many(&[key("a"), key("never-set")]).await.unwrap();

    assert!(!cache.get(&key("a"), None).await.unwrap().is_hit());
}

#[tokio::test]
async fn non_positive_ttl_falls_back_to_backend_default() {
    let (cache, clock) =
        cache_with_clock(InMemoryCacheConfig::new().default_ttl_ms(30_000));
    cache
        .set(&key("a"), "valA".to_string(), -1, clock.now())
        .await
        .unwrap();

    clock.advance(Duration::milliseconds(29_999));
    assert!(cache.get(&key("a"), None).await.unwrap().is_hit());
    clock.advance(Duration::milliseconds(1));
    assert!(!cache.get(&key("a"), None).await.unwrap().is_hit());
}

#[tokio::test]
async fn overwrite_is_last_writer_wins() {
    let (cache, clock) = cache_with_clock(InMemoryCacheConfig::new());
    cache
        .set(&key("a"), "old".to_string(), 1_000, clock.now())
        .await
        .unwrap();
    clock.advance(Duration::milliseconds(900));
    cache
        .set(&key("a"), "new".to_string(), 1_000, clock.now())
        .await
        .unwrap();

    // The rewrite restarted the lifetime.
    clock.advance(Duration::milliseconds(900));
    assert_eq!(
        cache.get(&key("a"), None).await.unwrap(),
        CacheLookup::Hit("new".to_string())
    );
}
