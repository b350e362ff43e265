//! The cache-aside pricing client.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};

use crate::cache::{CacheKey, CacheLookup, CacheStrategy, InMemoryCache, InMemoryCacheConfig};
use crate::clock::LogicalClock;
use crate::error::FetchError;
use crate::resilience::{ResiliencyPolicy, ResilientCall};
use crate::source::PriceSource;
use crate::telemetry;
use crate::types::{FetchedPrice, OrgConfig, PriceOptimization, PriceRequest};

use super::options::ClientOptions;

const OP_GET_PRICE: &str = "get_price";
const OP_GET_PRICES: &str = "get_prices";

/// TTL on the cached org config. A degraded fetch is cached too, so an
/// unreachable config endpoint is re-polled at most once per window.
const ORG_CONFIG_TTL_MS: i64 = 900_000;
const ORG_CONFIG_CACHE_CAPACITY: usize = 100;

/// TTL on fallbacks cached after a definitive rejection, so a request the
/// service refuses is not re-sent on every call.
const NEGATIVE_CACHE_TTL_MS: i64 = 300_000;

/// Cached, resiliency-wrapped client for the pricing service.
///
/// Every public operation is total: cache faults degrade to the remote
/// fetch, remote failures degrade to the caller's default price, and no
/// error ever reaches the call site. Single and batch fetches each run
/// under their own retry / circuit-breaker / timeout policy so a
/// struggling batch endpoint cannot trip single-price calls.
pub struct PricingClient {
    source: Arc<dyn PriceSource>,
    cache: Arc<dyn CacheStrategy<PriceOptimization>>,
    config_cache: InMemoryCache<OrgConfig>,
    clock: Arc<dyn LogicalClock>,
    get_price_call: ResilientCall,
    get_prices_call: ResilientCall,
}

impl PricingClient {
    /// Start building a client.
    pub fn builder() -> ClientOptions {
        ClientOptions::new()
    }

    pub(crate) fn from_parts(
        source: Arc<dyn PriceSource>,
        cache: Arc<dyn CacheStrategy<PriceOptimization>>,
        clock: Arc<dyn LogicalClock>,
        get_price_policy: ResiliencyPolicy,
        get_prices_policy: ResiliencyPolicy,
    ) -> Self {
        let config_cache = InMemoryCache::with_clock(
            InMemoryCacheConfig::new()
                .max_element_count(ORG_CONFIG_CACHE_CAPACITY)
                .default_ttl_ms(ORG_CONFIG_TTL_MS),
            clock.clone(),
        );
        Self {
            get_price_call: ResilientCall::new(OP_GET_PRICE, get_price_policy),
            get_prices_call: ResilientCall::new(OP_GET_PRICES, get_prices_policy),
            source,
            cache,
            config_cache,
            clock,
        }
    }

    /// Fetch the optimized price for one request.
    ///
    /// Cache-aside: a live cached price is returned as-is; on a miss the
    /// service is called under the `get_price` resiliency policy and the
    /// result written back with the TTL the service assigned. Requests
    /// from blacklisted user agents, and any fetch that ultimately fails,
    /// resolve to the request's default price.
    #[instrument(skip(self, request, user_agent), fields(operation = "get_price", item_id = %request.item_id))]
    pub async fn get_price(&self, request: &PriceRequest, user_agent: &str) -> PriceOptimization {
        if self.org_config().await.is_blacklisted(user_agent) {
            debug!("user agent blacklisted; serving default price");
            return self.fallback(request, OP_GET_PRICE);
        }

        let key = request.cache_key();
        match self.cache.get(&key, None).await {
            Ok(CacheLookup::Hit(value)) => {
                debug!(item_id = %request.item_id, "price cache hit");
                return value;
            }
            Ok(CacheLookup::Miss(_)) => {}
            Err(err) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "get")
                    .increment(1);
                warn!(error = %err, "price cache read failed; fetching from service");
            }
        }

        match self
            .get_price_call
            .run(|| self.source.fetch_one(request))
            .await
        {
            Ok(fresh) => {
                self.write_back(&key, fresh.value.clone(), fresh.ttl_ms).await;
                fresh.value
            }
            Err(err @ (FetchError::BadRequest { .. } | FetchError::AuthenticationFailed)) => {
                warn!(error = %err, "price request rejected; caching default price");
                let fallback = self.fallback(request, OP_GET_PRICE);
                self.write_back(&key, fallback.clone(), NEGATIVE_CACHE_TTL_MS)
                    .await;
                fallback
            }
            Err(err) => {
                warn!(error = %err, "price fetch failed; serving default price");
                self.fallback(request, OP_GET_PRICE)
            }
        }
    }

    /// Fetch optimized prices for a batch of requests.
    ///
    /// The output always has one price per request, in request order.
    /// Cached prices are served directly; only the misses go to the
    /// service, in one call under the `get_prices` policy, and fresh
    /// values are written back concurrently. A miss the service does not
    /// answer resolves to that request's default price.
    #[instrument(skip(self, requests, user_agent), fields(operation = "get_prices", batch_size = requests.len()))]
    pub async fn get_prices(
        &self,
        requests: &[PriceRequest],
        user_agent: &str,
    ) -> Vec<PriceOptimization> {
        metrics::histogram!(telemetry::BATCH_SIZE).record(requests.len() as f64);

        if self.org_config().await.is_blacklisted(user_agent) {
            debug!("user agent blacklisted; serving default prices");
            return requests
                .iter()
                .map(|request| self.fallback(request, OP_GET_PRICES))
                .collect();
        }

        let keys: Vec<CacheKey> = requests.iter().map(PriceRequest::cache_key).collect();
        let lookups = match self.cache.get_many(&keys, None).await {
            Ok(lookups) => lookups,
            Err(err) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "get_many")
                    .increment(1);
                warn!(error = %err, "price cache read failed; fetching entire batch from service");
                return self.fetch_all_remote(requests).await;
            }
        };

        // Reconstruct the source request for each miss via its key.
        let request_by_key: HashMap<String, &PriceRequest> =
            keys.iter().map(CacheKey::encode).zip(requests).collect();
        let miss_requests: Vec<PriceRequest> = lookups
            .iter()
            .filter_map(|lookup| match lookup {
                CacheLookup::Miss(key) => {
                    request_by_key.get(&key.encode()).map(|r| (*r).clone())
                }
                CacheLookup::Hit(_) => None,
            })
            .collect();
        debug!(
            hits = lookups.len() - miss_requests.len(),
            misses = miss_requests.len(),
            "price cache partition"
        );

        let (responses, write_back) = if miss_requests.is_empty() {
            (Vec::new(), false)
        } else {
            self.fetch_misses(&miss_requests).await
        };
        if write_back {
            self.write_back_many(&miss_requests, &responses).await;
        }

        // Responses pair with misses positionally, but merge by key so the
        // output order only depends on the input order.
        let response_by_key: HashMap<String, PriceOptimization> = miss_requests
            .iter()
            .zip(&responses)
            .map(|(request, fetched)| (request.cache_key().encode(), fetched.value.clone()))
            .collect();

        lookups
            .into_iter()
            .zip(requests)
            .map(|(lookup, request)| match lookup {
                CacheLookup::Hit(value) => value,
                CacheLookup::Miss(key) => response_by_key
                    .get(&key.encode())
                    .cloned()
                    .unwrap_or_else(|| self.fallback(request, OP_GET_PRICES)),
            })
            .collect()
    }

    /// One wrapped remote call for a batch's misses. Returns the fetched
    /// (or synthesized) responses and whether they belong in the cache.
    async fn fetch_misses(&self, miss_requests: &[PriceRequest]) -> (Vec<FetchedPrice>, bool) {
        match self
            .get_prices_call
            .run(|| self.source.fetch_many(miss_requests))
            .await
        {
            Ok(fresh) => (fresh, true),
            Err(err @ (FetchError::BadRequest { .. } | FetchError::AuthenticationFailed)) => {
                warn!(error = %err, "price batch rejected; caching default prices");
                let fallbacks = miss_requests
                    .iter()
                    .map(|request| FetchedPrice {
                        value: self.fallback(request, OP_GET_PRICES),
                        ttl_ms: NEGATIVE_CACHE_TTL_MS,
                    })
                    .collect();
                (fallbacks, true)
            }
            Err(err) => {
                warn!(error = %err, "price batch fetch failed; serving default prices");
                (Vec::new(), false)
            }
        }
    }

    /// Full-batch remote fetch for when the cache cannot answer at all.
    /// Nothing is written back; the backend just proved unusable.
    async fn fetch_all_remote(&self, requests: &[PriceRequest]) -> Vec<PriceOptimization> {
        match self
            .get_prices_call
            .run(|| self.source.fetch_many(requests))
            .await
        {
            Ok(fresh) => {
                let mut fresh = fresh.into_iter();
                requests
                    .iter()
                    .map(|request| match fresh.next() {
                        Some(fetched) => fetched.value,
                        None => self.fallback(request, OP_GET_PRICES),
                    })
                    .collect()
            }
            Err(err) => {
                warn!(error = %err, "price batch fetch failed; serving default prices");
                requests
                    .iter()
                    .map(|request| self.fallback(request, OP_GET_PRICES))
                    .collect()
            }
        }
    }

    /// The org config, from its dedicated cache or the service. A failed
    /// fetch degrades to the compiled-in default blacklist, and the result
    /// is cached either way so a degraded endpoint is not re-polled per
    /// call. Deliberately unwrapped: this path must stay cheap.
    async fn org_config(&self) -> OrgConfig {
        let key = org_config_key();
        if let Ok(CacheLookup::Hit(config)) = self.config_cache.get(&key, None).await {
            return config;
        }

        let config = match self.source.fetch_org_config().await {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "org config fetch failed; using default blacklist");
                OrgConfig::default()
            }
        };
        if let Err(err) = self
            .config_cache
            .set(&key, config.clone(), ORG_CONFIG_TTL_MS, self.clock.now())
            .await
        {
            warn!(error = %err, "org config cache write failed");
        }
        config
    }

    /// Best-effort single write-back.
    async fn write_back(&self, key: &CacheKey, value: PriceOptimization, ttl_ms: i64) {
        if let Err(err) = self.cache.set(key, value, ttl_ms, self.clock.now()).await {
            metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "set").increment(1);
            warn!(error = %err, "price cache write-back failed");
        }
    }

    /// Best-effort concurrent write-back of a batch: one shared logical
    /// timestamp, each value's own TTL.
    async fn write_back_many(&self, requests: &[PriceRequest], responses: &[FetchedPrice]) {
        let date_added = self.clock.now();
        let writes = requests.iter().zip(responses).map(|(request, fetched)| {
            let key = request.cache_key();
            async move {
                if let Err(err) = self
                    .cache
                    .set(&key, fetched.value.clone(), fetched.ttl_ms, date_added)
                    .await
                {
                    metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "operation" => "set")
                        .increment(1);
                    warn!(error = %err, "price cache write-back failed");
                }
            }
        });
        join_all(writes).await;
    }

    /// The request's default price, marked unoptimized and counted.
    fn fallback(&self, request: &PriceRequest, operation: &'static str) -> PriceOptimization {
        metrics::counter!(telemetry::FALLBACKS_TOTAL, "operation" => operation).increment(1);
        PriceOptimization::fallback_for(request)
    }
}

fn org_config_key() -> CacheKey {
    CacheKey::new().field("config", "config")
}
