//! Priceopt - cached, resilient price optimization client
//!
//! This crate front-ends a price optimization service with a cache-aside
//! layer and a retry / circuit-breaker / timeout wrapper around every
//! remote fetch. The public operations are total: when the cache or the
//! service degrades, callers receive the request's default price instead
//! of an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use priceopt::{PriceRequest, PricingClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), priceopt::BuildError> {
//!     let client = PricingClient::builder()
//!         .client_credentials("client-id", "client-secret")
//!         .build()?;
//!
//!     let request = PriceRequest::new("sku-123", "device-456", 9.99);
//!     let price = client.get_price(&request, "Mozilla/5.0").await;
//!
//!     println!("{}: {}", price.item_id, price.price);
//!     Ok(())
//! }
//! ```
//!
//! # Cache backends
//!
//! Prices land in a bounded in-memory LRU store by default; deployments
//! that share price state across processes swap in the Redis backend
//! (`redis` feature, on by default):
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use priceopt::cache::{RedisCache, RedisCacheConfig};
//! use priceopt::types::PriceOptimization;
//! use priceopt::PricingClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache: RedisCache<PriceOptimization> =
//!     RedisCache::new("redis://127.0.0.1/", RedisCacheConfig::new())?;
//!
//! let client = PricingClient::builder()
//!     .client_credentials("client-id", "client-secret")
//!     .cache(Arc::new(cache))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod resilience;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheEntry, CacheKey, CacheLookup, CacheStrategy, SerializationScheme};
pub use cache::{InMemoryCache, InMemoryCacheConfig};
#[cfg(feature = "redis")]
pub use cache::{RedisCache, RedisCacheConfig};
pub use client::{BuildError, ClientOptions, PricingClient};
pub use clock::{LogicalClock, ManualClock, SystemClock};
pub use error::{CacheError, CacheResult, FetchError, FetchResult};
pub use resilience::{CircuitBreaker, CircuitState, ResiliencyPolicy, ResilientCall};
pub use source::{Authenticator, ClientCredentials, HttpPriceSource, PriceSource, StaticToken};

// Re-export all value types
pub use types::{FetchedPrice, OrgConfig, PriceOptimization, PriceRequest, UserAgentRule};
