//! Client construction.

use std::sync::Arc;

use crate::cache::{CacheStrategy, InMemoryCache, InMemoryCacheConfig};
use crate::clock::{LogicalClock, SystemClock};
use crate::resilience::ResiliencyPolicy;
use crate::source::{Authenticator, ClientCredentials, HttpPriceSource, PriceSource, StaticToken};
use crate::types::PriceOptimization;

use super::pricing::PricingClient;

/// Error returned when [`ClientOptions::build`] cannot assemble a client.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no credentials configured; supply client_credentials, access_token, or source")]
    MissingCredentials,
}

/// Builder for [`PricingClient`].
///
/// Everything beyond credentials is optional: the price cache defaults to
/// a bounded in-memory store and both resiliency policies default to
/// [`ResiliencyPolicy::default`]. Policies are sanitized when the client
/// is built, not here.
///
/// ```rust,no_run
/// use priceopt::{PricingClient, ResiliencyPolicy};
///
/// # fn main() -> Result<(), priceopt::BuildError> {
/// let client = PricingClient::builder()
///     .client_credentials("client-id", "client-secret")
///     .get_price_policy(ResiliencyPolicy::new().number_of_retries(3))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientOptions {
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    base_url: Option<String>,
    token_url: Option<String>,
    source: Option<Arc<dyn PriceSource>>,
    cache: Option<Arc<dyn CacheStrategy<PriceOptimization>>>,
    clock: Option<Arc<dyn LogicalClock>>,
    get_price_policy: ResiliencyPolicy,
    get_prices_policy: ResiliencyPolicy,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            base_url: None,
            token_url: None,
            source: None,
            cache: None,
            clock: None,
            get_price_policy: ResiliencyPolicy::default(),
            get_prices_policy: ResiliencyPolicy::default(),
        }
    }

    /// Authenticate with OAuth client credentials.
    pub fn client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Authenticate with a caller-managed access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Override the pricing API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the OAuth token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Use a prebuilt price source instead of the HTTP client. Credentials
    /// and URL overrides are ignored when a source is supplied.
    pub fn source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a custom price cache backend.
    pub fn cache(mut self, cache: Arc<dyn CacheStrategy<PriceOptimization>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Inject the logical clock used for cache timestamps.
    pub fn clock(mut self, clock: Arc<dyn LogicalClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Resiliency policy for single-price fetches.
    pub fn get_price_policy(mut self, policy: ResiliencyPolicy) -> Self {
        self.get_price_policy = policy;
        self
    }

    /// Resiliency policy for batch price fetches.
    pub fn get_prices_policy(mut self, policy: ResiliencyPolicy) -> Self {
        self.get_prices_policy = policy;
        self
    }

    /// Assemble the client.
    pub fn build(self) -> Result<PricingClient, BuildError> {
        let clock: Arc<dyn LogicalClock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let source: Arc<dyn PriceSource> = match self.source {
            Some(source) => source,
            None => {
                let auth: Arc<dyn Authenticator> = if let Some(token) = self.access_token {
                    Arc::new(StaticToken::new(token))
                } else if let (Some(id), Some(secret)) = (self.client_id, self.client_secret) {
                    Arc::new(match self.token_url {
                        Some(url) => ClientCredentials::with_token_url(id, secret, url),
                        None => ClientCredentials::new(id, secret),
                    })
                } else {
                    return Err(BuildError::MissingCredentials);
                };
                Arc::new(match self.base_url {
                    Some(url) => HttpPriceSource::with_base_url(auth, url),
                    None => HttpPriceSource::new(auth),
                })
            }
        };

        let cache: Arc<dyn CacheStrategy<PriceOptimization>> = self.cache.unwrap_or_else(|| {
            Arc::new(InMemoryCache::with_clock(
                InMemoryCacheConfig::new(),
                clock.clone(),
            ))
        });

        Ok(PricingClient::from_parts(
            source,
            cache,
            clock,
            self.get_price_policy,
            self.get_prices_policy,
        ))
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}
