//! Remote price sources.
//!
//! [`PriceSource`] abstracts the pricing service so the orchestration layer
//! can be exercised against mocks, while [`HttpPriceSource`] is the
//! production implementation speaking the service's HTTP API with bearer
//! authentication from the [`auth`] module.

pub mod auth;
pub mod http;

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::{FetchedPrice, OrgConfig, PriceRequest};

pub use auth::{Authenticator, ClientCredentials, StaticToken};
pub use http::HttpPriceSource;

/// A remote pricing service.
///
/// Implementations perform one plain attempt per call and surface failures
/// through [`FetchError`](crate::FetchError); retries, timeouts and circuit
/// breaking are layered on top by the caller.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the optimized price for a single request.
    async fn fetch_one(&self, request: &PriceRequest) -> FetchResult<FetchedPrice>;

    /// Fetch optimized prices for a batch of requests.
    ///
    /// The response carries one entry per request, in request order.
    async fn fetch_many(&self, requests: &[PriceRequest]) -> FetchResult<Vec<FetchedPrice>>;

    /// Fetch the organization configuration (user-agent blacklist).
    async fn fetch_org_config(&self) -> FetchResult<OrgConfig>;
}
