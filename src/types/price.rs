//! Price optimization result types.

use serde::{Deserialize, Serialize};

use super::request::PriceRequest;

/// An optimized price for one item/device pair.
///
/// This is both the cached value and the caller-visible result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceOptimization {
    /// End-user identifier, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Item (SKU) identifier.
    pub item_id: String,
    /// Device the price is personalised for.
    pub device_id: String,
    /// Price to present.
    pub price: f64,
    /// False when this value is a request-derived fallback rather than a
    /// service-computed price.
    pub is_price_optimized: bool,
}

impl PriceOptimization {
    /// Degraded result derived from the original request: the caller's
    /// default price, marked as not optimized.
    pub fn fallback_for(request: &PriceRequest) -> Self {
        Self {
            user_id: request.user_id.clone(),
            item_id: request.item_id.clone(),
            device_id: request.device_id.clone(),
            price: request.default_price,
            is_price_optimized: false,
        }
    }
}

/// A freshly fetched price together with the cache lifetime the service
/// assigned to it.
///
/// `ttl_ms` only drives the write-back TTL; it is stripped before the value
/// is cached or handed to the caller. Non-positive lifetimes defer to the
/// backend's default TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedPrice {
    #[serde(flatten)]
    pub value: PriceOptimization,
    #[serde(default = "no_ttl")]
    pub ttl_ms: i64,
}

fn no_ttl() -> i64 {
    -1
}
