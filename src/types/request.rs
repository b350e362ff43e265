//! Price lookup request type.

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// A single price lookup request.
///
/// `default_price` doubles as the fallback price returned when neither the
/// cache nor the remote service can produce an optimized price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    /// End-user identifier, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Item (SKU) identifier.
    pub item_id: String,
    /// Device the price is personalised for.
    pub device_id: String,
    /// Caller-supplied base price; also the degraded-path fallback.
    pub default_price: f64,
    /// Force the response to the default price.
    pub override_to_default_price: bool,
}

impl PriceRequest {
    /// Create a request with required fields.
    pub fn new(
        item_id: impl Into<String>,
        device_id: impl Into<String>,
        default_price: f64,
    ) -> Self {
        Self {
            user_id: None,
            item_id: item_id.into(),
            device_id: device_id.into(),
            default_price,
            override_to_default_price: false,
        }
    }

    /// Attach the end-user identifier.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Force the response to the default price.
    pub fn with_override_to_default_price(mut self, value: bool) -> Self {
        self.override_to_default_price = value;
        self
    }

    /// Cache identity of this request.
    ///
    /// The user id is deliberately not part of the key: optimized prices
    /// are computed per item/device, so omitting it lets anonymous and
    /// signed-in traffic share entries.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new()
            .field("deviceId", self.device_id.as_str())
            .field("itemId", self.item_id.as_str())
            .field("defaultPrice", self.default_price.to_string())
            .field(
                "overrideToDefaultPrice",
                self.override_to_default_price.to_string(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_user_id() {
        let anonymous = PriceRequest::new("sku-1", "device-1", 9.99);
        let signed_in = PriceRequest::new("sku-1", "device-1", 9.99).with_user_id("user-1");
        assert_eq!(anonymous.cache_key(), signed_in.cache_key());
    }

    #[test]
    fn cache_key_distinguishes_price_and_override() {
        let base = PriceRequest::new("sku-1", "device-1", 9.99);
        let other_price = PriceRequest::new("sku-1", "device-1", 10.99);
        let overridden = base.clone().with_override_to_default_price(true);
        assert_ne!(base.cache_key(), other_price.cache_key());
        assert_ne!(base.cache_key(), overridden.cache_key());
    }
}
