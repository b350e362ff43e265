//! HTTP implementation of [`PriceSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::types::{FetchedPrice, OrgConfig, PriceRequest};

use super::PriceSource;
use super::auth::Authenticator;

const DEFAULT_BASE_URL: &str = "https://api.priceopt.io";

const PRICES_PATH: &str = "/pricing/v1/prices";
const ORG_CONFIG_PATH: &str = "/pricing/v1/organizationConfig";

/// Client for the pricing service HTTP API.
///
/// Each call is one plain request; the resiliency wrapper in the client
/// layer owns retries and per-attempt deadlines, so the transport timeout
/// here is only a backstop against wedged connections.
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
    auth: Arc<dyn Authenticator>,
}

impl HttpPriceSource {
    /// Create a source against the production API.
    pub fn new(auth: Arc<dyn Authenticator>) -> Self {
        Self::with_base_url(auth, DEFAULT_BASE_URL)
    }

    /// Create a source with a custom base URL (useful for testing).
    pub fn with_base_url(auth: Arc<dyn Authenticator>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            auth,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> FetchResult<T> {
        let token = self.auth.bearer_token().await?;
        let response = self
            .client
            .get(url)
            .header("Authorization", token)
            .query(query)
            .send()
            .await?;
        decode_response(response).await
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_one(&self, request: &PriceRequest) -> FetchResult<FetchedPrice> {
        debug!(item_id = %request.item_id, device_id = %request.device_id, "fetching price");

        let mut query: Vec<(&str, String)> = vec![
            ("deviceId", request.device_id.clone()),
            ("itemId", request.item_id.clone()),
            ("defaultPrice", request.default_price.to_string()),
            (
                "overrideToDefaultPrice",
                request.override_to_default_price.to_string(),
            ),
        ];
        if let Some(user_id) = &request.user_id {
            query.push(("userId", user_id.clone()));
        }

        self.get_json(format!("{}{}", self.base_url, PRICES_PATH), &query)
            .await
    }

    async fn fetch_many(&self, requests: &[PriceRequest]) -> FetchResult<Vec<FetchedPrice>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        debug!(batch_size = requests.len(), "fetching price batch");

        let token = self.auth.bearer_token().await?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, PRICES_PATH))
            .header("Authorization", token)
            .json(&BatchPriceRequest { items: requests })
            .send()
            .await?;
        decode_response(response).await
    }

    async fn fetch_org_config(&self) -> FetchResult<OrgConfig> {
        debug!("fetching org config");

        let payload: OrgConfigPayload = self
            .get_json(format!("{}{}", self.base_url, ORG_CONFIG_PATH), &[])
            .await?;
        Ok(OrgConfig::from_rules(
            payload
                .user_agent_blacklist
                .into_iter()
                .map(|rule| (rule.name, rule.regexp)),
        ))
    }
}

/// Unwrap the service's `{ "data": ... }` envelope or classify the failure.
async fn decode_response<T: DeserializeOwned>(response: Response) -> FetchResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    let envelope: DataEnvelope<T> = response.json().await?;
    Ok(envelope.data)
}

/// Map a non-2xx status to the fetch error taxonomy.
///
/// 401/403 are authentication rejections and the remaining 4xx are malformed
/// requests; neither will improve on retry. Everything else (3xx, 5xx) is an
/// unclassified transient failure.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> FetchError {
    match status.as_u16() {
        401 | 403 => FetchError::AuthenticationFailed,
        code if (400..500).contains(&code) => FetchError::BadRequest {
            status: code,
            message: body.trim().to_string(),
        },
        code => FetchError::Unknown(format!("pricing API returned status {code}")),
    }
}

// ============= Request/Response Types =============

#[derive(Debug, Serialize)]
struct BatchPriceRequest<'a> {
    items: &'a [PriceRequest],
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgConfigPayload {
    #[serde(default)]
    user_agent_blacklist: Vec<UserAgentRulePayload>,
}

#[derive(Debug, Deserialize)]
struct UserAgentRulePayload {
    name: String,
    regexp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn auth_statuses_map_to_authentication_failed() {
        assert!(matches!(
            classify_status(status(401), ""),
            FetchError::AuthenticationFailed
        ));
        assert!(matches!(
            classify_status(status(403), "forbidden"),
            FetchError::AuthenticationFailed
        ));
    }

    #[test]
    fn client_errors_map_to_bad_request() {
        for code in [400, 404, 422, 429] {
            match classify_status(status(code), "nope") {
                FetchError::BadRequest {
                    status: got,
                    message,
                } => {
                    assert_eq!(got, code);
                    assert_eq!(message, "nope");
                }
                other => panic!("expected BadRequest for {code}, got {other:?}"),
            }
        }
    }

    #[test]
    fn server_errors_and_redirects_map_to_unknown() {
        for code in [302, 304, 500, 502, 503] {
            assert!(
                matches!(classify_status(status(code), ""), FetchError::Unknown(_)),
                "expected Unknown for {code}"
            );
        }
    }

    #[test]
    fn batch_request_serializes_items_in_camel_case() {
        let items = vec![PriceRequest::new("sku-1", "device-1", 9.99)];
        let body = serde_json::to_value(BatchPriceRequest { items: &items }).unwrap();
        assert_eq!(body["items"][0]["itemId"], "sku-1");
        assert_eq!(body["items"][0]["deviceId"], "device-1");
        assert_eq!(body["items"][0]["defaultPrice"], 9.99);
        assert_eq!(body["items"][0]["overrideToDefaultPrice"], false);
        assert!(body["items"][0].get("userId").is_none());
    }

    #[test]
    fn envelope_decodes_fetched_price() {
        let payload = r#"{"data":{"userId":null,"itemId":"sku-1","deviceId":"device-1","price":7.25,"isPriceOptimized":true,"ttlMs":60000}}"#;
        let envelope: DataEnvelope<FetchedPrice> = serde_json::from_str(payload).unwrap();
        assert_eq!(envelope.data.value.price, 7.25);
        assert!(envelope.data.value.is_price_optimized);
        assert_eq!(envelope.data.ttl_ms, 60_000);
    }

    #[test]
    fn envelope_defaults_missing_ttl() {
        let payload = r#"{"data":{"itemId":"sku-1","deviceId":"device-1","price":7.25,"isPriceOptimized":false}}"#;
        let envelope: DataEnvelope<FetchedPrice> = serde_json::from_str(payload).unwrap();
        assert_eq!(envelope.data.ttl_ms, -1);
    }
}
