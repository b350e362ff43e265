//! Bearer-token authentication for the pricing API.
//!
//! [`ClientCredentials`] performs the OAuth client-credentials exchange and
//! caches the resulting token, refreshing it shortly before expiry so a
//! price fetch never races an expiring token. [`StaticToken`] is for
//! callers that manage tokens themselves.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::FetchResult;

use super::http::classify_status;

const DEFAULT_TOKEN_URL: &str = "https://auth.priceopt.io/oauth/token";
const DEFAULT_AUDIENCE: &str = "https://api.priceopt.io";

/// How long before actual expiry a cached token is considered stale.
const EXPIRE_WINDOW_MS: i64 = 300_000;

/// Supplies `Authorization` header values for pricing API calls.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// A header-ready value, `Bearer ` prefix included.
    async fn bearer_token(&self) -> FetchResult<String>;
}

/// Authenticator wrapping a caller-managed access token.
pub struct StaticToken {
    header_value: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            header_value: ensure_bearer(token.into()),
        }
    }
}

#[async_trait]
impl Authenticator for StaticToken {
    async fn bearer_token(&self) -> FetchResult<String> {
        Ok(self.header_value.clone())
    }
}

/// OAuth client-credentials authenticator with token caching.
pub struct ClientCredentials {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    audience: String,
    expire_window_ms: i64,
    token: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    header_value: String,
    expires_at: DateTime<Utc>,
}

impl ClientCredentials {
    /// Create an authenticator against the production token endpoint.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::with_token_url(client_id, client_secret, DEFAULT_TOKEN_URL)
    }

    /// Create an authenticator with a custom token endpoint (useful for
    /// testing, or self-hosted deployments).
    pub fn with_token_url(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: DEFAULT_AUDIENCE.to_string(),
            expire_window_ms: EXPIRE_WINDOW_MS,
            token: RwLock::new(None),
        }
    }

    /// Override the pre-expiry refresh window.
    pub fn expire_window_ms(mut self, window_ms: i64) -> Self {
        self.expire_window_ms = window_ms.max(0);
        self
    }

    fn is_fresh(&self, token: &CachedToken, now: DateTime<Utc>) -> bool {
        token.expires_at - now > chrono::Duration::milliseconds(self.expire_window_ms)
    }

    async fn exchange(&self) -> FetchResult<CachedToken> {
        debug!(url = %self.token_url, "requesting access token");

        let response = self
            .client
            .post(&self.token_url)
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                audience: &self.audience,
                grant_type: "client_credentials",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            header_value: ensure_bearer(token.access_token),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl Authenticator for ClientCredentials {
    async fn bearer_token(&self) -> FetchResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if self.is_fresh(token, Utc::now()) {
                    return Ok(token.header_value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref() {
            if self.is_fresh(token, Utc::now()) {
                return Ok(token.header_value.clone());
            }
        }

        let fresh = self.exchange().await?;
        let header_value = fresh.header_value.clone();
        *guard = Some(fresh);
        Ok(header_value)
    }
}

/// Prepend `Bearer ` exactly once.
fn ensure_bearer(token: String) -> String {
    if token.starts_with("Bearer") || token.starts_with("bearer") {
        token
    } else {
        format!("Bearer {token}")
    }
}

// ============= Request/Response Types =============

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_bearer_prepends_once() {
        assert_eq!(ensure_bearer("abc123".to_string()), "Bearer abc123");
        assert_eq!(ensure_bearer("Bearer abc123".to_string()), "Bearer abc123");
        assert_eq!(ensure_bearer("bearer abc123".to_string()), "bearer abc123");
    }

    #[tokio::test]
    async fn static_token_is_header_ready() {
        let auth = StaticToken::new("abc123");
        assert_eq!(auth.bearer_token().await.unwrap(), "Bearer abc123");

        let auth = StaticToken::new("Bearer abc123");
        assert_eq!(auth.bearer_token().await.unwrap(), "Bearer abc123");
    }

    #[test]
    fn freshness_respects_expire_window() {
        let auth = ClientCredentials::with_token_url("id", "secret", "http://localhost/token");
        let now = Utc::now();
        let token = |secs: i64| CachedToken {
            header_value: "Bearer t".to_string(),
            expires_at: now + chrono::Duration::seconds(secs),
        };

        // Expires well past the 300s window.
        assert!(auth.is_fresh(&token(400), now));
        // Inside the window, or already expired.
        assert!(!auth.is_fresh(&token(200), now));
        assert!(!auth.is_fresh(&token(300), now));
        assert!(!auth.is_fresh(&token(-10), now));
    }
}
