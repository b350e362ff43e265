//! Priceopt error types

/// Failures raised by cache backends.
///
/// A backend fault means "the cache is unusable for this call"; callers are
/// expected to fall back to the origin source rather than surface it. An
/// absent or expired entry is a [`CacheLookup::Miss`], never an error.
///
/// [`CacheLookup::Miss`]: crate::cache::CacheLookup::Miss
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    // Backend/storage errors
    #[error("cache backend error: {0}")]
    Backend(String),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // Data errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised by the remote fetch path.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    // Transient failures (retryable)
    #[error("request timed out")]
    Timeout,

    #[error("unknown remote failure: {0}")]
    Unknown(String),

    // Definitive rejections (not retried)
    #[error("bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    /// The circuit breaker is open; the operation was not invoked.
    #[error("circuit breaker open")]
    CircuitOpen,
}

impl FetchError {
    /// Whether the resiliency wrapper should retry after this failure.
    ///
    /// Timeouts and unclassified failures are transient. A well-formed
    /// rejection (bad request, auth) will not improve on retry, and an open
    /// breaker is a gate rather than an outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Unknown(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Unknown(err.to_string())
        }
    }
}

/// Result type alias for cache backend operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result type alias for remote fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;
