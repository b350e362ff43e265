//! Telemetry metric name constants.
//!
//! Centralised metric names for priceopt operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `priceopt_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `backend` — cache backend name (e.g. "in_memory", "redis")
//! - `operation` — logical fetch operation ("get_price", "get_prices",
//!   "get_org_config")
//! - `status` — outcome: "ok" or "error"

/// Total cache hits.
///
/// Labels: `backend`.
pub const CACHE_HITS_TOTAL: &str = "priceopt_cache_hits_total";

/// Total cache misses.
///
/// Labels: `backend`.
pub const CACHE_MISSES_TOTAL: &str = "priceopt_cache_misses_total";

/// Total cache backend faults. A faulted read degrades the call to the
/// remote path; a faulted write is dropped.
///
/// Labels: `operation` (the cache operation: "get" | "get_many" | "set"
/// | "set_many").
pub const CACHE_ERRORS_TOTAL: &str = "priceopt_cache_errors_total";

/// Total remote fetch attempts dispatched.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const FETCH_REQUESTS_TOTAL: &str = "priceopt_fetch_requests_total";

/// Remote fetch duration in seconds, including retries.
///
/// Labels: `operation`.
pub const FETCH_DURATION_SECONDS: &str = "priceopt_fetch_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "priceopt_retries_total";

/// Total circuit breaker trips (closed -> open transitions).
///
/// Labels: `operation`.
pub const BREAKER_TRIPS_TOTAL: &str = "priceopt_breaker_trips_total";

/// Total calls rejected by an open circuit breaker.
///
/// Labels: `operation`.
pub const BREAKER_REJECTIONS_TOTAL: &str = "priceopt_breaker_rejections_total";

/// Total request-derived fallback values served to callers.
///
/// Labels: `operation`.
pub const FALLBACKS_TOTAL: &str = "priceopt_fallbacks_total";

/// Batch size of `get_prices` calls.
pub const BATCH_SIZE: &str = "priceopt_batch_size";
