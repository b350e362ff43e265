//! Resiliency policy configuration, backoff calculation, and the
//! retry / circuit-breaker / timeout wrapper around remote fetches.
//!
//! Composition order is retry(circuit_breaker(timeout(operation))):
//! every attempt is independently bounded by the timeout and gated by
//! the breaker's current state, and the retry loop sits outermost.
//! One [`ResilientCall`] instance backs each distinct logical operation
//! so failure counters are never shared across operations of different
//! cost or shape.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{FetchError, FetchResult};
use crate::telemetry;

pub mod breaker;

pub use breaker::{CircuitBreaker, CircuitState};

const MAX_RETRIES: u32 = 10;
const DEFAULT_TIMEOUT_MS: i64 = 10_000;
const MIN_TIMEOUT_MS: i64 = 10_000;
const MAX_TIMEOUT_MS: i64 = 180_000;

/// Base delay before the first retry; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(128);
/// Cap on the exponential growth of the backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the retry / circuit-breaker / timeout wrapper.
///
/// Builders store values as given; the policy is sanitized once, when a
/// [`ResilientCall`] is constructed from it, never at call time:
///
/// ```rust
/// # use priceopt::ResiliencyPolicy;
/// let policy = ResiliencyPolicy::new()
///     .number_of_retries(3)
///     .timeout_ms(15_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResiliencyPolicy {
    /// Retries after the initial attempt. Sanitized to `[0, 10]`.
    /// Default: 10.
    pub number_of_retries: u32,
    /// Per-attempt timeout. Non-positive values reset to 10_000, then
    /// sanitized to `[10_000, 180_000]`. Default: 10_000.
    pub timeout_ms: i64,
    /// Consecutive failures before the breaker opens. Sanitized to
    /// `>= 1`. Default: 100.
    pub failures_before_tripping_breaker: u32,
    /// How long an open breaker rejects calls. Sanitized to `>= 0`.
    /// Default: 60_000.
    pub break_duration_ms: i64,
}

impl Default for ResiliencyPolicy {
    fn default() -> Self {
        Self {
            number_of_retries: 10,
            timeout_ms: 10_000,
            failures_before_tripping_breaker: 100,
            break_duration_ms: 60_000,
        }
    }
}

impl ResiliencyPolicy {
    /// Create a policy with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy that disables retries (single attempt).
    pub fn without_retries() -> Self {
        Self {
            number_of_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries after the initial attempt.
    pub fn number_of_retries(mut self, n: u32) -> Self {
        self.number_of_retries = n;
        self
    }

    /// Set the per-attempt timeout in milliseconds.
    pub fn timeout_ms(mut self, ms: i64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the consecutive-failure threshold that opens the breaker.
    pub fn failures_before_tripping_breaker(mut self, n: u32) -> Self {
        self.failures_before_tripping_breaker = n;
        self
    }

    /// Set the open-breaker window in milliseconds.
    pub fn break_duration_ms(mut self, ms: i64) -> Self {
        self.break_duration_ms = ms;
        self
    }

    /// Clamp every field into its safe range.
    pub fn sanitized(&self) -> Self {
        Self {
            number_of_retries: self.number_of_retries.min(MAX_RETRIES),
            timeout_ms: if self.timeout_ms <= 0 {
                DEFAULT_TIMEOUT_MS
            } else {
                self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
            },
            failures_before_tripping_breaker: self.failures_before_tripping_breaker.max(1),
            break_duration_ms: self.break_duration_ms.max(0),
        }
    }

    /// Calculate the backoff delay for a given retry (0-indexed).
    ///
    /// Exponential: `INITIAL_BACKOFF * 2^retry`, capped at [`MAX_BACKOFF`].
    /// Jitter is applied separately — see `jittered()`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        INITIAL_BACKOFF
            .saturating_mul(2u32.saturating_pow(retry))
            .min(MAX_BACKOFF)
    }
}

/// Scale a delay by a random factor in `[0.5, 1.0]`.
fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::rng().random_range(0.5..=1.0))
}

/// One logical operation wrapped in retry, circuit breaker, and timeout.
///
/// The policy is sanitized at construction. `run()` drives the attempt
/// loop: a timed-out or unclassified failure is retried with jittered
/// exponential backoff and counts against the breaker; a well-formed
/// rejection (bad request, auth) short-circuits immediately and does
/// not; an open breaker rejects the call without invoking the
/// operation at all.
pub struct ResilientCall {
    operation: &'static str,
    policy: ResiliencyPolicy,
    breaker: CircuitBreaker,
}

impl ResilientCall {
    pub fn new(operation: &'static str, policy: ResiliencyPolicy) -> Self {
        let policy = policy.sanitized();
        let breaker = CircuitBreaker::new(
            operation,
            policy.failures_before_tripping_breaker,
            Duration::from_millis(policy.break_duration_ms as u64),
        );
        Self {
            operation,
            policy,
            breaker,
        }
    }

    /// The sanitized policy backing this wrapper.
    pub fn policy(&self) -> &ResiliencyPolicy {
        &self.policy
    }

    /// Execute `f` under the full policy, returning the first success,
    /// the first non-retryable failure, or the last retryable failure
    /// once retries are exhausted.
    pub async fn run<F, Fut, T>(&self, f: F) -> FetchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let started = std::time::Instant::now();
        let result = self.attempt_loop(&f).await;
        metrics::histogram!(
            telemetry::FETCH_DURATION_SECONDS,
            "operation" => self.operation,
        )
        .record(started.elapsed().as_secs_f64());
        result
    }

    async fn attempt_loop<F, Fut, T>(&self, f: &F) -> FetchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let timeout = Duration::from_millis(self.policy.timeout_ms as u64);
        let mut attempt = 0;
        loop {
            if let Err(remaining) = self.breaker.try_call().await {
                metrics::counter!(
                    telemetry::BREAKER_REJECTIONS_TOTAL,
                    "operation" => self.operation,
                )
                .increment(1);
                warn!(
                    operation = self.operation,
                    remaining_ms = remaining.as_millis() as u64,
                    "circuit breaker rejected call"
                );
                return Err(FetchError::CircuitOpen);
            }

            let outcome = match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };

            let status = if outcome.is_ok() { "ok" } else { "error" };
            metrics::counter!(
                telemetry::FETCH_REQUESTS_TOTAL,
                "operation" => self.operation,
                "status" => status,
            )
            .increment(1);

            match outcome {
                Ok(value) => {
                    self.breaker.record_success().await;
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    self.breaker.record_failure().await;
                    if attempt >= self.policy.number_of_retries {
                        return Err(err);
                    }
                    let delay = jittered(self.policy.delay_for_retry(attempt));
                    metrics::counter!(
                        telemetry::RETRIES_TOTAL,
                        "operation" => self.operation,
                    )
                    .increment(1);
                    warn!(
                        operation = self.operation,
                        attempt = attempt + 1,
                        max_retries = self.policy.number_of_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after retryable failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    // A well-formed rejection resolves upstream to a
                    // fallback; only transport-shaped failures count
                    // against the breaker.
                    self.breaker.record_success().await;
                    return Err(err);
                }
            }
        }
    }
}
