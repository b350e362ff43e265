//! Consecutive-failure circuit breaker.
//!
//! Tracks consecutive classified failures for one logical operation.
//! Once the configured threshold is reached the breaker opens and
//! rejects calls without invoking the operation; after the break window
//! elapses a single half-open trial decides whether it closes again.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::telemetry;

/// Observable breaker state, mainly for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed {
        consecutive_failures: u32,
    },
    Open {
        until: Instant,
    },
    /// The single trial call is in flight.
    HalfOpen,
}

/// Circuit breaker guarding one logical operation.
///
/// Each wrapped operation owns its own breaker so failure counts of
/// operations with different cost and shape are never conflated.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: &'static str,
    failure_threshold: u32,
    break_duration: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(operation: &'static str, failure_threshold: u32, break_duration: Duration) -> Self {
        Self {
            operation,
            failure_threshold: failure_threshold.max(1),
            break_duration,
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Gate one attempt.
    ///
    /// `Ok(())` admits the call; in the half-open window the first caller
    /// through becomes the single trial. `Err` carries the remaining break
    /// time (zero when a trial is already in flight).
    pub async fn try_call(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    *state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(until.duration_since(now))
                }
            }
            State::HalfOpen => Err(Duration::ZERO),
        }
    }

    /// Record a successful (or non-retryable, well-formed) outcome.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { .. } | State::HalfOpen => {
                *state = State::Closed {
                    consecutive_failures: 0,
                };
            }
            // A late success from a call admitted before the trip does not
            // close the breaker early.
            State::Open { .. } => {}
        }
    }

    /// Record a classified failure.
    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    *state = self.trip(failures);
                } else {
                    *state = State::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            State::HalfOpen => {
                *state = self.trip(self.failure_threshold);
            }
            // A late failure while already open does not extend the window.
            State::Open { .. } => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        match *self.state.lock().await {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }

    fn trip(&self, failures: u32) -> State {
        metrics::counter!(telemetry::BREAKER_TRIPS_TOTAL, "operation" => self.operation)
            .increment(1);
        warn!(
            operation = self.operation,
            consecutive_failures = failures,
            break_duration_ms = self.break_duration.as_millis() as u64,
            "circuit breaker opened"
        );
        State::Open {
            until: Instant::now() + self.break_duration,
        }
    }
}
