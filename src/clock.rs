//! Logical clock abstraction.
//!
//! TTL math runs on a *logical* timeline: `date_added` values are supplied
//! by callers and compared against this clock, so processes sharing a cache
//! can share one eviction reference frame (typically a clock synchronised
//! against the pricing service) independent of any single machine's wall
//! clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of logical timestamps.
pub trait LogicalClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of [`LogicalClock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LogicalClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same underlying instant.
///
/// Useful in tests and when replaying a timeline supplied by an external
/// coordinator.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl LogicalClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        // Valid for any millisecond value an i64 can hold within chrono's range.
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
