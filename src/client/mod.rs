//! Cache-aside price fetch orchestration.
//!
//! [`PricingClient`] front-ends the pricing service with a read-through
//! cache and resiliency-wrapped remote fetches. Every public operation is
//! total: cache faults degrade to the remote path, remote failures degrade
//! to the caller's default price, and no error reaches the call site.

mod options;
mod pricing;

pub use options::{BuildError, ClientOptions};
pub use pricing::PricingClient;
