//! Public types for the priceopt API.

mod org_config;
mod price;
mod request;

pub use org_config::{OrgConfig, UserAgentRule};
pub use price::{FetchedPrice, PriceOptimization};
pub use request::PriceRequest;
