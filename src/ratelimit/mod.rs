//! Outbound rate-limit pacing.
//!
//! The governor watches `x-ratelimit-remaining` / `x-ratelimit-reset` on
//! every upstream response and, once the remaining budget runs low, spaces
//! subsequent requests evenly across the rest of the provider's window.
//! It is advisory: it lowers the chance of a 429 but does not enforce a quota.

mod config;
mod governor;
mod layer;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use governor::{RateLimitGovernor, RateLimitState};
pub use layer::{RateLimitLayer, RateLimitService};
