//! frontbridge - webhook ingestion and a resilient API client for Front
//!
//! The bridge exposes the Front helpdesk API to tool-calling agents and
//! receives Front's webhooks. Both directions share one concern: delivering
//! unreliable network operations at least once under partial failure.
//!
//! # Components
//!
//! - **Webhooks**: HMAC signature verification, freshness and dedup checks,
//!   routing to per-event handlers under the retry engine
//! - **Retry**: exponential backoff with jitter, shared by webhook
//!   processing and outbound calls
//! - **Rate limiting**: advisory pacing driven by the API's rate-limit headers
//! - **Cache**: time-boxed cache for slow-changing reads
//! - **Client**: one method per Front resource, behind a tower pipeline
//! - **Tools**: agent-facing tool calls that always return a structured result
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use frontbridge::{ConfigBuilder, FrontClient, RetryPolicy, WebhookState, webhook_router};
//!
//! # async fn run() -> frontbridge::Result<()> {
//! let config = ConfigBuilder::new().from_env().build()?;
//! frontbridge::init_tracing_with_config(&config);
//!
//! let client = FrontClient::from_config(&config)?;
//! let state = WebhookState::from_config(
//!     &config.webhook,
//!     client,
//!     RetryPolicy::from_config(&config.retry),
//! );
//! let router = webhook_router(state, config.server.max_body_size);
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
mod config;
mod error;
pub mod health;
pub mod ratelimit;
pub mod retry;
pub mod tools;
pub mod traits;
mod utils;
pub mod webhooks;

// Re-exports for public API
pub use cache::{CacheConfig, CacheKey, ResponseCache};
pub use client::{ClientConfig, FrontClient, FrontClientBuilder, ListQuery, Page};
pub use config::{Config, ConfigBuilder, LoggingConfig, ServerConfig};
pub use error::{BridgeError, ErrorResponse, Result};
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use ratelimit::{RateLimitConfig, RateLimitGovernor};
pub use retry::{RetryConfig, RetryError, RetryPolicy, Retryable, execute_with_retry};
pub use tools::{ToolDefinition, ToolRegistry, ToolResponse};
pub use traits::cache::Cache;
pub use webhooks::{
    EventType, SubscriptionManager, WebhookConfig, WebhookDispatcher, WebhookEnvelope,
    WebhookState, webhook_router,
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "frontbridge=debug")
/// - `FRONTBRIDGE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("FRONTBRIDGE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from the logging section of `config`
///
/// `RUST_LOG`, when set, still takes precedence over the configured level.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
