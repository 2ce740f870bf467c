//! Inbound webhook ingestion.
//!
//! Signature verification with replay protection, deduplication, routing to
//! per-event handlers under the retry engine, and startup reconciliation of
//! the provider's subscriptions.

mod config;
mod dispatcher;
mod event;
pub mod handler;
mod idempotency;
mod routes;
mod subscription;
mod verification;

pub use config::{WebhookConfig, WebhookConfigBuilder};
pub use dispatcher::{DispatchOutcome, WebhookDispatcher};
pub use event::{EventType, WebhookEnvelope};
pub use handler::EventHandler;
pub use idempotency::{DedupKey, IdempotencyStore, MemoryIdempotencyStore};
pub use routes::{WebhookState, webhook_router};
pub use subscription::{ReconcileOutcome, SubscriptionManager};
pub use verification::{
    HmacSha256Verifier, SIGNATURE_HEADER, WebhookAuthenticator, WebhookVerifier, sign,
};
