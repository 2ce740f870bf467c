//! Inbound HTTP surface: `POST /webhooks` and `GET /health`.
//!
//! Deliveries are acknowledged as soon as they pass the boundary checks;
//! processing continues on a detached task and its failures are visible
//! only in the logs.

use super::config::WebhookConfig;
use super::dispatcher::WebhookDispatcher;
use super::idempotency::MemoryIdempotencyStore;
use super::verification::{HmacSha256Verifier, SIGNATURE_HEADER, WebhookAuthenticator};
use crate::client::FrontClient;
use crate::error::Result;
use crate::health::{self, HealthResponse};
use crate::retry::RetryPolicy;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Shared state for the webhook routes
#[derive(Clone)]
pub struct WebhookState {
    pub authenticator: Arc<WebhookAuthenticator>,
    pub dispatcher: Arc<WebhookDispatcher>,
}

impl WebhookState {
    pub fn new(authenticator: WebhookAuthenticator, dispatcher: WebhookDispatcher) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// HMAC verification, an in-memory dedup store and the default handlers
    pub fn from_config(config: &WebhookConfig, client: FrontClient, retry: RetryPolicy) -> Self {
        let authenticator = WebhookAuthenticator::new(
            Arc::new(HmacSha256Verifier::new(config.secret.clone())),
            Arc::new(MemoryIdempotencyStore::new(config.dedup_window())),
            config.freshness_window(),
        );
        Self::new(authenticator, WebhookDispatcher::new(client, retry))
    }
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
}

/// Build the inbound router
pub fn webhook_router(state: WebhookState, max_body_size: usize) -> Router {
    Router::new()
        .route("/webhooks", post(receive_webhook))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

async fn receive_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Accepted>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let envelope = state.authenticator.authenticate(&body, signature).await?;

    let span = tracing::info_span!(
        "webhook",
        delivery_id = %Uuid::new_v4(),
        event_type = %envelope.event_type,
        webhook_id = %envelope.id,
    );
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(
        async move {
            // Failures are logged by the dispatcher
            let _ = dispatcher.handle(envelope).await;
        }
        .instrument(span),
    );

    Ok(Json(Accepted { status: "accepted" }))
}

async fn health_check(State(state): State<WebhookState>) -> HealthResponse {
    health::report(state.dispatcher.client())
}
