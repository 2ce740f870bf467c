//! Routes claimed deliveries to their handlers.
//!
//! `validate_payload` runs once and is never retried. `process` runs under
//! the retry engine; a handler whose outbound calls already exhausted their
//! own retries surfaces `RetriesExhausted`, which is terminal here, so the
//! two retry layers do not multiply.

use super::event::{EventType, WebhookEnvelope};
use super::handler::{EventHandler, handler_for};
use crate::client::FrontClient;
use crate::error::{BridgeError, Result};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of dispatching one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Processed,
    /// No handler is registered for the event type
    Ignored,
}

pub struct WebhookDispatcher {
    client: FrontClient,
    retry: RetryPolicy,
    /// Handlers registered in place of the built-in ones
    overrides: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl WebhookDispatcher {
    /// Dispatcher with a handler for every known event type
    pub fn new(client: FrontClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            overrides: HashMap::new(),
        }
    }

    /// Replace the handler for `event_type`
    #[must_use]
    pub fn with_handler(mut self, event_type: EventType, handler: Arc<dyn EventHandler>) -> Self {
        self.overrides.insert(event_type, handler);
        self
    }

    fn handler(&self, event_type: &EventType) -> Option<&dyn EventHandler> {
        match self.overrides.get(event_type) {
            Some(handler) => Some(handler.as_ref()),
            None => handler_for(event_type),
        }
    }

    pub fn client(&self) -> &FrontClient {
        &self.client
    }

    /// Validate and process `envelope`
    ///
    /// Every terminal failure is logged with the event type, webhook id and
    /// attempt count before being returned.
    pub async fn handle(&self, envelope: WebhookEnvelope) -> Result<DispatchOutcome> {
        let Some(handler) = self.handler(&envelope.event_type) else {
            tracing::info!(
                event_type = %envelope.event_type,
                webhook_id = %envelope.id,
                "No handler for webhook type, acknowledging"
            );
            return Ok(DispatchOutcome::Ignored);
        };

        if let Err(e) = handler.validate_payload(&envelope.payload) {
            tracing::error!(
                event_type = %envelope.event_type,
                webhook_id = %envelope.id,
                attempts = 0,
                error = %e,
                "Webhook payload failed validation"
            );
            return Err(e);
        }

        let operation = format!("webhook {}", envelope.event_type);
        let result = self
            .retry
            .execute(&operation, || handler.process(&envelope, &self.client))
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    event_type = %envelope.event_type,
                    webhook_id = %envelope.id,
                    "Webhook processed successfully"
                );
                Ok(DispatchOutcome::Processed)
            }
            Err(e) => {
                let attempts = e.attempts();
                let err = BridgeError::from(e);
                tracing::error!(
                    event_type = %envelope.event_type,
                    webhook_id = %envelope.id,
                    attempts,
                    error = %err,
                    "Webhook processing failed"
                );
                Err(err)
            }
        }
    }
}
