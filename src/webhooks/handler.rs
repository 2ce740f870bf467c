//! Per-event handlers.
//!
//! Handlers never trust the payload as a delta: they re-read current state
//! from the API, so deliveries applied out of order still converge.

use super::event::{EventType, WebhookEnvelope, payload_str};
use crate::client::FrontClient;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Two-phase contract for handling one family of events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Reject structurally invalid payloads; never retried
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()>;

    /// Perform the side effects for a validated delivery
    async fn process(&self, envelope: &WebhookEnvelope, client: &FrontClient) -> Result<()>;
}

fn require<'a>(payload: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    payload_str(payload, key).ok_or_else(|| BridgeError::validation(format!("payload.{} is required", key)))
}

/// Built-in handler for `event_type`, fixed at compile time
///
/// Unknown types have no handler and are acknowledged without processing.
pub fn handler_for(event_type: &EventType) -> Option<&'static dyn EventHandler> {
    match event_type {
        EventType::ConversationCreated
        | EventType::ConversationUpdated
        | EventType::ConversationAssigned
        | EventType::ConversationArchived => Some(&ConversationHandler),
        EventType::MessageReceived | EventType::MessageSent => Some(&MessageHandler),
        EventType::CommentCreated => Some(&CommentHandler),
        EventType::ContactCreated | EventType::ContactUpdated => Some(&ContactHandler),
        EventType::TagAdded | EventType::TagRemoved => Some(&TagHandler),
        EventType::Unknown(_) => None,
    }
}

/// Conversation lifecycle events
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationHandler;

#[async_trait]
impl EventHandler for ConversationHandler {
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()> {
        require(payload, "id").map(|_| ())
    }

    async fn process(&self, envelope: &WebhookEnvelope, client: &FrontClient) -> Result<()> {
        let conversation = client.get_conversation(&envelope.id).await?;

        tracing::info!(
            event_type = %envelope.event_type,
            conversation_id = %conversation.id,
            status = conversation.status.as_deref().unwrap_or("unknown"),
            assignee = conversation.assignee.as_ref().map(|a| a.id.as_str()).unwrap_or("none"),
            "Conversation event processed"
        );
        Ok(())
    }
}

/// Inbound and outbound messages
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageHandler;

impl MessageHandler {
    /// Conversation the message belongs to, from an explicit id or the related link
    fn conversation_id(payload: &Map<String, Value>) -> Option<String> {
        if let Some(id) = payload_str(payload, "conversation_id") {
            return Some(id.to_string());
        }

        let link = payload
            .get("_links")?
            .get("related")?
            .get("conversation")?
            .as_str()?;
        let url = url::Url::parse(link).ok()?;
        url.path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()> {
        require(payload, "id")?;
        if Self::conversation_id(payload).is_none() {
            return Err(BridgeError::validation(
                "payload.conversation_id or payload._links.related.conversation is required",
            ));
        }
        Ok(())
    }

    async fn process(&self, envelope: &WebhookEnvelope, client: &FrontClient) -> Result<()> {
        let conversation_id = Self::conversation_id(&envelope.payload)
            .ok_or_else(|| BridgeError::validation("message has no conversation reference"))?;
        let conversation = client.get_conversation(&conversation_id).await?;

        tracing::info!(
            event_type = %envelope.event_type,
            message_id = %envelope.id,
            conversation_id = %conversation.id,
            status = conversation.status.as_deref().unwrap_or("unknown"),
            "Message event processed"
        );
        Ok(())
    }
}

/// Internal comments
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentHandler;

#[async_trait]
impl EventHandler for CommentHandler {
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()> {
        require(payload, "id").map(|_| ())
    }

    async fn process(&self, envelope: &WebhookEnvelope, _client: &FrontClient) -> Result<()> {
        let author = envelope
            .payload
            .get("author")
            .and_then(|a| a.get("email").or_else(|| a.get("id")))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        tracing::info!(
            comment_id = %envelope.id,
            author,
            conversation_id = envelope.payload_str("conversation_id").unwrap_or("unknown"),
            "Comment event processed"
        );
        Ok(())
    }
}

/// Contact creation and updates
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactHandler;

#[async_trait]
impl EventHandler for ContactHandler {
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()> {
        require(payload, "id").map(|_| ())
    }

    async fn process(&self, envelope: &WebhookEnvelope, client: &FrontClient) -> Result<()> {
        let contact = client.get_contact(&envelope.id).await?;

        tracing::info!(
            event_type = %envelope.event_type,
            contact_id = %contact.id,
            name = contact.name.as_deref().unwrap_or(""),
            handles = contact.handles.len(),
            "Contact event processed"
        );
        Ok(())
    }
}

/// Tags applied to or removed from a conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct TagHandler;

impl TagHandler {
    fn tag_id(payload: &Map<String, Value>) -> Option<&str> {
        payload_str(payload, "tag_id").or_else(|| {
            payload
                .get("tag")
                .and_then(|t| t.get("id"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
    }
}

#[async_trait]
impl EventHandler for TagHandler {
    fn validate_payload(&self, payload: &Map<String, Value>) -> Result<()> {
        require(payload, "id")?;
        if Self::tag_id(payload).is_none() {
            return Err(BridgeError::validation("payload.tag_id or payload.tag.id is required"));
        }
        Ok(())
    }

    async fn process(&self, envelope: &WebhookEnvelope, client: &FrontClient) -> Result<()> {
        let tag_id = Self::tag_id(&envelope.payload)
            .ok_or_else(|| BridgeError::validation("tag event has no tag id"))?;
        let tag = client.get_tag(tag_id).await?;

        tracing::info!(
            event_type = %envelope.event_type,
            conversation_id = %envelope.id,
            tag_id = %tag.id,
            tag = %tag.name,
            "Tag event processed"
        );
        Ok(())
    }
}
