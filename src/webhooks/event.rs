use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Webhook event types the bridge routes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    ConversationCreated,
    ConversationUpdated,
    ConversationAssigned,
    ConversationArchived,
    MessageReceived,
    MessageSent,
    CommentCreated,
    ContactCreated,
    ContactUpdated,
    TagAdded,
    TagRemoved,
    /// Anything the bridge has no handler for
    Unknown(String),
}

impl EventType {
    /// Every routed type, in subscription order
    pub const KNOWN: [EventType; 11] = [
        EventType::ConversationCreated,
        EventType::ConversationUpdated,
        EventType::ConversationAssigned,
        EventType::ConversationArchived,
        EventType::MessageReceived,
        EventType::MessageSent,
        EventType::CommentCreated,
        EventType::ContactCreated,
        EventType::ContactUpdated,
        EventType::TagAdded,
        EventType::TagRemoved,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::ConversationCreated => "conversation.created",
            Self::ConversationUpdated => "conversation.updated",
            Self::ConversationAssigned => "conversation.assigned",
            Self::ConversationArchived => "conversation.archived",
            Self::MessageReceived => "message.received",
            Self::MessageSent => "message.sent",
            Self::CommentCreated => "comment.created",
            Self::ContactCreated => "contact.created",
            Self::ContactUpdated => "contact.updated",
            Self::TagAdded => "tag.added",
            Self::TagRemoved => "tag.removed",
            Self::Unknown(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|t| t.as_str() == s)
            .cloned()
            .unwrap_or_else(|| Self::Unknown(s.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(EventType::from(s.as_str()))
    }
}

/// A verified, claimed webhook delivery
///
/// Identity is `(event_type, id)`, where `id` is `payload.id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEnvelope {
    pub event_type: EventType,
    pub payload: Map<String, Value>,
    pub id: String,
    /// Epoch seconds at which the bridge accepted the delivery
    pub received_at: f64,
}

impl WebhookEnvelope {
    /// String field of the payload, if present and non-empty
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        payload_str(&self.payload, key)
    }
}

pub(crate) fn payload_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
