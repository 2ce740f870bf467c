//! Wire types for the Front REST API
//!
//! Only the fields the bridge reads are typed; everything else the API
//! returns is kept in `extra` so responses pass through to agents intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of a list endpoint
///
/// Decoded from `{"_results": [...], "_pagination": {"next": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "_results", default = "Vec::new")]
    pub results: Vec<T>,

    #[serde(rename = "_pagination", default)]
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Absolute URL of the following page, if any
    pub fn next(&self) -> Option<&str> {
        self.pagination.next.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next: Option<String>,
}

/// Query parameters accepted by list endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Search expression, e.g. `q[statuses][]=open`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl ListQuery {
    pub fn is_empty(&self) -> bool {
        self.q.is_none() && self.limit.is_none() && self.page_token.is_none()
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = &self.q {
            pairs.push(("q", q.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(token) = &self.page_token {
            pairs.push(("page_token", token.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee: Option<Teammate>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields accepted by `PATCH /conversations/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_inbound: Option<bool>,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<Teammate>,
    #[serde(default)]
    pub posted_at: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReply {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Acknowledgement for a queued outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message_uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactHandle {
    pub handle: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub handles: Vec<ContactHandle>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for creating or updating a contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handles: Option<Vec<ContactHandle>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teammate {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

/// A webhook subscription as held by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_decodes_results_and_next() {
        let page: Page<Tag> = serde_json::from_value(json!({
            "_pagination": {"next": "https://api2.frontapp.com/tags?page_token=abc"},
            "_links": {"self": "https://api2.frontapp.com/tags"},
            "_results": [{"id": "tag_1", "name": "urgent"}]
        }))
        .unwrap();

        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].name, "urgent");
        assert_eq!(page.next(), Some("https://api2.frontapp.com/tags?page_token=abc"));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page: Page<Tag> =
            serde_json::from_value(json!({"_pagination": {"next": null}, "_results": []})).unwrap();
        assert!(page.results.is_empty());
        assert_eq!(page.next(), None);
    }

    #[test]
    fn test_conversation_keeps_unknown_fields() {
        let conversation: Conversation = serde_json::from_value(json!({
            "id": "cnv_123",
            "status": "assigned",
            "is_private": false
        }))
        .unwrap();

        assert_eq!(conversation.status.as_deref(), Some("assigned"));
        assert_eq!(conversation.extra.get("is_private"), Some(&json!(false)));
    }

    #[test]
    fn test_list_query_pairs() {
        assert!(ListQuery::default().is_empty());

        let query = ListQuery {
            q: Some("status:open".to_string()),
            limit: Some(25),
            page_token: None,
        };
        assert!(!query.is_empty());
        assert_eq!(
            query.pairs(),
            vec![("q", "status:open".to_string()), ("limit", "25".to_string())]
        );
    }
}
