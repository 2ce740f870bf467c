//! One method per Front resource and verb

use super::FrontClient;
use super::models::*;
use crate::cache::CacheKey;
use crate::error::Result;
use serde_json::json;

impl FrontClient {
    // Conversations

    pub async fn list_conversations(&self, query: &ListQuery) -> Result<Page<Conversation>> {
        self.get_json(&["conversations"], query).await
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        self.get_json(&["conversations", id], &ListQuery::default()).await
    }

    pub async fn update_conversation(&self, id: &str, update: &ConversationUpdate) -> Result<()> {
        self.patch_empty(&["conversations", id], update).await
    }

    pub async fn list_conversation_messages(
        &self,
        id: &str,
        query: &ListQuery,
    ) -> Result<Page<Message>> {
        self.get_json(&["conversations", id, "messages"], query).await
    }

    pub async fn add_comment(&self, conversation_id: &str, comment: &NewComment) -> Result<Comment> {
        self.post_json(&["conversations", conversation_id, "comments"], comment)
            .await
    }

    /// Queue a reply on the conversation's channel
    pub async fn send_reply(&self, conversation_id: &str, reply: &NewReply) -> Result<MessageReceipt> {
        self.post_json(&["conversations", conversation_id, "messages"], reply)
            .await
    }

    // Tags

    pub async fn list_tags(&self, query: &ListQuery) -> Result<Page<Tag>> {
        self.list_maybe_cached(CacheKey::Tags, &["tags"], query).await
    }

    pub async fn get_tag(&self, id: &str) -> Result<Tag> {
        self.cached_get(CacheKey::Tag(id.to_string()), &["tags", id])
            .await
    }

    pub async fn create_tag(&self, tag: &NewTag) -> Result<Tag> {
        self.post_json(&["tags"], tag).await
    }

    pub async fn apply_tag(&self, conversation_id: &str, tag_id: &str) -> Result<()> {
        self.post_empty(
            &["conversations", conversation_id, "tags"],
            &json!({ "tag_ids": [tag_id] }),
        )
        .await
    }

    pub async fn remove_tag(&self, conversation_id: &str, tag_id: &str) -> Result<()> {
        self.delete_empty(
            &["conversations", conversation_id, "tags"],
            &json!({ "tag_ids": [tag_id] }),
        )
        .await
    }

    // Contacts

    pub async fn list_contacts(&self, query: &ListQuery) -> Result<Page<Contact>> {
        self.get_json(&["contacts"], query).await
    }

    pub async fn get_contact(&self, id: &str) -> Result<Contact> {
        self.get_json(&["contacts", id], &ListQuery::default()).await
    }

    pub async fn create_contact(&self, contact: &ContactInput) -> Result<Contact> {
        self.post_json(&["contacts"], contact).await
    }

    pub async fn update_contact(&self, id: &str, contact: &ContactInput) -> Result<()> {
        self.patch_empty(&["contacts", id], contact).await
    }

    // Accounts

    pub async fn list_accounts(&self, query: &ListQuery) -> Result<Page<Account>> {
        self.list_maybe_cached(CacheKey::Accounts, &["accounts"], query)
            .await
    }

    pub async fn get_account(&self, id: &str) -> Result<Account> {
        self.cached_get(CacheKey::Account(id.to_string()), &["accounts", id])
            .await
    }

    pub async fn create_account(&self, account: &NewAccount) -> Result<Account> {
        self.post_json(&["accounts"], account).await
    }

    // Inboxes and teammates

    pub async fn list_inboxes(&self, query: &ListQuery) -> Result<Page<Inbox>> {
        self.list_maybe_cached(CacheKey::Inboxes, &["inboxes"], query)
            .await
    }

    pub async fn list_teammates(&self, query: &ListQuery) -> Result<Page<Teammate>> {
        self.list_maybe_cached(CacheKey::Teammates, &["teammates"], query)
            .await
    }

    pub async fn get_teammate(&self, id: &str) -> Result<Teammate> {
        self.cached_get(CacheKey::Teammate(id.to_string()), &["teammates", id])
            .await
    }

    // Webhook subscriptions

    pub async fn list_webhooks(&self) -> Result<Page<WebhookSubscription>> {
        self.get_json(&["webhooks"], &ListQuery::default()).await
    }

    /// Subscribe `url` to `events` in a single call
    pub async fn create_webhook(&self, url: &str, events: &[String]) -> Result<WebhookSubscription> {
        self.post_json(&["webhooks"], &json!({ "url": url, "events": events }))
            .await
    }
}
