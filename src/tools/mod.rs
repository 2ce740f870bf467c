//! Agent-facing tool surface over [`FrontClient`].
//!
//! Tools take JSON arguments, deserialize them into typed structs and call
//! the client. Failures never escape as `Err`: they come back as a
//! [`ToolResponse`] with `is_error` set so the calling agent always gets a
//! well-formed result.

use crate::client::{
    ContactInput, ConversationUpdate, FrontClient, ListQuery, NewAccount, NewComment, NewReply,
    NewTag,
};
use crate::error::{BridgeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Outcome of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub is_error: bool,
    pub content: Value,
}

impl ToolResponse {
    pub fn ok(content: Value) -> Self {
        Self {
            is_error: false,
            content,
        }
    }

    fn from_error(err: &BridgeError) -> Self {
        Self {
            is_error: true,
            content: json!({
                "error": err.to_string(),
                "retryable": err.is_retryable(),
                "status": err.upstream_status(),
            }),
        }
    }
}

/// Name and description of a tool, as advertised to agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
}

const DEFINITIONS: &[ToolDefinition] = &[
    ToolDefinition { name: "list_conversations", description: "List conversations, optionally filtered by a search query" },
    ToolDefinition { name: "get_conversation", description: "Fetch a conversation by id" },
    ToolDefinition { name: "update_conversation", description: "Change a conversation's assignee, inbox, status or tags" },
    ToolDefinition { name: "add_comment", description: "Add an internal comment to a conversation" },
    ToolDefinition { name: "send_reply", description: "Reply to a conversation on its channel" },
    ToolDefinition { name: "list_tags", description: "List tags" },
    ToolDefinition { name: "create_tag", description: "Create a tag" },
    ToolDefinition { name: "apply_tag", description: "Apply a tag to a conversation" },
    ToolDefinition { name: "remove_tag", description: "Remove a tag from a conversation" },
    ToolDefinition { name: "list_contacts", description: "List contacts, optionally filtered by a search query" },
    ToolDefinition { name: "get_contact", description: "Fetch a contact by id" },
    ToolDefinition { name: "create_contact", description: "Create a contact" },
    ToolDefinition { name: "update_contact", description: "Update a contact's name, description or handles" },
    ToolDefinition { name: "list_accounts", description: "List accounts" },
    ToolDefinition { name: "get_account", description: "Fetch an account by id" },
    ToolDefinition { name: "create_account", description: "Create an account" },
    ToolDefinition { name: "list_inboxes", description: "List inboxes" },
    ToolDefinition { name: "list_teammates", description: "List teammates" },
];

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(flatten)]
    query: ListQuery,
}

#[derive(Deserialize)]
struct UpdateConversationArgs {
    conversation_id: String,
    #[serde(flatten)]
    update: ConversationUpdate,
}

#[derive(Deserialize)]
struct CommentArgs {
    conversation_id: String,
    #[serde(flatten)]
    comment: NewComment,
}

#[derive(Deserialize)]
struct ReplyArgs {
    conversation_id: String,
    #[serde(flatten)]
    reply: NewReply,
}

#[derive(Deserialize)]
struct TagArgs {
    conversation_id: String,
    tag_id: String,
}

#[derive(Deserialize)]
struct UpdateContactArgs {
    contact_id: String,
    #[serde(flatten)]
    contact: ContactInput,
}

/// Registry of the tools exposed to agents
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    client: FrontClient,
}

impl ToolRegistry {
    pub fn new(client: FrontClient) -> Self {
        Self { client }
    }

    pub fn definitions() -> &'static [ToolDefinition] {
        DEFINITIONS
    }

    /// Run tool `name` with JSON `args`
    pub async fn call(&self, name: &str, args: Value) -> ToolResponse {
        tracing::debug!(tool = name, "Tool invoked");

        match self.dispatch(name, args).await {
            Ok(content) => ToolResponse::ok(content),
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Tool call failed");
                ToolResponse::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value> {
        let client = &self.client;

        match name {
            // Conversations
            "list_conversations" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_conversations(&args.query).await?)
            }
            "get_conversation" => {
                let args: IdArgs = parse(name, args)?;
                to_content(client.get_conversation(&args.id).await?)
            }
            "update_conversation" => {
                let args: UpdateConversationArgs = parse(name, args)?;
                if args.update == ConversationUpdate::default() {
                    return Err(BridgeError::validation("update_conversation needs at least one field to change"));
                }
                client.update_conversation(&args.conversation_id, &args.update).await?;
                Ok(json!({ "updated": args.conversation_id }))
            }
            "add_comment" => {
                let args: CommentArgs = parse(name, args)?;
                require_text("body", &args.comment.body)?;
                to_content(client.add_comment(&args.conversation_id, &args.comment).await?)
            }
            "send_reply" => {
                let args: ReplyArgs = parse(name, args)?;
                require_text("body", &args.reply.body)?;
                to_content(client.send_reply(&args.conversation_id, &args.reply).await?)
            }

            // Tags
            "list_tags" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_tags(&args.query).await?)
            }
            "create_tag" => {
                let args: NewTag = parse(name, args)?;
                require_text("name", &args.name)?;
                to_content(client.create_tag(&args).await?)
            }
            "apply_tag" => {
                let args: TagArgs = parse(name, args)?;
                client.apply_tag(&args.conversation_id, &args.tag_id).await?;
                Ok(json!({ "conversation_id": args.conversation_id, "tag_id": args.tag_id, "applied": true }))
            }
            "remove_tag" => {
                let args: TagArgs = parse(name, args)?;
                client.remove_tag(&args.conversation_id, &args.tag_id).await?;
                Ok(json!({ "conversation_id": args.conversation_id, "tag_id": args.tag_id, "removed": true }))
            }

            // Contacts
            "list_contacts" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_contacts(&args.query).await?)
            }
            "get_contact" => {
                let args: IdArgs = parse(name, args)?;
                to_content(client.get_contact(&args.id).await?)
            }
            "create_contact" => {
                let args: ContactInput = parse(name, args)?;
                if args.handles.as_ref().is_none_or(Vec::is_empty) {
                    return Err(BridgeError::validation("create_contact needs at least one handle"));
                }
                to_content(client.create_contact(&args).await?)
            }
            "update_contact" => {
                let args: UpdateContactArgs = parse(name, args)?;
                client.update_contact(&args.contact_id, &args.contact).await?;
                Ok(json!({ "updated": args.contact_id }))
            }

            // Accounts
            "list_accounts" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_accounts(&args.query).await?)
            }
            "get_account" => {
                let args: IdArgs = parse(name, args)?;
                to_content(client.get_account(&args.id).await?)
            }
            "create_account" => {
                let args: NewAccount = parse(name, args)?;
                require_text("name", &args.name)?;
                to_content(client.create_account(&args).await?)
            }

            // Inboxes and teammates
            "list_inboxes" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_inboxes(&args.query).await?)
            }
            "list_teammates" => {
                let args: ListArgs = parse(name, args)?;
                to_content(client.list_teammates(&args.query).await?)
            }

            _ => Err(BridgeError::validation(format!("Unknown tool: {}", name))),
        }
    }
}

/// Deserialize tool arguments; `null` is treated as an empty object
fn parse<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| BridgeError::validation(format!("Invalid arguments for {}: {}", tool, e)))
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn to_content<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| BridgeError::internal(format!("Failed to encode tool result: {}", e)))
}
