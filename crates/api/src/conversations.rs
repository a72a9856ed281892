//! Conversation calls.

use crate::{MemochatClient, Pagination};
use memochat_transport::RequestOptions;
use memochat_types::Result;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Conversation {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Deserialize)]
struct Deleted {
    deleted_count: u32,
}

pub struct ConversationApi<'a> {
    client: &'a MemochatClient,
}

impl<'a> ConversationApi<'a> {
    pub(crate) fn new(client: &'a MemochatClient) -> Self {
        Self { client }
    }

    /// Lists conversations, most recently updated first. The server
    /// defaults to page 1 with 20 entries.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn list(&self, page: Option<u32>, limit: Option<u32>) -> Result<ConversationPage> {
        self.client
            .executor()
            .execute_json(
                "/conversations",
                RequestOptions::get()
                    .with_query("page", page)
                    .with_query("limit", limit),
            )
            .await
    }

    /// Creates a conversation. Without a title the server picks a placeholder
    /// and renames it after the first message.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn create(&self, title: Option<&str>) -> Result<Conversation> {
        let body = match title {
            Some(title) => json!({ "title": title }),
            None => json!({}),
        };
        self.client
            .executor()
            .execute_json("/conversations", RequestOptions::post(body))
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update(&self, id: i64, title: &str) -> Result<Conversation> {
        self.client
            .executor()
            .execute_json(
                &format!("/conversations/{id}"),
                RequestOptions::put(json!({ "title": title })),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .executor()
            .execute(&format!("/conversations/{id}"), RequestOptions::delete())
            .await
            .map(drop)
    }

    /// Deletes several conversations in one call and returns how many went.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn batch_delete(&self, ids: &[i64]) -> Result<u32> {
        let deleted: Deleted = self
            .client
            .executor()
            .execute_json(
                "/conversations/batch",
                RequestOptions::delete().with_body(json!({ "conversation_ids": ids })),
            )
            .await?;
        Ok(deleted.deleted_count)
    }
}
