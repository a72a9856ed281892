//! Message calls, including the streamed reply.

use crate::{MemochatClient, Pagination};
use memochat_transport::{CancellationToken, RequestOptions, StreamOutcome};
use memochat_types::{Result, StreamHandler};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Both sides of a non-streamed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentExchange {
    pub user_message: Message,
    pub assistant_message: Message,
}

pub struct MessageApi<'a> {
    client: &'a MemochatClient,
}

impl<'a> MessageApi<'a> {
    pub(crate) fn new(client: &'a MemochatClient) -> Self {
        Self { client }
    }

    /// Lists messages oldest first. The server defaults to 50 a page.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn list(
        &self,
        conversation_id: i64,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<MessagePage> {
        self.client
            .executor()
            .execute_json(
                &format!("/conversations/{conversation_id}/messages"),
                RequestOptions::get()
                    .with_query("page", page)
                    .with_query("limit", limit),
            )
            .await
    }

    /// Sends a message and waits for the whole reply.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn send(&self, conversation_id: i64, content: &str) -> Result<SentExchange> {
        self.client
            .executor()
            .execute_json(
                &format!("/conversations/{conversation_id}/messages"),
                RequestOptions::post(json!({ "content": content })),
            )
            .await
    }

    /// Sends a message and streams the reply into `handler`.
    ///
    /// # Errors
    ///
    /// Only setup failures; everything else goes to `handler.on_error`.
    pub async fn stream<H: StreamHandler + ?Sized>(
        &self,
        conversation_id: i64,
        content: &str,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        self.client
            .streams()
            .stream(
                &format!("/conversations/{conversation_id}/messages/stream"),
                &json!({ "content": content }),
                handler,
                cancel,
            )
            .await
    }

    /// Edits a user message. Assistant messages are rejected with 403.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update(
        &self,
        conversation_id: i64,
        message_id: i64,
        content: &str,
    ) -> Result<Message> {
        self.client
            .executor()
            .execute_json(
                &format!("/conversations/{conversation_id}/messages/{message_id}"),
                RequestOptions::put(json!({ "content": content })),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn delete(&self, conversation_id: i64, message_id: i64) -> Result<()> {
        self.client
            .executor()
            .execute(
                &format!("/conversations/{conversation_id}/messages/{message_id}"),
                RequestOptions::delete(),
            )
            .await
            .map(drop)
    }
}
