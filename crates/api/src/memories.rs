//! Memory calls.

use crate::{MemochatClient, Pagination};
use memochat_transport::RequestOptions;
use memochat_types::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Memories listed from the vector store carry string ids; rows created
/// through the API carry integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryId {
    Int(i64),
    Text(String),
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for MemoryId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Either a list of strings or its JSON-encoded text, depending on the source.
    #[serde(default)]
    pub tags: Value,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryList {
    #[serde(default)]
    pub memories: Vec<Memory>,
    /// Graph relations between memories, passed through untouched.
    #[serde(default)]
    pub relations: Vec<Value>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// Body for creating or updating a memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryDraft {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    memories: Vec<Memory>,
}

pub struct MemoryApi<'a> {
    client: &'a MemochatClient,
}

impl<'a> MemoryApi<'a> {
    pub(crate) fn new(client: &'a MemochatClient) -> Self {
        Self { client }
    }

    /// Lists memories, optionally scoped to one conversation. The server
    /// returns up to 100 by default.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn list(&self, limit: Option<u32>, conversation_id: Option<i64>) -> Result<MemoryList> {
        self.client
            .executor()
            .execute_json(
                "/memories",
                RequestOptions::get()
                    .with_query("limit", limit)
                    .with_query("conversation_id", conversation_id),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn create(&self, draft: &MemoryDraft) -> Result<Memory> {
        self.client
            .executor()
            .execute_json("/memories", RequestOptions::post(serde_json::to_value(draft)?))
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update(&self, id: &MemoryId, draft: &MemoryDraft) -> Result<Memory> {
        self.client
            .executor()
            .execute_json(
                &format!("/memories/{id}"),
                RequestOptions::put(serde_json::to_value(draft)?),
            )
            .await
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn delete(&self, id: &MemoryId) -> Result<()> {
        self.client
            .executor()
            .execute(&format!("/memories/{id}"), RequestOptions::delete())
            .await
            .map(drop)
    }

    /// Semantic search within one conversation's memories.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn search(
        &self,
        query: &str,
        conversation_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<Memory>> {
        let mut body = json!({ "query": query, "conversation_id": conversation_id });
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }
        let results: SearchResults = self
            .client
            .executor()
            .execute_json("/memories/search", RequestOptions::post(body))
            .await?;
        Ok(results.memories)
    }
}
