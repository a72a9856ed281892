//! Per-user model provider configuration calls.

use crate::MemochatClient;
use memochat_transport::RequestOptions;
use memochat_types::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// A provider the server knows how to call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Empty means any model name is accepted.
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    pub id: i64,
    pub provider: String,
    pub model_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// The server stores flags as 0/1 integers.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}

/// Body for creating or updating a configuration. On update, `None` fields
/// keep their stored value.
#[derive(Clone, Default, Serialize)]
pub struct ModelConfigDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

impl fmt::Debug for ModelConfigDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfigDraft")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("is_default", &self.is_default)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelTestResult {
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct Providers {
    providers: BTreeMap<String, Provider>,
}

#[derive(Deserialize)]
struct Configs {
    #[serde(default)]
    configs: Vec<ModelConfig>,
}

#[derive(Deserialize)]
struct Created {
    id: i64,
}

pub struct ModelConfigApi<'a> {
    client: &'a MemochatClient,
}

impl<'a> ModelConfigApi<'a> {
    pub(crate) fn new(client: &'a MemochatClient) -> Self {
        Self { client }
    }

    /// Supported providers keyed by their id (`deepseek`, `qwen`, ...).
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn providers(&self) -> Result<BTreeMap<String, Provider>> {
        let providers: Providers = self
            .client
            .executor()
            .execute_json("/user/model-configs/providers", RequestOptions::get())
            .await?;
        Ok(providers.providers)
    }

    /// The user's configurations, default first.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn list(&self) -> Result<Vec<ModelConfig>> {
        let configs: Configs = self
            .client
            .executor()
            .execute_json("/user/model-configs", RequestOptions::get())
            .await?;
        Ok(configs.configs)
    }

    /// # Errors
    ///
    /// A `RequestFailed` (404) when no default is set.
    pub async fn default_config(&self) -> Result<ModelConfig> {
        self.client
            .executor()
            .execute_json("/user/model-configs/default", RequestOptions::get())
            .await
    }

    /// Creates a configuration and returns its id.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn create(&self, draft: &ModelConfigDraft) -> Result<i64> {
        let created: Created = self
            .client
            .executor()
            .execute_json(
                "/user/model-configs",
                RequestOptions::post(serde_json::to_value(draft)?),
            )
            .await?;
        Ok(created.id)
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update(&self, id: i64, draft: &ModelConfigDraft) -> Result<()> {
        self.client
            .executor()
            .execute(
                &format!("/user/model-configs/{id}"),
                RequestOptions::put(serde_json::to_value(draft)?),
            )
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .executor()
            .execute(&format!("/user/model-configs/{id}"), RequestOptions::delete())
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn set_default(&self, id: i64) -> Result<()> {
        self.client
            .executor()
            .execute(
                &format!("/user/model-configs/{id}/set-default"),
                RequestOptions::put(json!({})),
            )
            .await
            .map(drop)
    }

    /// Asks the server to make a tiny completion call with the stored key.
    ///
    /// # Errors
    ///
    /// Propagates transport errors; an invalid key is usually a `RequestFailed` (400).
    pub async fn test(&self, id: i64) -> Result<ModelTestResult> {
        self.client
            .executor()
            .execute_json(
                &format!("/user/model-configs/{id}/test"),
                RequestOptions::post(json!({})),
            )
            .await
    }
}
