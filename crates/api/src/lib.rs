//! Typed calls for the memochat backend.
//!
//! Each resource gets a thin wrapper that supplies endpoint, method, and
//! body to the shared [`RequestExecutor`]. Errors are never caught here; they
//! reach the caller exactly as the transport produced them.

pub mod auth;
pub mod conversations;
pub mod memories;
pub mod messages;
pub mod models;

pub use auth::{AuthApi, RegisterRequest, RegisteredUser, Session, UpdateProfile, User};
pub use conversations::{Conversation, ConversationApi, ConversationPage};
pub use memories::{Memory, MemoryApi, MemoryDraft, MemoryId, MemoryList};
pub use messages::{Message, MessageApi, MessagePage, SentExchange};
pub use models::{ModelConfig, ModelConfigApi, ModelConfigDraft, ModelTestResult, Provider};

use memochat_auth::TokenStore;
use memochat_config::Config;
use memochat_transport::{RequestExecutor, RetryPolicy, StreamReader, TransportContext};
use memochat_types::{Result, SessionExpiryHook};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Page metadata returned alongside list endpoints.
///
/// The memories endpoint sometimes sends an empty object, so every field
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Entry point bundling the executor, the stream reader, and the token store.
#[derive(Clone)]
pub struct MemochatClient {
    executor: RequestExecutor,
    streams: StreamReader,
}

impl MemochatClient {
    #[must_use]
    pub fn new(ctx: Arc<TransportContext>, policy: RetryPolicy) -> Self {
        Self {
            executor: RequestExecutor::new(Arc::clone(&ctx)).with_policy(policy),
            streams: StreamReader::new(ctx),
        }
    }

    /// Builds a client from configuration.
    ///
    /// `timeout_secs` bounds every non-streaming attempt; streams are only
    /// bounded while connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(
        config: &Config,
        tokens: Arc<TokenStore>,
        on_expired: Arc<dyn SessionExpiryHook>,
    ) -> Result<Self> {
        let ctx = Arc::new(TransportContext::from_config(config, tokens, on_expired)?);
        let mut client = Self::new(ctx, RetryPolicy::from(&config.retry));
        client.executor = client
            .executor
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)));
        Ok(client)
    }

    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    #[must_use]
    pub fn streams(&self) -> &StreamReader {
        &self.streams
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.executor.context().tokens()
    }

    #[must_use]
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    #[must_use]
    pub fn conversations(&self) -> ConversationApi<'_> {
        ConversationApi::new(self)
    }

    #[must_use]
    pub fn messages(&self) -> MessageApi<'_> {
        MessageApi::new(self)
    }

    #[must_use]
    pub fn memories(&self) -> MemoryApi<'_> {
        MemoryApi::new(self)
    }

    #[must_use]
    pub fn models(&self) -> ModelConfigApi<'_> {
        ModelConfigApi::new(self)
    }
}
