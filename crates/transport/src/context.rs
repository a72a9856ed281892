//! Shared state every transport call needs: HTTP client, API root,
//! credential store, and the session-expiry hook.

use memochat_auth::TokenStore;
use memochat_config::Config;
use memochat_types::{Credential, Result, SessionExpiryHook, TransportError};
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP context used by both the request executor and the stream reader.
pub struct TransportContext {
    http: reqwest::Client,
    api_root: String,
    tokens: Arc<TokenStore>,
    on_expired: Arc<dyn SessionExpiryHook>,
}

impl TransportContext {
    /// Creates a context targeting `api_root` (origin plus path prefix).
    pub fn new(
        http: reqwest::Client,
        api_root: impl Into<String>,
        tokens: Arc<TokenStore>,
        on_expired: Arc<dyn SessionExpiryHook>,
    ) -> Self {
        Self {
            http,
            api_root: api_root.into().trim_end_matches('/').to_string(),
            tokens,
            on_expired,
        }
    }

    /// Builds a context from configuration.
    ///
    /// Only the connect phase gets a client-wide timeout; a whole-request
    /// timeout would cut long token streams short.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &Config,
        tokens: Arc<TokenStore>,
        on_expired: Arc<dyn SessionExpiryHook>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| TransportError::Config(format!("http client: {e}")))?;
        Ok(Self::new(http, config.endpoint_url(""), tokens, on_expired))
    }

    /// Full URL for an endpoint path such as `/conversations/3/messages`.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() || endpoint.starts_with('/') {
            format!("{}{endpoint}", self.api_root)
        } else {
            format!("{}/{endpoint}", self.api_root)
        }
    }

    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// The credential to attach right now, read fresh for every attempt.
    #[must_use]
    pub fn credential(&self) -> Option<Arc<Credential>> {
        self.tokens.get()
    }

    /// Handles a 401: clears the credential and fires the login redirect.
    ///
    /// Returns the terminal error so call sites can `return Err(ctx.expire_session())`.
    pub fn expire_session(&self) -> TransportError {
        // The in-memory credential is gone even if the stored copy is not.
        if let Err(e) = self.tokens.clear() {
            tracing::debug!(error = %e, "stored credential not removed on session expiry");
        }
        self.on_expired.on_session_expired();
        TransportError::AuthExpired
    }
}
