//! Traits shared across all memochat crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `memochat-types`, not on each other.

use crate::error::Result;

/// Durable client-side key-value storage.
///
/// This is the whole persisted-state footprint of the transport: the token
/// store keeps exactly one key in it. Operations are synchronous so the
/// in-memory mirror can be updated in the same step as the persisted copy.
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::Storage`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores (or overwrites) `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::Storage`] if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::Storage`] if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Invoked when the server rejects the current session with HTTP 401.
///
/// The consuming application implements this to send the user back to its
/// login entry point.
pub trait SessionExpiryHook: Send + Sync {
    fn on_session_expired(&self);
}

/// Callbacks driven by a streaming session, one per frame kind.
///
/// `on_token` may fire many times, strictly in arrival order. At most one of
/// `on_done` / `on_error` fires per session, and nothing fires after it.
pub trait StreamHandler: Send {
    /// Appends an incremental piece of the reply.
    fn on_token(&mut self, content: &str);

    /// The reply is complete and was stored as `message_id`.
    fn on_done(&mut self, message_id: Option<i64>);

    /// The session failed; `message` is human-readable.
    fn on_error(&mut self, message: &str);

    /// The server echoed the persisted user message.
    fn on_user_message(&mut self, message_id: Option<i64>, content: &str) {
        let _ = (message_id, content);
    }
}
