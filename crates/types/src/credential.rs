//! Bearer credential representation.

use secrecy::{ExposeSecret as _, SecretString};
use std::fmt;

/// Fixed storage key under which the active credential is persisted.
pub const CREDENTIAL_KEY: &str = "auth_token";

/// An opaque bearer token proving session identity.
///
/// The inner string is kept in a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
pub struct Credential(SecretString);

impl Credential {
    /// Wraps a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Returns the raw token string.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Formats the value of an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Lifecycle notification emitted by the token store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    /// A new credential was stored.
    Stored,
    /// The credential was removed (logout or session expiry).
    Cleared,
}
