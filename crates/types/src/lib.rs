//! Core types and traits for the memochat workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! memochat client, including the transport error taxonomy, the bearer
//! credential, streamed frame payloads, and the traits each layer implements.

pub mod credential;
pub mod error;
pub mod frame;
pub mod traits;

pub use credential::{CREDENTIAL_KEY, Credential, CredentialEvent};
pub use error::{AUTH_FAILED_MESSAGE, NETWORK_FAILED_MESSAGE, Result, TransportError};
pub use frame::Frame;
pub use traits::{KeyValueStorage, SessionExpiryHook, StreamHandler};
