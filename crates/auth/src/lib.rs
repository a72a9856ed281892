//! Bearer credential lifecycle for the memochat client.
//!
//! [`TokenStore`] owns the single active credential; [`LoginRedirect`] is the
//! default reaction to a server-side session expiry.

pub mod manager;
pub mod redirect;

pub use manager::TokenStore;
pub use redirect::LoginRedirect;
