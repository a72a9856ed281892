//! Default session-expiry hook: records a redirect to the login entry point.

use memochat_types::SessionExpiryHook;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sends the application back to `login_path` when a session expires.
///
/// Without a UI to navigate, this logs the redirect and counts it so the
/// consuming application (or a test) can observe that it happened.
pub struct LoginRedirect {
    login_path: String,
    redirects: AtomicUsize,
}

impl LoginRedirect {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            redirects: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Number of redirects triggered so far.
    #[must_use]
    pub fn redirect_count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Default for LoginRedirect {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl SessionExpiryHook for LoginRedirect {
    fn on_session_expired(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        tracing::info!(login_path = %self.login_path, "session expired, redirecting to login");
    }
}
