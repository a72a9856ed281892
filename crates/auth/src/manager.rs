//! Process-wide holder of the active bearer credential.
//!
//! Responsibilities:
//! - Initialize from durable storage when constructed.
//! - Mirror the persisted value in memory for synchronous, lock-free reads.
//! - Broadcast lifecycle events when the credential is stored or cleared.
use arc_swap::ArcSwapOption;
use memochat_types::{CREDENTIAL_KEY, Credential, CredentialEvent, KeyValueStorage, Result};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    current: ArcSwapOption<Credential>,
    events: broadcast::Sender<CredentialEvent>,
}

impl TokenStore {
    /// Creates a store and loads the persisted credential, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be read.
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let initial = storage
            .get(CREDENTIAL_KEY)?
            .filter(|t| !t.is_empty())
            .map(|t| Arc::new(Credential::new(t)));
        tracing::debug!(present = initial.is_some(), "token store initialized");
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            storage,
            current: ArcSwapOption::new(initial),
            events,
        })
    }

    /// Returns the current credential.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Credential>> {
        self.current.load_full()
    }

    /// Returns `true` if a credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_some()
    }

    /// Stores `token`, or clears the credential when `None`.
    ///
    /// A new token is persisted first and mirrored only once the write
    /// succeeded, so memory and storage never diverge. Clearing always
    /// empties memory, even when the persisted copy cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails; see above for the
    /// state left behind.
    pub fn set(&self, token: Option<Credential>) -> Result<()> {
        let Some(token) = token else {
            return self.clear();
        };
        self.storage.set(CREDENTIAL_KEY, token.expose())?;
        self.current.store(Some(Arc::new(token)));
        let _ = self.events.send(CredentialEvent::Stored);
        Ok(())
    }

    /// Removes the credential from memory and storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted copy cannot be removed. The
    /// in-memory credential is gone regardless.
    pub fn clear(&self) -> Result<()> {
        self.current.store(None);
        let _ = self.events.send(CredentialEvent::Cleared);
        self.storage.remove(CREDENTIAL_KEY).inspect_err(|e| {
            tracing::error!(error = %e, "failed to remove persisted credential");
        })
    }

    /// Subscribes to credential lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }
}
