//! Client-side session lifecycle.
//!
//! [`SessionStore`] is the single source of truth for authentication state.
//! Every mutation bumps or checks a generation counter so that a response
//! which resolves after `logout` (or after a fresh `login`) cannot write a
//! stale token or profile back into the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::models::UserProfile;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::storage::{PersistedSession, SessionStorage, StorageError};

const EVENT_CAPACITY: usize = 16;

/// Snapshot of the authentication state.
///
/// The store only ever exposes two shapes: empty, or an access token together
/// with a profile (the refresh token is optional).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn populated(access_token: String, refresh_token: Option<String>, user: UserProfile) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token,
            user: Some(user.normalized()),
        }
    }

    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user: self.user.clone(),
        }
    }
}

/// Signals published to subscribers such as the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    TokenRefreshed,
    /// The session ended; subscribers should return to the sign-in entry point.
    LoggedOut,
}

#[derive(Debug, Default)]
struct Inner {
    session: Session,
    generation: u64,
    /// Durable storage may hold entries even when the in-memory session is empty.
    persisted: bool,
}

/// Owned store for the access token, refresh token and user profile.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<Inner>,
    storage: Arc<dyn SessionStorage>,
    events: broadcast::Sender<SessionEvent>,
    loading: watch::Sender<bool>,
}

impl SessionStore {
    /// Create an empty store backed by `storage`.
    ///
    /// `loading` starts as `true` and flips to `false` once the first
    /// rehydration finishes.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (loading, _) = watch::channel(true);
        Self {
            inner: Mutex::new(Inner::default()),
            storage,
            events,
            loading,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Subscribe to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock().session.access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.lock().session.refresh_token.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.lock().session.user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_authenticated()
    }

    /// Current session generation. Changes on every login and logout.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Watch the loading flag.
    #[must_use]
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    /// Establish a new session and persist it as a group.
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted; the in-memory
    /// state is left untouched in that case.
    pub fn login(
        &self,
        user: UserProfile,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), StorageError> {
        let session = Session::populated(access_token, refresh_token, user);
        let username = session
            .user
            .as_ref()
            .map(|user| user.username.clone())
            .unwrap_or_default();

        {
            // Storage writes happen under the lock so they are ordered with logout.
            let mut inner = self.lock();
            self.storage.save(&session.to_persisted())?;
            inner.session = session;
            inner.generation += 1;
            inner.persisted = true;
        }

        info!(%username, "session established");
        self.emit(SessionEvent::LoggedIn { username });
        Ok(())
    }

    /// Clear the session in memory and in durable storage.
    ///
    /// Returns `true` when a live session actually ended. Calling it on an
    /// already empty store changes nothing and publishes nothing.
    pub fn logout(&self) -> bool {
        self.end(None)
    }

    /// Log out only if no login or logout happened since `generation`.
    pub(crate) fn logout_if_current(&self, generation: u64) -> bool {
        self.end(Some(generation))
    }

    fn end(&self, expected_generation: Option<u64>) -> bool {
        let ended = {
            let mut inner = self.lock();
            if expected_generation.is_some_and(|generation| generation != inner.generation) {
                debug!("skipping logout for a superseded session");
                return false;
            }
            let ended = inner.session.is_authenticated() || inner.persisted;
            inner.session = Session::default();
            inner.generation += 1;
            inner.persisted = false;
            if let Err(err) = self.storage.clear() {
                warn!(error = %err, "failed to clear persisted session");
            }
            ended
        };

        if ended {
            info!("session ended");
            self.emit(SessionEvent::LoggedOut);
        } else {
            debug!("logout requested with no active session");
        }
        ended
    }

    /// Replace the access token after a successful refresh.
    ///
    /// The update is dropped when the session changed since `generation` or is
    /// no longer populated, so a late refresh never resurrects a cleared session.
    pub(crate) fn update_access_token(&self, access_token: &str, generation: u64) -> bool {
        {
            let mut inner = self.lock();
            if inner.generation != generation || !inner.session.is_authenticated() {
                return false;
            }
            inner.session.access_token = Some(access_token.to_string());
            self.persist(&inner.session, "refreshed access token");
        }

        self.emit(SessionEvent::TokenRefreshed);
        true
    }

    /// Overwrite the cached profile with a fresh copy from the backend.
    pub(crate) fn apply_profile(&self, user: UserProfile, generation: u64) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.session.is_authenticated() {
            return false;
        }
        inner.session.user = Some(user.normalized());
        self.persist(&inner.session, "refreshed profile");
        true
    }

    /// Populate the session from a validated rehydration.
    pub(crate) fn install(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        user: UserProfile,
        generation: u64,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.session = Session::populated(access_token, refresh_token, user);
        inner.persisted = true;
        self.persist(&inner.session, "rehydrated session");
        true
    }

    fn persist(&self, session: &Session, what: &str) {
        if let Err(err) = self.storage.save(&session.to_persisted()) {
            warn!(error = %err, "failed to persist {what}");
        }
    }

    /// Load persisted entries and optimistically restore them.
    ///
    /// Memory is populated only when both the access token and the profile were
    /// persisted; a lone token is returned for validation but not exposed.
    pub(crate) fn restore(&self) -> Result<PersistedSession, StorageError> {
        let persisted = self.storage.load()?;
        let mut inner = self.lock();
        inner.persisted = !persisted.is_empty();
        if let (Some(access_token), Some(user)) =
            (persisted.access_token.clone(), persisted.user.clone())
        {
            inner.session =
                Session::populated(access_token, persisted.refresh_token.clone(), user);
        }
        Ok(persisted)
    }
}
