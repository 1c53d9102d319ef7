//! Startup reconstruction of the session from durable storage.

use shared::models::UserProfile;
use tracing::{debug, info, instrument, warn};

use crate::{
    endpoints::CURRENT_USER_PATH,
    error::ClientResult,
    pipeline::{ApiClient, ApiRequest, Attempt},
};

/// How a call to [`ApiClient::rehydrate`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehydrateOutcome {
    /// Nothing was persisted; no network calls were made.
    Anonymous,
    /// The persisted access token was accepted and the profile refreshed.
    Restored,
    /// The persisted access token was replaced through one refresh.
    Refreshed,
    /// Validation failed and the session was cleared.
    LoggedOut,
    /// A login or logout happened while validation was in flight; its result won.
    Superseded,
}

impl ApiClient {
    /// Rebuild the session from durable storage and validate it.
    ///
    /// The persisted session is exposed optimistically while the profile is
    /// fetched. A failed fetch gets exactly one refresh and one retry; any
    /// other failure, or a missing refresh token, ends the session. The store's
    /// loading flag stays `true` until this returns.
    #[instrument(skip(self))]
    pub async fn rehydrate(&self) -> RehydrateOutcome {
        self.session().set_loading(true);
        let outcome = self.validate_persisted_session().await;
        self.session().set_loading(false);
        info!(?outcome, "session rehydration finished");
        outcome
    }

    async fn validate_persisted_session(&self) -> RehydrateOutcome {
        let session = self.session();
        let persisted = match session.restore() {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(error = %err, "persisted session unreadable");
                session.logout();
                return RehydrateOutcome::LoggedOut;
            }
        };
        let generation = session.generation();

        let Some(access_token) = persisted.access_token else {
            debug!("no persisted access token");
            return RehydrateOutcome::Anonymous;
        };

        match self.fetch_profile_with(&access_token).await {
            Ok(user) => {
                let installed =
                    session.install(access_token, persisted.refresh_token, user, generation);
                return finish(installed, RehydrateOutcome::Restored);
            }
            Err(err) => warn!(error = %err, "profile fetch failed during rehydration"),
        }

        let Some(refresh_token) = persisted.refresh_token else {
            return self.end_session(generation);
        };

        let access_token = match self.request_token_refresh(&refresh_token).await {
            Ok(access_token) => access_token,
            Err(err) => {
                warn!(error = %err, "token refresh failed during rehydration");
                return self.end_session(generation);
            }
        };

        match self.fetch_profile_with(&access_token).await {
            Ok(user) => finish(
                session.install(access_token, Some(refresh_token), user, generation),
                RehydrateOutcome::Refreshed,
            ),
            Err(err) => {
                warn!(error = %err, "profile fetch failed after token refresh");
                self.end_session(generation)
            }
        }
    }

    fn end_session(&self, generation: u64) -> RehydrateOutcome {
        if self.session().logout_if_current(generation) {
            RehydrateOutcome::LoggedOut
        } else {
            RehydrateOutcome::Superseded
        }
    }

    /// Fetch the profile with an explicit token and no refresh handling.
    async fn fetch_profile_with(&self, access_token: &str) -> ClientResult<UserProfile> {
        self.dispatch(
            &ApiRequest::get(CURRENT_USER_PATH),
            Some(access_token),
            Attempt::First,
        )
        .await?
        .error_for_status()?
        .json()
    }
}

fn finish(installed: bool, outcome: RehydrateOutcome) -> RehydrateOutcome {
    if installed {
        outcome
    } else {
        RehydrateOutcome::Superseded
    }
}
