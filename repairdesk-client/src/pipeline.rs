//! Authenticated request pipeline.
//!
//! Every call goes through [`ApiClient::send`], which attaches the current
//! access token and, on a 401, performs at most one refresh followed by at
//! most one retry. The retry is dispatched with [`Attempt::Retried`], and a
//! retried request is never recovered again.

use std::{fmt, sync::Arc, time::Duration};

use reqwest::{Client, Method, StatusCode, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};
use shared::{
    config::client::{ApiConfig, Config, RefreshPolicy},
    models::{ErrorResponse, RefreshRequest, RefreshResponse},
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    error::{ClientError, ClientResult, RefreshError},
    session::SessionStore,
};

pub(crate) const TOKEN_REFRESH_PATH: &str = "token/refresh/";

/// Which dispatch of a logical request is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Retried => f.write_str("retried"),
        }
    }
}

/// Re-dispatchable description of an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body).map_err(ClientError::Encode)?);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Fully buffered backend response, returned verbatim for every non-401 outcome.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self::new(status, headers, body))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns [`ClientError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(ClientError::Decode)
    }

    /// Best-effort description of an error body.
    #[must_use]
    pub fn error_message(&self) -> String {
        ErrorResponse::from_body(&self.body)
            .map(|error| error.summary())
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| self.text())
    }

    /// Turn a non-success response into [`ClientError::Api`].
    ///
    /// # Errors
    /// Returns an error for any status outside `2xx`.
    pub fn error_for_status(self) -> ClientResult<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Api {
                status: self.status,
                message: self.error_message(),
            })
        }
    }
}

/// HTTP client that carries session credentials and recovers expired tokens.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Arc<SessionStore>,
    refresh_policy: RefreshPolicy,
    refresh_gate: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Build a client for the given API settings.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        api: &ApiConfig,
        refresh_policy: RefreshPolicy,
        session: Arc<SessionStore>,
    ) -> ClientResult<Self> {
        let http = Client::builder()
            .user_agent(api.user_agent.clone())
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: shared::config::client::normalize_base_url(api.base_url.clone()),
            session,
            refresh_policy,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Build a client from a resolved [`Config`].
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> ClientResult<Self> {
        Self::new(&config.api, config.session.refresh_policy, session)
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    pub(crate) fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ClientError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    /// Send a request with the current credentials.
    ///
    /// Any outcome other than 401 is returned as-is, including business
    /// errors. A 401 triggers one refresh and one retry; see the module docs.
    ///
    /// # Errors
    /// Returns an error on transport failure, an unrecoverable 401, or a
    /// failed refresh (which also ends the session).
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let generation = self.session.generation();
        let token = self.session.access_token();
        let response = self
            .dispatch(request, token.as_deref(), Attempt::First)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if self.session.generation() != generation {
            debug!("401 belongs to a session that has since ended; not recovering");
            return Err(ClientError::SessionEnded);
        }
        debug!("access token rejected; attempting recovery");
        let token = self
            .recover_token(request, token, generation, &response)
            .await?;

        let retried = self
            .dispatch(request, Some(&token), Attempt::Retried)
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("request still unauthorized after a successful token refresh");
            return Err(unauthorized(request, Attempt::Retried, &retried));
        }
        Ok(retried)
    }

    /// Send and decode a successful JSON response.
    ///
    /// # Errors
    /// Returns [`ClientError::Api`] for non-success statuses in addition to
    /// the failures of [`ApiClient::send`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ClientResult<T> {
        self.send(request).await?.error_for_status()?.json()
    }

    /// Obtain a usable access token after `rejected_token` got a 401.
    ///
    /// `generation` is the session generation the rejected request was sent
    /// under; recovery never touches a session that replaced it.
    async fn recover_token(
        &self,
        request: &ApiRequest,
        rejected_token: Option<String>,
        generation: u64,
        response: &ApiResponse,
    ) -> ClientResult<String> {
        match self.refresh_policy {
            RefreshPolicy::Independent => {
                self.refresh_session_token(request, generation, response)
                    .await
            }
            RefreshPolicy::Coalesced => {
                let _gate = self.refresh_gate.lock().await;
                if self.session.generation() != generation {
                    return Err(ClientError::SessionEnded);
                }
                match self.session.access_token() {
                    Some(current) if rejected_token.as_ref() != Some(&current) => {
                        debug!("reusing token refreshed by a concurrent request");
                        Ok(current)
                    }
                    _ => {
                        self.refresh_session_token(request, generation, response)
                            .await
                    }
                }
            }
        }
    }

    async fn refresh_session_token(
        &self,
        request: &ApiRequest,
        generation: u64,
        response: &ApiResponse,
    ) -> ClientResult<String> {
        let Some(refresh_token) = self.session.refresh_token() else {
            warn!("authorization failed with no refresh token available; ending session");
            self.session.logout_if_current(generation);
            return Err(unauthorized(request, Attempt::First, response));
        };

        match self.request_token_refresh(&refresh_token).await {
            Ok(access) => {
                if self.session.update_access_token(&access, generation) {
                    Ok(access)
                } else {
                    Err(ClientError::SessionEnded)
                }
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; ending session");
                self.session.logout_if_current(generation);
                Err(ClientError::Refresh(err))
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// This bypasses [`ApiClient::send`]; a refresh call is never itself refreshed.
    pub(crate) async fn request_token_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<String, RefreshError> {
        let url = self
            .base_url
            .join(TOKEN_REFRESH_PATH)
            .map_err(RefreshError::Endpoint)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(RefreshError::Transport)?;
        let response = ApiResponse::read(response)
            .await
            .map_err(RefreshError::Transport)?;

        if !response.status().is_success() {
            return Err(RefreshError::Rejected {
                status: response.status(),
                message: response.error_message(),
            });
        }

        let body: RefreshResponse =
            serde_json::from_slice(response.body()).map_err(RefreshError::Decode)?;
        debug!("access token refreshed");
        Ok(body.access)
    }

    /// Single dispatch with an explicit token; no recovery.
    pub(crate) async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: Attempt,
    ) -> ClientResult<ApiResponse> {
        let url = self.endpoint(&request.path)?;
        let mut builder = self.http.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%attempt, authenticated = token.is_some(), "dispatching request");
        let transport = |source| ClientError::Transport {
            url: url.to_string(),
            source,
        };
        let response = builder.send().await.map_err(transport)?;
        let response = ApiResponse::read(response).await.map_err(transport)?;
        debug!(%attempt, status = %response.status(), "response received");
        Ok(response)
    }
}

fn unauthorized(request: &ApiRequest, attempt: Attempt, response: &ApiResponse) -> ClientError {
    ClientError::Unauthorized {
        method: request.method.to_string(),
        path: request.path.clone(),
        attempt,
        message: response.error_message(),
    }
}
