use reqwest::StatusCode;
use thiserror::Error;

use crate::{pipeline::Attempt, storage::StorageError};

pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid endpoint path {path}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered 401 and the request could not be recovered.
    #[error("{method} {path} unauthorized on {attempt} attempt: {message}")]
    Unauthorized {
        method: String,
        path: String,
        attempt: Attempt,
        message: String,
    },
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    #[error("session ended while the request was in flight")]
    SessionEnded,
    /// A non-success response the caller asked to decode.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    /// Status code carried by the failure, if the backend produced one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Api { status, .. } => Some(*status),
            Self::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure ended the local session.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Self::Refresh(_)
                | Self::SessionEnded
                | Self::Unauthorized {
                    attempt: Attempt::First,
                    ..
                }
        )
    }
}

/// Why a call to the token-refresh endpoint failed.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh rejected with {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("refresh request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("refresh response was malformed: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid refresh endpoint: {0}")]
    Endpoint(#[source] url::ParseError),
}
