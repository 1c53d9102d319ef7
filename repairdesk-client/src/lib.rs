#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)] // TODO(deps-001): remove once transitive dependencies converge.

//! Authenticated API client for the RepairDesk backend.
//!
//! [`SessionStore`] owns the access token, refresh token and user profile and
//! is the only writer of those fields. [`ApiClient`] wraps every outbound call,
//! attaches the current bearer token and recovers from a single expired-token
//! failure per request by refreshing once and retrying once.

pub mod endpoints;
pub mod error;
pub mod orders;
pub mod pipeline;
pub mod rehydrate;
pub mod session;
pub mod storage;

pub use error::{ClientError, ClientResult, RefreshError};
pub use orders::OrderBook;
pub use pipeline::{ApiClient, ApiRequest, ApiResponse, Attempt};
pub use rehydrate::RehydrateOutcome;
pub use session::{Session, SessionEvent, SessionStore};
pub use storage::{FileStorage, MemoryStorage, PersistedSession, SessionStorage, StorageError};
