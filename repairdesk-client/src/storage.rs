//! Durable session persistence.
//!
//! The access token, refresh token and user profile are stored as one JSON
//! document so they are always written and cleared together.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use shared::models::UserProfile;
use thiserror::Error;

/// Errors produced by session storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session file {path} is malformed: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persisted group of session entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl PersistedSession {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

/// Durable key-value storage for the session group.
pub trait SessionStorage: Send + Sync + fmt::Debug {
    /// Read the persisted group; an absent document yields an empty group.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read or decoded.
    fn load(&self) -> Result<PersistedSession, StorageError>;

    /// Replace the persisted group as a whole.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be written.
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove every persisted entry.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be cleared.
    fn clear(&self) -> Result<(), StorageError>;
}

/// JSON document on disk, replaced through a sibling temp file and `rename`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<PersistedSession, StorageError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(PersistedSession::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        serde_json::from_slice(&contents).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let encoded = serde_json::to_vec_pretty(session)?;
        let staging = self.staging_path();
        fs::write(&staging, encoded).map_err(|err| self.io_error(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging, fs::Permissions::from_mode(0o600))
                .map_err(|err| self.io_error(err))?;
        }
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// In-process storage, used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a persisted group.
    #[must_use]
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    /// Current contents, `None` when nothing has been written.
    #[must_use]
    pub fn contents(&self) -> Option<PersistedSession> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<PersistedSession, StorageError> {
        Ok(self.contents().unwrap_or_default())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> PersistedSession {
        PersistedSession {
            access_token: Some("A1".to_string()),
            refresh_token: Some("R1".to_string()),
            user: Some(UserProfile {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                phone: String::new(),
                address: String::new(),
                is_staff: false,
                role: None,
            }),
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));

        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_returns_whole_group() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("session.json"));

        storage.save(&sample()).unwrap();

        assert_eq!(storage.load().unwrap(), sample());
        assert!(!storage.staging_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.save(&sample()).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.save(&sample()).unwrap();

        storage.clear().unwrap();
        storage.clear().unwrap();

        assert!(!storage.path().exists());
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn memory_storage_tracks_writes() {
        let storage = MemoryStorage::new();
        assert!(storage.contents().is_none());

        storage.save(&sample()).unwrap();
        assert_eq!(storage.contents(), Some(sample()));

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_empty());
    }
}
