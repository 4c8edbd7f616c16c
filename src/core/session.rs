//! Session manager: owns the bearer credential.
//!
//! Lifecycle:
//! - `login` stores a credential (and persists it for file storage)
//! - `logout` and `on_unauthorized` drop it and erase the stored copy
//!
//! Other components only ever read the credential through this type.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::adapters::{with_timeout, BackendError, JournalBackend};
use crate::domain::Credential;

/// Authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    BadCredentials,

    #[error("username is already taken")]
    DuplicateUser,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("backend unavailable: {0}")]
    Backend(BackendError),

    #[error("failed to store credential: {0}")]
    Storage(#[from] io::Error),
}

/// Where the credential lives between calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStorage {
    /// Process lifetime only
    Memory,
    /// Token file, readable by the owner only
    File(PathBuf),
}

/// Holds the bearer credential and authenticates against the backend
pub struct SessionManager {
    backend: Arc<dyn JournalBackend>,
    credential: RwLock<Option<Credential>>,
    storage: CredentialStorage,
    request_timeout: Duration,
}

impl SessionManager {
    /// Create a session manager, restoring a stored credential if present
    pub fn new(
        backend: Arc<dyn JournalBackend>,
        storage: CredentialStorage,
        request_timeout: Duration,
    ) -> io::Result<Self> {
        let credential = match &storage {
            CredentialStorage::Memory => None,
            CredentialStorage::File(path) => match std::fs::read_to_string(path) {
                Ok(token) if !token.trim().is_empty() => Some(Credential::new(token.trim())),
                Ok(_) => None,
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e),
            },
        };

        Ok(Self {
            backend,
            credential: RwLock::new(credential),
            storage,
            request_timeout,
        })
    }

    /// Memory-only session with a 60s request timeout
    pub fn in_memory(backend: Arc<dyn JournalBackend>) -> Self {
        Self {
            backend,
            credential: RwLock::new(None),
            storage: CredentialStorage::Memory,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn storage(&self) -> &CredentialStorage {
        &self.storage
    }

    /// Create an account. Does not log in.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        validate_input(username, password)?;

        let result = with_timeout(
            self.request_timeout,
            self.backend.register(username, password),
        )
        .await;

        match result {
            Ok(()) => {
                info!("Registered new user");
                Ok(())
            }
            Err(BackendError::Rejected { status: 400, .. }) => Err(AuthError::DuplicateUser),
            Err(BackendError::Rejected {
                status: 422,
                detail,
            }) => Err(AuthError::InvalidInput(detail)),
            Err(e) => Err(AuthError::Backend(e)),
        }
    }

    /// Log in and hold the returned credential
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, AuthError> {
        validate_input(username, password)?;

        let result = with_timeout(self.request_timeout, self.backend.login(username, password)).await;

        let credential = match result {
            Ok(credential) => credential,
            Err(BackendError::Unauthorized) => return Err(AuthError::BadCredentials),
            Err(BackendError::Rejected {
                status: 400 | 422,
                detail,
            }) => return Err(AuthError::InvalidInput(detail)),
            Err(e) => return Err(AuthError::Backend(e)),
        };

        if let CredentialStorage::File(path) = &self.storage {
            write_token(path, credential.token())?;
        }
        *self.write() = Some(credential.clone());

        info!("Logged in");
        Ok(credential)
    }

    /// Drop the credential and erase any stored copy
    pub fn logout(&self) {
        self.clear();
        info!("Logged out");
    }

    /// Called when the backend rejects the credential on an authenticated call
    pub fn on_unauthorized(&self) {
        if self.is_authenticated() {
            warn!("Backend rejected the session credential, dropping it");
        }
        self.clear();
    }

    fn clear(&self) {
        *self.write() = None;
        if let CredentialStorage::File(path) = &self.storage {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove stored credential");
                }
            }
        }
    }

    /// Current credential, if any
    pub fn credential(&self) -> Option<Credential> {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// `Authorization` header for authenticated calls, if logged in
    pub fn authorized_header(&self) -> Option<HashMap<String, String>> {
        self.read().as_ref().map(Credential::header)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Credential>> {
        self.credential.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Credential>> {
        self.credential.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_input(username: &str, password: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidInput("username is empty".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is empty".to_string()));
    }
    Ok(())
}

/// Write the token with owner-only permissions
fn write_token(path: &PathBuf, token: &str) -> io::Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(token.as_bytes())?;
    file.flush()
}
