//! Adapter interface for the journal backend.
//!
//! The backend owns transcription, summarization, the search index and
//! account storage. Everything in `core` talks to it through the
//! [`JournalBackend`] trait so tests can swap in a fake.

pub mod http;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credential, ProfileSubmission, SearchResult, Summary};

pub use http::HttpBackend;

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend rejected the credential")]
    Unauthorized,

    #[error("backend rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    /// HTTP status of a rejection, if the backend answered
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Unauthorized => Some(401),
            BackendError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Audio file ready for upload
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Request/response contract of the journal backend
#[async_trait]
pub trait JournalBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Create an account. Does not log in.
    async fn register(&self, username: &str, password: &str) -> Result<(), BackendError>;

    /// Exchange username and password for a bearer credential
    async fn login(&self, username: &str, password: &str) -> Result<Credential, BackendError>;

    /// Turn audio into a transcript. The endpoint takes no credential.
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, BackendError>;

    /// Summarize a transcript and index it under the credential's user
    async fn summarize(
        &self,
        credential: &Credential,
        transcript: &str,
    ) -> Result<Summary, BackendError>;

    /// Free-text search over the user's indexed entries
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<SearchResult>, BackendError>;

    /// Replace the user's goals and principles
    async fn setup_profile(
        &self,
        credential: &Credential,
        profile: &ProfileSubmission,
    ) -> Result<(), BackendError>;
}

/// Bound a backend call by `limit`, mapping expiry to [`BackendError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(BackendError::Timeout(limit)))
}
