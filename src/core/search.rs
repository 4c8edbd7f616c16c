//! Search client: free-text queries over the user's indexed entries.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::adapters::{with_timeout, BackendError, JournalBackend};
use crate::domain::SearchResult;

use super::session::SessionManager;

/// Search failures
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("not logged in, or the session was rejected")]
    Unauthorized,

    #[error("search query is empty")]
    EmptyQuery,

    #[error("search failed: {0}")]
    BackendError(BackendError),
}

/// Queries the backend's semantic index
pub struct SearchClient {
    backend: Arc<dyn JournalBackend>,
    reject_empty_query: bool,
    request_timeout: Duration,
}

impl SearchClient {
    pub fn new(backend: Arc<dyn JournalBackend>) -> Self {
        Self {
            backend,
            reject_empty_query: true,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_reject_empty_query(mut self, reject: bool) -> Self {
        self.reject_empty_query = reject;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run one query. Results keep the backend's relevance order.
    #[instrument(skip(self, session))]
    pub async fn search(
        &self,
        query: &str,
        session: &SessionManager,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if self.reject_empty_query && query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let credential = session.credential().ok_or(SearchError::Unauthorized)?;

        let result = with_timeout(self.request_timeout, self.backend.search(&credential, query)).await;

        match result {
            Ok(results) => {
                debug!(matches = results.len(), "Search completed");
                Ok(results)
            }
            Err(BackendError::Unauthorized) => {
                session.on_unauthorized();
                Err(SearchError::Unauthorized)
            }
            Err(e) => Err(SearchError::BackendError(e)),
        }
    }
}
