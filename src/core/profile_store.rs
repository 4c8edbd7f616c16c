//! Profile store: the locally edited goals and principles.
//!
//! The draft lives in memory and, when a path is configured, in a JSON file so
//! edits made across CLI invocations accumulate. Submitting replaces the
//! whole server-side profile in one request.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{with_timeout, BackendError, JournalBackend};
use crate::domain::{Goals, Principles, ProfileDraft, ProfileSubmission, SlotKind};

use super::session::SessionManager;

/// Profile failures
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("not logged in, or the session was rejected")]
    Unauthorized,

    #[error("profile rejected: {0}")]
    ValidationFailed(String),

    #[error("{kind} slot {index} does not exist ({len} slots)")]
    SlotOutOfBounds {
        kind: SlotKind,
        index: usize,
        len: usize,
    },

    #[error("backend unavailable: {0}")]
    Backend(BackendError),

    #[error("failed to store profile draft: {0}")]
    Storage(#[from] io::Error),
}

/// Holds the profile draft and submits it
pub struct ProfileStore {
    backend: Arc<dyn JournalBackend>,
    draft: ProfileDraft,
    path: Option<PathBuf>,
    drop_blank_slots: bool,
    request_timeout: Duration,
}

impl ProfileStore {
    /// In-memory store with a fresh draft
    pub fn new(backend: Arc<dyn JournalBackend>) -> Self {
        Self {
            backend,
            draft: ProfileDraft::default(),
            path: None,
            drop_blank_slots: true,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Store backed by a draft file, loading it if it exists
    pub fn load(backend: Arc<dyn JournalBackend>, path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let draft = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ProfileDraft::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), "Loaded profile draft");
        Ok(Self {
            draft,
            path: Some(path),
            ..Self::new(backend)
        })
    }

    /// Keep or send blank slots on submit
    pub fn with_drop_blank_slots(mut self, drop: bool) -> Self {
        self.drop_blank_slots = drop;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    pub fn goals(&self) -> &Goals {
        &self.draft.goals
    }

    pub fn principles(&self) -> &Principles {
        &self.draft.principles
    }

    /// Payload that `submit` would send
    pub fn submission(&self) -> ProfileSubmission {
        self.draft.submission(self.drop_blank_slots)
    }

    /// Append an empty slot and return its index
    pub fn add_slot(&mut self, kind: SlotKind) -> Result<usize, ProfileError> {
        let index = match kind {
            SlotKind::Goal => self.draft.goals.add_slot(),
            SlotKind::Principle => self.draft.principles.add_slot(),
        };
        self.save()?;
        Ok(index)
    }

    /// Replace the text of an existing slot
    pub fn update_slot(
        &mut self,
        kind: SlotKind,
        index: usize,
        value: impl Into<String>,
    ) -> Result<(), ProfileError> {
        let result = match kind {
            SlotKind::Goal => self.draft.goals.update(index, value),
            SlotKind::Principle => self.draft.principles.update(index, value),
        };
        result.map_err(|e| ProfileError::SlotOutOfBounds {
            kind,
            index: e.index,
            len: e.len,
        })?;
        self.save()
    }

    /// Discard the draft
    pub fn reset(&mut self) -> Result<(), ProfileError> {
        self.draft = ProfileDraft::default();
        self.save()
    }

    /// Write the draft file, if one is configured
    pub fn save(&self) -> Result<(), ProfileError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.draft)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replace the server-side profile with the draft
    #[instrument(skip(self, session))]
    pub async fn submit(&self, session: &SessionManager) -> Result<(), ProfileError> {
        let credential = session.credential().ok_or(ProfileError::Unauthorized)?;
        let submission = self.submission();

        let result = with_timeout(
            self.request_timeout,
            self.backend.setup_profile(&credential, &submission),
        )
        .await;

        match result {
            Ok(()) => {
                info!(
                    goals = submission.goals.len(),
                    principles = submission.principles.len(),
                    "Profile submitted"
                );
                Ok(())
            }
            Err(BackendError::Unauthorized) => {
                session.on_unauthorized();
                Err(ProfileError::Unauthorized)
            }
            Err(BackendError::Rejected {
                status: 400 | 422,
                detail,
            }) => {
                warn!(%detail, "Profile rejected");
                Err(ProfileError::ValidationFailed(detail))
            }
            Err(e) => Err(ProfileError::Backend(e)),
        }
    }
}
