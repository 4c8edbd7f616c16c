//! Application shell: wires the components from resolved configuration.
//!
//! One `App` owns the backend client, the session and the entry store.
//! Profile and search components are built on demand and borrow the session
//! for each call.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::adapters::{HttpBackend, JournalBackend};
use crate::config::ResolvedConfig;
use crate::core::{
    inspect_audio, EntryLogError, EntryPipeline, EntryStore, PipelineError, PipelineSettings,
    ProfileError, ProfileStore, SearchClient, SessionManager,
};
use crate::domain::JournalEntry;

pub struct App {
    config: ResolvedConfig,
    backend: Arc<dyn JournalBackend>,
    session: SessionManager,
    entries: EntryStore,
}

impl App {
    /// Build against the HTTP backend named in the config
    pub fn from_config(config: ResolvedConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(config.backend.base_url.clone()));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: ResolvedConfig, backend: Arc<dyn JournalBackend>) -> Result<Self> {
        let session = SessionManager::new(
            backend.clone(),
            config.credential_storage(),
            config.backend.request_timeout,
        )
        .with_context(|| {
            format!(
                "Failed to read stored credential: {}",
                config.credential_path().display()
            )
        })?;
        let entries = EntryStore::new(config.entries_dir());

        debug!(backend = backend.name(), home = %config.home.display(), "App initialised");
        Ok(Self {
            config,
            backend,
            session,
            entries,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn entries(&self) -> &EntryStore {
        &self.entries
    }

    /// Profile store over the persisted draft
    pub fn profile_store(&self) -> Result<ProfileStore, ProfileError> {
        Ok(
            ProfileStore::load(self.backend.clone(), self.config.profile_path())?
                .with_drop_blank_slots(self.config.drop_blank_slots)
                .with_request_timeout(self.config.backend.request_timeout),
        )
    }

    pub fn search_client(&self) -> SearchClient {
        SearchClient::new(self.backend.clone())
            .with_reject_empty_query(self.config.reject_empty_query)
            .with_request_timeout(self.config.backend.request_timeout)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            transcribe_timeout: self.config.backend.transcribe_timeout,
            summarize_timeout: self.config.backend.request_timeout,
            max_audio_bytes: self.config.max_audio_bytes,
        }
    }

    /// Start a new logged entry from an audio file
    pub async fn new_entry(&self, audio: &Path) -> Result<EntryPipeline, PipelineError> {
        let audio = inspect_audio(audio, self.config.max_audio_bytes).await?;
        let (log, entry) = self.entries.create(audio).await?;

        debug!(entry_id = %entry.id, "Created entry");
        Ok(EntryPipeline::new(self.backend.clone(), entry, self.pipeline_settings()).with_log(log))
    }

    /// Reopen a logged entry by id or unique id prefix
    pub async fn open_entry(&self, id_or_prefix: &str) -> Result<EntryPipeline, EntryLogError> {
        let id = self.entries.resolve(id_or_prefix).await?;
        let (log, entry) = self.entries.load(id).await?;
        Ok(EntryPipeline::new(self.backend.clone(), entry, self.pipeline_settings()).with_log(log))
    }

    /// Most recent entries first
    pub async fn list_entries(&self, limit: usize) -> Result<Vec<JournalEntry>, EntryLogError> {
        self.entries.list(limit).await
    }
}
