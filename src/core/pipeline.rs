//! Entry pipeline: drives one entry through transcription and summarization.
//!
//! Each stage transition is an explicit call. A transition is validated on
//! the entry, logged, then the backend is called under a timeout and the
//! outcome is applied and logged. Failures keep whatever the entry already
//! had and can be retried from the failed stage.
//!
//! Only one backend call may be in flight per entry. A second call while one
//! is pending fails with [`PipelineError::Busy`] instead of racing; across
//! processes the entry log's advisory lock enforces the same rule.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{with_timeout, AudioUpload, BackendError, JournalBackend};
use crate::domain::{
    mime_for_path, AudioRef, EntryAction, EntryEvent, EntryEventType, JournalEntry, Stage, StageKind, Summary,
    TransitionError,
};

use super::entry_store::{hash_bytes, hash_file, EntryLock, EntryLog, EntryLogError};
use super::session::SessionManager;

/// Entry pipeline failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(BackendError),

    #[error("summarization failed: {0}")]
    SummarizationFailed(BackendError),

    #[error("not logged in, or the session was rejected")]
    Unauthorized,

    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("audio unavailable at {path}: {reason}")]
    AudioUnavailable { path: PathBuf, reason: String },

    #[error("{0} is not a supported audio format")]
    UnsupportedAudio(PathBuf),

    #[error("audio is {actual} bytes, limit is {limit}")]
    AudioTooLarge { actual: u64, limit: u64 },

    #[error("audio at {0} changed since the entry was created")]
    AudioChanged(PathBuf),

    #[error("cannot {action} while entry is {stage}")]
    InvalidTransition { stage: Stage, action: EntryAction },

    #[error("entry already has a request in flight")]
    Busy,

    #[error("entry log error: {0}")]
    Log(#[from] EntryLogError),
}

impl From<TransitionError> for PipelineError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Invalid { stage, action } => {
                PipelineError::InvalidTransition { stage, action }
            }
            TransitionError::EmptyTranscript => PipelineError::EmptyTranscript,
        }
    }
}

/// Timeouts and limits applied to backend calls
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub transcribe_timeout: Duration,
    pub summarize_timeout: Duration,
    pub max_audio_bytes: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            transcribe_timeout: Duration::from_secs(300),
            summarize_timeout: Duration::from_secs(60),
            max_audio_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Inspect an audio file and build a reference to it
pub async fn inspect_audio(
    path: impl Into<PathBuf>,
    max_bytes: u64,
) -> Result<AudioRef, PipelineError> {
    let path = path.into();
    // The backend rejects non-audio uploads, so don't spend an upload finding out
    if mime_for_path(&path).is_none() {
        return Err(PipelineError::UnsupportedAudio(path));
    }

    let unavailable = |e: std::io::Error| PipelineError::AudioUnavailable {
        path: path.clone(),
        reason: e.to_string(),
    };

    let metadata = tokio::fs::metadata(&path).await.map_err(unavailable)?;
    if !metadata.is_file() {
        return Err(PipelineError::AudioUnavailable {
            path: path.clone(),
            reason: "not a file".to_string(),
        });
    }
    if metadata.len() > max_bytes {
        return Err(PipelineError::AudioTooLarge {
            actual: metadata.len(),
            limit: max_bytes,
        });
    }

    let hash = hash_file(&path).await.map_err(unavailable)?;
    AudioRef::new(path.clone(), metadata.len(), hash).ok_or(PipelineError::UnsupportedAudio(path))
}

/// Clears the in-flight flag (and releases the entry lock) on drop
struct InFlight<'a> {
    flag: &'a AtomicBool,
    _lock: Option<EntryLock>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates the stages of one entry
pub struct EntryPipeline {
    backend: Arc<dyn JournalBackend>,
    entry: Mutex<JournalEntry>,
    log: Option<EntryLog>,
    in_flight: AtomicBool,
    settings: PipelineSettings,
}

impl EntryPipeline {
    /// Create a pipeline over an in-memory entry
    pub fn new(
        backend: Arc<dyn JournalBackend>,
        entry: JournalEntry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            backend,
            entry: Mutex::new(entry),
            log: None,
            in_flight: AtomicBool::new(false),
            settings,
        }
    }

    /// Record every transition in `log`
    pub fn with_log(mut self, log: EntryLog) -> Self {
        self.log = Some(log);
        self
    }

    fn lock_entry(&self) -> MutexGuard<'_, JournalEntry> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the entry
    pub fn entry(&self) -> JournalEntry {
        self.lock_entry().clone()
    }

    pub fn stage(&self) -> Stage {
        self.lock_entry().stage
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<InFlight<'_>, PipelineError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }

        // Guard first so the flag is cleared if locking fails
        let mut guard = InFlight {
            flag: &self.in_flight,
            _lock: None,
        };
        if let Some(log) = &self.log {
            guard._lock = Some(log.try_lock()?.ok_or(PipelineError::Busy)?);
        }
        Ok(guard)
    }

    /// Validate a transition on a copy, log it, then publish it.
    async fn commit<F>(&self, event: EntryEvent, transition: F) -> Result<JournalEntry, PipelineError>
    where
        F: FnOnce(&mut JournalEntry) -> Result<(), TransitionError>,
    {
        let mut next = self.entry();
        transition(&mut next)?;

        if let Some(log) = &self.log {
            log.append(&event).await?;
        }

        *self.lock_entry() = next.clone();
        Ok(next)
    }

    /// Apply the outcome of a backend call, then log it.
    ///
    /// The outcome is published even when the log write fails, so the entry
    /// never stays in an in-flight stage. The log error is returned after.
    /// On the next load the unfinished `*Started` event settles as
    /// interrupted.
    async fn settle<F>(&self, event: EntryEvent, transition: F) -> Result<JournalEntry, PipelineError>
    where
        F: FnOnce(&mut JournalEntry) -> Result<(), TransitionError>,
    {
        let mut next = self.entry();
        transition(&mut next)?;
        *self.lock_entry() = next.clone();

        if let Some(log) = &self.log {
            if let Err(e) = log.append(&event).await {
                error!(event = ?event.event_type, error = %e, "Outcome applied but not logged");
                return Err(e.into());
            }
        }
        Ok(next)
    }

    async fn read_audio(&self, audio: &AudioRef) -> Result<AudioUpload, PipelineError> {
        let bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(|e| PipelineError::AudioUnavailable {
                path: audio.path.clone(),
                reason: e.to_string(),
            })?;

        if bytes.len() as u64 > self.settings.max_audio_bytes {
            return Err(PipelineError::AudioTooLarge {
                actual: bytes.len() as u64,
                limit: self.settings.max_audio_bytes,
            });
        }
        if hash_bytes(&bytes) != audio.content_hash {
            return Err(PipelineError::AudioChanged(audio.path.clone()));
        }

        Ok(AudioUpload {
            file_name: audio.file_name.clone(),
            mime_type: audio.mime_type.clone(),
            bytes,
        })
    }

    /// Send the entry's audio for transcription.
    ///
    /// Valid from `Empty` and from a failed transcription.
    #[instrument(skip(self), fields(entry_id = %self.entry().id))]
    pub async fn transcribe(&self) -> Result<String, PipelineError> {
        let _in_flight = self.begin()?;

        let snapshot = self.entry();
        if !matches!(
            snapshot.stage,
            Stage::Empty
                | Stage::Failed {
                    during: StageKind::Transcription
                }
        ) {
            return Err(PipelineError::InvalidTransition {
                stage: snapshot.stage,
                action: EntryAction::Transcribe,
            });
        }
        let upload = self.read_audio(&snapshot.audio).await?;

        let id = snapshot.id;
        self.commit(
            EntryEvent::new(id, EntryEventType::TranscriptionStarted),
            |e| e.begin_transcription(),
        )
        .await?;
        info!(bytes = upload.bytes.len(), "Transcription started");

        let started = Instant::now();
        let result = with_timeout(
            self.settings.transcribe_timeout,
            self.backend.transcribe(upload),
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(transcript) => {
                let event = EntryEvent::new(id, EntryEventType::TranscriptionCompleted)
                    .with_transcript(transcript.clone())
                    .with_duration(duration_ms);
                let text = transcript.clone();
                self.settle(event, move |e| e.complete_transcription(text))
                    .await?;

                info!(duration_ms, chars = transcript.len(), "Transcription completed");
                Ok(transcript)
            }
            Err(e) => {
                error!(duration_ms, error = %e, "Transcription failed");

                let message = e.to_string();
                let event = EntryEvent::new(id, EntryEventType::TranscriptionFailed)
                    .with_error(message.clone())
                    .with_duration(duration_ms);
                self.settle(event, move |entry| entry.fail(message)).await?;

                Err(PipelineError::TranscriptionFailed(e))
            }
        }
    }

    /// Replace the transcript before summarizing
    pub async fn edit_transcript(&self, transcript: impl Into<String>) -> Result<(), PipelineError> {
        let _in_flight = self.begin()?;
        let transcript = transcript.into();
        let id = self.entry().id;

        let event = EntryEvent::new(id, EntryEventType::TranscriptEdited)
            .with_transcript(transcript.clone());
        self.commit(event, move |e| e.edit_transcript(transcript))
            .await?;

        debug!(%id, "Transcript edited");
        Ok(())
    }

    /// Send the transcript for summarization under the session's credential.
    ///
    /// Valid from `Transcribed` and from a failed summarization. The backend
    /// looks up the user's goals and principles by identity; nothing from the
    /// local profile draft is sent.
    #[instrument(skip(self, session), fields(entry_id = %self.entry().id))]
    pub async fn summarize(&self, session: &SessionManager) -> Result<Summary, PipelineError> {
        let _in_flight = self.begin()?;

        let credential = session.credential().ok_or(PipelineError::Unauthorized)?;

        let id = self.entry().id;
        let started_entry = self
            .commit(
                EntryEvent::new(id, EntryEventType::SummarizationStarted),
                |e| e.begin_summarization(),
            )
            .await?;
        // begin_summarization guarantees a non-empty transcript
        let transcript = started_entry.transcript.unwrap_or_default();
        info!(chars = transcript.len(), "Summarization started");

        let started = Instant::now();
        let result = with_timeout(
            self.settings.summarize_timeout,
            self.backend.summarize(&credential, &transcript),
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(summary) => {
                let event = EntryEvent::new(id, EntryEventType::SummarizationCompleted)
                    .with_summary(summary.clone())
                    .with_duration(duration_ms);
                let applied = summary.clone();
                self.settle(event, move |e| e.complete_summarization(applied))
                    .await?;

                info!(duration_ms, "Summarization completed");
                Ok(summary)
            }
            Err(e) => {
                let rejected = e == BackendError::Unauthorized;
                if rejected {
                    session.on_unauthorized();
                    warn!("Summarization rejected: session is no longer valid");
                } else {
                    error!(duration_ms, error = %e, "Summarization failed");
                }

                let message = e.to_string();
                let event = EntryEvent::new(id, EntryEventType::SummarizationFailed)
                    .with_error(message.clone())
                    .with_duration(duration_ms);
                self.settle(event, move |entry| entry.fail(message)).await?;

                if rejected {
                    return Err(PipelineError::Unauthorized);
                }
                Err(PipelineError::SummarizationFailed(e))
            }
        }
    }

    /// Re-run the call that failed last, with the same inputs
    pub async fn retry(&self, session: &SessionManager) -> Result<JournalEntry, PipelineError> {
        match self.stage() {
            Stage::Failed {
                during: StageKind::Transcription,
            } => {
                self.transcribe().await?;
            }
            Stage::Failed {
                during: StageKind::Summarization,
            } => {
                self.summarize(session).await?;
            }
            stage => {
                return Err(PipelineError::InvalidTransition {
                    stage,
                    action: EntryAction::Retry,
                })
            }
        }
        Ok(self.entry())
    }
}
