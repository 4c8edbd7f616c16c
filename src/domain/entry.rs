//! Journal entry state and reconstruction from events.
//!
//! An entry walks `Empty → Transcribing → Transcribed → Summarizing →
//! Summarized`, with `Failed` reachable from either in-flight stage. The
//! transition methods here are the only way to move an entry forward; each
//! one checks the current stage and leaves the entry untouched on rejection.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::events::{EntryEvent, EntryEventType};

/// Error recorded when replay finds a stage that no process finished.
pub const INTERRUPTED: &str = "interrupted before the backend answered";

/// Reference to the audio file an entry was created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef {
    /// Path to the audio file on disk
    pub path: PathBuf,

    /// File name sent with the upload
    pub file_name: String,

    /// MIME type derived from the extension
    pub mime_type: String,

    /// Size at the time the entry was created
    pub size_bytes: u64,

    /// First 16 hex chars of the SHA-256 of the content
    pub content_hash: String,
}

impl AudioRef {
    /// Returns `None` when the extension is not a supported audio format
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, content_hash: String) -> Option<Self> {
        let path = path.into();
        let mime_type = mime_for_path(&path)?.to_string();
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Some(Self {
            path,
            file_name,
            mime_type,
            size_bytes,
            content_hash,
        })
    }
}

/// Audio MIME type for a file extension.
///
/// The transcription endpoint rejects anything that is not `audio/*`, so an
/// unknown extension has no type rather than a generic one.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())?;

    let mime = match ext.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        _ => return None,
    };
    Some(mime)
}

/// Coaching summary returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Summary and feedback text
    pub text: String,

    /// Per-goal alignment notes, when the user has a profile
    #[serde(default)]
    pub goal_alignment: Vec<String>,
}

impl Summary {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            goal_alignment: Vec::new(),
        }
    }
}

/// The backend call a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Transcription,
    Summarization,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Transcription => write!(f, "transcription"),
            StageKind::Summarization => write!(f, "summarization"),
        }
    }
}

/// Position of an entry in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum Stage {
    /// Audio attached, nothing sent yet
    Empty,

    /// Audio sent, waiting for the transcript
    Transcribing,

    /// Transcript available and editable
    Transcribed,

    /// Transcript sent, waiting for the summary
    Summarizing,

    /// Summary received
    Summarized,

    /// The last backend call failed; retry resumes from here
    Failed { during: StageKind },
}

impl Stage {
    /// Whether a backend call is outstanding in this stage
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Stage::Transcribing | Stage::Summarizing)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Empty
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Empty => write!(f, "empty"),
            Stage::Transcribing => write!(f, "transcribing"),
            Stage::Transcribed => write!(f, "transcribed"),
            Stage::Summarizing => write!(f, "summarizing"),
            Stage::Summarized => write!(f, "summarized"),
            Stage::Failed { during } => write!(f, "failed ({})", during),
        }
    }
}

/// User or backend action that moves an entry between stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Transcribe,
    ApplyTranscript,
    EditTranscript,
    Summarize,
    ApplySummary,
    RecordFailure,
    Retry,
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryAction::Transcribe => "transcribe",
            EntryAction::ApplyTranscript => "apply a transcript",
            EntryAction::EditTranscript => "edit the transcript",
            EntryAction::Summarize => "summarize",
            EntryAction::ApplySummary => "apply a summary",
            EntryAction::RecordFailure => "record a failure",
            EntryAction::Retry => "retry",
        };
        f.write_str(name)
    }
}

/// A rejected stage transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} while entry is {stage}")]
    Invalid { stage: Stage, action: EntryAction },

    #[error("transcript is empty")]
    EmptyTranscript,
}

/// One journaling session's audio, transcript and summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Local draft handle; never sent to the backend
    pub id: Uuid,

    /// Audio the entry was created from
    pub audio: AudioRef,

    /// Transcript, once transcription succeeded
    pub transcript: Option<String>,

    /// Summary, once summarization succeeded
    pub summary: Option<Summary>,

    /// Current stage
    pub stage: Stage,

    /// Error from the most recent failed call
    pub last_error: Option<String>,

    /// Number of backend calls started for this entry
    pub attempts: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create a new entry around an audio file
    pub fn new(id: Uuid, audio: AudioRef) -> Self {
        let now = Utc::now();
        Self {
            id,
            audio,
            transcript: None,
            summary: None,
            stage: Stage::Empty,
            last_error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn reject(&self, action: EntryAction) -> TransitionError {
        TransitionError::Invalid {
            stage: self.stage,
            action,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// `Empty | Failed(transcription) → Transcribing`
    pub fn begin_transcription(&mut self) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Empty
            | Stage::Failed {
                during: StageKind::Transcription,
            } => {
                self.stage = Stage::Transcribing;
                self.attempts += 1;
                self.touch();
                Ok(())
            }
            _ => Err(self.reject(EntryAction::Transcribe)),
        }
    }

    /// `Transcribing → Transcribed`
    pub fn complete_transcription(&mut self, transcript: String) -> Result<(), TransitionError> {
        if self.stage != Stage::Transcribing {
            return Err(self.reject(EntryAction::ApplyTranscript));
        }
        self.transcript = Some(transcript);
        self.stage = Stage::Transcribed;
        self.last_error = None;
        self.touch();
        Ok(())
    }

    /// Replace the transcript before it is summarized.
    pub fn edit_transcript(&mut self, transcript: String) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Transcribed
            | Stage::Failed {
                during: StageKind::Summarization,
            } => {
                self.transcript = Some(transcript);
                self.touch();
                Ok(())
            }
            _ => Err(self.reject(EntryAction::EditTranscript)),
        }
    }

    /// `Transcribed | Failed(summarization) → Summarizing`
    pub fn begin_summarization(&mut self) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Transcribed
            | Stage::Failed {
                during: StageKind::Summarization,
            } => {
                let has_text = self
                    .transcript
                    .as_deref()
                    .map(|t| !t.trim().is_empty())
                    .unwrap_or(false);
                if !has_text {
                    return Err(TransitionError::EmptyTranscript);
                }
                self.stage = Stage::Summarizing;
                self.attempts += 1;
                self.touch();
                Ok(())
            }
            _ => Err(self.reject(EntryAction::Summarize)),
        }
    }

    /// `Summarizing → Summarized`
    pub fn complete_summarization(&mut self, summary: Summary) -> Result<(), TransitionError> {
        if self.stage != Stage::Summarizing {
            return Err(self.reject(EntryAction::ApplySummary));
        }
        self.summary = Some(summary);
        self.stage = Stage::Summarized;
        self.last_error = None;
        self.touch();
        Ok(())
    }

    /// `Transcribing | Summarizing → Failed`. The transcript is kept.
    pub fn fail(&mut self, error: String) -> Result<(), TransitionError> {
        let during = match self.stage {
            Stage::Transcribing => StageKind::Transcription,
            Stage::Summarizing => StageKind::Summarization,
            _ => return Err(self.reject(EntryAction::RecordFailure)),
        };
        self.stage = Stage::Failed { during };
        self.last_error = Some(error);
        self.touch();
        Ok(())
    }

    /// Turn an in-flight stage that no process owns into a failure.
    ///
    /// Returns true if the entry changed.
    pub fn settle_interrupted(&mut self) -> bool {
        if self.stage.is_in_flight() {
            // fail() only rejects non-in-flight stages
            let _ = self.fail(INTERRUPTED.to_string());
            true
        } else {
            false
        }
    }

    /// Reconstruct entry state from a sequence of events
    pub fn from_events(events: &[EntryEvent]) -> Option<Self> {
        let first = events.first()?;
        if first.event_type != EntryEventType::Created {
            return None;
        }
        let audio = first.audio.clone()?;

        let mut entry = Self::new(first.entry_id, audio);
        entry.created_at = first.timestamp;
        entry.updated_at = first.timestamp;

        for event in &events[1..] {
            entry.apply_event(event);
        }

        Some(entry)
    }

    /// Apply a single logged event to update entry state.
    ///
    /// Events were validated when they were written, so replay does not
    /// re-check transitions.
    pub fn apply_event(&mut self, event: &EntryEvent) {
        match event.event_type {
            EntryEventType::Created => {
                if let Some(ref audio) = event.audio {
                    self.audio = audio.clone();
                }
            }
            EntryEventType::TranscriptionStarted => {
                self.stage = Stage::Transcribing;
                self.attempts += 1;
            }
            EntryEventType::TranscriptionCompleted => {
                self.transcript = event.transcript.clone();
                self.stage = Stage::Transcribed;
                self.last_error = None;
            }
            EntryEventType::TranscriptionFailed => {
                self.stage = Stage::Failed {
                    during: StageKind::Transcription,
                };
                self.last_error = event.error.clone();
            }
            EntryEventType::TranscriptEdited => {
                if event.transcript.is_some() {
                    self.transcript = event.transcript.clone();
                }
            }
            EntryEventType::SummarizationStarted => {
                self.stage = Stage::Summarizing;
                self.attempts += 1;
            }
            EntryEventType::SummarizationCompleted => {
                self.summary = event.summary.clone();
                self.stage = Stage::Summarized;
                self.last_error = None;
            }
            EntryEventType::SummarizationFailed => {
                self.stage = Stage::Failed {
                    during: StageKind::Summarization,
                };
                self.last_error = event.error.clone();
            }
        }
        self.updated_at = event.timestamp;
    }
}
