//! Event types for the entry log.
//!
//! Every stage change of a journal entry is recorded as an immutable event in
//! an append-only log. The current state of an entry is reconstructed by
//! replaying its events in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::{AudioRef, Summary};

/// A single event in an entry's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The local entry draft this event belongs to
    pub entry_id: Uuid,

    /// Type of event
    pub event_type: EntryEventType,

    /// Audio reference (only on `Created`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioRef>,

    /// Transcript text (on transcription completion and edits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// Summary returned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,

    /// Time the backend call took, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message if a stage failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntryEvent {
    /// Create a new event with the current timestamp
    pub fn new(entry_id: Uuid, event_type: EntryEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            entry_id,
            event_type,
            audio: None,
            transcript: None,
            summary: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_audio(mut self, audio: AudioRef) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of events in an entry's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryEventType {
    /// Entry draft created around an audio file
    Created,

    /// Audio submitted for transcription
    TranscriptionStarted,

    /// Transcript received
    TranscriptionCompleted,

    /// Transcription call failed
    TranscriptionFailed,

    /// User corrected the transcript
    TranscriptEdited,

    /// Transcript submitted for summarization
    SummarizationStarted,

    /// Summary received (entry is now indexed by the backend)
    SummarizationCompleted,

    /// Summarization call failed
    SummarizationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = EntryEvent::new(Uuid::new_v4(), EntryEventType::TranscriptionStarted);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"transcription_started\""));
        assert!(!json.contains("transcript\""));
        assert!(!json.contains("error"));

        let parsed: EntryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, EntryEventType::TranscriptionStarted);
        assert_eq!(parsed.entry_id, event.entry_id);
    }

    #[test]
    fn test_event_with_error() {
        let event = EntryEvent::new(Uuid::new_v4(), EntryEventType::SummarizationFailed)
            .with_error("backend rejected request (500): Summarization failed")
            .with_duration(1500);

        assert_eq!(event.duration_ms, Some(1500));
        assert_eq!(
            event.error.as_deref(),
            Some("backend rejected request (500): Summarization failed")
        );
    }
}
