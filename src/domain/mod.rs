//! Domain types for the journaling client.
//!
//! This module contains the core data structures:
//! - Entry: one journaling session and its stage machine
//! - Events: Immutable records of entry stage changes
//! - Profile: Goals and principles being edited
//! - Credential and search results

pub mod credential;
pub mod entry;
pub mod events;
pub mod profile;
pub mod search;

// Re-export commonly used types
pub use credential::Credential;
pub use entry::{
    mime_for_path, AudioRef, EntryAction, JournalEntry, Stage, StageKind, Summary,
    TransitionError,
};
pub use events::{EntryEvent, EntryEventType};
pub use profile::{
    Goals, Principles, ProfileDraft, ProfileSubmission, SlotKind, SlotList, SlotOutOfRange,
};
pub use search::SearchResult;
