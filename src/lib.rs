//! diarist - voice journaling client
//!
//! Records spoken journal entries, has a backend transcribe them, lets the
//! user correct the transcript, then asks the backend for a coaching summary
//! measured against the user's goals and principles. Past entries are
//! searchable by meaning.
//!
//! # Architecture
//!
//! The backend owns transcription, summarization, the search index and
//! accounts. This crate is the client:
//! - Each entry moves through explicit stages; every transition is logged
//!   to an append-only event file and replayed on load
//! - Failed calls keep what the entry already had and can be retried
//! - The session credential is held in one place and passed by reference
//!
//! # Modules
//!
//! - `adapters`: Backend interface and its HTTP implementation
//! - `core`: Session, entry pipeline, entry log, profile and search
//! - `domain`: Data structures (JournalEntry, EntryEvent, ProfileDraft)
//! - `app`: Builds the components from configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! diarist login ada --password ...
//! diarist profile set goal 1 "Run 5k"
//! diarist profile submit
//! diarist transcribe today.m4a
//! diarist summarize <entry-id>
//! diarist search "running"
//! ```

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{BackendError, HttpBackend, JournalBackend};
pub use app::App;
pub use core::{EntryPipeline, ProfileStore, SearchClient, SessionManager};
pub use domain::{JournalEntry, ProfileDraft, SearchResult, Stage, Summary};
