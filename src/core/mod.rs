//! Core client components.
//!
//! This module contains:
//! - SessionManager: Holds the bearer credential
//! - EntryPipeline: Drives an entry through transcription and summarization
//! - EntryStore: Append-only per-entry event logs
//! - ProfileStore: Goals and principles draft
//! - SearchClient: Queries over indexed entries

pub mod entry_store;
pub mod pipeline;
pub mod profile_store;
pub mod search;
pub mod session;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use entry_store::{hash_bytes, hash_file, EntryLog, EntryLogError, EntryStore};
pub use pipeline::{inspect_audio, EntryPipeline, PipelineError, PipelineSettings};
pub use profile_store::{ProfileError, ProfileStore};
pub use search::{SearchClient, SearchError};
pub use session::{AuthError, CredentialStorage, SessionManager};
