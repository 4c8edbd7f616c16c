//! Append-only entry log with file-based persistence.
//!
//! Each local entry draft gets a directory under `entries/` holding
//! `events.jsonl` (newline-delimited JSON, one event per line) and
//! `entry.lock`, an advisory lock held while a backend call is in flight so
//! two processes can't drive the same entry at once.

use std::fs::OpenOptions as StdOpenOptions;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::domain::{AudioRef, EntryEvent, EntryEventType, JournalEntry};

/// Errors that can occur with the entry log
#[derive(Debug, Error)]
pub enum EntryLogError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Directory of entry logs
#[derive(Debug, Clone)]
pub struct EntryStore {
    /// Directory containing one subdirectory per entry
    root: PathBuf,
}

impl EntryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new entry around an audio file and log its creation
    pub async fn create(&self, audio: AudioRef) -> Result<(EntryLog, JournalEntry), EntryLogError> {
        let id = Uuid::new_v4();
        let log = EntryLog::at(&self.root, id);
        fs::create_dir_all(&log.dir).await?;

        let event = EntryEvent::new(id, EntryEventType::Created).with_audio(audio.clone());
        log.append(&event).await?;

        let mut entry = JournalEntry::new(id, audio);
        entry.created_at = event.timestamp;
        entry.updated_at = event.timestamp;

        Ok((log, entry))
    }

    /// Open the log of an existing entry
    pub fn open(&self, id: Uuid) -> Result<EntryLog, EntryLogError> {
        let log = EntryLog::at(&self.root, id);
        if !log.events_path.exists() {
            return Err(EntryLogError::NotFound(id.to_string()));
        }
        Ok(log)
    }

    /// Resolve a full UUID or a unique prefix of one
    pub async fn resolve(&self, id_or_prefix: &str) -> Result<Uuid, EntryLogError> {
        if let Ok(id) = Uuid::parse_str(id_or_prefix) {
            return Ok(id);
        }

        let matches: Vec<Uuid> = self
            .list_ids()
            .await?
            .into_iter()
            .filter(|id| id.to_string().starts_with(id_or_prefix))
            .collect();

        match matches.as_slice() {
            [id] => Ok(*id),
            _ => Err(EntryLogError::NotFound(id_or_prefix.to_string())),
        }
    }

    /// Load an entry, settling any stage left in flight by a dead process
    pub async fn load(&self, id: Uuid) -> Result<(EntryLog, JournalEntry), EntryLogError> {
        let log = self.open(id)?;
        let mut entry = log.load().await?;

        if entry.stage.is_in_flight() && !log.is_locked()? {
            entry.settle_interrupted();
        }

        Ok((log, entry))
    }

    /// List all entry IDs in the store
    pub async fn list_ids(&self) -> Result<Vec<Uuid>, EntryLogError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        ids.push(uuid);
                    }
                }
            }
        }

        Ok(ids)
    }

    /// Load every entry, most recent first
    pub async fn list(&self, limit: usize) -> Result<Vec<JournalEntry>, EntryLogError> {
        let mut entries = Vec::new();
        for id in self.list_ids().await? {
            match self.load(id).await {
                Ok((_, entry)) => entries.push(entry),
                Err(e) => tracing::warn!(%id, error = %e, "Skipping unreadable entry log"),
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

/// Event log of a single entry
#[derive(Debug, Clone)]
pub struct EntryLog {
    entry_id: Uuid,

    /// Directory containing the entry
    dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,

    /// Path to the advisory lock file
    lock_path: PathBuf,
}

impl EntryLog {
    fn at(root: &Path, entry_id: Uuid) -> Self {
        let dir = root.join(entry_id.to_string());
        Self {
            entry_id,
            events_path: dir.join("events.jsonl"),
            lock_path: dir.join("entry.lock"),
            dir,
        }
    }

    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &EntryEvent) -> Result<(), EntryLogError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<EntryEvent>, EntryLogError> {
        if !self.events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Rebuild the entry from its events, exactly as logged
    pub async fn load(&self) -> Result<JournalEntry, EntryLogError> {
        let events = self.replay().await?;
        JournalEntry::from_events(&events)
            .ok_or_else(|| EntryLogError::NotFound(self.entry_id.to_string()))
    }

    /// Take the entry's advisory lock without blocking.
    ///
    /// Returns `None` if another process holds it.
    pub fn try_lock(&self) -> Result<Option<EntryLock>, EntryLogError> {
        let file = StdOpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(EntryLock { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether another process currently holds the lock.
    ///
    /// Checks with a shared lock, so concurrent checks never contend with
    /// each other and nothing exclusive is ever taken.
    pub fn is_locked(&self) -> Result<bool, EntryLogError> {
        let file = match std::fs::File::open(&self.lock_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

/// Held advisory lock on an entry; released on drop
#[derive(Debug)]
pub struct EntryLock {
    file: std::fs::File,
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Hash audio content (first 16 hex chars of SHA-256)
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Hash a file's content without loading it all at once
pub async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let result = hasher.finalize();
    Ok(hex::encode(&result[..8]))
}
