//! In-memory backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapters::{AudioUpload, BackendError, JournalBackend};
use crate::domain::{Credential, ProfileSubmission, SearchResult, Summary};

#[derive(Default)]
struct FakeState {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    profiles: HashMap<String, ProfileSubmission>,
    profile_writes: usize,
    index: Vec<(String, SearchResult)>,
    transcript: String,
    transcribe_failures: usize,
    summarize_failures: usize,
    uploads: Vec<AudioUpload>,
    summarized: Vec<String>,
    delay: Option<Duration>,
}

/// Backend double with the same observable contract as the real service
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn with_user(username: &str, password: &str) -> Self {
        let backend = Self::default();
        backend.add_user(username, password);
        backend
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, username: &str, password: &str) {
        self.state()
            .users
            .insert(username.to_string(), password.to_string());
    }

    pub fn set_transcript(&self, transcript: &str) {
        self.state().transcript = transcript.to_string();
    }

    pub fn fail_next_transcriptions(&self, n: usize) {
        self.state().transcribe_failures = n;
    }

    pub fn fail_next_summaries(&self, n: usize) {
        self.state().summarize_failures = n;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Invalidate every issued token, as if they all expired
    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    /// Issue a token without going through login
    pub fn issue_token(&self, username: &str) -> Credential {
        let token = format!("token-{}-{}", username, self.state().tokens.len());
        self.state().tokens.insert(token.clone(), username.to_string());
        Credential::new(token)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<AudioUpload> {
        self.state().uploads.clone()
    }

    pub fn summarized(&self) -> Vec<String> {
        self.state().summarized.clone()
    }

    pub fn profile(&self, username: &str) -> Option<ProfileSubmission> {
        self.state().profiles.get(username).cloned()
    }

    pub fn profile_writes(&self) -> usize {
        self.state().profile_writes
    }

    /// Put an entry straight into the search index
    pub fn index_entry(&self, username: &str, transcript: &str, summary: &str) {
        self.state().index.push((
            username.to_string(),
            SearchResult {
                id: None,
                transcript: transcript.to_string(),
                summary: summary.to_string(),
            },
        ));
    }

    fn user_for(&self, credential: &Credential) -> Result<String, BackendError> {
        self.state()
            .tokens
            .get(credential.token())
            .cloned()
            .ok_or(BackendError::Unauthorized)
    }

    async fn pause(&self) {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn stems(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(|w| w.to_lowercase().chars().take(3).collect())
        .collect()
}

#[async_trait]
impl JournalBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn register(&self, username: &str, password: &str) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state.users.contains_key(username) {
            return Err(BackendError::Rejected {
                status: 400,
                detail: "User already exists".to_string(),
            });
        }
        state
            .users
            .insert(username.to_string(), password.to_string());
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<Credential, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let valid = self.state().users.get(username).map(String::as_str) == Some(password);
        if !valid {
            return Err(BackendError::Unauthorized);
        }
        Ok(self.issue_token(username))
    }

    async fn transcribe(&self, audio: AudioUpload) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if !audio.mime_type.starts_with("audio/") {
            return Err(BackendError::Rejected {
                status: 400,
                detail: "Invalid file type. Please upload an audio file.".to_string(),
            });
        }

        let mut state = self.state();
        state.uploads.push(audio);
        if state.transcribe_failures > 0 {
            state.transcribe_failures -= 1;
            return Err(BackendError::Rejected {
                status: 500,
                detail: "Transcription failed".to_string(),
            });
        }
        Ok(state.transcript.clone())
    }

    async fn summarize(
        &self,
        credential: &Credential,
        transcript: &str,
    ) -> Result<Summary, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let user = self.user_for(credential)?;

        let mut state = self.state();
        if state.summarize_failures > 0 {
            state.summarize_failures -= 1;
            return Err(BackendError::Rejected {
                status: 500,
                detail: "Summarization failed".to_string(),
            });
        }

        let goals = state
            .profiles
            .get(&user)
            .map(|p| p.goals.clone())
            .unwrap_or_default();
        let text = if goals.is_empty() {
            format!("You wrote: {}", transcript)
        } else {
            format!("You wrote: {}. Keep working toward: {}", transcript, goals.join(", "))
        };
        let goal_alignment = goals.iter().map(|g| format!("Aligned with: {}", g)).collect();

        state.summarized.push(transcript.to_string());
        let id = format!("entry-{}", state.index.len());
        state.index.push((
            user,
            SearchResult {
                id: Some(id),
                transcript: transcript.to_string(),
                summary: text.clone(),
            },
        ));

        Ok(Summary {
            text,
            goal_alignment,
        })
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<SearchResult>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(credential)?;
        let wanted = stems(query);

        Ok(self
            .state()
            .index
            .iter()
            .filter(|(owner, _)| *owner == user)
            .filter(|(_, result)| {
                let text = format!("{} {}", result.transcript, result.summary);
                stems(&text).iter().any(|s| wanted.contains(s))
            })
            .map(|(_, result)| result.clone())
            .collect())
    }

    async fn setup_profile(
        &self,
        credential: &Credential,
        profile: &ProfileSubmission,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(credential)?;
        let mut state = self.state();
        state.profiles.insert(user, profile.clone());
        state.profile_writes += 1;
        Ok(())
    }
}
