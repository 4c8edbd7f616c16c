//! HTTP client for the journal backend.
//!
//! Endpoints:
//! - POST /register       JSON `{username, password}`
//! - POST /token          form `{username, password}` → `{access_token}`
//! - POST /transcribe     multipart `file` → `{transcript}`
//! - POST /summarize      bearer, JSON `{transcript}` → `{summary, goal_alignment}`
//! - POST /search         bearer, JSON `{query_text}` → `{matches}`
//! - POST /setup-profile  bearer, JSON `{goals, principles}`

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AudioUpload, BackendError, JournalBackend};
use crate::domain::{Credential, ProfileSubmission, SearchResult, Summary};

/// Backend reached over HTTP
pub struct HttpBackend {
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    transcript: String,
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    transcript: &'a str,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
    #[serde(default)]
    goal_alignment: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    matches: Vec<SearchResult>,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build endpoint URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Map non-2xx responses to errors
    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Rejected {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Pull a readable message out of an error body.
///
/// FastAPI-style bodies carry `{"detail": ...}` where detail is a string or a
/// list of validation errors; anything else is returned as raw text.
pub fn error_detail(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v.get("detail")) {
        Some(serde_json::Value::String(detail)) => detail.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string())
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl JournalBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn register(&self, username: &str, password: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint("register"))
            .json(&RegisterRequest { username, password })
            .send()
            .await
            .map_err(transport)?;

        Self::check(response).await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<Credential, BackendError> {
        let response = self
            .client
            .post(self.endpoint("token"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = Self::decode(response).await?;
        Ok(Credential::new(token.access_token))
    }

    async fn transcribe(&self, audio: AudioUpload) -> Result<String, BackendError> {
        debug!(
            file = %audio.file_name,
            bytes = audio.bytes.len(),
            "Uploading audio for transcription (endpoint is unauthenticated)"
        );

        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(transport)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("transcribe"))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let body: TranscribeResponse = Self::decode(response).await?;
        Ok(body.transcript)
    }

    async fn summarize(
        &self,
        credential: &Credential,
        transcript: &str,
    ) -> Result<Summary, BackendError> {
        let response = self
            .client
            .post(self.endpoint("summarize"))
            .header(header::AUTHORIZATION, credential.bearer())
            .json(&SummarizeRequest { transcript })
            .send()
            .await
            .map_err(transport)?;

        let body: SummarizeResponse = Self::decode(response).await?;
        Ok(Summary {
            text: body.summary,
            goal_alignment: body.goal_alignment,
        })
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &str,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let response = self
            .client
            .post(self.endpoint("search"))
            .header(header::AUTHORIZATION, credential.bearer())
            .json(&SearchRequest { query_text: query })
            .send()
            .await
            .map_err(transport)?;

        let body: SearchResponse = Self::decode(response).await?;
        Ok(body.matches)
    }

    async fn setup_profile(
        &self,
        credential: &Credential,
        profile: &ProfileSubmission,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint("setup-profile"))
            .header(header::AUTHORIZATION, credential.bearer())
            .json(profile)
            .send()
            .await
            .map_err(transport)?;

        Self::check(response).await?;
        Ok(())
    }
}
