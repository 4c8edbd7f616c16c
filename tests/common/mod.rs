//! In-process journal backend for integration tests.
//!
//! Serves the same routes and payloads as the real service on an ephemeral
//! port, so tests exercise `HttpBackend` over real HTTP.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use diarist::config::{ResolvedConfig, StorageMode};
use diarist::{App, HttpBackend};

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Audio received by /transcribe
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub had_authorization: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StoredProfile {
    pub goals: Vec<String>,
    pub principles: Vec<String>,
}

#[derive(Default)]
struct ServerState {
    users: HashMap<String, String>,
    tokens: HashMap<String, String>,
    profiles: HashMap<String, StoredProfile>,
    index: Vec<(String, String, String)>,
    transcript: String,
    transcribe_failures: usize,
    transcribe_delay: Option<Duration>,
    uploads: Vec<ReceivedUpload>,
    search_calls: usize,
    summarize_calls: usize,
}

/// Handle to a running fake backend
#[derive(Clone)]
pub struct FakeServer {
    pub base_url: String,
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(ServerState {
            transcript: "Today I ran 3 miles".to_string(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/register", post(register))
            .route("/token", post(token))
            .route("/transcribe", post(transcribe))
            .route("/summarize", post(summarize))
            .route("/search", post(search))
            .route("/setup-profile", post(setup_profile))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn set_transcript(&self, transcript: &str) {
        self.state().transcript = transcript.to_string();
    }

    pub fn fail_next_transcriptions(&self, n: usize) {
        self.state().transcribe_failures = n;
    }

    pub fn set_transcribe_delay(&self, delay: Duration) {
        self.state().transcribe_delay = Some(delay);
    }

    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state().uploads.clone()
    }

    pub fn profile(&self, username: &str) -> Option<StoredProfile> {
        self.state().profiles.get(username).cloned()
    }

    pub fn search_calls(&self) -> usize {
        self.state().search_calls
    }

    pub fn summarize_calls(&self) -> usize {
        self.state().summarize_calls
    }

    /// App with its home under `home`, talking to this server
    pub fn app(&self, home: &Path) -> App {
        let mut config = ResolvedConfig::with_home(home);
        config.backend.base_url = self.base_url.clone();
        config.backend.request_timeout = Duration::from_secs(5);
        config.backend.transcribe_timeout = Duration::from_secs(5);
        App::with_backend(config, Arc::new(HttpBackend::new(self.base_url.clone()))).unwrap()
    }

    /// Same as `app` but the credential is never written to disk
    pub fn memory_app(&self, home: &Path) -> App {
        let mut config = ResolvedConfig::with_home(home);
        config.credential_storage = StorageMode::Memory;
        App::with_backend(config, Arc::new(HttpBackend::new(self.base_url.clone()))).unwrap()
    }
}

/// Write an audio file to `dir` and return its path
pub async fn write_audio(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await.unwrap();
    path
}

fn reject(status: StatusCode, detail: impl Into<Value>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail.into() })))
}

fn stems(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(|w| w.to_lowercase().chars().take(3).collect())
        .collect()
}

fn user_for(state: &ServerState, headers: &HeaderMap) -> Result<String, (StatusCode, Json<Value>)> {
    let unauthorized = || reject(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(unauthorized)?;
    state.tokens.get(token).cloned().ok_or_else(unauthorized)
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn register(
    State(state): State<Arc<Mutex<ServerState>>>,
    Json(body): Json<Credentials>,
) -> Reply {
    let mut state = state.lock().unwrap();
    if state.users.contains_key(&body.username) {
        return Err(reject(StatusCode::BAD_REQUEST, "User already exists"));
    }
    state.users.insert(body.username, body.password);
    Ok(Json(json!({ "message": "User created successfully" })))
}

async fn token(
    State(state): State<Arc<Mutex<ServerState>>>,
    Form(body): Form<Credentials>,
) -> Reply {
    let mut state = state.lock().unwrap();
    if state.users.get(&body.username) != Some(&body.password) {
        return Err(reject(
            StatusCode::UNAUTHORIZED,
            "Incorrect username or password",
        ));
    }
    let token = format!("tok-{}-{}", body.username, state.tokens.len());
    state.tokens.insert(token.clone(), body.username);
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

async fn transcribe(
    State(state): State<Arc<Mutex<ServerState>>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Reply {
    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        upload = Some(ReceivedUpload {
            file_name,
            content_type,
            bytes,
            had_authorization: headers.contains_key("authorization"),
        });
    }
    let Some(upload) = upload else {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["body", "file"], "msg": "field required" }]),
        ));
    };

    let is_audio = upload
        .content_type
        .as_deref()
        .is_some_and(|t| t.starts_with("audio/"));
    if !is_audio {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Invalid file type. Please upload an audio file.",
        ));
    }

    let delay = state.lock().unwrap().transcribe_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock().unwrap();
    state.uploads.push(upload);
    if state.transcribe_failures > 0 {
        state.transcribe_failures -= 1;
        return Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Transcription failed: model unavailable",
        ));
    }
    Ok(Json(json!({ "transcript": state.transcript })))
}

#[derive(Deserialize)]
struct SummarizeBody {
    transcript: String,
}

async fn summarize(
    State(state): State<Arc<Mutex<ServerState>>>,
    headers: HeaderMap,
    Json(body): Json<SummarizeBody>,
) -> Reply {
    let mut state = state.lock().unwrap();
    state.summarize_calls += 1;
    let user = user_for(&state, &headers)?;

    let goals = state
        .profiles
        .get(&user)
        .map(|p| p.goals.clone())
        .unwrap_or_default();
    let summary = format!(
        "You wrote: {}. Progress toward your goals: {}",
        body.transcript,
        goals.join(", ")
    );
    let alignment: Vec<String> = goals.iter().map(|g| format!("Supports: {}", g)).collect();

    state
        .index
        .push((user, body.transcript.clone(), summary.clone()));
    Ok(Json(json!({ "summary": summary, "goal_alignment": alignment })))
}

#[derive(Deserialize)]
struct SearchBody {
    query_text: String,
}

async fn search(
    State(state): State<Arc<Mutex<ServerState>>>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Reply {
    let mut state = state.lock().unwrap();
    state.search_calls += 1;
    let user = user_for(&state, &headers)?;
    let wanted = stems(&body.query_text);

    let matches: Vec<Value> = state
        .index
        .iter()
        .enumerate()
        .filter(|(_, (owner, _, _))| *owner == user)
        .filter(|(_, (_, transcript, summary))| {
            stems(&format!("{} {}", transcript, summary))
                .iter()
                .any(|s| wanted.contains(s))
        })
        .map(|(i, (_, transcript, summary))| {
            json!({ "id": format!("e{}", i), "transcript": transcript, "summary": summary })
        })
        .collect();
    Ok(Json(json!({ "matches": matches })))
}

#[derive(Deserialize)]
struct ProfileBody {
    goals: Vec<String>,
    principles: Vec<String>,
}

async fn setup_profile(
    State(state): State<Arc<Mutex<ServerState>>>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let user = user_for(&state, &headers)?;
    if body.goals.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{ "loc": ["body", "goals"], "msg": "at least one goal is required" }]),
        ));
    }
    state.profiles.insert(
        user,
        StoredProfile {
            goals: body.goals,
            principles: body.principles,
        },
    );
    Ok(Json(json!({ "message": "Profile saved" })))
}
