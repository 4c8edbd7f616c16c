//! Configuration for the diarist client.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DIARIST_HOME, DIARIST_BACKEND_URL)
//! 2. Config file (.diarist/config.yaml)
//! 3. Defaults (~/.diarist, http://localhost:8000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .diarist/config.yaml
//! - `home` in the config file is relative to the .diarist/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::CredentialStorage;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub transcribe_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub credential_storage: StorageMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    pub drop_blank_slots: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    pub reject_empty_query: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    pub max_audio_bytes: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Client state directory (credential, profile draft, entry logs)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub backend: BackendSettings,
    pub credential_storage: StorageMode,
    pub drop_blank_slots: bool,
    pub reject_empty_query: bool,
    pub max_audio_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub transcribe_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            transcribe_timeout: Duration::from_secs(300),
        }
    }
}

impl ResolvedConfig {
    /// Defaults rooted at `home`, ignoring files and environment
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            config_file: None,
            backend: BackendSettings::default(),
            credential_storage: StorageMode::File,
            drop_blank_slots: true,
            reject_empty_query: true,
            max_audio_bytes: 25 * 1024 * 1024,
        }
    }

    /// Entry logs ($DIARIST_HOME/entries)
    pub fn entries_dir(&self) -> PathBuf {
        self.home.join("entries")
    }

    /// Stored bearer token ($DIARIST_HOME/credential)
    pub fn credential_path(&self) -> PathBuf {
        self.home.join("credential")
    }

    /// Profile draft ($DIARIST_HOME/profile.json)
    pub fn profile_path(&self) -> PathBuf {
        self.home.join("profile.json")
    }

    pub fn credential_storage(&self) -> CredentialStorage {
        match self.credential_storage {
            StorageMode::File => CredentialStorage::File(self.credential_path()),
            StorageMode::Memory => CredentialStorage::Memory,
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".diarist").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Resolve configuration from a working directory and an environment lookup
fn resolve(
    cwd: &Path,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let config_file = find_config_file(cwd);
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let home = if let Some(env_home) = env("DIARIST_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(config_path)) = (&file.home, &config_file) {
        // home is relative to .diarist/
        let diarist_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(diarist_dir, home_path)
    } else {
        default_home
    };

    let defaults = BackendSettings::default();
    let base_url = env("DIARIST_BACKEND_URL")
        .or(file.backend.base_url)
        .unwrap_or(defaults.base_url);

    let backend = BackendSettings {
        base_url: base_url.trim_end_matches('/').to_string(),
        request_timeout: file
            .backend
            .request_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
        transcribe_timeout: file
            .backend
            .transcribe_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.transcribe_timeout),
    };

    let mut config = ResolvedConfig::with_home(home);
    config.config_file = config_file;
    config.backend = backend;
    config.credential_storage = file.session.credential_storage;
    if let Some(drop) = file.profile.drop_blank_slots {
        config.drop_blank_slots = drop;
    }
    if let Some(reject) = file.search.reject_empty_query {
        config.reject_empty_query = reject;
    }
    if let Some(max) = file.limits.max_audio_bytes {
        config.max_audio_bytes = max;
    }

    Ok(config)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".diarist");
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    resolve(&cwd, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
