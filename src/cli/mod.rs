//! Command-line interface for diarist.
//!
//! Provides commands for managing the session, editing the profile,
//! moving journal entries through transcription and summarization, and
//! searching past entries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::app::App;
use crate::config;
use crate::core::{AuthError, EntryPipeline, PipelineError, SearchError};
use crate::domain::JournalEntry;

pub mod profile;

/// diarist - voice journaling client
#[derive(Parser, Debug)]
#[command(name = "diarist")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account (does not log in)
    Register {
        username: String,

        /// Password (or set DIARIST_PASSWORD)
        #[arg(long, env = "DIARIST_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and store the session credential
    Login {
        username: String,

        /// Password (or set DIARIST_PASSWORD)
        #[arg(long, env = "DIARIST_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Drop the stored credential
    Logout,

    /// Show whether a session credential is held
    Whoami,

    /// Edit and submit goals and principles
    Profile {
        #[command(subcommand)]
        command: profile::ProfileCommands,
    },

    /// Create an entry from an audio file and transcribe it
    Transcribe {
        /// Audio file (wav, mp3, m4a, ...)
        audio: PathBuf,
    },

    /// Replace an entry's transcript before summarizing
    Edit {
        /// Entry ID (or unique prefix)
        entry_id: String,

        /// New transcript text
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read the new transcript from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Summarize a transcribed entry
    Summarize {
        /// Entry ID (or unique prefix)
        entry_id: String,
    },

    /// Retry the call that failed last on an entry
    Retry {
        /// Entry ID (or unique prefix)
        entry_id: String,
    },

    /// Show an entry's stage, transcript and summary
    Status {
        /// Entry ID (or unique prefix)
        entry_id: String,
    },

    /// List recent entries
    Entries {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Search past entries
    Search {
        /// Free-text query
        query: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if let Commands::Config = self.command {
            return show_config();
        }

        let app = App::from_config(config::config()?.clone())?;

        match self.command {
            Commands::Register { username, password } => register(&app, &username, &password).await,
            Commands::Login { username, password } => login(&app, &username, &password).await,
            Commands::Logout => {
                app.session().logout();
                println!("Logged out");
                Ok(())
            }
            Commands::Whoami => {
                whoami(&app);
                Ok(())
            }
            Commands::Profile { command } => profile::execute(&app, command).await,
            Commands::Transcribe { audio } => transcribe(&app, &audio).await,
            Commands::Edit {
                entry_id,
                text,
                file,
            } => edit(&app, &entry_id, text, file).await,
            Commands::Summarize { entry_id } => summarize(&app, &entry_id).await,
            Commands::Retry { entry_id } => retry(&app, &entry_id).await,
            Commands::Status { entry_id } => show_status(&app, &entry_id).await,
            Commands::Entries { limit } => list_entries(&app, limit).await,
            Commands::Search { query } => search(&app, &query).await,
            Commands::Config => show_config(),
        }
    }
}

async fn register(app: &App, username: &str, password: &str) -> Result<()> {
    match app.session().register(username, password).await {
        Ok(()) => {
            println!("Registered {}. Run `diarist login {}` to start.", username, username);
            Ok(())
        }
        Err(AuthError::DuplicateUser) => anyhow::bail!("Username '{}' is already taken", username),
        Err(e) => Err(e).context("Registration failed"),
    }
}

async fn login(app: &App, username: &str, password: &str) -> Result<()> {
    app.session()
        .login(username, password)
        .await
        .context("Login failed")?;

    println!("Logged in as {}", username);
    Ok(())
}

fn whoami(app: &App) {
    let cfg = app.config();
    if app.session().is_authenticated() {
        println!("Session credential held");
    } else {
        println!("Not logged in");
    }
    println!("Backend: {}", cfg.backend.base_url);
}

async fn open(app: &App, entry_id: &str) -> Result<EntryPipeline> {
    app.open_entry(entry_id)
        .await
        .with_context(|| format!("No entry matching '{}'", entry_id))
}

/// Turn pipeline failures into messages with a next step
fn explain(entry: &JournalEntry, err: PipelineError) -> anyhow::Error {
    let id = entry.id;
    match err {
        PipelineError::Unauthorized => {
            anyhow::anyhow!("Not logged in, or the session expired. Run `diarist login <username>`")
        }
        PipelineError::Busy => anyhow::anyhow!("Entry {} already has a request in flight", id),
        e @ (PipelineError::TranscriptionFailed(_) | PipelineError::SummarizationFailed(_)) => {
            anyhow::anyhow!("{}\nRun `diarist retry {}` to try again", e, id)
        }
        e => e.into(),
    }
}

async fn transcribe(app: &App, audio: &Path) -> Result<()> {
    let pipeline = app
        .new_entry(audio)
        .await
        .with_context(|| format!("Failed to create entry from {}", audio.display()))?;
    let entry = pipeline.entry();
    eprintln!("[Entry {} created]", entry.id);

    let transcript = pipeline
        .transcribe()
        .await
        .map_err(|e| explain(&entry, e))?;

    println!("{}", transcript);
    eprintln!(
        "\n[Entry {} transcribed. Edit with `diarist edit`, then `diarist summarize {}`]",
        entry.id, entry.id
    );
    Ok(())
}

async fn edit(app: &App, entry_id: &str, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let pipeline = open(app, entry_id).await?;
    let entry = pipeline.entry();

    let transcript = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read transcript file: {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide --text or --file"),
    };

    pipeline
        .edit_transcript(transcript)
        .await
        .map_err(|e| explain(&entry, e))?;

    eprintln!("[Entry {} transcript updated]", entry.id);
    Ok(())
}

async fn summarize(app: &App, entry_id: &str) -> Result<()> {
    let pipeline = open(app, entry_id).await?;
    let entry = pipeline.entry();

    let summary = pipeline
        .summarize(app.session())
        .await
        .map_err(|e| explain(&entry, e))?;

    println!("{}", summary.text);
    for note in &summary.goal_alignment {
        println!("  - {}", note);
    }
    Ok(())
}

async fn retry(app: &App, entry_id: &str) -> Result<()> {
    let pipeline = open(app, entry_id).await?;
    let entry = pipeline.entry();

    let entry = pipeline
        .retry(app.session())
        .await
        .map_err(|e| explain(&entry, e))?;

    eprintln!("[Entry {} is now {}]", entry.id, entry.stage);
    print_entry(&entry);
    Ok(())
}

fn print_entry(entry: &JournalEntry) {
    if let Some(transcript) = &entry.transcript {
        println!("\nTranscript:\n{}", transcript);
    }
    if let Some(summary) = &entry.summary {
        println!("\nSummary:\n{}", summary.text);
        for note in &summary.goal_alignment {
            println!("  - {}", note);
        }
    }
}

/// Show the status of an entry
async fn show_status(app: &App, entry_id: &str) -> Result<()> {
    let entry = open(app, entry_id).await?.entry();

    println!("Entry ID: {}", entry.id);
    println!("Audio: {} ({} bytes)", entry.audio.path.display(), entry.audio.size_bytes);
    println!("Stage: {}", entry.stage);
    println!("Attempts: {}", entry.attempts);
    println!("Created: {}", entry.created_at);
    println!("Updated: {}", entry.updated_at);
    if let Some(error) = &entry.last_error {
        println!("Last error: {}", error);
    }
    print_entry(&entry);

    Ok(())
}

/// List recent entries
async fn list_entries(app: &App, limit: usize) -> Result<()> {
    let entries = app.list_entries(limit).await?;

    if entries.is_empty() {
        println!("No entries found");
        return Ok(());
    }

    println!("{:<38} {:<26} {:<20}", "ENTRY ID", "STAGE", "CREATED");
    println!("{}", "-".repeat(84));

    for entry in entries {
        println!(
            "{:<38} {:<26} {:<20}",
            entry.id,
            entry.stage.to_string(),
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

async fn search(app: &App, query: &str) -> Result<()> {
    let results = match app.search_client().search(query, app.session()).await {
        Ok(results) => results,
        Err(SearchError::Unauthorized) => {
            anyhow::bail!("Not logged in, or the session expired. Run `diarist login <username>`")
        }
        Err(e) => return Err(e.into()),
    };

    if results.is_empty() {
        println!("No matching entries");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. {}", i + 1, result.transcript);
        if !result.summary.is_empty() {
            println!("   {}", result.summary);
        }
    }

    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("diarist configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:          {}", cfg.home.display());
    println!("  Entries:       {}", cfg.entries_dir().display());
    println!("  Profile draft: {}", cfg.profile_path().display());
    println!("  Credential:    {:?}", cfg.credential_storage);
    println!();
    println!("Backend:");
    println!("  Base URL:           {}", cfg.backend.base_url);
    println!("  Request timeout:    {}s", cfg.backend.request_timeout.as_secs());
    println!("  Transcribe timeout: {}s", cfg.backend.transcribe_timeout.as_secs());
    println!();
    println!("Limits:");
    println!("  Max audio size:     {} bytes", cfg.max_audio_bytes);
    println!("  Drop blank slots:   {}", cfg.drop_blank_slots);
    println!("  Reject empty query: {}", cfg.reject_empty_query);

    Ok(())
}
