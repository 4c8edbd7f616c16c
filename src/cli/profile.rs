//! Profile CLI subcommands for editing goals and principles.
//!
//! Slots are numbered from 1 on the command line. Edits go to the local
//! draft; nothing reaches the backend until `submit`.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use crate::app::App;
use crate::core::ProfileError;
use crate::domain::{SlotKind, SlotList};

/// Profile-related subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Show the draft and what would be submitted
    Show,

    /// Add an empty goal or principle slot
    Add {
        #[arg(value_enum)]
        kind: SlotArg,
    },

    /// Set the text of an existing slot
    Set {
        #[arg(value_enum)]
        kind: SlotArg,

        /// Slot number (from 1)
        index: usize,

        value: String,
    },

    /// Replace the server-side profile with the draft
    Submit,

    /// Discard the draft
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SlotArg {
    Goal,
    Principle,
}

impl From<SlotArg> for SlotKind {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::Goal => SlotKind::Goal,
            SlotArg::Principle => SlotKind::Principle,
        }
    }
}

/// Execute profile subcommands
pub async fn execute(app: &App, command: ProfileCommands) -> Result<()> {
    let mut store = app
        .profile_store()
        .context("Failed to load profile draft")?;

    match command {
        ProfileCommands::Show => {
            print_slots("Goals", store.goals().slots());
            print_slots("Principles", store.principles().slots());

            let submission = store.submission();
            println!(
                "\nWould submit {} goal(s) and {} principle(s)",
                submission.goals.len(),
                submission.principles.len()
            );
        }
        ProfileCommands::Add { kind } => {
            let kind = SlotKind::from(kind);
            let index = store.add_slot(kind)?;
            println!("Added {} slot {}", kind, index + 1);
        }
        ProfileCommands::Set { kind, index, value } => {
            let kind = SlotKind::from(kind);
            let Some(index) = index.checked_sub(1) else {
                anyhow::bail!("Slots are numbered from 1");
            };
            store.update_slot(kind, index, value)?;
            println!("Updated {} {}", kind, index + 1);
        }
        ProfileCommands::Submit => match store.submit(app.session()).await {
            Ok(()) => println!("Profile submitted"),
            Err(ProfileError::Unauthorized) => {
                anyhow::bail!("Not logged in, or the session expired. Run `diarist login <username>`")
            }
            Err(e) => return Err(e).context("Profile submission failed"),
        },
        ProfileCommands::Reset => {
            store.reset()?;
            println!("Profile draft cleared");
        }
    }

    Ok(())
}

fn print_slots(title: &str, slots: &SlotList) {
    println!("{}:", title);
    for (i, value) in slots.as_slice().iter().enumerate() {
        if value.trim().is_empty() {
            println!("  {}. (empty)", i + 1);
        } else {
            println!("  {}. {}", i + 1, value);
        }
    }
}
