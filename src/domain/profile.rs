//! Goals and principles as the user edits them.
//!
//! Goals and principles are two independent ordered lists of editable slots.
//! A list always holds at least one slot, and only `add_slot` changes its
//! length.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which list a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Goal,
    Principle,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Goal => write!(f, "goal"),
            SlotKind::Principle => write!(f, "principle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("slot {index} is out of range ({len} slots)")]
pub struct SlotOutOfRange {
    pub index: usize,
    pub len: usize,
}

/// Ordered list of editable text slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SlotList(Vec<String>);

impl SlotList {
    /// A list with a single empty slot
    pub fn new() -> Self {
        Self(vec![String::new()])
    }

    pub fn push_empty(&mut self) -> usize {
        self.0.push(String::new());
        self.0.len() - 1
    }

    pub fn set(&mut self, index: usize, value: impl Into<String>) -> Result<(), SlotOutOfRange> {
        let len = self.0.len();
        let slot = self
            .0
            .get_mut(index)
            .ok_or(SlotOutOfRange { index, len })?;
        *slot = value.into();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Trimmed, non-blank values in order
    pub fn filled(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for SlotList {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for SlotList {
    fn from(values: Vec<String>) -> Self {
        if values.is_empty() {
            Self::new()
        } else {
            Self(values)
        }
    }
}

impl From<SlotList> for Vec<String> {
    fn from(list: SlotList) -> Self {
        list.0
    }
}

/// Long-term goals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goals(SlotList);

impl Goals {
    pub fn add_slot(&mut self) -> usize {
        self.0.push_empty()
    }

    pub fn update(&mut self, index: usize, goal: impl Into<String>) -> Result<(), SlotOutOfRange> {
        self.0.set(index, goal)
    }

    pub fn slots(&self) -> &SlotList {
        &self.0
    }
}

/// Core principles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principles(SlotList);

impl Principles {
    pub fn add_slot(&mut self) -> usize {
        self.0.push_empty()
    }

    pub fn update(
        &mut self,
        index: usize,
        principle: impl Into<String>,
    ) -> Result<(), SlotOutOfRange> {
        self.0.set(index, principle)
    }

    pub fn slots(&self) -> &SlotList {
        &self.0
    }
}

/// Profile as edited locally, before submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub principles: Principles,
}

impl ProfileDraft {
    /// Build the payload sent to the backend.
    ///
    /// With `drop_blank` set, empty and whitespace-only slots are left out.
    pub fn submission(&self, drop_blank: bool) -> ProfileSubmission {
        let collect = |list: &SlotList| {
            if drop_blank {
                list.filled()
            } else {
                list.as_slice().to_vec()
            }
        };

        ProfileSubmission {
            goals: collect(self.goals.slots()),
            principles: collect(self.principles.slots()),
        }
    }
}

/// Wire payload for `POST /setup-profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSubmission {
    pub goals: Vec<String>,
    pub principles: Vec<String>,
}
