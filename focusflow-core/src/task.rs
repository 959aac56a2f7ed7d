//! Task model shared by every step of the creation flow.
//!
//! A `CreatedTask` is what the backend hands back after a draft is accepted;
//! its `TaskId` is the join key for breakdown, environment, switch and session
//! calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(v: i64) -> Self {
        TaskId(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Study,
    Work,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Study => f.write_str("study"),
            Category::Work => f.write_str("work"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// 1 (lowest) to 5 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Out-of-range input is clamped rather than rejected.
    pub fn new(level: i32) -> Self {
        Priority(level.clamp(Self::MIN as i32, Self::MAX as i32) as u8)
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority(3)
    }
}

/// A subtask as the user typed it, before the backend has seen it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskInput {
    /// Stable client-side key so UI rows survive reordering.
    pub client_id: String,
    pub title: String,
    pub estimated_minutes: Option<i32>,
}

impl SubtaskInput {
    pub fn new(client_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            title: title.into(),
            estimated_minutes: None,
        }
    }

    pub fn with_minutes(mut self, minutes: i32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// A persisted subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub title: String,
    pub estimated_minutes: Option<i32>,
}

/// Result of a successful draft submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub focus_difficulty: Option<u8>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl CreatedTask {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: None,
            focus_difficulty: None,
            subtasks: Vec::new(),
        }
    }
}
