//! Focus session start request and handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// Backend accepts 1..=120 minute sessions.
pub const MIN_SESSION_MINUTES: i32 = 1;
pub const MAX_SESSION_MINUTES: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Work,
    Break,
    LongBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub task_id: TaskId,
    pub title: String,
    pub duration_minutes: i32,
    pub session_type: SessionType,
}

impl SessionRequest {
    /// Work session sized from the task estimate, or `default_minutes` without one.
    pub fn work(task_id: TaskId, title: impl Into<String>, estimate: Option<i32>, default_minutes: i32) -> Self {
        let minutes = estimate
            .filter(|m| *m > 0)
            .unwrap_or(default_minutes)
            .clamp(MIN_SESSION_MINUTES, MAX_SESSION_MINUTES);
        Self {
            task_id,
            title: title.into(),
            duration_minutes: minutes,
            session_type: SessionType::Work,
        }
    }
}

/// A started session as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: i64,
    pub task_id: TaskId,
    pub duration_minutes: i32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}
