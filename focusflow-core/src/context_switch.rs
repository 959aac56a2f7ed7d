//! Context switch decisions and a history-based evaluator.
//!
//! The backend normally scores switches; `HistorySwitchEvaluator` applies the
//! same rules locally when the previous task's profile is already known.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ServiceError;
use crate::services::{Ack, ContextSwitchEvaluator};
use crate::task::{Category, TaskId};

/// Minutes every switch costs.
pub const BASE_COST_MINUTES: i32 = 15;
/// Extra minutes when the category changes.
pub const CATEGORY_CHANGE_MINUTES: i32 = 10;
/// Extra minutes per focus-difficulty level once the jump is significant.
pub const DIFFICULTY_STEP_MINUTES: i32 = 5;
/// Difficulty jump that counts as significant.
pub const SIGNIFICANT_DIFFICULTY_JUMP: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSwitch {
    pub id: i64,
    pub from_category: Option<Category>,
    pub to_category: Option<Category>,
    #[serde(default)]
    pub from_focus_difficulty: Option<u8>,
    #[serde(default)]
    pub to_focus_difficulty: Option<u8>,
    pub estimated_cost_minutes: i32,
    #[serde(default)]
    pub is_significant_switch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSwitchDecision {
    pub should_warn: bool,
    pub warning_message: Option<String>,
    #[serde(rename = "context_switch")]
    pub switch: ContextSwitch,
}

impl ContextSwitchDecision {
    /// The host must ask the user before launching.
    pub fn requires_confirmation(&self) -> bool {
        self.should_warn
            && self
                .warning_message
                .as_deref()
                .is_some_and(|m| !m.trim().is_empty())
    }
}

/// The user's answer to a switch warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchResolution {
    Proceed { note: Option<String> },
    /// Batch with similar tasks later; no session now.
    Defer,
    Cancel,
}

/// What the evaluator needs to know about a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProfile {
    pub title: String,
    pub category: Category,
    pub focus_difficulty: u8,
}

/// Score a switch between two tasks: `(significant, cost_minutes)`.
pub fn score_switch(from: &TaskProfile, to: &TaskProfile) -> (bool, i32) {
    let mut significant = false;
    let mut cost = BASE_COST_MINUTES;

    if from.category != to.category {
        significant = true;
        cost += CATEGORY_CHANGE_MINUTES;
    }

    let jump = (to.focus_difficulty as i32 - from.focus_difficulty as i32).abs();
    if jump >= SIGNIFICANT_DIFFICULTY_JUMP {
        significant = true;
        cost += jump * DIFFICULTY_STEP_MINUTES;
    }

    (significant, cost)
}

pub fn warning_message(from: &TaskProfile, to: &TaskProfile, cost: i32) -> String {
    let mut msg = format!(
        "Context switch detected\nFrom: {} ({})\nTo: {} ({})\nEstimated recovery time: ~{} minutes\n",
        from.title, from.category, to.title, to.category, cost
    );
    if from.category != to.category {
        msg.push_str("Different categories need a mental reset. Consider batching similar tasks together.\n");
    }
    let jump = (to.focus_difficulty as i32 - from.focus_difficulty as i32).abs();
    if jump >= SIGNIFICANT_DIFFICULTY_JUMP {
        msg.push_str("Focus difficulty changes a lot. Take a moment to prepare.\n");
    }
    msg
}

/// Evaluates switches against profiles the host already has in memory.
#[derive(Debug, Default)]
pub struct HistorySwitchEvaluator {
    profiles: HashMap<TaskId, TaskProfile>,
    last_active: Option<TaskId>,
    next_id: AtomicI64,
    confirmed: Mutex<Vec<(i64, Option<String>)>>,
}

impl HistorySwitchEvaluator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, id: TaskId, profile: TaskProfile) -> Self {
        self.profiles.insert(id, profile);
        self
    }

    /// Fallback when the caller passes no previous task.
    pub fn with_last_active(mut self, id: TaskId) -> Self {
        self.last_active = Some(id);
        self
    }

    pub fn confirmed(&self) -> Vec<(i64, Option<String>)> {
        self.confirmed
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContextSwitchEvaluator for HistorySwitchEvaluator {
    async fn evaluate(
        &self,
        task_id: TaskId,
        previous_task_id: Option<TaskId>,
    ) -> Result<Option<ContextSwitchDecision>, ServiceError> {
        let Some(from_id) = previous_task_id.or(self.last_active) else {
            return Ok(None);
        };
        if from_id == task_id {
            return Ok(None);
        }
        let (Some(from), Some(to)) = (self.profiles.get(&from_id), self.profiles.get(&task_id)) else {
            return Ok(None);
        };

        let (significant, cost) = score_switch(from, to);
        if !significant {
            return Ok(None);
        }

        Ok(Some(ContextSwitchDecision {
            should_warn: true,
            warning_message: Some(warning_message(from, to, cost)),
            switch: ContextSwitch {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                from_category: Some(from.category),
                to_category: Some(to.category),
                from_focus_difficulty: Some(from.focus_difficulty),
                to_focus_difficulty: Some(to.focus_difficulty),
                estimated_cost_minutes: cost,
                is_significant_switch: true,
            },
        }))
    }

    async fn confirm_switch(&self, switch_id: i64, note: Option<&str>) -> Result<Ack, ServiceError> {
        let mut confirmed = self
            .confirmed
            .lock()
            .map_err(|_| ServiceError::Decode("switch log poisoned".to_string()))?;
        confirmed.push((switch_id, note.map(str::to_string)));
        Ok(Ack::default())
    }
}
