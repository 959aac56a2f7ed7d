//! Task draft: everything the user enters before a task exists server-side.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Category, EnergyLevel, Priority, SubtaskInput};

/// User-entered task attributes, mutable until submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: Option<NaiveDate>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub energy_level: EnergyLevel,
    pub estimated_minutes: Option<i32>,
    pub category: Category,
    pub subtasks: Vec<SubtaskInput>,

    pub requires_deep_focus: bool,
    /// Manual override; `None` means "derive from deep focus".
    allow_interruptions_override: Option<bool>,
    /// 1-5.
    pub focus_difficulty: u8,
    pub warmup_minutes: Option<i32>,
    pub cooldown_minutes: Option<i32>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            focus_difficulty: 3,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, level: i32) -> Self {
        self.priority = Priority::new(level);
        self
    }

    pub fn with_energy(mut self, energy: EnergyLevel) -> Self {
        self.energy_level = energy;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_scheduled_time(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    /// Duration comes from separate hours/minutes inputs.
    pub fn with_duration(mut self, hours: Option<i32>, minutes: Option<i32>) -> Self {
        self.estimated_minutes = crate::time::minutes_from_parts(hours, minutes);
        self
    }

    pub fn with_subtask(mut self, subtask: SubtaskInput) -> Self {
        self.subtasks.push(subtask);
        self
    }

    pub fn with_deep_focus(mut self, requires: bool) -> Self {
        self.set_requires_deep_focus(requires);
        self
    }

    pub fn with_focus_difficulty(mut self, difficulty: i32) -> Self {
        self.focus_difficulty = difficulty.clamp(1, 5) as u8;
        self
    }

    pub fn with_warmup(mut self, minutes: i32) -> Self {
        self.warmup_minutes = Some(minutes);
        self
    }

    pub fn with_cooldown(mut self, minutes: i32) -> Self {
        self.cooldown_minutes = Some(minutes);
        self
    }

    /// Toggling deep focus re-derives interruptions (last write wins).
    pub fn set_requires_deep_focus(&mut self, requires: bool) {
        self.requires_deep_focus = requires;
        self.allow_interruptions_override = None;
    }

    /// Manual toggle; wins until deep focus is toggled again.
    pub fn set_allow_interruptions(&mut self, allow: bool) {
        self.allow_interruptions_override = Some(allow);
    }

    pub fn allow_interruptions(&self) -> bool {
        self.allow_interruptions_override
            .unwrap_or(!self.requires_deep_focus)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must be non-empty".to_string());
        }
        Ok(())
    }

    /// Subtasks worth sending: blank rows dropped, order kept.
    pub fn submittable_subtasks(&self) -> Vec<SubtaskInput> {
        self.subtasks
            .iter()
            .filter(|s| !s.is_blank())
            .map(|s| SubtaskInput {
                client_id: s.client_id.clone(),
                title: s.title.trim().to_string(),
                estimated_minutes: s.estimated_minutes,
            })
            .collect()
    }

    /// Normalized payload for task creation.
    pub fn to_request(&self) -> NewTask {
        NewTask {
            title: self.title.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            priority: self.priority.level(),
            energy_level: self.energy_level,
            estimated_minutes: self.estimated_minutes,
            category: self.category,
            deadline: self.deadline,
            scheduled_time: self.scheduled_time,
            requires_deep_focus: self.requires_deep_focus,
            allow_interruptions: self.allow_interruptions(),
            focus_difficulty: self.focus_difficulty.clamp(1, 5),
            warmup_minutes: self.warmup_minutes,
            cooldown_minutes: self.cooldown_minutes,
        }
    }
}

/// Wire shape of a task creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: u8,
    pub energy_level: EnergyLevel,
    pub estimated_minutes: Option<i32>,
    pub category: Category,
    pub deadline: Option<NaiveDate>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub requires_deep_focus: bool,
    pub allow_interruptions: bool,
    pub focus_difficulty: u8,
    pub warmup_minutes: Option<i32>,
    pub cooldown_minutes: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interruptions_follow_deep_focus_by_default() {
        let mut d = TaskDraft::new("Write report");
        assert!(d.allow_interruptions());
        d.set_requires_deep_focus(true);
        assert!(!d.allow_interruptions());
    }

    #[test]
    fn manual_interruptions_toggle_wins_until_deep_focus_changes() {
        let mut d = TaskDraft::new("Write report").with_deep_focus(true);
        d.set_allow_interruptions(true);
        assert!(d.allow_interruptions());

        d.set_requires_deep_focus(true);
        assert!(!d.allow_interruptions());
    }

    #[test]
    fn blank_title_fails_validation() {
        assert!(TaskDraft::new("   ").validate().is_err());
        assert!(TaskDraft::new("Read ch. 3").validate().is_ok());
    }

    #[test]
    fn request_is_trimmed_and_normalized() {
        let d = TaskDraft::new("  Write report ")
            .with_description("   ")
            .with_priority(7)
            .with_duration(Some(1), Some(15))
            .with_deep_focus(true);
        let req = d.to_request();
        assert_eq!(req.title, "Write report");
        assert_eq!(req.description, None);
        assert_eq!(req.priority, 5);
        assert_eq!(req.estimated_minutes, Some(75));
        assert!(!req.allow_interruptions);

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"energy_level\":\"medium\""));
        assert!(json.contains("\"category\":\"study\""));
    }

    #[test]
    fn blank_subtasks_are_not_submitted() {
        let d = TaskDraft::new("Essay")
            .with_subtask(SubtaskInput::new("c1", " Outline "))
            .with_subtask(SubtaskInput::new("c2", "  "))
            .with_subtask(SubtaskInput::new("c3", "Draft").with_minutes(40));
        let subs = d.submittable_subtasks();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].title, "Outline");
        assert_eq!(subs[1].client_id, "c3");
    }
}
