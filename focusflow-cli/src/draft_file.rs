//! TOML draft files for `focusflow create --draft`.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use focusflow_core::time::{checked_minutes, parse_date, parse_local_to_utc};
use focusflow_core::{Category, EnergyLevel, SubtaskInput, TaskDraft};

#[derive(Debug, Clone, Deserialize)]
pub struct DraftFile {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub energy_level: EnergyLevel,
    #[serde(default)]
    pub category: Category,
    /// `YYYY-MM-DD`
    pub deadline: Option<String>,
    /// `YYYY-MM-DD HH:MM` in the configured timezone
    pub scheduled: Option<String>,
    pub hours: Option<i32>,
    pub minutes: Option<i32>,
    #[serde(default)]
    pub requires_deep_focus: bool,
    pub allow_interruptions: Option<bool>,
    pub focus_difficulty: Option<i32>,
    pub warmup_minutes: Option<i32>,
    pub cooldown_minutes: Option<i32>,
    #[serde(default)]
    pub subtasks: Vec<SubtaskEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtaskEntry {
    pub title: String,
    pub minutes: Option<i32>,
}

fn default_priority() -> i32 {
    3
}

pub fn read_draft(path: &Path, tz: &str) -> Result<TaskDraft> {
    if !path.exists() {
        bail!("draft not found: {}", path.display());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: DraftFile =
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    file.into_draft(tz)
}

impl DraftFile {
    pub fn into_draft(self, tz: &str) -> Result<TaskDraft> {
        checked_minutes(self.hours, self.minutes).context("duration")?;
        let mut draft = TaskDraft::new(self.title)
            .with_priority(self.priority)
            .with_energy(self.energy_level)
            .with_category(self.category)
            .with_duration(self.hours, self.minutes)
            .with_deep_focus(self.requires_deep_focus);

        if let Some(d) = self.description {
            draft = draft.with_description(d);
        }
        if let Some(d) = self.deadline.as_deref() {
            draft = draft.with_deadline(parse_date(d).context("deadline")?);
        }
        if let Some(at) = self.scheduled.as_deref() {
            draft = draft.with_scheduled_time(parse_local_to_utc(at, tz).context("scheduled")?);
        }
        if let Some(level) = self.focus_difficulty {
            draft = draft.with_focus_difficulty(level);
        }
        if let Some(m) = self.warmup_minutes {
            draft = draft.with_warmup(m);
        }
        if let Some(m) = self.cooldown_minutes {
            draft = draft.with_cooldown(m);
        }
        // after deep focus so the explicit value wins
        if let Some(allow) = self.allow_interruptions {
            draft.set_allow_interruptions(allow);
        }

        for (i, entry) in self.subtasks.into_iter().enumerate() {
            let mut sub = SubtaskInput::new(format!("file-{i}"), entry.title);
            if let Some(m) = entry.minutes {
                sub = sub.with_minutes(m);
            }
            draft = draft.with_subtask(sub);
        }
        Ok(draft)
    }
}
