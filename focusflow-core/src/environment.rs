//! Environment readiness checklist recorded before a focus session.

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub const CHECK_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentChecklist {
    pub quiet_space: bool,
    pub phone_silent: bool,
    pub materials_ready: bool,
    pub water_coffee_ready: bool,
    pub comfortable_position: bool,
    pub notifications_off: bool,
    #[serde(default)]
    pub apps_closed: Vec<String>,
    pub notes: Option<String>,
}

impl EnvironmentChecklist {
    /// Every check ticked.
    pub fn all_checked() -> Self {
        Self {
            quiet_space: true,
            phone_silent: true,
            materials_ready: true,
            water_coffee_ready: true,
            comfortable_position: true,
            notifications_off: true,
            ..Self::default()
        }
    }

    pub fn checks(&self) -> [(&'static str, bool); CHECK_COUNT] {
        [
            ("quiet space", self.quiet_space),
            ("phone silent", self.phone_silent),
            ("materials ready", self.materials_ready),
            ("water/coffee ready", self.water_coffee_ready),
            ("comfortable position", self.comfortable_position),
            ("notifications off", self.notifications_off),
        ]
    }

    pub fn remaining(&self) -> usize {
        self.checks().iter().filter(|(_, ok)| !ok).count()
    }

    pub fn all_passed(&self) -> bool {
        self.remaining() == 0
    }
}

/// What gets written for one session start attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCheckRecord {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub checklist: EnvironmentChecklist,
}

impl EnvironmentCheckRecord {
    pub fn new(task_id: TaskId, checklist: EnvironmentChecklist) -> Self {
        let mut checklist = checklist;
        checklist.notes = checklist
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self { task_id, checklist }
    }
}
