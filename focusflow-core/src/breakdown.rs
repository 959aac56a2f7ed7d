//! AI subtask breakdown proposals.
//!
//! A proposal is only a suggestion. Nothing is written to the task until the
//! user applies it through the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::task::{SubtaskInput, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Medium => "medium",
            ComplexityLevel::Complex => "complex",
        })
    }
}

impl FromStr for ComplexityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ComplexityLevel::Simple),
            "medium" => Ok(ComplexityLevel::Medium),
            "complex" => Ok(ComplexityLevel::Complex),
            other => Err(format!("unknown complexity level: {other}")),
        }
    }
}

/// One suggested subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSubtask {
    pub title: String,
    pub estimated_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownProposal {
    pub task_id: TaskId,
    pub complexity: ComplexityLevel,
    /// Ordered as the service returned them.
    pub subtasks: Vec<ProposedSubtask>,
}

impl BreakdownProposal {
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Draft rows for the proposed subtasks, keyed by position.
    pub fn to_inputs(&self) -> Vec<SubtaskInput> {
        self.subtasks
            .iter()
            .enumerate()
            .map(|(idx, s)| SubtaskInput {
                client_id: format!("ai-{}-{}", self.task_id, idx),
                title: s.title.clone(),
                estimated_minutes: s.estimated_minutes,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_parses_case_insensitively() {
        assert_eq!("Complex".parse::<ComplexityLevel>().unwrap(), ComplexityLevel::Complex);
        assert!("extreme".parse::<ComplexityLevel>().is_err());
        assert_eq!(ComplexityLevel::default().to_string(), "medium");
    }

    #[test]
    fn proposal_inputs_keep_order() {
        let p = BreakdownProposal {
            task_id: TaskId(7),
            complexity: ComplexityLevel::Simple,
            subtasks: vec![
                ProposedSubtask { title: "Outline".into(), estimated_minutes: Some(15) },
                ProposedSubtask { title: "Draft".into(), estimated_minutes: None },
            ],
        };
        let inputs = p.to_inputs();
        assert_eq!(inputs[0].title, "Outline");
        assert_eq!(inputs[0].client_id, "ai-7-0");
        assert_eq!(inputs[1].title, "Draft");
    }
}
