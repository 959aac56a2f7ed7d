//! Backend wire shapes and status classification.

use serde::{Deserialize, Serialize};

use focusflow_core::breakdown::{ComplexityLevel, ProposedSubtask};
use focusflow_core::error::ServiceError;
use focusflow_core::task::{SubtaskInput, TaskId};

/// Every backend response is wrapped in this envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Best human-readable reason for a failure.
    pub fn reason(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|m| !m.trim().is_empty())
    }
}

/// Map a non-success HTTP status to a service error.
pub fn classify_status(status: u16, message: String) -> ServiceError {
    match status {
        422 => ServiceError::Validation(message),
        500..=599 => ServiceError::Server { status, message },
        _ => ServiceError::Rejected { status, message },
    }
}

#[derive(Debug, Serialize)]
pub struct NewSubtask<'a> {
    pub title: &'a str,
    pub estimated_minutes: Option<i32>,
    pub sort_order: usize,
}

#[derive(Debug, Serialize)]
pub struct NewSubtasks<'a> {
    pub subtasks: Vec<NewSubtask<'a>>,
}

impl<'a> NewSubtasks<'a> {
    pub fn from_inputs(inputs: &'a [SubtaskInput]) -> Self {
        Self {
            subtasks: inputs
                .iter()
                .enumerate()
                .map(|(i, s)| NewSubtask {
                    title: &s.title,
                    estimated_minutes: s.estimated_minutes,
                    sort_order: i,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BreakdownRequest {
    pub complexity: ComplexityLevel,
}

#[derive(Debug, Deserialize)]
pub struct BreakdownData {
    #[serde(default)]
    pub subtasks: Vec<ProposedSubtask>,
}

#[derive(Debug, Serialize)]
pub struct SwitchCheck {
    pub to_task_id: TaskId,
    pub from_task_id: Option<TaskId>,
}

#[derive(Debug, Serialize)]
pub struct SwitchConfirm<'a> {
    pub user_proceeded: bool,
    pub note: Option<&'a str>,
}
