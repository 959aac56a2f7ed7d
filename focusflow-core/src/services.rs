//! Remote collaborators the controller drives.
//!
//! Every trait is object-safe so a host can mix a real HTTP backend with local
//! implementations (for example `HistorySwitchEvaluator`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::breakdown::{BreakdownProposal, ComplexityLevel};
use crate::context_switch::ContextSwitchDecision;
use crate::draft::NewTask;
use crate::environment::EnvironmentCheckRecord;
use crate::error::ServiceError;
use crate::session::{SessionHandle, SessionRequest};
use crate::task::{CreatedTask, Subtask, SubtaskInput, TaskId};

/// Acknowledgement for write-only calls.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    pub message: Option<String>,
}

#[async_trait]
pub trait TaskCreationService: Send + Sync {
    /// Persist exactly one task. `request_token` is stable across user retries
    /// of the same flow so the backend can deduplicate.
    async fn create_task(&self, task: &NewTask, request_token: Uuid) -> Result<CreatedTask, ServiceError>;

    /// Persist subtasks in the given order.
    async fn create_subtasks(
        &self,
        task_id: TaskId,
        subtasks: &[SubtaskInput],
    ) -> Result<Vec<Subtask>, ServiceError>;

    /// Make `subtasks` the task's only subtasks. `existing` are the rows
    /// already persisted for it.
    async fn replace_subtasks(
        &self,
        task_id: TaskId,
        existing: &[Subtask],
        subtasks: &[SubtaskInput],
    ) -> Result<Vec<Subtask>, ServiceError>;
}

#[async_trait]
pub trait BreakdownService: Send + Sync {
    async fn request_breakdown(
        &self,
        task_id: TaskId,
        complexity: ComplexityLevel,
    ) -> Result<BreakdownProposal, ServiceError>;
}

#[async_trait]
pub trait EnvironmentCheckService: Send + Sync {
    async fn save_check(&self, record: &EnvironmentCheckRecord) -> Result<Ack, ServiceError>;
}

#[async_trait]
pub trait ContextSwitchEvaluator: Send + Sync {
    /// `None` means too little history or nothing significant.
    async fn evaluate(
        &self,
        task_id: TaskId,
        previous_task_id: Option<TaskId>,
    ) -> Result<Option<ContextSwitchDecision>, ServiceError>;

    async fn confirm_switch(&self, switch_id: i64, note: Option<&str>) -> Result<Ack, ServiceError>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, request: &SessionRequest) -> Result<SessionHandle, ServiceError>;
}

/// The full set of collaborators one controller needs.
#[derive(Clone)]
pub struct FlowServices {
    pub tasks: Arc<dyn TaskCreationService>,
    pub breakdown: Arc<dyn BreakdownService>,
    pub environment: Arc<dyn EnvironmentCheckService>,
    pub switches: Arc<dyn ContextSwitchEvaluator>,
    pub sessions: Arc<dyn SessionLauncher>,
}

impl FlowServices {
    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TaskCreationService
            + BreakdownService
            + EnvironmentCheckService
            + ContextSwitchEvaluator
            + SessionLauncher
            + 'static,
    {
        Self {
            tasks: backend.clone(),
            breakdown: backend.clone(),
            environment: backend.clone(),
            switches: backend.clone(),
            sessions: backend,
        }
    }

    pub fn with_switch_evaluator(mut self, switches: Arc<dyn ContextSwitchEvaluator>) -> Self {
        self.switches = switches;
        self
    }
}
