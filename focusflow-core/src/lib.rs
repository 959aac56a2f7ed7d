//! focusflow-core: task creation to focus session orchestration

pub mod breakdown;
pub mod context_switch;
pub mod controller;
pub mod draft;
pub mod environment;
pub mod error;
pub mod flow;
pub mod services;
pub mod session;
pub mod signals;
pub mod task;
pub mod time;

pub use breakdown::{BreakdownProposal, ComplexityLevel, ProposedSubtask};
pub use context_switch::{
    ContextSwitch, ContextSwitchDecision, HistorySwitchEvaluator, SwitchResolution, TaskProfile,
    score_switch,
};
pub use controller::{FlowConfig, OrchestrationController, Progress};
pub use draft::{NewTask, TaskDraft};
pub use environment::{EnvironmentCheckRecord, EnvironmentChecklist};
pub use error::{FlowError, ServiceError};
pub use flow::{FlowStage, FlowState, Step};
pub use services::{
    Ack, BreakdownService, ContextSwitchEvaluator, EnvironmentCheckService, FlowServices,
    SessionLauncher, TaskCreationService,
};
pub use session::{SessionHandle, SessionRequest, SessionType};
pub use signals::{FlowSignal, SignalSink};
pub use task::{Category, CreatedTask, EnergyLevel, Priority, Subtask, SubtaskInput, TaskId};
