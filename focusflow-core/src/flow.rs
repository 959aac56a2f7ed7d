//! Flow state machine: stages, legal transitions and the per-flow working state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::breakdown::BreakdownProposal;
use crate::context_switch::ContextSwitchDecision;
use crate::draft::TaskDraft;
use crate::error::FlowError;
use crate::task::{CreatedTask, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    Draft,
    Creating,
    Created,
    BreakdownRequested,
    BreakdownProposed,
    BreakdownApplied,
    BreakdownDismissed,
    EnvironmentPending,
    EnvironmentSaved,
    EnvironmentSkipped,
    SwitchEvaluating,
    SwitchWarned,
    SwitchClear,
    Proceeding,
    Deferred,
    Cancelled,
    Launching,
    Launched,
    Failed,
}

impl FlowStage {
    pub fn can_transition_to(self, next: FlowStage) -> bool {
        use FlowStage::*;
        matches!(
            (self, next),
            (Draft, Creating)
                | (Creating, Created)
                | (Creating, Draft)
                | (Created, BreakdownRequested)
                | (Created, EnvironmentPending)
                | (BreakdownRequested, BreakdownProposed)
                | (BreakdownRequested, Created)
                | (BreakdownRequested, BreakdownApplied)
                | (BreakdownRequested, BreakdownDismissed)
                | (BreakdownProposed, BreakdownApplied)
                | (BreakdownProposed, BreakdownDismissed)
                | (BreakdownApplied, BreakdownRequested)
                | (BreakdownDismissed, BreakdownRequested)
                | (BreakdownApplied, EnvironmentPending)
                | (BreakdownDismissed, EnvironmentPending)
                | (EnvironmentPending, EnvironmentSaved)
                | (EnvironmentPending, EnvironmentSkipped)
                | (EnvironmentSaved, SwitchEvaluating)
                | (EnvironmentSkipped, SwitchEvaluating)
                | (SwitchEvaluating, SwitchWarned)
                | (SwitchEvaluating, SwitchClear)
                | (SwitchWarned, Proceeding)
                | (SwitchWarned, Deferred)
                | (SwitchWarned, Cancelled)
                | (Proceeding, Launching)
                | (SwitchClear, Launching)
                | (Launching, Launched)
                | (Launching, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowStage::Launched | FlowStage::Failed | FlowStage::Deferred | FlowStage::Cancelled
        )
    }

    /// Stages from which a breakdown may be requested or the session started.
    pub fn accepts_breakdown(self) -> bool {
        matches!(
            self,
            FlowStage::Created | FlowStage::BreakdownApplied | FlowStage::BreakdownDismissed
        )
    }
}

/// Single-flight keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    Breakdown,
    ApplyBreakdown,
    Environment,
    ResolveSwitch,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Breakdown => "breakdown",
            Step::ApplyBreakdown => "apply_breakdown",
            Step::Environment => "environment",
            Step::ResolveSwitch => "resolve_switch",
        }
    }
}

/// Working state owned by exactly one controller.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub id: Uuid,
    /// Reused on every creation attempt of this flow.
    pub request_token: Uuid,
    pub stage: FlowStage,
    pub draft: TaskDraft,
    pub previous_task_id: Option<TaskId>,
    current_task: Option<CreatedTask>,
    start_immediately: Option<bool>,
    pub pending_breakdown: Option<BreakdownProposal>,
    pub pending_switch: Option<ContextSwitchDecision>,
    launch_attempted: bool,
    in_flight: HashSet<Step>,
    pub failure: Option<String>,
}

impl FlowState {
    pub fn new(draft: TaskDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_token: Uuid::new_v4(),
            stage: FlowStage::Draft,
            draft,
            previous_task_id: None,
            current_task: None,
            start_immediately: None,
            pending_breakdown: None,
            pending_switch: None,
            launch_attempted: false,
            in_flight: HashSet::new(),
            failure: None,
        }
    }

    pub fn advance(&mut self, next: FlowStage, action: &'static str) -> Result<(), FlowError> {
        if !self.stage.can_transition_to(next) {
            return Err(FlowError::InvalidTransition {
                action,
                stage: self.stage,
            });
        }
        self.stage = next;
        Ok(())
    }

    pub fn current_task(&self) -> Option<&CreatedTask> {
        self.current_task.as_ref()
    }

    pub fn current_task_mut(&mut self) -> Option<&mut CreatedTask> {
        self.current_task.as_mut()
    }

    pub fn current_task_id(&self) -> Option<TaskId> {
        self.current_task.as_ref().map(|t| t.id)
    }

    /// The task id is assigned once per flow.
    pub fn set_task(&mut self, task: CreatedTask) -> Result<(), FlowError> {
        if self.current_task.is_some() {
            return Err(FlowError::InvalidTransition {
                action: "record created task",
                stage: self.stage,
            });
        }
        self.current_task = Some(task);
        Ok(())
    }

    /// First captured value sticks for the lifetime of the flow.
    pub fn capture_start_immediately(&mut self, requested: bool) -> bool {
        *self.start_immediately.get_or_insert(requested)
    }

    pub fn start_immediately(&self) -> bool {
        self.start_immediately.unwrap_or(false)
    }

    /// Reserve the one launch this flow is allowed.
    pub fn claim_launch(&mut self) -> Result<TaskId, FlowError> {
        let Some(task_id) = self.current_task_id() else {
            return Err(FlowError::InvalidTransition {
                action: "launch without a task",
                stage: self.stage,
            });
        };
        if self.launch_attempted {
            return Err(FlowError::InvalidTransition {
                action: "launch twice",
                stage: self.stage,
            });
        }
        self.launch_attempted = true;
        Ok(task_id)
    }

    pub fn launch_attempted(&self) -> bool {
        self.launch_attempted
    }

    /// `false` when the step is already running.
    pub fn begin(&mut self, step: Step) -> bool {
        self.in_flight.insert(step)
    }

    pub fn finish(&mut self, step: Step) {
        self.in_flight.remove(&step);
    }

    pub fn is_in_flight(&self, step: Step) -> bool {
        self.in_flight.contains(&step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use FlowStage::*;
        let path = [
            Draft, Creating, Created, EnvironmentPending, EnvironmentSkipped,
            SwitchEvaluating, SwitchWarned, Proceeding, Launching, Launched,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_stages_go_nowhere() {
        use FlowStage::*;
        for stage in [Launched, Failed, Deferred, Cancelled] {
            assert!(stage.is_terminal());
            assert!(!stage.can_transition_to(Launching));
            assert!(!stage.can_transition_to(Draft));
        }
        assert!(!SwitchWarned.can_transition_to(Launching));
        assert!(!Created.can_transition_to(Creating));
    }

    #[test]
    fn session_can_start_after_a_breakdown() {
        use FlowStage::*;
        for stage in [Created, BreakdownApplied, BreakdownDismissed] {
            assert!(stage.accepts_breakdown());
            assert!(stage.can_transition_to(EnvironmentPending), "{stage:?}");
        }
        assert!(!BreakdownProposed.can_transition_to(EnvironmentPending));
        assert!(!BreakdownRequested.can_transition_to(EnvironmentPending));
    }

    #[test]
    fn task_is_recorded_once() {
        let mut st = FlowState::new(TaskDraft::new("x"));
        st.set_task(CreatedTask::new(1, "x")).unwrap();
        assert!(st.set_task(CreatedTask::new(2, "x")).is_err());
        assert_eq!(st.current_task_id(), Some(TaskId(1)));
    }

    #[test]
    fn launch_can_be_claimed_once_and_only_with_a_task() {
        let mut st = FlowState::new(TaskDraft::new("x"));
        assert!(st.claim_launch().is_err());
        st.set_task(CreatedTask::new(5, "x")).unwrap();
        assert_eq!(st.claim_launch().unwrap(), TaskId(5));
        assert!(st.claim_launch().is_err());
    }

    #[test]
    fn immediate_flag_sticks_after_first_capture() {
        let mut st = FlowState::new(TaskDraft::new("x"));
        assert!(st.capture_start_immediately(true));
        assert!(st.capture_start_immediately(false));
        assert!(st.start_immediately());
    }

    #[test]
    fn single_flight_bookkeeping() {
        let mut st = FlowState::new(TaskDraft::new("x"));
        assert!(st.begin(Step::Create));
        assert!(!st.begin(Step::Create));
        assert!(st.begin(Step::Breakdown));
        st.finish(Step::Create);
        assert!(!st.is_in_flight(Step::Create));
        assert!(st.begin(Step::Create));
    }
}
