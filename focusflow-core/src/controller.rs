//! Orchestration controller: drives one task-creation attempt from draft to
//! focus session.
//!
//! Every remote call goes through here. The controller:
//! - owns the `FlowState` and is the only place that advances the stage
//! - ignores a second trigger of a step that is still running (single-flight)
//! - wraps each call in a watchdog timeout
//! - treats the environment save and switch evaluation as fail-open
//! - launches at most once, and never retries creation or launch by itself

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::breakdown::{BreakdownProposal, ComplexityLevel};
use crate::context_switch::{ContextSwitchDecision, SwitchResolution};
use crate::draft::TaskDraft;
use crate::environment::{EnvironmentCheckRecord, EnvironmentChecklist};
use crate::error::{FlowError, ServiceError};
use crate::flow::{FlowStage, FlowState, Step};
use crate::services::FlowServices;
use crate::session::SessionRequest;
use crate::signals::{FlowSignal, SignalSink};
use crate::task::{CreatedTask, Subtask, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Upper bound for any single remote call.
    pub step_timeout: Duration,
    /// Session length when the draft carries no estimate.
    pub default_session_minutes: i32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            default_session_minutes: 25,
        }
    }
}

/// Result of triggering a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The step ran; the flow now sits at this stage.
    Advanced(FlowStage),
    /// The same step was already running; nothing happened.
    AlreadyInFlight,
}

pub struct OrchestrationController {
    state: Mutex<FlowState>,
    services: FlowServices,
    config: FlowConfig,
    signals: SignalSink,
}

struct InFlight<'a> {
    state: &'a Mutex<FlowState>,
    step: Step,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.state).finish(self.step);
    }
}

fn lock(state: &Mutex<FlowState>) -> MutexGuard<'_, FlowState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrchestrationController {
    pub fn new(
        draft: TaskDraft,
        services: FlowServices,
        config: FlowConfig,
    ) -> (Self, mpsc::UnboundedReceiver<FlowSignal>) {
        let (signals, rx) = SignalSink::channel();
        let controller = Self {
            state: Mutex::new(FlowState::new(draft)),
            services,
            config,
            signals,
        };
        (controller, rx)
    }

    /// Task the user was working on before this one, for switch detection.
    pub fn with_previous_task(self, previous: Option<TaskId>) -> Self {
        lock(&self.state).previous_task_id = previous;
        self
    }

    pub fn flow_id(&self) -> Uuid {
        lock(&self.state).id
    }

    pub fn stage(&self) -> FlowStage {
        lock(&self.state).stage
    }

    pub fn task_id(&self) -> Option<TaskId> {
        lock(&self.state).current_task_id()
    }

    pub fn created_task(&self) -> Option<CreatedTask> {
        lock(&self.state).current_task().cloned()
    }

    pub fn draft(&self) -> TaskDraft {
        lock(&self.state).draft.clone()
    }

    pub fn start_immediately(&self) -> bool {
        lock(&self.state).start_immediately()
    }

    pub fn pending_breakdown(&self) -> Option<BreakdownProposal> {
        lock(&self.state).pending_breakdown.clone()
    }

    pub fn pending_switch(&self) -> Option<ContextSwitchDecision> {
        lock(&self.state).pending_switch.clone()
    }

    pub fn failure(&self) -> Option<String> {
        lock(&self.state).failure.clone()
    }

    /// Edit the draft. Only allowed before submission.
    pub fn update_draft(&self, edit: impl FnOnce(&mut TaskDraft)) -> Result<(), FlowError> {
        let mut st = lock(&self.state);
        if st.stage != FlowStage::Draft || st.is_in_flight(Step::Create) {
            return Err(FlowError::DraftFrozen);
        }
        edit(&mut st.draft);
        Ok(())
    }

    /// Submit the draft and create the task.
    ///
    /// On success the flow is `Created`, or `EnvironmentPending` when an
    /// immediate start was requested. On a remote failure the flow returns to
    /// `Draft` and waits for the user to retry.
    pub async fn submit(&self, start_immediately: bool) -> Result<Progress, FlowError> {
        self.create(start_immediately, true).await
    }

    async fn create(&self, start_immediately: bool, advance: bool) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::Create) else {
            return Ok(Progress::AlreadyInFlight);
        };

        let (request, token, flow_id) = {
            let mut st = lock(&self.state);
            if st.current_task().is_some() || st.stage != FlowStage::Draft {
                return Err(FlowError::InvalidTransition {
                    action: "submit",
                    stage: st.stage,
                });
            }
            if let Err(msg) = st.draft.validate() {
                self.signals.emit(FlowSignal::Error(msg.clone()));
                return Err(FlowError::Validation(msg));
            }
            let immediate = st.capture_start_immediately(start_immediately);
            if immediate != start_immediately {
                warn!(flow_id = %st.id, "immediate-start flag already captured; keeping {immediate}");
            }
            self.transition(&mut st, FlowStage::Creating, "submit")?;
            (st.draft.to_request(), st.request_token, st.id)
        };

        let task = match self.call(self.services.tasks.create_task(&request, token)).await {
            Ok(task) => task,
            Err(e) => {
                warn!(%flow_id, step = Step::Create.name(), "task creation failed: {e}");
                let mut st = lock(&self.state);
                self.transition(&mut st, FlowStage::Draft, "recover from failed creation")?;
                let err = FlowError::from_service(e);
                self.signals.emit(FlowSignal::Error(err.to_string()));
                return Err(err);
            }
        };

        let (task_id, subtasks) = {
            let mut st = lock(&self.state);
            let task_id = task.id;
            st.set_task(task)?;
            self.transition(&mut st, FlowStage::Created, "record created task")?;
            (task_id, st.draft.submittable_subtasks())
        };
        info!(%flow_id, %task_id, "task created");
        self.signals.emit(FlowSignal::TaskCreated(task_id));

        if !subtasks.is_empty() {
            let saved = self
                .call(self.services.tasks.create_subtasks(task_id, &subtasks))
                .await;
            self.record_subtasks(task_id, saved);
        }

        let mut st = lock(&self.state);
        if advance && st.start_immediately() {
            self.transition(&mut st, FlowStage::EnvironmentPending, "await environment check")?;
        }
        Ok(Progress::Advanced(st.stage))
    }

    /// Move on to the environment check once breakdown work is done. Only
    /// flows submitted with an immediate start may do this.
    pub fn start_session(&self) -> Result<Progress, FlowError> {
        let mut st = lock(&self.state);
        let ready = st.stage.accepts_breakdown()
            && st.start_immediately()
            && !st.is_in_flight(Step::ApplyBreakdown);
        if !ready {
            return Err(FlowError::InvalidTransition {
                action: "start session",
                stage: st.stage,
            });
        }
        self.transition(&mut st, FlowStage::EnvironmentPending, "await environment check")?;
        Ok(Progress::Advanced(st.stage))
    }

    /// Ask for an AI breakdown of the created task. The result is held as a
    /// proposal until `apply_breakdown` or `dismiss_breakdown`.
    pub async fn request_breakdown(&self, complexity: ComplexityLevel) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::Breakdown) else {
            return Ok(Progress::AlreadyInFlight);
        };

        let (task_id, resume) = {
            let mut st = lock(&self.state);
            let task_id = match st.current_task_id() {
                Some(id) if st.stage.accepts_breakdown() && !st.is_in_flight(Step::ApplyBreakdown) => id,
                _ => {
                    return Err(FlowError::InvalidTransition {
                        action: "request breakdown",
                        stage: st.stage,
                    });
                }
            };
            let resume = st.stage;
            self.transition(&mut st, FlowStage::BreakdownRequested, "request breakdown")?;
            (task_id, resume)
        };

        let result = self
            .call(self.services.breakdown.request_breakdown(task_id, complexity))
            .await;

        let mut st = lock(&self.state);
        match result {
            Ok(proposal) => {
                debug!(%task_id, count = proposal.subtasks.len(), "breakdown proposed");
                st.pending_breakdown = Some(proposal.clone());
                self.transition(&mut st, FlowStage::BreakdownProposed, "propose breakdown")?;
                self.signals.emit(FlowSignal::BreakdownProposed(proposal));
                Ok(Progress::Advanced(st.stage))
            }
            Err(e) => {
                warn!(%task_id, step = Step::Breakdown.name(), "breakdown unavailable: {e}");
                self.transition(&mut st, resume, "recover from failed breakdown")?;
                let err = FlowError::BreakdownUnavailable(e.to_string());
                self.signals.emit(FlowSignal::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Create the task first when still drafting, then request a breakdown.
    /// With `start_immediately` the flow continues through `start_session`
    /// once the proposal is applied or dismissed.
    pub async fn breakdown_draft(
        &self,
        complexity: ComplexityLevel,
        start_immediately: bool,
    ) -> Result<Progress, FlowError> {
        if self.stage() == FlowStage::Draft {
            if let Progress::AlreadyInFlight = self.create(start_immediately, false).await? {
                return Ok(Progress::AlreadyInFlight);
            }
        }
        self.request_breakdown(complexity).await
    }

    /// Replace the task's subtasks with the proposal, locally and remotely.
    ///
    /// A persistence failure is reported through the error signal; the local
    /// subtasks still reflect the applied proposal.
    pub async fn apply_breakdown(&self) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::ApplyBreakdown) else {
            return Ok(Progress::AlreadyInFlight);
        };

        let (task_id, existing, inputs) = {
            let mut st = lock(&self.state);
            let task = match st.current_task() {
                Some(task) if st.stage == FlowStage::BreakdownProposed => task,
                _ => {
                    return Err(FlowError::InvalidTransition {
                        action: "apply breakdown",
                        stage: st.stage,
                    });
                }
            };
            let (task_id, existing) = (task.id, task.subtasks.clone());
            let inputs = st
                .pending_breakdown
                .take()
                .map(|p| p.to_inputs())
                .unwrap_or_default();
            st.draft.subtasks = inputs.clone();
            self.transition(&mut st, FlowStage::BreakdownApplied, "apply breakdown")?;
            (task_id, existing, inputs)
        };

        if !inputs.is_empty() || !existing.is_empty() {
            let saved = self
                .call(self.services.tasks.replace_subtasks(task_id, &existing, &inputs))
                .await;
            self.record_subtasks(task_id, saved);
        }
        Ok(Progress::Advanced(FlowStage::BreakdownApplied))
    }

    pub fn dismiss_breakdown(&self) -> Result<Progress, FlowError> {
        let mut st = lock(&self.state);
        if st.stage != FlowStage::BreakdownProposed {
            return Err(FlowError::InvalidTransition {
                action: "dismiss breakdown",
                stage: st.stage,
            });
        }
        st.pending_breakdown = None;
        self.transition(&mut st, FlowStage::BreakdownDismissed, "dismiss breakdown")?;
        Ok(Progress::Advanced(st.stage))
    }

    /// Record the checklist, then continue to switch evaluation and launch.
    /// A failed save is surfaced but does not stop the flow.
    pub async fn save_environment(&self, checklist: EnvironmentChecklist) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::Environment) else {
            return Ok(Progress::AlreadyInFlight);
        };

        let task_id = self.expect_stage(FlowStage::EnvironmentPending, "save environment check")?;
        let record = EnvironmentCheckRecord::new(task_id, checklist);

        let result = self.call(self.services.environment.save_check(&record)).await;

        {
            let mut st = lock(&self.state);
            match result {
                Ok(_) => {
                    self.transition(&mut st, FlowStage::EnvironmentSaved, "save environment check")?;
                }
                Err(e) => {
                    self.fail_open(task_id, Step::Environment, "environment check not saved", &e);
                    self.signals
                        .emit(FlowSignal::Error(format!("environment check not saved: {e}")));
                    self.transition(&mut st, FlowStage::EnvironmentSkipped, "skip environment check")?;
                }
            }
        }

        self.evaluate_and_launch().await
    }

    /// Continue without recording a checklist.
    pub async fn skip_environment(&self) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::Environment) else {
            return Ok(Progress::AlreadyInFlight);
        };

        self.expect_stage(FlowStage::EnvironmentPending, "skip environment check")?;
        {
            let mut st = lock(&self.state);
            self.transition(&mut st, FlowStage::EnvironmentSkipped, "skip environment check")?;
        }

        self.evaluate_and_launch().await
    }

    /// The user's answer to a switch warning.
    pub async fn resolve_switch(&self, resolution: SwitchResolution) -> Result<Progress, FlowError> {
        let Some(_guard) = self.begin(Step::ResolveSwitch) else {
            return Ok(Progress::AlreadyInFlight);
        };

        let task_id = self.expect_stage(FlowStage::SwitchWarned, "resolve context switch")?;

        match resolution {
            SwitchResolution::Proceed { note } => {
                let switch_id = {
                    let mut st = lock(&self.state);
                    self.transition(&mut st, FlowStage::Proceeding, "proceed with switch")?;
                    st.pending_switch.as_ref().map(|d| d.switch.id)
                };
                if let Some(switch_id) = switch_id {
                    let confirmed = self
                        .call(self.services.switches.confirm_switch(switch_id, note.as_deref()))
                        .await;
                    if let Err(e) = confirmed {
                        self.fail_open(task_id, Step::ResolveSwitch, "switch confirmation not recorded", &e);
                    }
                }
                self.launch().await
            }
            SwitchResolution::Defer => {
                let mut st = lock(&self.state);
                self.transition(&mut st, FlowStage::Deferred, "defer session")?;
                Ok(Progress::Advanced(st.stage))
            }
            SwitchResolution::Cancel => {
                let mut st = lock(&self.state);
                self.transition(&mut st, FlowStage::Cancelled, "cancel session")?;
                Ok(Progress::Advanced(st.stage))
            }
        }
    }

    async fn evaluate_and_launch(&self) -> Result<Progress, FlowError> {
        let (task_id, previous) = {
            let mut st = lock(&self.state);
            self.transition(&mut st, FlowStage::SwitchEvaluating, "evaluate context switch")?;
            let Some(task_id) = st.current_task_id() else {
                return Err(FlowError::InvalidTransition {
                    action: "evaluate context switch",
                    stage: st.stage,
                });
            };
            (task_id, st.previous_task_id)
        };

        let decision = match self.call(self.services.switches.evaluate(task_id, previous)).await {
            Ok(decision) => decision,
            Err(e) => {
                self.fail_open(task_id, Step::Environment, "context switch evaluation failed, treating as no switch", &e);
                None
            }
        };
        self.signals.emit(FlowSignal::SwitchDecision(decision.clone()));

        match decision {
            Some(d) if d.requires_confirmation() => {
                info!(%task_id, cost = d.switch.estimated_cost_minutes, "context switch warning");
                let mut st = lock(&self.state);
                st.pending_switch = Some(d);
                self.transition(&mut st, FlowStage::SwitchWarned, "warn about switch")?;
                Ok(Progress::Advanced(st.stage))
            }
            _ => {
                {
                    let mut st = lock(&self.state);
                    self.transition(&mut st, FlowStage::SwitchClear, "clear switch")?;
                }
                self.launch().await
            }
        }
    }

    async fn launch(&self) -> Result<Progress, FlowError> {
        let request = {
            let mut st = lock(&self.state);
            let task_id = st.claim_launch()?;
            self.transition(&mut st, FlowStage::Launching, "launch session")?;
            let title = st
                .current_task()
                .map(|t| t.title.clone())
                .unwrap_or_else(|| st.draft.title.trim().to_string());
            SessionRequest::work(
                task_id,
                title,
                st.draft.estimated_minutes,
                self.config.default_session_minutes,
            )
        };

        let result = self.call(self.services.sessions.launch(&request)).await;

        let mut st = lock(&self.state);
        match result {
            Ok(handle) => {
                info!(task_id = %request.task_id, session_id = handle.id, "focus session launched");
                self.transition(&mut st, FlowStage::Launched, "launch session")?;
                self.signals.emit(FlowSignal::SessionLaunched(handle));
                Ok(Progress::Advanced(st.stage))
            }
            Err(e) => {
                error!(task_id = %request.task_id, "focus session launch failed: {e}");
                st.failure = Some(e.to_string());
                self.transition(&mut st, FlowStage::Failed, "fail launch")?;
                let err = FlowError::Launch(e.to_string());
                self.signals.emit(FlowSignal::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn record_subtasks(&self, task_id: TaskId, saved: Result<Vec<Subtask>, ServiceError>) {
        match saved {
            Ok(saved) => {
                debug!(%task_id, count = saved.len(), "subtasks saved");
                if let Some(task) = lock(&self.state).current_task_mut() {
                    task.subtasks = saved;
                }
            }
            Err(e) => {
                self.fail_open(task_id, Step::ApplyBreakdown, "subtasks not saved", &e);
                self.signals
                    .emit(FlowSignal::Error(format!("subtasks not saved: {e}")));
            }
        }
    }

    /// Log a failure the flow continues past. Transport trouble is expected;
    /// anything else means the backend disagreed with us.
    fn fail_open(&self, task_id: TaskId, step: Step, what: &str, e: &ServiceError) {
        if e.is_transport() {
            warn!(%task_id, step = step.name(), "{what}: {e}");
        } else {
            error!(%task_id, step = step.name(), "{what}: {e}");
        }
    }

    fn expect_stage(&self, stage: FlowStage, action: &'static str) -> Result<TaskId, FlowError> {
        let st = lock(&self.state);
        match st.current_task_id() {
            Some(task_id) if st.stage == stage => Ok(task_id),
            _ => Err(FlowError::InvalidTransition {
                action,
                stage: st.stage,
            }),
        }
    }

    fn transition(&self, st: &mut FlowState, next: FlowStage, action: &'static str) -> Result<(), FlowError> {
        let from = st.stage;
        st.advance(next, action)?;
        info!(flow_id = %st.id, ?from, to = ?next, "flow stage");
        self.signals.emit(FlowSignal::StageChanged(next));
        Ok(())
    }

    fn begin(&self, step: Step) -> Option<InFlight<'_>> {
        let mut st = lock(&self.state);
        if !st.begin(step) {
            debug!(flow_id = %st.id, step = step.name(), "step already in flight; ignoring");
            return None;
        }
        Some(InFlight {
            state: &self.state,
            step,
        })
    }

    /// One remote call: loading signals around it, bounded by the watchdog.
    async fn call<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        self.signals.emit(FlowSignal::Loading(true));
        let result = match tokio::time::timeout(self.config.step_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.config.step_timeout.as_secs())),
        };
        self.signals.emit(FlowSignal::Loading(false));
        result
    }
}
