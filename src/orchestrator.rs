//! Plan execution.
//!
//! A request is turned into a plan by the language model, parsed, then walked
//! strictly in order. Each `action` step is dispatched to the tool registry and
//! its result folded into a typed `ExecutionContext`. The first failing
//! precondition ends the run.
//!
//! Check-then-create is guarded by a per-attendee lease: a run takes the
//! attendee's lease at `checkAvailability` and keeps it until
//! `scheduleAppointment` has written the booking (or the run ends), so two
//! runs cannot both see the same slot as free. Writing a booking, resolving a
//! date, or switching attendee spends the check: the lease is released and a
//! further booking needs a fresh `checkAvailability`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{DbAppointment, DbPerson};
use crate::error::SchedulingError;
use crate::llm::prompts::build_plan_prompt;
use crate::llm::LanguageModel;
use crate::plan::{self, ParsedPlan, PlanStep, RejectedFragment};
use crate::tools::{ToolName, ToolRegistry};

/// Everything a run has learned so far.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub attendee: Option<DbPerson>,
    pub date: Option<DateTime<Utc>>,
    pub is_available: bool,
    pub appointment: Option<DbAppointment>,
}

#[derive(Debug)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed(SchedulingError),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Outcome of one run.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub context: ExecutionContext,
    pub executed_actions: Vec<ToolName>,
    pub skipped_actions: Vec<String>,
    pub rejected_fragments: Vec<RejectedFragment>,
}

impl RunReport {
    fn failed_before_execution(err: SchedulingError, rejected: Vec<RejectedFragment>) -> Self {
        Self {
            state: RunState::Failed(err),
            context: ExecutionContext::default(),
            executed_actions: Vec::new(),
            skipped_actions: Vec::new(),
            rejected_fragments: rejected,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, RunState::Completed)
    }

    pub fn error(&self) -> Option<&SchedulingError> {
        match &self.state {
            RunState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Completed context, or the failure that ended the run.
    pub fn into_result(self) -> Result<ExecutionContext, SchedulingError> {
        match self.state {
            RunState::Completed => Ok(self.context),
            RunState::Failed(err) => Err(err),
            RunState::Idle | RunState::Running => Err(SchedulingError::Internal(
                "run report taken before the run finished".to_string(),
            )),
        }
    }
}

type LeaseMap = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive hold on one attendee's calendar. Dropping it unlocks and, when
/// no other run holds or waits on the attendee, removes the map entry.
struct Lease {
    attendee_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    leases: Arc<LeaseMap>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's own handle is the last one left.
        self.leases
            .remove_if(&self.attendee_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    model: Arc<dyn LanguageModel>,
    leases: Arc<LeaseMap>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            registry,
            model,
            leases: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Ask the model for a plan and parse it.
    pub async fn plan(&self, request: &str) -> Result<ParsedPlan, SchedulingError> {
        let resolver = self.registry.resolver();
        let prompt = build_plan_prompt(
            request,
            &resolver.now_local_display(),
            resolver.timezone().name(),
        );
        let raw = self.model.generate(&prompt).await?;
        let parsed = plan::parse(&raw);
        log::debug!(
            "Parsed plan: {} steps ({} actions), {} rejected",
            parsed.steps.len(),
            parsed.action_count(),
            parsed.rejected.len()
        );
        Ok(parsed)
    }

    /// Plan and execute a free-text request on behalf of `host_id`.
    pub async fn run(&self, request: &str, host_id: &str) -> RunReport {
        log::info!("Scheduling run started for host {}", host_id);
        let report = match self.plan(request).await {
            Ok(parsed) => self.execute(parsed, host_id).await,
            Err(e) => RunReport::failed_before_execution(e, Vec::new()),
        };
        match &report.state {
            RunState::Completed => log::info!(
                "Scheduling run completed for host {} ({} actions)",
                host_id,
                report.executed_actions.len()
            ),
            RunState::Failed(e) => log::info!(
                "Scheduling run failed for host {}: {:?} ({})",
                host_id,
                e.kind(),
                e
            ),
            _ => {}
        }
        report
    }

    /// Walk an already-parsed plan. A plan with no steps fails as malformed.
    pub async fn execute(&self, parsed: ParsedPlan, host_id: &str) -> RunReport {
        if parsed.is_empty() {
            let reason = if parsed.rejected.is_empty() {
                "the assistant returned no steps".to_string()
            } else {
                format!("none of the {} plan fragments could be read", parsed.rejected.len())
            };
            return RunReport::failed_before_execution(SchedulingError::MalformedPlan(reason), parsed.rejected);
        }

        let run = PlanRun::new(self, host_id);
        run.execute(parsed).await
    }

    async fn acquire_lease(&self, attendee_id: &str) -> Lease {
        let lock = self
            .leases
            .entry(attendee_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        Lease {
            attendee_id: attendee_id.to_string(),
            guard: Some(guard),
            leases: Arc::clone(&self.leases),
        }
    }
}

/// A single pass over a plan. Consumed by `execute`, so it cannot be restarted.
struct PlanRun<'a> {
    orchestrator: &'a Orchestrator,
    host_id: String,
    state: RunState,
    context: ExecutionContext,
    lease: Option<Lease>,
    executed: Vec<ToolName>,
    skipped: Vec<String>,
}

impl<'a> PlanRun<'a> {
    fn new(orchestrator: &'a Orchestrator, host_id: &str) -> Self {
        Self {
            orchestrator,
            host_id: host_id.to_string(),
            state: RunState::Idle,
            context: ExecutionContext::default(),
            lease: None,
            executed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    async fn execute(mut self, parsed: ParsedPlan) -> RunReport {
        self.state = RunState::Running;
        for step in &parsed.steps {
            let PlanStep::Action { action, input } = step else {
                continue;
            };
            if let Err(e) = self.dispatch(action, input).await {
                log::warn!("Action {} failed: {}", action, e);
                self.state = RunState::Failed(e);
                break;
            }
        }
        if !self.state.is_terminal() {
            self.state = RunState::Completed;
        }
        // Dropping the run releases any lease still held.
        self.lease = None;

        RunReport {
            state: self.state,
            context: self.context,
            executed_actions: self.executed,
            skipped_actions: self.skipped,
            rejected_fragments: parsed.rejected,
        }
    }

    async fn dispatch(&mut self, action: &str, input: &Value) -> Result<(), SchedulingError> {
        let tool = ToolName::parse(action);
        let registry = Arc::clone(&self.orchestrator.registry);
        match &tool {
            ToolName::FindAttendee => {
                let name = str_field(input, "name").unwrap_or_default();
                let attendee = registry
                    .find_attendee(name)
                    .await?
                    .ok_or_else(|| SchedulingError::AttendeeNotFound(name.trim().to_string()))?;
                if self.context.attendee.as_ref().map(|a| &a.id) != Some(&attendee.id) {
                    self.spend_check();
                }
                log::debug!("findAttendee matched {}", attendee.id);
                self.context.attendee = Some(attendee);
            }
            ToolName::GetDate => {
                // Resolution may wait on the model; never do that holding a lease.
                self.spend_check();
                let at = registry.resolve_date(input).await?.into_result()?;
                log::debug!("getDate resolved {}", at);
                self.context.date = Some(at);
            }
            ToolName::CheckAvailability => {
                let attendee_id = self
                    .context
                    .attendee
                    .as_ref()
                    .map(|a| a.id.clone())
                    .ok_or(SchedulingError::AttendeeMissing)?;
                let at = self.context.date.ok_or_else(|| {
                    SchedulingError::MalformedInput(
                        "a date is required to check availability".to_string(),
                    )
                })?;
                self.hold_lease(&attendee_id).await;
                let result = registry.check_availability(Some(&attendee_id), Some(at)).await?;
                if !result.is_available {
                    return Err(SchedulingError::AttendeeUnavailable { attendee_id, at });
                }
                self.context.is_available = true;
            }
            ToolName::ScheduleAppointment => {
                let (attendee_id, at) = match (&self.context.attendee, self.context.date) {
                    (Some(attendee), Some(at)) if self.context.is_available => (attendee.id.clone(), at),
                    (None, _) => {
                        return Err(SchedulingError::PreconditionNotMet(
                            "no attendee has been found".to_string(),
                        ))
                    }
                    _ => {
                        return Err(SchedulingError::PreconditionNotMet(
                            "availability has not been confirmed".to_string(),
                        ))
                    }
                };
                let agenda = str_field(input, "agenda").unwrap_or_default();
                let appointment = registry
                    .schedule_appointment(agenda, &attendee_id, &self.host_id, at)
                    .await?;
                self.context.appointment = Some(appointment);
                self.spend_check();
            }
            ToolName::UpdateAppointment | ToolName::FindExistingAppointment | ToolName::Unknown(_) => {
                log::debug!("Skipping action {}", action);
                self.skipped.push(action.to_string());
                return Ok(());
            }
        }
        self.executed.push(tool);
        Ok(())
    }

    /// Forget a confirmed availability and release its lease.
    fn spend_check(&mut self) {
        self.context.is_available = false;
        self.lease = None;
    }

    /// Hold exactly one lease at a time; switching attendee releases the old one.
    async fn hold_lease(&mut self, attendee_id: &str) {
        if let Some(lease) = &self.lease {
            if lease.attendee_id == attendee_id {
                return;
            }
        }
        self.lease = None;
        self.lease = Some(self.orchestrator.acquire_lease(attendee_id).await);
    }
}

fn str_field<'v>(input: &'v Value, key: &str) -> Option<&'v str> {
    input.get(key).and_then(Value::as_str)
}
