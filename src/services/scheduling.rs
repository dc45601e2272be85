// Scheduling service: free-text booking and rescheduling on behalf of a caller.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{AppointmentStatus, DbAppointment, DbAvailability, DbPerson, PersonWithRelations};
use crate::error::{SchedulingError, SchedulingFailure};
use crate::orchestrator::Orchestrator;
use crate::store::RecordStore;
use crate::util::{format_timestamp, parse_timestamp};

use super::people::{self, AvailabilityInput};
use super::to_failure;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSummary {
    pub id: String,
    pub host_id: String,
    pub attendee_id: String,
    pub attendee_name: Option<String>,
    pub date: String,
    pub duration_minutes: i64,
    pub agenda: String,
    pub status: AppointmentStatus,
}

impl AppointmentSummary {
    fn from_appointment(appointment: &DbAppointment, attendee_name: Option<String>) -> Self {
        Self {
            id: appointment.id.clone(),
            host_id: appointment.host_id.clone(),
            attendee_id: appointment.attendee_id.clone(),
            attendee_name,
            date: format_timestamp(&appointment.date),
            duration_minutes: appointment.effective_duration_minutes(),
            agenda: appointment.agenda.clone(),
            status: appointment.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuccess {
    pub message: String,
    pub code: u16,
    /// Absent when the plan completed without booking anything.
    pub appointment: Option<AppointmentSummary>,
    /// Plan fragments the assistant produced that could not be read.
    pub dropped_fragments: usize,
}

#[derive(Clone)]
pub struct SchedulingService {
    store: Arc<dyn RecordStore>,
    orchestrator: Arc<Orchestrator>,
}

impl SchedulingService {
    pub fn new(store: Arc<dyn RecordStore>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { store, orchestrator }
    }

    /// Plan and book a free-text request for `host_id`.
    pub async fn schedule_from_text(
        &self,
        host_id: &str,
        request: &str,
    ) -> Result<ScheduleSuccess, SchedulingFailure> {
        self.try_schedule(host_id, request)
            .await
            .map_err(|e| to_failure("Scheduling request", &e))
    }

    async fn try_schedule(&self, host_id: &str, request: &str) -> Result<ScheduleSuccess, SchedulingError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(SchedulingError::MalformedInput("the request is empty".to_string()));
        }
        if self.store.get_person(host_id).await?.is_none() {
            return Err(SchedulingError::PersonNotFound(host_id.to_string()));
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let request = request.to_string();
        let host = host_id.to_string();
        // A panicking run surfaces as a join error instead of taking the caller down.
        let report = tokio::spawn(async move { orchestrator.run(&request, &host).await })
            .await
            .map_err(|e| SchedulingError::Internal(format!("scheduling task failed: {}", e)))?;

        let dropped_fragments = report.rejected_fragments.len();
        let context = report.into_result()?;
        let attendee_name = context.attendee.as_ref().map(|a| a.name.clone());
        let appointment = context
            .appointment
            .as_ref()
            .map(|a| AppointmentSummary::from_appointment(a, attendee_name));

        let message = if appointment.is_some() {
            "Scheduled Appointment"
        } else {
            "Nothing was scheduled"
        };
        Ok(ScheduleSuccess {
            message: message.to_string(),
            code: 200,
            appointment,
            dropped_fragments,
        })
    }

    /// Move an existing appointment. Availability is not re-checked.
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        new_date: &str,
    ) -> Result<AppointmentSummary, SchedulingFailure> {
        self.try_reschedule(appointment_id, new_date)
            .await
            .map_err(|e| to_failure("Reschedule", &e))
    }

    async fn try_reschedule(
        &self,
        appointment_id: &str,
        new_date: &str,
    ) -> Result<AppointmentSummary, SchedulingError> {
        let at = parse_timestamp(new_date).map_err(|e| {
            SchedulingError::MalformedInput(format!("{:?} is not an RFC 3339 timestamp: {}", new_date, e))
        })?;
        let registry = self.orchestrator.registry();
        let existing = registry
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::AppointmentNotFound(appointment_id.to_string()))?;
        let moved = registry.update_appointment(&existing.id, at).await?;
        log::info!(
            "Rescheduled appointment {} from {} to {}",
            moved.id,
            format_timestamp(&existing.date),
            format_timestamp(&moved.date)
        );
        let attendee_name = self.store.get_person(&moved.attendee_id).await?.map(|p| p.name);
        Ok(AppointmentSummary::from_appointment(&moved, attendee_name))
    }

    pub async fn register_person(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<DbPerson, SchedulingFailure> {
        people::register_person(self.store.as_ref(), email, name)
            .await
            .map_err(|e| to_failure("Person registration", &e))
    }

    pub async fn set_availability(
        &self,
        person_id: &str,
        input: &AvailabilityInput,
    ) -> Result<DbAvailability, SchedulingFailure> {
        people::set_availability(self.store.as_ref(), person_id, input)
            .await
            .map_err(|e| to_failure("Availability update", &e))
    }

    pub async fn get_profile(&self, person_id: &str) -> Result<PersonWithRelations, SchedulingFailure> {
        people::get_profile(self.store.as_ref(), person_id)
            .await
            .map_err(|e| to_failure("Profile lookup", &e))
    }
}
