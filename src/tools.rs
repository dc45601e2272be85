//! The fixed tool API a plan may call.
//!
//! Each tool checks its own preconditions and fails with a named
//! `SchedulingError`; none of them retry.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::availability::{self, AvailabilityResult};
use crate::db::{DbAppointment, DbError, DbPerson, NewAppointment, MAX_DURATION_MINUTES};
use crate::error::SchedulingError;
use crate::store::RecordStore;
use crate::time_resolver::{DateQuery, ResolvedTime, TimeResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolName {
    FindAttendee,
    GetDate,
    CheckAvailability,
    ScheduleAppointment,
    UpdateAppointment,
    FindExistingAppointment,
    Unknown(String),
}

impl ToolName {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "findAttendee" => ToolName::FindAttendee,
            "getDate" => ToolName::GetDate,
            "checkAvailability" => ToolName::CheckAvailability,
            "scheduleAppointment" => ToolName::ScheduleAppointment,
            // Older prompts spelled it without the second 't'.
            "updateAppointment" | "updateAppoinment" => ToolName::UpdateAppointment,
            "findExistingAppointment" => ToolName::FindExistingAppointment,
            other => ToolName::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ToolName::FindAttendee => "findAttendee",
            ToolName::GetDate => "getDate",
            ToolName::CheckAvailability => "checkAvailability",
            ToolName::ScheduleAppointment => "scheduleAppointment",
            ToolName::UpdateAppointment => "updateAppointment",
            ToolName::FindExistingAppointment => "findExistingAppointment",
            ToolName::Unknown(name) => name,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ToolRegistry {
    store: Arc<dyn RecordStore>,
    resolver: TimeResolver,
    default_duration_minutes: i64,
}

impl ToolRegistry {
    /// `default_duration_minutes` is clamped to `1..=MAX_DURATION_MINUTES`.
    pub fn new(store: Arc<dyn RecordStore>, resolver: TimeResolver, default_duration_minutes: i64) -> Self {
        let clamped = default_duration_minutes.clamp(1, MAX_DURATION_MINUTES);
        if clamped != default_duration_minutes {
            log::warn!(
                "Booking duration {} out of range, using {} minutes",
                default_duration_minutes,
                clamped
            );
        }
        Self {
            store,
            resolver,
            default_duration_minutes: clamped,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn resolver(&self) -> &TimeResolver {
        &self.resolver
    }

    pub fn timezone(&self) -> Tz {
        self.resolver.timezone()
    }

    /// First person, in insertion order, whose trimmed name matches case-insensitively.
    pub async fn find_attendee(&self, name: &str) -> Result<Option<DbPerson>, SchedulingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchedulingError::MalformedInput(
                "a name is required to find an attendee".to_string(),
            ));
        }
        Ok(self.store.find_person_by_name(name).await?)
    }

    /// Resolve a `getDate` input. Strategy is chosen by the input's shape.
    pub async fn resolve_date(&self, input: &Value) -> Result<ResolvedTime, SchedulingError> {
        let query = DateQuery::from_input(input)?;
        Ok(self.resolver.resolve(&query).await?)
    }

    pub async fn check_availability(
        &self,
        attendee_id: Option<&str>,
        at: Option<DateTime<Utc>>,
    ) -> Result<AvailabilityResult, SchedulingError> {
        let attendee_id = non_empty(attendee_id).ok_or_else(|| {
            SchedulingError::MalformedInput("attendee id is required to check availability".to_string())
        })?;
        let at = at.ok_or_else(|| {
            SchedulingError::MalformedInput("a date is required to check availability".to_string())
        })?;
        Ok(availability::check_availability(self.store.as_ref(), attendee_id, at, self.timezone()).await?)
    }

    /// Create a SCHEDULED appointment. No idempotency: repeated calls create repeats.
    pub async fn schedule_appointment(
        &self,
        agenda: &str,
        attendee_id: &str,
        host_id: &str,
        at: DateTime<Utc>,
    ) -> Result<DbAppointment, SchedulingError> {
        let attendee_id = non_empty(Some(attendee_id))
            .ok_or_else(|| SchedulingError::MalformedInput("attendee id is required".to_string()))?;
        let host_id = non_empty(Some(host_id))
            .ok_or_else(|| SchedulingError::MalformedInput("host id is required".to_string()))?;

        let appointment = self
            .store
            .create_appointment(&NewAppointment {
                host_id: host_id.to_string(),
                attendee_id: attendee_id.to_string(),
                date: at,
                duration_minutes: Some(self.default_duration_minutes),
                agenda: agenda.trim().to_string(),
            })
            .await?;
        log::info!(
            "Scheduled appointment {} ({} with {} at {})",
            appointment.id,
            host_id,
            attendee_id,
            at
        );
        Ok(appointment)
    }

    /// Move an appointment and mark it RESCHEDULED. Availability is not re-checked.
    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        at: DateTime<Utc>,
    ) -> Result<DbAppointment, SchedulingError> {
        let appointment_id = non_empty(Some(appointment_id))
            .ok_or_else(|| SchedulingError::MalformedInput("appointment id is required".to_string()))?;
        match self.store.update_appointment_date(appointment_id, at).await {
            Ok(appointment) => Ok(appointment),
            Err(DbError::AppointmentNotFound(id)) => Err(SchedulingError::AppointmentNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Option<DbAppointment>, SchedulingError> {
        let appointment_id = non_empty(Some(appointment_id))
            .ok_or_else(|| SchedulingError::MalformedInput("appointment id is required".to_string()))?;
        Ok(self.store.get_appointment(appointment_id).await?)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::db::AppointmentStatus;
    use crate::llm::testing::ScriptedModel;
    use crate::store::test_support::{add_person, test_store};
    use chrono::TimeZone;
    use serde_json::json;

    async fn registry() -> ToolRegistry {
        let store = test_store();
        add_person(&store, "host", "Hana Host").await;
        add_person(&store, "jd", "John Doe").await;
        store.upsert_availability("jd", 9, 17, &[1, 2, 3, 4, 5]).await.unwrap();
        test_registry(Arc::new(store), Arc::new(ScriptedModel::new(vec![])))
    }

    fn tuesday_10() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_tool_names_and_alias() {
        assert_eq!(ToolName::parse("findAttendee"), ToolName::FindAttendee);
        assert_eq!(ToolName::parse("updateAppoinment"), ToolName::UpdateAppointment);
        assert_eq!(ToolName::UpdateAppointment.as_str(), "updateAppointment");
        assert_eq!(
            ToolName::parse("sendInvite"),
            ToolName::Unknown("sendInvite".to_string())
        );
    }

    #[tokio::test]
    async fn test_find_attendee_distinguishes_empty_from_missing() {
        let tools = registry().await;
        assert!(matches!(
            tools.find_attendee("   ").await,
            Err(SchedulingError::MalformedInput(_))
        ));
        assert!(tools.find_attendee("Jane").await.unwrap().is_none());
        let found = tools.find_attendee("  JOHN doe ").await.unwrap().unwrap();
        assert_eq!(found.id, "jd");
    }

    #[tokio::test]
    async fn test_resolve_date_deterministic() {
        let tools = registry().await;
        let resolved = tools
            .resolve_date(&json!({"day": "tomorrow", "time": "10am"}))
            .await
            .unwrap();
        assert_eq!(resolved, ResolvedTime::Resolved(tuesday_10()));
        assert!(matches!(
            tools.resolve_date(&json!({})).await,
            Err(SchedulingError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_check_availability_requires_both_inputs() {
        let tools = registry().await;
        assert!(matches!(
            tools.check_availability(None, Some(tuesday_10())).await,
            Err(SchedulingError::MalformedInput(_))
        ));
        assert!(matches!(
            tools.check_availability(Some("jd"), None).await,
            Err(SchedulingError::MalformedInput(_))
        ));
        let result = tools.check_availability(Some("jd"), Some(tuesday_10())).await.unwrap();
        assert!(result.is_available);
    }

    #[tokio::test]
    async fn test_direct_scheduling_is_not_idempotent() {
        let tools = registry().await;
        let a = tools.schedule_appointment("Sync", "jd", "host", tuesday_10()).await.unwrap();
        let b = tools.schedule_appointment("Sync", "jd", "host", tuesday_10()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, AppointmentStatus::Scheduled);
        assert_eq!(a.duration_minutes, Some(30));

        let profile = tools.store().get_person_with_relations("jd").await.unwrap().unwrap();
        assert_eq!(profile.attending_appointments.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_duration_is_clamped_and_checkable() {
        let store = test_store();
        add_person(&store, "host", "Hana Host").await;
        add_person(&store, "jd", "John Doe").await;
        store.upsert_availability("jd", 9, 17, &[1, 2, 3, 4, 5]).await.unwrap();
        let resolver = TimeResolver::new(Arc::new(ScriptedModel::new(vec![])), chrono_tz::UTC)
            .with_clock(pinned_clock());
        let tools = ToolRegistry::new(Arc::new(store), resolver, 1_000_000_000_000);

        let booked = tools.schedule_appointment("Long", "jd", "host", tuesday_10()).await.unwrap();
        assert_eq!(booked.duration_minutes, Some(MAX_DURATION_MINUTES));

        let an_hour_later = tuesday_10() + chrono::Duration::hours(1);
        let result = tools.check_availability(Some("jd"), Some(an_hour_later)).await.unwrap();
        assert!(!result.is_available);
    }

    #[tokio::test]
    async fn test_schedule_rejects_empty_ids() {
        let tools = registry().await;
        assert!(matches!(
            tools.schedule_appointment("Sync", " ", "host", tuesday_10()).await,
            Err(SchedulingError::MalformedInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_appointment_reschedules() {
        let tools = registry().await;
        let created = tools.schedule_appointment("Sync", "jd", "host", tuesday_10()).await.unwrap();
        let later = tuesday_10() + chrono::Duration::hours(3);
        let moved = tools.update_appointment(&created.id, later).await.unwrap();
        assert_eq!(moved.date, later);
        assert_eq!(moved.status, AppointmentStatus::Rescheduled);

        let found = tools.find_appointment(&created.id).await.unwrap().unwrap();
        assert_eq!(found.date, later);

        assert!(matches!(
            tools.update_appointment("nope", later).await,
            Err(SchedulingError::AppointmentNotFound(_))
        ));
        assert!(tools.find_appointment("nope").await.unwrap().is_none());
    }
}
