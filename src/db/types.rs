//! Shared type definitions for the database layer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Duration assumed for a booking whose `duration_minutes` is unset.
pub const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Longest booking the app will write: one day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Database task failed: {0}")]
    Task(String),
}

/// A row from the `people` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPerson {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `availability` table.
///
/// Columns are nullable; rows written before validation existed (or edited by
/// hand) may be incomplete. Evaluation treats incomplete rows as unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAvailability {
    pub person_id: String,
    pub start_hour: Option<i64>,
    pub end_hour: Option<i64>,
    pub allowed_days: Option<Vec<i64>>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }

    /// Unknown values read back as `Scheduled`.
    pub fn parse(s: &str) -> Self {
        match s {
            "CONFIRMED" => AppointmentStatus::Confirmed,
            "CANCELLED" => AppointmentStatus::Cancelled,
            "COMPLETED" => AppointmentStatus::Completed,
            "RESCHEDULED" => AppointmentStatus::Rescheduled,
            _ => AppointmentStatus::Scheduled,
        }
    }
}

/// A row from the `appointments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAppointment {
    pub id: String,
    pub host_id: String,
    pub attendee_id: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub agenda: String,
    pub status: AppointmentStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl DbAppointment {
    pub fn effective_duration_minutes(&self) -> i64 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    /// Exclusive end of the booking interval `[date, date + duration)`.
    ///
    /// A duration too large to represent (rows written outside the app)
    /// saturates at the latest representable instant.
    pub fn end(&self) -> DateTime<Utc> {
        Duration::try_minutes(self.effective_duration_minutes())
            .and_then(|d| self.date.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Fields supplied when creating an appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub host_id: String,
    pub attendee_id: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub agenda: String,
}

/// A person together with their weekly window and every booking they are part of.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonWithRelations {
    pub person: DbPerson,
    pub availability: Option<DbAvailability>,
    pub hosted_appointments: Vec<DbAppointment>,
    pub attending_appointments: Vec<DbAppointment>,
}

impl PersonWithRelations {
    /// Union of hosted and attending appointments.
    pub fn all_appointments(&self) -> impl Iterator<Item = &DbAppointment> {
        self.hosted_appointments
            .iter()
            .chain(self.attending_appointments.iter())
    }
}
