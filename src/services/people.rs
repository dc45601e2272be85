// People service: registration, weekly availability, profile lookup.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{DbAvailability, DbPerson, PersonWithRelations};
use crate::error::SchedulingError;
use crate::store::RecordStore;
use crate::util::{format_timestamp, name_from_email, person_id_from_email};

/// An hour as sent by a client: a number, or text such as "9" or "09:00".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HourValue {
    Number(i64),
    Text(String),
}

impl HourValue {
    /// Leading integer of the value. "09:00" reads as 9.
    fn leading_hour(&self) -> Option<i64> {
        match self {
            HourValue::Number(n) => Some(*n),
            HourValue::Text(s) => {
                let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityInput {
    pub start_time: Option<HourValue>,
    pub end_time: Option<HourValue>,
    pub days: Option<Vec<i64>>,
}

/// A window that passed validation, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAvailability {
    pub start_hour: i64,
    pub end_hour: i64,
    pub days: Vec<i64>,
}

pub fn validate_availability(input: &AvailabilityInput) -> Result<ValidAvailability, SchedulingError> {
    let start_hour = required_hour(input.start_time.as_ref(), "startTime")?;
    let end_hour = required_hour(input.end_time.as_ref(), "endTime")?;
    if start_hour >= end_hour {
        return Err(SchedulingError::MalformedInput(format!(
            "startTime ({}) must be before endTime ({})",
            start_hour, end_hour
        )));
    }

    let days = input
        .days
        .as_ref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| SchedulingError::MalformedInput("days must list at least one weekday".to_string()))?;
    if let Some(bad) = days.iter().find(|d| !(0..=6).contains(*d)) {
        return Err(SchedulingError::MalformedInput(format!(
            "day {} is not a weekday (0 = Sunday .. 6 = Saturday)",
            bad
        )));
    }
    let days: BTreeSet<i64> = days.iter().copied().collect();

    Ok(ValidAvailability {
        start_hour,
        end_hour,
        days: days.into_iter().collect(),
    })
}

fn required_hour(value: Option<&HourValue>, field: &str) -> Result<i64, SchedulingError> {
    let value = value.ok_or_else(|| SchedulingError::MalformedInput(format!("{} is required", field)))?;
    let hour = value
        .leading_hour()
        .ok_or_else(|| SchedulingError::MalformedInput(format!("{} is not an hour", field)))?;
    if !(0..=23).contains(&hour) {
        return Err(SchedulingError::MalformedInput(format!(
            "{} must be between 0 and 23, got {}",
            field, hour
        )));
    }
    Ok(hour)
}

/// Create or refresh a person keyed by email. A new person's id is the
/// email's slug, suffixed when another email already owns that slug. The name
/// falls back to one derived from the email.
pub async fn register_person(
    store: &dyn RecordStore,
    email: &str,
    name: Option<&str>,
) -> Result<DbPerson, SchedulingError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .unwrap_or(false);
    if !valid {
        return Err(SchedulingError::MalformedInput(format!("not an email address: {:?}", email)));
    }

    let id = match store.get_person_by_email(&email).await? {
        Some(existing) => existing.id,
        None => unclaimed_id(store, &email).await?,
    };
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name_from_email(&email));
    let now = format_timestamp(&Utc::now());

    let person = DbPerson {
        id,
        name,
        email,
        created_at: now.clone(),
        updated_at: now,
    };
    let inserted = store.upsert_person(&person).await?;
    if inserted {
        log::info!("Registered person {} ({})", person.id, person.name);
    }
    // Read back so an existing row's created_at is reported.
    Ok(store.get_person(&person.id).await?.unwrap_or(person))
}

/// Slug id for a new email. Distinct emails can share a slug
/// ("john.doe@" and "john-doe@"), so a taken slug gets a short random suffix.
async fn unclaimed_id(store: &dyn RecordStore, email: &str) -> Result<String, SchedulingError> {
    let slug = person_id_from_email(email);
    if store.get_person(&slug).await?.is_none() {
        return Ok(slug);
    }
    let suffix = Uuid::new_v4().simple().to_string();
    let id = format!("{}-{}", slug, &suffix[..8]);
    log::debug!("Person id {} is taken, registering {} as {}", slug, email, id);
    Ok(id)
}

/// Replace a person's weekly window after validating it.
pub async fn set_availability(
    store: &dyn RecordStore,
    person_id: &str,
    input: &AvailabilityInput,
) -> Result<DbAvailability, SchedulingError> {
    let valid = validate_availability(input)?;
    if store.get_person(person_id).await?.is_none() {
        return Err(SchedulingError::PersonNotFound(person_id.to_string()));
    }
    let stored = store
        .upsert_availability(person_id, valid.start_hour, valid.end_hour, &valid.days)
        .await?;
    log::info!(
        "Availability for {} set to {}-{} on {:?}",
        person_id,
        valid.start_hour,
        valid.end_hour,
        valid.days
    );
    Ok(stored)
}

/// Person with their weekly window and every booking they host or attend.
pub async fn get_profile(
    store: &dyn RecordStore,
    person_id: &str,
) -> Result<PersonWithRelations, SchedulingError> {
    store
        .get_person_with_relations(person_id)
        .await?
        .ok_or_else(|| SchedulingError::PersonNotFound(person_id.to_string()))
}
