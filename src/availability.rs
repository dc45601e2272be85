//! Availability evaluation.
//!
//! A person is available at an instant when the instant falls inside their
//! recurring weekly window (read in the reference timezone) and no existing
//! booking, hosted or attended, covers it. Incomplete windows fail closed.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::db::{DbAppointment, DbAvailability, DbError};
use crate::store::RecordStore;

/// A validated weekly window. Only constructed from complete, in-range data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyAvailability {
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub allowed_days: BTreeSet<u32>,
}

impl WeeklyAvailability {
    /// `None` when a bound or the day set is missing, a value is out of
    /// range, or `start_hour >= end_hour`.
    pub fn from_stored(stored: &DbAvailability) -> Option<Self> {
        let start = hour_in_range(stored.start_hour?)?;
        let end = hour_in_range(stored.end_hour?)?;
        if start >= end {
            return None;
        }
        let days = stored.allowed_days.as_ref()?;
        let mut allowed_days = BTreeSet::new();
        for day in days {
            if !(0..=6).contains(day) {
                return None;
            }
            allowed_days.insert(*day as u32);
        }
        Some(Self {
            start_hour: start,
            end_hour: end,
            allowed_days,
        })
    }
}

fn hour_in_range(hour: i64) -> Option<u32> {
    if (0..=23).contains(&hour) {
        Some(hour as u32)
    } else {
        None
    }
}

/// Weekday in the set and `start_hour <= hour < end_hour`, both read in `tz`.
pub fn is_admissible(window: &WeeklyAvailability, at: DateTime<Utc>, tz: Tz) -> bool {
    let local = at.with_timezone(&tz);
    let weekday = local.weekday().num_days_from_sunday();
    let hour = local.hour();
    window.allowed_days.contains(&weekday) && window.start_hour <= hour && hour < window.end_hour
}

/// True when `at` falls inside any booking's `[date, date + duration)`.
pub fn has_conflict<'a>(bookings: impl IntoIterator<Item = &'a DbAppointment>, at: DateTime<Utc>) -> bool {
    bookings
        .into_iter()
        .any(|booking| booking.date <= at && at < booking.end())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub is_available: bool,
}

/// Point-in-time availability. The new booking's own duration is not checked.
pub async fn check_availability(
    store: &dyn RecordStore,
    person_id: &str,
    at: DateTime<Utc>,
    tz: Tz,
) -> Result<AvailabilityResult, DbError> {
    let Some(person) = store.get_person_with_relations(person_id).await? else {
        log::debug!("Availability check for unknown person {}", person_id);
        return Ok(AvailabilityResult { is_available: false });
    };

    let window = match person.availability.as_ref().and_then(WeeklyAvailability::from_stored) {
        Some(window) => window,
        None => {
            log::debug!("No usable weekly window for {}, treating as unavailable", person_id);
            return Ok(AvailabilityResult { is_available: false });
        }
    };

    if !is_admissible(&window, at, tz) {
        return Ok(AvailabilityResult { is_available: false });
    }

    let conflict = has_conflict(person.all_appointments(), at);
    Ok(AvailabilityResult {
        is_available: !conflict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AppointmentStatus, NewAppointment};
    use crate::store::test_support::{add_person, test_store};
    use chrono::TimeZone;

    fn stored(start: Option<i64>, end: Option<i64>, days: Option<Vec<i64>>) -> DbAvailability {
        DbAvailability {
            person_id: "p".into(),
            start_hour: start,
            end_hour: end,
            allowed_days: days,
            updated_at: String::new(),
        }
    }

    fn weekdays_9_to_5() -> WeeklyAvailability {
        WeeklyAvailability::from_stored(&stored(Some(9), Some(17), Some(vec![1, 2, 3, 4, 5]))).unwrap()
    }

    fn booking(at: DateTime<Utc>, minutes: Option<i64>) -> DbAppointment {
        DbAppointment {
            id: "a".into(),
            host_id: "h".into(),
            attendee_id: "p".into(),
            date: at,
            duration_minutes: minutes,
            agenda: String::new(),
            status: AppointmentStatus::Scheduled,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_incomplete_windows_fail_closed() {
        assert!(WeeklyAvailability::from_stored(&stored(None, Some(17), Some(vec![1]))).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(9), None, Some(vec![1]))).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(9), Some(17), None)).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(17), Some(9), Some(vec![1]))).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(9), Some(9), Some(vec![1]))).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(9), Some(24), Some(vec![1]))).is_none());
        assert!(WeeklyAvailability::from_stored(&stored(Some(9), Some(17), Some(vec![7]))).is_none());
    }

    #[test]
    fn test_hour_bounds_are_half_open() {
        let window = weekdays_9_to_5();
        // 2026-10-20 is a Tuesday.
        let tue = |h| Utc.with_ymd_and_hms(2026, 10, 20, h, 0, 0).unwrap();
        assert!(!is_admissible(&window, tue(8), chrono_tz::UTC));
        assert!(is_admissible(&window, tue(9), chrono_tz::UTC));
        assert!(is_admissible(&window, tue(16), chrono_tz::UTC));
        assert!(!is_admissible(&window, tue(17), chrono_tz::UTC));
    }

    #[test]
    fn test_weekday_must_be_allowed() {
        let window = weekdays_9_to_5();
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 10, 24, 10, 0, 0).unwrap();
        assert!(!is_admissible(&window, sunday, chrono_tz::UTC));
        assert!(!is_admissible(&window, saturday, chrono_tz::UTC));
    }

    #[test]
    fn test_window_is_read_in_reference_timezone() {
        let window = weekdays_9_to_5();
        // 05:00 UTC Tuesday is 10:30 in Kolkata.
        let at = Utc.with_ymd_and_hms(2026, 10, 20, 5, 0, 0).unwrap();
        assert!(!is_admissible(&window, at, chrono_tz::UTC));
        assert!(is_admissible(&window, at, chrono_tz::Asia::Kolkata));
    }

    #[test]
    fn test_booking_interval_is_half_open() {
        let start = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let existing = [booking(start, None)];
        assert!(has_conflict(&existing, start));
        assert!(has_conflict(&existing, start + chrono::Duration::minutes(29)));
        assert!(!has_conflict(&existing, start + chrono::Duration::minutes(30)));
        assert!(!has_conflict(&existing, start - chrono::Duration::minutes(1)));

        let long = [booking(start, Some(90))];
        assert!(has_conflict(&long, start + chrono::Duration::minutes(60)));
    }

    #[test]
    fn test_unrepresentable_duration_blocks_rest_of_time() {
        let start = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let runaway = [booking(start, Some(1_000_000_000_000))];
        assert!(has_conflict(&runaway, start + chrono::Duration::hours(1)));
        assert!(!has_conflict(&runaway, start - chrono::Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_check_availability_end_to_end() {
        let store = test_store();
        add_person(&store, "host", "Hana Host").await;
        add_person(&store, "jd", "John Doe").await;
        store.upsert_availability("jd", 9, 17, &[1, 2, 3, 4, 5]).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let result = check_availability(&store, "jd", at, chrono_tz::UTC).await.unwrap();
        assert!(result.is_available);

        store
            .create_appointment(&NewAppointment {
                host_id: "host".into(),
                attendee_id: "jd".into(),
                date: at,
                duration_minutes: None,
                agenda: "Sync".into(),
            })
            .await
            .unwrap();
        let result = check_availability(&store, "jd", at, chrono_tz::UTC).await.unwrap();
        assert!(!result.is_available);
    }

    #[tokio::test]
    async fn test_hosted_bookings_also_block() {
        let store = test_store();
        add_person(&store, "jd", "John Doe").await;
        add_person(&store, "amy", "Amy Aster").await;
        store.upsert_availability("jd", 9, 17, &[1, 2, 3, 4, 5]).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 10, 20, 11, 0, 0).unwrap();
        store
            .create_appointment(&NewAppointment {
                host_id: "jd".into(),
                attendee_id: "amy".into(),
                date: at,
                duration_minutes: Some(60),
                agenda: String::new(),
            })
            .await
            .unwrap();
        let probe = at + chrono::Duration::minutes(45);
        let result = check_availability(&store, "jd", probe, chrono_tz::UTC).await.unwrap();
        assert!(!result.is_available);
    }

    #[tokio::test]
    async fn test_missing_person_or_window_is_unavailable() {
        let store = test_store();
        add_person(&store, "nowin", "No Window").await;
        let at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        assert!(!check_availability(&store, "ghost", at, chrono_tz::UTC).await.unwrap().is_available);
        assert!(!check_availability(&store, "nowin", at, chrono_tz::UTC).await.unwrap().is_available);
    }
}
