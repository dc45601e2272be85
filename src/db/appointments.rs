use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::*;
use crate::util::{format_timestamp, parse_timestamp};

const APPOINTMENT_COLUMNS: &str = "id, host_id, attendee_id, date, duration_minutes, agenda, status,
                                   created_at, updated_at";

impl ScheduleDb {
    // =========================================================================
    // Appointments
    // =========================================================================

    /// Insert a new appointment with status SCHEDULED.
    ///
    /// No idempotency key: two identical calls create two rows.
    pub fn create_appointment(&self, new: &NewAppointment) -> Result<DbAppointment, DbError> {
        let now = Utc::now().to_rfc3339();
        let appointment = DbAppointment {
            id: uuid::Uuid::new_v4().to_string(),
            host_id: new.host_id.clone(),
            attendee_id: new.attendee_id.clone(),
            date: new.date,
            duration_minutes: new.duration_minutes,
            agenda: new.agenda.clone(),
            status: AppointmentStatus::Scheduled,
            created_at: now.clone(),
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO appointments (
                id, host_id, attendee_id, date, duration_minutes, agenda, status,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                appointment.id,
                appointment.host_id,
                appointment.attendee_id,
                format_timestamp(&appointment.date),
                appointment.duration_minutes,
                appointment.agenda,
                appointment.status.as_str(),
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(appointment)
    }

    /// Move an appointment to a new instant and mark it RESCHEDULED.
    pub fn update_appointment_date(
        &self,
        id: &str,
        date: DateTime<Utc>,
    ) -> Result<DbAppointment, DbError> {
        let changed = self.conn.execute(
            "UPDATE appointments
             SET date = ?1, status = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                format_timestamp(&date),
                AppointmentStatus::Rescheduled.as_str(),
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(DbError::AppointmentNotFound(id.to_string()));
        }
        self.get_appointment(id)?
            .ok_or_else(|| DbError::AppointmentNotFound(id.to_string()))
    }

    pub fn get_appointment(&self, id: &str) -> Result<Option<DbAppointment>, DbError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
        let appointment = self
            .conn
            .query_row(&sql, params![id], Self::map_appointment_row)
            .optional()?;
        Ok(appointment)
    }

    pub fn get_hosted_appointments(&self, person_id: &str) -> Result<Vec<DbAppointment>, DbError> {
        self.query_appointments("host_id", person_id)
    }

    pub fn get_attending_appointments(
        &self,
        person_id: &str,
    ) -> Result<Vec<DbAppointment>, DbError> {
        self.query_appointments("attendee_id", person_id)
    }

    fn query_appointments(&self, column: &str, person_id: &str) -> Result<Vec<DbAppointment>, DbError> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE {column} = ?1 ORDER BY date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![person_id], Self::map_appointment_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn map_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<DbAppointment> {
        let date: String = row.get(3)?;
        let date = parse_timestamp(&date).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status: String = row.get(6)?;
        Ok(DbAppointment {
            id: row.get(0)?,
            host_id: row.get(1)?,
            attendee_id: row.get(2)?,
            date,
            duration_minutes: row.get(4)?,
            agenda: row.get(5)?,
            status: AppointmentStatus::parse(&status),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_db;
    use super::*;
    use chrono::TimeZone;

    fn seed(db: &ScheduleDb) {
        for (id, name) in [("host", "Hana Host"), ("jd", "John Doe")] {
            let now = Utc::now().to_rfc3339();
            db.upsert_person(&DbPerson {
                id: id.to_string(),
                name: name.to_string(),
                email: format!("{id}@acme.com"),
                created_at: now.clone(),
                updated_at: now,
            })
            .unwrap();
        }
    }

    fn new_appt(date: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            host_id: "host".into(),
            attendee_id: "jd".into(),
            date,
            duration_minutes: None,
            agenda: "Roadmap".into(),
        }
    }

    #[test]
    fn test_create_and_read_back() {
        let db = test_db();
        seed(&db);
        let at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let created = db.create_appointment(&new_appt(at)).unwrap();
        let fetched = db.get_appointment(&created.id).unwrap().unwrap();
        assert_eq!(fetched.date, at);
        assert_eq!(fetched.status, AppointmentStatus::Scheduled);
        assert_eq!(fetched.effective_duration_minutes(), DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn test_duplicate_creates_are_not_deduplicated() {
        let db = test_db();
        seed(&db);
        let at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        db.create_appointment(&new_appt(at)).unwrap();
        db.create_appointment(&new_appt(at)).unwrap();
        assert_eq!(db.get_attending_appointments("jd").unwrap().len(), 2);
        assert_eq!(db.get_hosted_appointments("host").unwrap().len(), 2);
    }

    #[test]
    fn test_update_date_marks_rescheduled() {
        let db = test_db();
        seed(&db);
        let at = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let created = db.create_appointment(&new_appt(at)).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 10, 21, 15, 30, 0).unwrap();
        let updated = db.update_appointment_date(&created.id, later).unwrap();
        assert_eq!(updated.date, later);
        assert_eq!(updated.status, AppointmentStatus::Rescheduled);
    }

    #[test]
    fn test_update_unknown_appointment() {
        let db = test_db();
        let err = db.update_appointment_date("nope", Utc::now()).unwrap_err();
        assert!(matches!(err, DbError::AppointmentNotFound(_)));
    }

    #[test]
    fn test_unknown_attendee_rejected_by_foreign_key() {
        let db = test_db();
        seed(&db);
        let mut appt = new_appt(Utc::now());
        appt.attendee_id = "ghost".into();
        assert!(db.create_appointment(&appt).is_err());
    }
}
