use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::*;

/// Key used for display-name matching: trimmed and lowercased.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ScheduleDb {
    // =========================================================================
    // People
    // =========================================================================

    /// Upsert a person record. Returns true if the person was newly inserted (not updated).
    pub fn upsert_person(&self, person: &DbPerson) -> Result<bool, DbError> {
        let existed: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM people WHERE id = ?1)",
            params![person.id],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "INSERT INTO people (id, name, name_key, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, LOWER(?4), ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                name_key = excluded.name_key,
                email = excluded.email,
                updated_at = excluded.updated_at",
            params![
                person.id,
                person.name.trim(),
                name_key(&person.name),
                person.email.trim(),
                person.created_at,
                person.updated_at,
            ],
        )?;
        Ok(!existed)
    }

    pub fn get_person(&self, id: &str) -> Result<Option<DbPerson>, DbError> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name, email, created_at, updated_at FROM people WHERE id = ?1",
                params![id],
                Self::map_person_row,
            )
            .optional()?;
        Ok(person)
    }

    /// Person registered under `email`, compared case-insensitively.
    pub fn get_person_by_email(&self, email: &str) -> Result<Option<DbPerson>, DbError> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name, email, created_at, updated_at FROM people WHERE email = LOWER(?1)",
                params![email.trim()],
                Self::map_person_row,
            )
            .optional()?;
        Ok(person)
    }

    /// First person (by insertion order) whose name matches case-insensitively
    /// after trimming both sides.
    pub fn find_person_by_name(&self, name: &str) -> Result<Option<DbPerson>, DbError> {
        let person = self
            .conn
            .query_row(
                "SELECT id, name, email, created_at, updated_at
                 FROM people
                 WHERE name_key = ?1
                 ORDER BY rowid
                 LIMIT 1",
                params![name_key(name)],
                Self::map_person_row,
            )
            .optional()?;
        Ok(person)
    }

    fn map_person_row(row: &rusqlite::Row) -> rusqlite::Result<DbPerson> {
        Ok(DbPerson {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    // =========================================================================
    // Weekly availability
    // =========================================================================

    /// Create or replace a person's weekly window. Never a partial update.
    pub fn upsert_availability(
        &self,
        person_id: &str,
        start_hour: i64,
        end_hour: i64,
        allowed_days: &[i64],
    ) -> Result<DbAvailability, DbError> {
        let now = Utc::now().to_rfc3339();
        let days_json = serde_json::to_string(allowed_days)
            .map_err(|e| DbError::Task(format!("Failed to encode allowed days: {e}")))?;
        self.conn.execute(
            "INSERT INTO availability (person_id, start_hour, end_hour, allowed_days, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(person_id) DO UPDATE SET
                start_hour = excluded.start_hour,
                end_hour = excluded.end_hour,
                allowed_days = excluded.allowed_days,
                updated_at = excluded.updated_at",
            params![person_id, start_hour, end_hour, days_json, now],
        )?;
        Ok(DbAvailability {
            person_id: person_id.to_string(),
            start_hour: Some(start_hour),
            end_hour: Some(end_hour),
            allowed_days: Some(allowed_days.to_vec()),
            updated_at: now,
        })
    }

    pub fn get_availability(&self, person_id: &str) -> Result<Option<DbAvailability>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT person_id, start_hour, end_hour, allowed_days, updated_at
                 FROM availability WHERE person_id = ?1",
                params![person_id],
                |row| {
                    let days: Option<String> = row.get(3)?;
                    Ok(DbAvailability {
                        person_id: row.get(0)?,
                        start_hour: row.get(1)?,
                        end_hour: row.get(2)?,
                        // An unreadable day list counts as missing.
                        allowed_days: days.and_then(|d| serde_json::from_str(&d).ok()),
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Person plus availability and both sides of their bookings, read as one snapshot.
    pub fn get_person_with_relations(
        &self,
        id: &str,
    ) -> Result<Option<PersonWithRelations>, DbError> {
        self.with_transaction(|db| {
            let Some(person) = db.get_person(id)? else {
                return Ok(None);
            };
            let availability = db.get_availability(id)?;
            let hosted_appointments = db.get_hosted_appointments(id)?;
            let attending_appointments = db.get_attending_appointments(id)?;
            Ok(Some(PersonWithRelations {
                person,
                availability,
                hosted_appointments,
                attending_appointments,
            }))
        })
    }
}
