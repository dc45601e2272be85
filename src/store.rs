//! Record store boundary consumed by the scheduling engine.
//!
//! Every operation is individually atomic; the engine never asks for a
//! transaction spanning two calls. `SqliteStore` runs each call on the
//! blocking pool against a mutex-guarded `ScheduleDb`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::{
    DbAppointment, DbAvailability, DbError, DbPerson, NewAppointment, PersonWithRelations,
    ScheduleDb,
};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_person_by_name(&self, name: &str) -> Result<Option<DbPerson>, DbError>;

    async fn get_person(&self, id: &str) -> Result<Option<DbPerson>, DbError>;

    async fn get_person_by_email(&self, email: &str) -> Result<Option<DbPerson>, DbError>;

    async fn get_person_with_relations(
        &self,
        id: &str,
    ) -> Result<Option<PersonWithRelations>, DbError>;

    /// Returns true when the person was newly inserted.
    async fn upsert_person(&self, person: &DbPerson) -> Result<bool, DbError>;

    async fn upsert_availability(
        &self,
        person_id: &str,
        start_hour: i64,
        end_hour: i64,
        allowed_days: &[i64],
    ) -> Result<DbAvailability, DbError>;

    async fn create_appointment(&self, new: &NewAppointment) -> Result<DbAppointment, DbError>;

    async fn update_appointment_date(
        &self,
        id: &str,
        date: DateTime<Utc>,
    ) -> Result<DbAppointment, DbError>;

    async fn get_appointment(&self, id: &str) -> Result<Option<DbAppointment>, DbError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<ScheduleDb>>,
}

impl SqliteStore {
    pub fn new(db: ScheduleDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(configured: Option<&Path>) -> Result<Self, DbError> {
        Ok(Self::new(ScheduleDb::open(configured)?))
    }

    async fn with_db<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&ScheduleDb) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock();
            f(&guard)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_person_by_name(&self, name: &str) -> Result<Option<DbPerson>, DbError> {
        let name = name.to_string();
        self.with_db(move |db| db.find_person_by_name(&name)).await
    }

    async fn get_person(&self, id: &str) -> Result<Option<DbPerson>, DbError> {
        let id = id.to_string();
        self.with_db(move |db| db.get_person(&id)).await
    }

    async fn get_person_by_email(&self, email: &str) -> Result<Option<DbPerson>, DbError> {
        let email = email.to_string();
        self.with_db(move |db| db.get_person_by_email(&email)).await
    }

    async fn get_person_with_relations(
        &self,
        id: &str,
    ) -> Result<Option<PersonWithRelations>, DbError> {
        let id = id.to_string();
        self.with_db(move |db| db.get_person_with_relations(&id)).await
    }

    async fn upsert_person(&self, person: &DbPerson) -> Result<bool, DbError> {
        let person = person.clone();
        self.with_db(move |db| db.upsert_person(&person)).await
    }

    async fn upsert_availability(
        &self,
        person_id: &str,
        start_hour: i64,
        end_hour: i64,
        allowed_days: &[i64],
    ) -> Result<DbAvailability, DbError> {
        let person_id = person_id.to_string();
        let days = allowed_days.to_vec();
        self.with_db(move |db| db.upsert_availability(&person_id, start_hour, end_hour, &days))
            .await
    }

    async fn create_appointment(&self, new: &NewAppointment) -> Result<DbAppointment, DbError> {
        let new = new.clone();
        self.with_db(move |db| db.create_appointment(&new)).await
    }

    async fn update_appointment_date(
        &self,
        id: &str,
        date: DateTime<Utc>,
    ) -> Result<DbAppointment, DbError> {
        let id = id.to_string();
        self.with_db(move |db| db.update_appointment_date(&id, date)).await
    }

    async fn get_appointment(&self, id: &str) -> Result<Option<DbAppointment>, DbError> {
        let id = id.to_string();
        self.with_db(move |db| db.get_appointment(&id)).await
    }
}
