//! SQLite-backed record store for people, weekly availability, and appointments.
//!
//! The database lives at `~/.schedly/schedly.db` unless `dbPath` is set in the
//! config. Timestamps are stored as RFC 3339 UTC text with millisecond precision.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

pub mod appointments;
pub mod people;
pub mod types;
pub use types::*;

pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the configured or default path.
    pub fn open(configured: Option<&Path>) -> Result<Self, DbError> {
        let path = match configured {
            Some(p) => p.to_path_buf(),
            None => Self::db_path()?,
        };
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.schedly/schedly.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".schedly").join("schedly.db"))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_db;
    use super::*;

    #[test]
    fn test_open_applies_schema() {
        let db = test_db();
        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .expect("appointments table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.conn_ref().execute(
                "INSERT INTO people (id, name, name_key, email, created_at, updated_at)
                 VALUES ('p1', 'Pat', 'pat', 'pat@x.io', 'now', 'now')",
                [],
            )?;
            Err(DbError::Task("boom".into()))
        });
        assert!(result.is_err());
        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
