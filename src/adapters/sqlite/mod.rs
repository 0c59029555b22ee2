//! SQLite adapter: Implementation of `HistoryStore` and `ProfileStore`.
//!
//! Provides local persistence for health-history records and user profiles.
//!
//! # Timestamps
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with nanosecond
//! precision, so lexical order in SQL equals chronological order. Records that
//! share a timestamp come back newest-insert first.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex surfaces as
//! `StorageError::LockPoisoned` instead of a panic.
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{record_id, HealthHistoryRecord, NewHistoryRecord, UserProfile};
use crate::ports::{Clock, HistoryStore, ProfileStore, SystemClock};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteStorage {
    /// Open (or create) a database file.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let storage = Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Use a different clock for defaulting missing timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS health_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                symptoms TEXT NOT NULL,
                diagnosis TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_user_time
                ON health_history(user_id, timestamp DESC);

            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::Serialization(format!("bad timestamp {raw:?}: {e}")))
    }
}

impl HistoryStore for SqliteStorage {
    type Error = StorageError;

    fn append(&self, record: &NewHistoryRecord) -> Result<String, Self::Error> {
        record
            .validate()
            .map_err(|errors| StorageError::Invalid(errors.join("; ")))?;

        let id = record_id();
        let timestamp = record.timestamp.unwrap_or_else(|| self.clock.now());
        let symptoms = serde_json::to_string(&record.symptoms)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO health_history (id, user_id, symptoms, diagnosis, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                id,
                record.user_id,
                symptoms,
                record.diagnosis,
                Self::format_timestamp(&timestamp),
            ],
        )?;

        tracing::debug!("Appended history record {}", id);
        Ok(id)
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<HealthHistoryRecord>, Self::Error> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r"
            SELECT id, user_id, symptoms, diagnosis, timestamp
            FROM health_history
            WHERE user_id = ?1
            ORDER BY timestamp DESC, rowid DESC
            ",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, user_id, symptoms, diagnosis, timestamp)| {
                let symptoms = serde_json::from_str(&symptoms)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(HealthHistoryRecord {
                    id,
                    user_id,
                    symptoms,
                    diagnosis,
                    timestamp: Self::parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    fn count_by_user(&self, user_id: &str) -> Result<usize, Self::Error> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM health_history WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl ProfileStore for SqliteStorage {
    type Error = StorageError;

    fn save_profile(&self, profile: &UserProfile) -> Result<(), Self::Error> {
        let now = Self::format_timestamp(&self.clock.now());
        let conn = self.conn()?;

        conn.execute(
            r"
            INSERT INTO users (user_id, email, first_name, last_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                updated_at = excluded.updated_at
            ",
            params![
                profile.user_id,
                profile.email,
                profile.first_name,
                profile.last_name,
                now,
            ],
        )?;

        tracing::debug!("Saved user profile");
        Ok(())
    }

    fn update_profile(&self, profile: &UserProfile) -> Result<bool, Self::Error> {
        let now = Self::format_timestamp(&self.clock.now());
        let conn = self.conn()?;

        let changed = conn.execute(
            r"
            UPDATE users
            SET email = ?2, first_name = ?3, last_name = ?4, updated_at = ?5
            WHERE user_id = ?1
            ",
            params![
                profile.user_id,
                profile.email,
                profile.first_name,
                profile.last_name,
                now,
            ],
        )?;

        Ok(changed > 0)
    }

    fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Self::Error> {
        let conn = self.conn()?;

        let profile = conn
            .query_row(
                "SELECT user_id, email, first_name, last_name FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(profile)
    }
}
