//! History port: Trait for the health-history store, plus the clock it uses.

use chrono::{DateTime, Utc};

use crate::domain::{HealthHistoryRecord, NewHistoryRecord};

/// Source of "now" for stores that default missing timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Trait for the health-history store.
///
/// Records are append-only: there is no update or delete.
pub trait HistoryStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append a record and return its generated id.
    ///
    /// A missing timestamp is filled from the store's clock at write time.
    ///
    /// # Errors
    /// Returns error if the record is invalid or the write fails.
    fn append(&self, record: &NewHistoryRecord) -> Result<String, Self::Error>;

    /// All records of one user, newest timestamp first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<HealthHistoryRecord>, Self::Error>;

    /// Number of records of one user.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count_by_user(&self, user_id: &str) -> Result<usize, Self::Error>;
}
