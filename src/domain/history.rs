//! Health history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored diagnosis request and its outcome. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthHistoryRecord {
    pub id: String,

    /// Identity-provider user id (not owned by this store)
    pub user_id: String,

    /// The submitted symptoms, kept as an opaque JSON document
    pub symptoms: serde_json::Value,

    pub diagnosis: String,

    pub timestamp: DateTime<Utc>,
}

/// A record waiting to be appended.
///
/// When `timestamp` is `None` the store fills it in from its clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryRecord {
    pub user_id: String,
    pub symptoms: serde_json::Value,
    pub diagnosis: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewHistoryRecord {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        symptoms: serde_json::Value,
        diagnosis: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            symptoms,
            diagnosis: diagnosis.into(),
            timestamp: None,
        }
    }

    /// Pin the record to an explicit point in time.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate required fields.
    ///
    /// # Errors
    /// Returns the list of problems found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.user_id.trim().is_empty() {
            errors.push("userId is required".to_string());
        }
        if self.diagnosis.trim().is_empty() {
            errors.push("diagnosis is required".to_string());
        }
        if self.symptoms.is_null() {
            errors.push("symptoms are required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Materialize into a stored record.
    #[must_use]
    pub fn into_record(self, id: String, default_timestamp: DateTime<Utc>) -> HealthHistoryRecord {
        HealthHistoryRecord {
            id,
            user_id: self.user_id,
            symptoms: self.symptoms,
            diagnosis: self.diagnosis,
            timestamp: self.timestamp.unwrap_or(default_timestamp),
        }
    }
}

/// Generate a random UUID v4 string from a CSPRNG.
#[must_use]
pub fn record_id() -> String {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let mut bytes: [u8; 16] = rng.gen();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
