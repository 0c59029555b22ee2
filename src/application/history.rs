//! History service: Writes records and reads per-user history for display.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::adapters::StorageError;
use crate::config::DisplayConfig;
use crate::domain::{HealthHistoryRecord, NewHistoryRecord};
use crate::ports::HistoryStore;
use crate::SymptraError;

/// A stored record plus its timestamp rendered for people.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: HealthHistoryRecord,
    pub displayed_at: String,
}

/// Validate and append one record; shared by every write path.
pub(crate) fn append_record<H>(history: &H, record: &NewHistoryRecord) -> Result<String, SymptraError>
where
    H: HistoryStore,
    H::Error: Into<StorageError>,
{
    record
        .validate()
        .map_err(|errors| SymptraError::Validation(errors.join("; ")))?;

    let id = history
        .append(record)
        .map_err(|e| SymptraError::Storage(e.into()))?;

    tracing::info!("Saved health history record");
    Ok(id)
}

pub struct HistoryService<H>
where
    H: HistoryStore,
{
    history: Arc<H>,
    display: DisplayConfig,
}

impl<H> HistoryService<H>
where
    H: HistoryStore,
    H::Error: Into<StorageError>,
{
    pub fn new(history: Arc<H>, display: DisplayConfig) -> Self {
        Self { history, display }
    }

    /// Store an already-computed diagnosis. No prediction service involved.
    ///
    /// # Errors
    /// `Validation` for missing fields, `Storage` if the write fails.
    pub fn record(&self, record: &NewHistoryRecord) -> Result<String, SymptraError> {
        append_record(self.history.as_ref(), record)
    }

    /// All records of one user, newest first.
    ///
    /// An unknown user yields an empty list.
    ///
    /// # Errors
    /// `Validation` for a blank user id, `Storage` if the read fails.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>, SymptraError> {
        if user_id.trim().is_empty() {
            return Err(SymptraError::Validation("userId is required".to_string()));
        }

        let records = self
            .history
            .list_by_user(user_id)
            .map_err(|e| SymptraError::Storage(e.into()))?;

        tracing::debug!("Loaded {} history record(s)", records.len());

        Ok(records
            .into_iter()
            .map(|record| HistoryEntry {
                displayed_at: self.display_time(&record.timestamp),
                record,
            })
            .collect())
    }

    fn display_time(&self, timestamp: &DateTime<Utc>) -> String {
        let local = timestamp.with_timezone(&self.display.utc_offset);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.display.format)).is_err() {
            // Unusable format string
            return local.to_rfc3339_opts(SecondsFormat::Secs, true);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::domain::NewHistoryRecord;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn seeded() -> Arc<SqliteStorage> {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        for (day, diagnosis) in [(1, "Flu Biasa"), (3, "Tifus"), (2, "Alergi")] {
            let t = Utc.with_ymd_and_hms(2024, 3, day, 6, 30, 0).unwrap();
            storage
                .append(&NewHistoryRecord::new("user-1", json!(["demam"]), diagnosis).at(t))
                .expect("Should append");
        }
        storage
    }

    #[test]
    fn test_lists_newest_first() {
        let svc = HistoryService::new(seeded(), DisplayConfig::default());

        let entries = svc.list_for_user("user-1").expect("Should list");
        let diagnoses: Vec<&str> = entries.iter().map(|e| e.record.diagnosis.as_str()).collect();
        assert_eq!(diagnoses, ["Tifus", "Alergi", "Flu Biasa"]);
        assert_eq!(entries[0].displayed_at, "2024-03-03 06:30:00");
    }

    #[test]
    fn test_display_uses_configured_offset() {
        let display = DisplayConfig {
            utc_offset: FixedOffset::east_opt(7 * 3600).expect("Valid offset"),
            format: "%d/%m/%Y %H:%M".to_string(),
        };
        let svc = HistoryService::new(seeded(), display);

        let entries = svc.list_for_user("user-1").expect("Should list");
        assert_eq!(entries[0].displayed_at, "03/03/2024 13:30");
        // Stored instant is unchanged.
        assert_eq!(
            entries[0].record.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 3, 6, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_format_falls_back_to_rfc3339() {
        let display = DisplayConfig {
            format: "%Q broken".to_string(),
            ..DisplayConfig::default()
        };
        let svc = HistoryService::new(seeded(), display);

        let entries = svc.list_for_user("user-1").expect("Should list");
        assert_eq!(entries[0].displayed_at, "2024-03-03T06:30:00Z");
    }

    #[test]
    fn test_record_then_list() {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let svc = HistoryService::new(storage.clone(), DisplayConfig::default());
        let t = Utc.with_ymd_and_hms(2024, 2, 1, 8, 15, 0).unwrap();

        let id = svc
            .record(&NewHistoryRecord::new("user-2", json!(["demam", "batuk"]), "Flu Biasa").at(t))
            .expect("Should record");
        assert_eq!(id.len(), 36);

        let entries = svc.list_for_user("user-2").expect("Should list");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.id, id);
        assert_eq!(entries[0].record.timestamp, t);
        assert_eq!(entries[0].displayed_at, "2024-02-01 08:15:00");
    }

    #[test]
    fn test_record_rejects_missing_fields() {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        let svc = HistoryService::new(storage.clone(), DisplayConfig::default());

        let err = svc
            .record(&NewHistoryRecord::new("user-2", json!([]), " "))
            .expect_err("Should fail");
        assert!(matches!(err, SymptraError::Validation(msg) if msg.contains("diagnosis")));
        assert_eq!(storage.count_by_user("user-2").expect("Should count"), 0);
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let svc = HistoryService::new(seeded(), DisplayConfig::default());
        assert!(svc.list_for_user("nobody").expect("Should list").is_empty());
    }

    #[test]
    fn test_blank_user_rejected() {
        let svc = HistoryService::new(seeded(), DisplayConfig::default());
        assert!(matches!(
            svc.list_for_user(""),
            Err(SymptraError::Validation(_))
        ));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let svc = HistoryService::new(seeded(), DisplayConfig::default());
        let entries = svc.list_for_user("user-1").expect("Should list");

        let value = serde_json::to_value(&entries[0]).expect("Should serialize");
        assert_eq!(value["diagnosis"], "Tifus");
        assert_eq!(value["user_id"], "user-1");
        assert!(value["displayed_at"].is_string());
    }
}
