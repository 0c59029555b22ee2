//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod diagnosis;
mod history;
mod profile;
mod response;

pub use diagnosis::{DiagnosisService, Recommendation, RecordedDiagnosis};
pub use history::{HistoryEntry, HistoryService};
pub use profile::ProfileService;
pub use response::ApiResponse;
