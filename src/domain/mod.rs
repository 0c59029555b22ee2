//! Domain layer: Core types and the pure stages of the diagnosis pipeline.
//!
//! Nothing here performs I/O (apart from reading a vocabulary file on request).
//! Encoding and resolution are deterministic functions of their inputs.

mod diagnosis;
mod features;
mod history;
mod profile;
mod vocabulary;

pub use diagnosis::{
    resolve, resolve_ranked, DiagnosisResult, ProbabilityVector, RankedDiagnosis, RankedDisease,
    ResolveError,
};
pub use features::{encode, unknown_symptoms, FeatureVector};
pub use history::{record_id, HealthHistoryRecord, NewHistoryRecord};
pub use profile::UserProfile;
pub use vocabulary::{ModelShape, Vocabulary, VocabularyError, VocabularySet};
