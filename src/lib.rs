//! # Symptra
//!
//! Symptom-based diagnosis backed by an external prediction service.
//!
//! This crate provides:
//! - Encoding of free-text symptom lists into the classifier's feature order
//! - An HTTP client for the external classifier and recommendation endpoints
//! - Resolution of the classifier's probability vector onto the disease taxonomy
//! - A SQLite-backed health-history and user-profile store
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types and the pure pipeline stages (encode, resolve)
//! - `ports`: Trait definitions for external collaborators
//! - `adapters`: Concrete implementations (reqwest, SQLite, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment-driven runtime configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{DiagnosisResult, FeatureVector, ProbabilityVector, VocabularySet};

use serde::Serialize;

/// Result type for Symptra operations
pub type Result<T> = std::result::Result<T, SymptraError>;

/// Main error type for Symptra
#[derive(Debug, thiserror::Error)]
pub enum SymptraError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Prediction service unavailable: {0}")]
    UpstreamUnavailable(#[source] ports::PredictionError),

    #[error("Malformed prediction response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("Vocabulary mismatch: {0}")]
    VocabularyMismatch(String),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pipeline stage a failure is attributed to, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Validation,
    Upstream,
    UpstreamResponse,
    Configuration,
    Storage,
    Internal,
}

impl SymptraError {
    #[must_use]
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::Validation(_) => FailureStage::Validation,
            Self::UpstreamUnavailable(_) => FailureStage::Upstream,
            Self::MalformedUpstreamResponse(_) => FailureStage::UpstreamResponse,
            Self::VocabularyMismatch(_) | Self::Config(_) => FailureStage::Configuration,
            Self::Storage(_) => FailureStage::Storage,
            Self::Io(_) | Self::Serialization(_) => FailureStage::Internal,
        }
    }

    /// Message safe to show an end user. The underlying cause is not included.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::UpstreamUnavailable(_) => {
                "The prediction service is currently unavailable".to_string()
            }
            Self::MalformedUpstreamResponse(_) => {
                "The prediction service returned an unexpected response".to_string()
            }
            Self::VocabularyMismatch(_) | Self::Config(_) => {
                "The diagnosis service is misconfigured".to_string()
            }
            Self::Storage(_) => "Health history storage failed".to_string(),
            Self::Io(_) | Self::Serialization(_) => "Internal error".to_string(),
        }
    }
}

impl From<ports::PredictionError> for SymptraError {
    fn from(err: ports::PredictionError) -> Self {
        match err {
            ports::PredictionError::Malformed(msg) => Self::MalformedUpstreamResponse(msg),
            ports::PredictionError::NotConfigured(what) => {
                Self::Config(format!("{what} endpoint is not configured"))
            }
            other => Self::UpstreamUnavailable(other),
        }
    }
}

impl From<domain::ResolveError> for SymptraError {
    fn from(err: domain::ResolveError) -> Self {
        match err {
            domain::ResolveError::NonFinite { .. } => Self::MalformedUpstreamResponse(err.to_string()),
            _ => Self::VocabularyMismatch(err.to_string()),
        }
    }
}

impl From<domain::VocabularyError> for SymptraError {
    fn from(err: domain::VocabularyError) -> Self {
        match err {
            domain::VocabularyError::ShapeMismatch { .. } | domain::VocabularyError::Empty(_) => {
                Self::VocabularyMismatch(err.to_string())
            }
            domain::VocabularyError::Io(_) | domain::VocabularyError::Parse(_) => {
                Self::Config(err.to_string())
            }
        }
    }
}
