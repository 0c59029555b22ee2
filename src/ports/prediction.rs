//! Prediction service port: Trait for the external classifier.
//!
//! The classifier runs elsewhere; this trait only describes the exchange.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{FeatureVector, ProbabilityVector};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from a call to the prediction service.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// Connection failure or any other transport-level problem.
    #[error("prediction service request failed")]
    Transport(#[source] BoxError),

    #[error("prediction service did not answer within {0:?}")]
    Timeout(Duration),

    /// Non-2xx status. `body` is a bounded excerpt kept for diagnostics.
    #[error("prediction service returned HTTP {status}")]
    Status { status: u16, body: String },

    /// 2xx status but the body does not have the expected shape.
    #[error("malformed prediction response: {0}")]
    Malformed(String),

    #[error("{0} endpoint is not configured")]
    NotConfigured(&'static str),
}

impl PredictionError {
    /// Whether the failure happened before a usable response arrived.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Status { .. }
        )
    }
}

/// Trait for the external prediction service.
///
/// Implementations hold no per-request state, so one instance can serve
/// concurrent requests. Dropping a returned future cancels the call.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Send an encoded feature vector and return the decoded probability vector.
    ///
    /// No retries are attempted.
    ///
    /// # Errors
    /// Returns `Transport`, `Timeout` or `Status` when no usable response
    /// arrived, and `Malformed` when the body fails schema validation.
    async fn predict(&self, features: &FeatureVector) -> Result<ProbabilityVector, PredictionError>;

    /// Ask for a free-text recommendation. The text is returned verbatim.
    ///
    /// # Errors
    /// Same as [`PredictionService::predict`], plus `NotConfigured` when the
    /// service has no recommendation endpoint.
    async fn recommend(&self, prompt: &str) -> Result<String, PredictionError>;
}
