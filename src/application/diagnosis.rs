//! Diagnosis service: Orchestrates the inference pipeline.
//!
//! This service coordinates:
//! - Feature encoding against the symptom vocabulary
//! - The call to the external prediction service
//! - Resolution against the disease vocabulary
//! - Optional history persistence (only after a successful diagnosis)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::append_record;
use crate::adapters::StorageError;
use crate::config::DEFAULT_RECOMMEND_PROMPT;
use crate::domain::{
    encode, resolve, resolve_ranked, unknown_symptoms, DiagnosisResult, NewHistoryRecord,
    ProbabilityVector, RankedDiagnosis, VocabularySet,
};
use crate::ports::{HistoryStore, PredictionService};
use crate::SymptraError;

/// Free-text answer of the recommendation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: String,
}

/// A diagnosis together with the id of the history record it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDiagnosis {
    pub record_id: String,
    #[serde(flatten)]
    pub result: DiagnosisResult,
}

/// Service for running diagnoses against the external classifier.
///
/// Holds no per-request state; share it behind an `Arc` and call it from
/// as many tasks as needed.
pub struct DiagnosisService<P, H>
where
    P: PredictionService,
    H: HistoryStore,
{
    predictor: Arc<P>,
    history: Arc<H>,
    vocabulary: Arc<VocabularySet>,
    prompt_template: String,
}

impl<P, H> DiagnosisService<P, H>
where
    P: PredictionService,
    H: HistoryStore,
    H::Error: Into<StorageError>,
{
    /// Create a new diagnosis service.
    pub fn new(predictor: Arc<P>, history: Arc<H>, vocabulary: Arc<VocabularySet>) -> Self {
        Self {
            predictor,
            history,
            vocabulary,
            prompt_template: DEFAULT_RECOMMEND_PROMPT.to_string(),
        }
    }

    /// Replace the recommendation prompt; `{symptoms}` is substituted.
    #[must_use]
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Encode, predict and resolve.
    ///
    /// An empty list (or one with no known symptom) is still sent as an
    /// all-zero vector.
    ///
    /// # Errors
    /// `UpstreamUnavailable`, `MalformedUpstreamResponse` or `VocabularyMismatch`.
    pub async fn diagnose(&self, symptoms: &[String]) -> Result<DiagnosisResult, SymptraError> {
        let probabilities = self.infer(symptoms).await?;
        let result = resolve(&probabilities, &self.vocabulary.diseases)?;

        tracing::info!(
            "Diagnosis complete: confidence={:.2}%, vocabulary={}",
            result.confidence * 100.0,
            self.vocabulary.version
        );
        Ok(result)
    }

    /// Like [`Self::diagnose`], with the full distribution attached.
    ///
    /// # Errors
    /// Same as [`Self::diagnose`].
    pub async fn diagnose_ranked(&self, symptoms: &[String]) -> Result<RankedDiagnosis, SymptraError> {
        let probabilities = self.infer(symptoms).await?;
        let ranked = resolve_ranked(&probabilities, &self.vocabulary.diseases)?;

        tracing::info!(
            "Ranked diagnosis complete: {} classes, top confidence={:.2}%",
            ranked.distribution.len(),
            ranked.top.confidence * 100.0
        );
        Ok(ranked)
    }

    /// Diagnose, then append the outcome to the user's history.
    ///
    /// Nothing is written when the diagnosis fails. `timestamp: None` lets
    /// the store stamp the record at write time.
    ///
    /// # Errors
    /// `Validation` for a blank user id, any [`Self::diagnose`] error, or `Storage`.
    pub async fn diagnose_and_record(
        &self,
        user_id: &str,
        symptoms: &[String],
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<RecordedDiagnosis, SymptraError> {
        if user_id.trim().is_empty() {
            return Err(SymptraError::Validation("userId is required".to_string()));
        }

        let result = self.diagnose(symptoms).await?;

        let mut record =
            NewHistoryRecord::new(user_id, serde_json::json!(symptoms), result.diagnosis.clone());
        record.timestamp = timestamp;
        let record_id = append_record(self.history.as_ref(), &record)?;

        Ok(RecordedDiagnosis { record_id, result })
    }

    /// Ask the recommendation endpoint about a symptom list.
    ///
    /// # Errors
    /// `Validation` when no non-blank symptom is given, otherwise upstream errors.
    pub async fn recommend(&self, symptoms: &[String]) -> Result<Recommendation, SymptraError> {
        let listed: Vec<&str> = symptoms
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if listed.is_empty() {
            return Err(SymptraError::Validation(
                "At least one symptom is required for a recommendation".to_string(),
            ));
        }

        let prompt = self.prompt_template.replace("{symptoms}", &listed.join(", "));
        let recommendation = self.predictor.recommend(&prompt).await?;

        tracing::info!("Recommendation received ({} chars)", recommendation.chars().count());
        Ok(Recommendation { recommendation })
    }

    async fn infer(&self, symptoms: &[String]) -> Result<ProbabilityVector, SymptraError> {
        let vocabulary = &self.vocabulary;
        let features = encode(symptoms, &vocabulary.symptoms);

        let unknown = unknown_symptoms(symptoms, &vocabulary.symptoms).len();
        if unknown > 0 {
            tracing::debug!(
                "{} submitted symptom(s) are not in vocabulary {}",
                unknown,
                vocabulary.version
            );
        }
        if features.active_count() == 0 {
            tracing::warn!(
                "No submitted symptom matched vocabulary {}; sending an all-zero vector",
                vocabulary.version
            );
        }

        let probabilities = self.predictor.predict(&features).await?;

        // With a declared model shape the vocabulary is known-good, so a
        // wrong-length answer is the upstream's fault.
        if let Some(shape) = vocabulary.model {
            if probabilities.len() != shape.output_dim {
                return Err(SymptraError::MalformedUpstreamResponse(format!(
                    "expected {} probabilities for vocabulary {}, got {}",
                    shape.output_dim,
                    vocabulary.version,
                    probabilities.len()
                )));
            }
        }

        Ok(probabilities)
    }
}
