//! HTTP adapter: Implementation of `PredictionService` over `reqwest`.
//!
//! # Wire format
//!
//! Diagnosis: `POST {predict_url}` with `{"data": [0, 1, ...]}`. The response
//! must carry the probability array under the configured field, either flat
//! (`[0.1, 0.9]`) or as a single-row batch (`[[0.1, 0.9]]`).
//!
//! Recommendation: `POST {recommend_url}` with
//! `{"contents": [{"parts": [{"text": "..."}]}]}`; the answer is read from
//! `candidates[0].content.parts[0].text`.
//!
//! Every call is a single attempt bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{FeatureVector, ProbabilityVector};
use crate::ports::{PredictionError, PredictionService};

/// Default upper bound on one outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default response field holding the probability array.
pub const DEFAULT_PROBABILITIES_FIELD: &str = "prediction";

/// Longest non-2xx body excerpt kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;

const RECOMMENDATION_TEXT_POINTER: &str = "/candidates/0/content/parts/0/text";

/// Connection settings for the prediction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionConfig {
    pub predict_url: String,
    pub recommend_url: Option<String>,
    pub timeout: Duration,
    pub probabilities_field: String,
}

impl PredictionConfig {
    #[must_use]
    pub fn new(predict_url: impl Into<String>) -> Self {
        Self {
            predict_url: predict_url.into(),
            recommend_url: None,
            timeout: DEFAULT_TIMEOUT,
            probabilities_field: DEFAULT_PROBABILITIES_FIELD.to_string(),
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    data: &'a FeatureVector,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct RecommendRequest<'a> {
    contents: [Content<'a>; 1],
}

/// `reqwest`-backed prediction client.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    client: Client,
    config: PredictionConfig,
}

impl HttpPredictionClient {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    /// Returns `PredictionError::Transport` if the HTTP client cannot be built.
    pub fn new(config: PredictionConfig) -> Result<Self, PredictionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PredictionError::Transport(Box::new(e)))?;
        Ok(Self { client, config })
    }

    /// Send a JSON body and return the decoded JSON answer of a 2xx response.
    async fn post_json<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<Value, PredictionError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!("Prediction service answered HTTP {}", status.as_u16());
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PredictionError::Malformed(format!("body is not JSON: {e}")))
    }

    fn transport_error(&self, err: reqwest::Error) -> PredictionError {
        if err.is_timeout() {
            tracing::warn!("Prediction service timed out after {:?}", self.config.timeout);
            PredictionError::Timeout(self.config.timeout)
        } else {
            tracing::warn!("Prediction service unreachable: {}", err);
            PredictionError::Transport(Box::new(err))
        }
    }
}

#[async_trait]
impl PredictionService for HttpPredictionClient {
    async fn predict(&self, features: &FeatureVector) -> Result<ProbabilityVector, PredictionError> {
        tracing::debug!(
            "Requesting prediction for {} features ({} active)",
            features.len(),
            features.active_count()
        );

        let body = self
            .post_json(&self.config.predict_url, &PredictRequest { data: features })
            .await?;
        decode_probabilities(&body, &self.config.probabilities_field)
    }

    async fn recommend(&self, prompt: &str) -> Result<String, PredictionError> {
        let url = self
            .config
            .recommend_url
            .as_deref()
            .ok_or(PredictionError::NotConfigured("recommendation"))?;

        let request = RecommendRequest {
            contents: [Content {
                parts: [TextPart { text: prompt }],
            }],
        };
        let body = self.post_json(url, &request).await?;
        decode_recommendation(&body)
    }
}

/// Validate a prediction response body and extract the probability vector.
///
/// # Errors
/// Returns `PredictionError::Malformed` if the field is missing, is not a
/// numeric array (or a batch of exactly one numeric array), or is empty.
pub fn decode_probabilities(body: &Value, field: &str) -> Result<ProbabilityVector, PredictionError> {
    let value = body
        .get(field)
        .ok_or_else(|| PredictionError::Malformed(format!("missing field {field:?}")))?;

    let row = match value {
        Value::Array(items) => match items.as_slice() {
            [Value::Array(inner)] => inner,
            [] => return Err(PredictionError::Malformed(format!("field {field:?} is empty"))),
            _ if items.iter().any(Value::is_array) => {
                return Err(PredictionError::Malformed(format!(
                    "field {field:?} holds a batch of {} rows, expected 1",
                    items.len()
                )))
            }
            _ => items,
        },
        other => {
            return Err(PredictionError::Malformed(format!(
                "field {field:?} is {}, expected an array",
                json_kind(other)
            )))
        }
    };

    if row.is_empty() {
        return Err(PredictionError::Malformed(format!("field {field:?} is empty")));
    }

    let values = row
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().ok_or_else(|| {
                PredictionError::Malformed(format!(
                    "entry {i} of {field:?} is {}, expected a number",
                    json_kind(v)
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProbabilityVector::new(values))
}

/// Extract the recommendation text from a response body, verbatim.
///
/// # Errors
/// Returns `PredictionError::Malformed` if no text is present at the expected path.
pub fn decode_recommendation(body: &Value) -> Result<String, PredictionError> {
    body.pointer(RECOMMENDATION_TEXT_POINTER)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PredictionError::Malformed("missing candidates[0].content.parts[0].text".to_string())
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
