//! Runtime configuration from `SYMPTRA_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::adapters::http::{PredictionConfig, DEFAULT_PROBABILITIES_FIELD};
use crate::SymptraError;

pub const PREDICT_URL_ENV: &str = "SYMPTRA_PREDICT_URL";
pub const RECOMMEND_URL_ENV: &str = "SYMPTRA_RECOMMEND_URL";
pub const TIMEOUT_ENV: &str = "SYMPTRA_PREDICT_TIMEOUT_MS";
pub const PROBABILITIES_FIELD_ENV: &str = "SYMPTRA_PROBABILITIES_FIELD";
pub const VOCABULARY_ENV: &str = "SYMPTRA_VOCABULARY";
pub const DATABASE_ENV: &str = "SYMPTRA_DB";
pub const DISPLAY_OFFSET_ENV: &str = "SYMPTRA_DISPLAY_UTC_OFFSET";
pub const DISPLAY_FORMAT_ENV: &str = "SYMPTRA_DISPLAY_FORMAT";
pub const RECOMMEND_PROMPT_ENV: &str = "SYMPTRA_RECOMMEND_PROMPT";
pub const ALLOW_INSECURE_HTTP_ENV: &str = "SYMPTRA_ALLOW_INSECURE_HTTP";

const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_VOCABULARY_PATH: &str = "models/vocabulary.json";
const DEFAULT_DATABASE_PATH: &str = "data/symptra.db";
pub const DEFAULT_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_RECOMMEND_PROMPT: &str =
    "Give short, practical health recommendations for someone with these symptoms: {symptoms}";

/// How history timestamps are rendered for people.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub utc_offset: FixedOffset,
    pub format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset: utc(),
            format: DEFAULT_DISPLAY_FORMAT.to_string(),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Runtime configuration.
///
/// Only `diagnose` and `recommend` need the prediction endpoint, so it is
/// optional here and checked by [`Config::require_prediction`]. History and
/// profile access work without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prediction: Option<PredictionConfig>,
    pub vocabulary_path: PathBuf,
    pub database_path: PathBuf,
    pub display: DisplayConfig,
    pub recommend_prompt: String,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `SymptraError::Config` for invalid values.
    pub fn from_env() -> Result<Self, SymptraError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// # Errors
    /// Returns `SymptraError::Config` for invalid values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SymptraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let allow_insecure = get(ALLOW_INSECURE_HTTP_ENV)
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
            .unwrap_or(false);

        let predict_url = get(PREDICT_URL_ENV);
        if let Some(url) = &predict_url {
            check_url(PREDICT_URL_ENV, url, allow_insecure)?;
        }

        let recommend_url = get(RECOMMEND_URL_ENV);
        if let Some(url) = &recommend_url {
            check_url(RECOMMEND_URL_ENV, url, allow_insecure)?;
        }

        let timeout_ms = match get(TIMEOUT_ENV) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|&ms| ms > 0)
                .ok_or_else(|| {
                    SymptraError::Config(format!(
                        "{TIMEOUT_ENV} must be a positive number of milliseconds, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let display = DisplayConfig {
            utc_offset: match get(DISPLAY_OFFSET_ENV) {
                Some(raw) => parse_utc_offset(&raw).ok_or_else(|| {
                    SymptraError::Config(format!(
                        "{DISPLAY_OFFSET_ENV} must look like +07:00 or -03:30, got {raw:?}"
                    ))
                })?,
                None => utc(),
            },
            format: get(DISPLAY_FORMAT_ENV).unwrap_or_else(|| DEFAULT_DISPLAY_FORMAT.to_string()),
        };

        let recommend_prompt =
            get(RECOMMEND_PROMPT_ENV).unwrap_or_else(|| DEFAULT_RECOMMEND_PROMPT.to_string());
        if !recommend_prompt.contains("{symptoms}") {
            return Err(SymptraError::Config(format!(
                "{RECOMMEND_PROMPT_ENV} must contain the {{symptoms}} placeholder"
            )));
        }

        if predict_url.is_none() && recommend_url.is_some() {
            tracing::warn!("{RECOMMEND_URL_ENV} is set but {PREDICT_URL_ENV} is not; both are ignored");
        }

        Ok(Self {
            prediction: predict_url.map(|predict_url| PredictionConfig {
                predict_url,
                recommend_url,
                timeout: Duration::from_millis(timeout_ms),
                probabilities_field: get(PROBABILITIES_FIELD_ENV)
                    .unwrap_or_else(|| DEFAULT_PROBABILITIES_FIELD.to_string()),
            }),
            vocabulary_path: get(VOCABULARY_ENV)
                .unwrap_or_else(|| DEFAULT_VOCABULARY_PATH.to_string())
                .into(),
            database_path: get(DATABASE_ENV)
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string())
                .into(),
            display,
            recommend_prompt,
        })
    }

    /// The prediction endpoint settings, for commands that call the classifier.
    ///
    /// # Errors
    /// Returns `SymptraError::Config` when no prediction URL was configured.
    pub fn require_prediction(&self) -> Result<&PredictionConfig, SymptraError> {
        self.prediction.as_ref().ok_or_else(|| {
            SymptraError::Config(format!("{PREDICT_URL_ENV} is required to call the prediction service"))
        })
    }
}

fn check_url(name: &str, url: &str, allow_insecure: bool) -> Result<(), SymptraError> {
    if url.starts_with("https://") || (allow_insecure && url.starts_with("http://")) {
        return Ok(());
    }
    let hint = if url.starts_with("http://") {
        format!(" (set {ALLOW_INSECURE_HTTP_ENV}=true to allow plain HTTP)")
    } else {
        String::new()
    };
    Err(SymptraError::Config(format!(
        "{name} must be an https:// URL{hint}"
    )))
}

/// Parse `+HH:MM`, `-HH:MM` or `Z`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") {
        return Some(utc());
    }
    // Only the `+HH:MM` form, not `+HHMM`.
    if !raw.contains(':') {
        return None;
    }
    raw.parse::<FixedOffset>().ok()
}
