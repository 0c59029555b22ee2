//! Symptom and disease vocabularies.
//!
//! A vocabulary is a positional schema shared with the external classifier:
//! index `i` of the feature vector means `symptoms[i]`, and index `j` of the
//! probability vector means `diseases[j]`. The lists are loaded from a
//! versioned JSON document and checked against the model's declared shape
//! before anything is encoded with them.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a vocabulary document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VocabularyError {
    #[error("{0} vocabulary is empty")]
    Empty(&'static str),

    #[error("{kind} vocabulary has {actual} entries but the model expects {expected}")]
    ShapeMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot read vocabulary file: {0}")]
    Io(String),

    #[error("Cannot parse vocabulary document: {0}")]
    Parse(String),
}

/// An ordered list of canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    names: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from names in positional order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names that appear more than once, in first-seen order.
    #[must_use]
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        self.iter()
            .filter(|name| !seen.insert(*name) && reported.insert(*name))
            .collect()
    }
}

/// Input/output dimensionality declared by the deployed classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelShape {
    pub input_dim: usize,
    pub output_dim: usize,
}

/// Versioned pair of vocabularies bound to one classifier deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySet {
    pub version: String,
    pub symptoms: Vocabulary,
    pub diseases: Vocabulary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelShape>,
}

impl VocabularySet {
    /// Create a vocabulary set without a declared model shape.
    #[must_use]
    pub fn new(version: impl Into<String>, symptoms: Vocabulary, diseases: Vocabulary) -> Self {
        Self {
            version: version.into(),
            symptoms,
            diseases,
            model: None,
        }
    }

    /// Attach the classifier's declared dimensions.
    #[must_use]
    pub fn with_model_shape(mut self, input_dim: usize, output_dim: usize) -> Self {
        self.model = Some(ModelShape {
            input_dim,
            output_dim,
        });
        self
    }

    /// Check that both vocabularies are usable and agree with the model shape.
    ///
    /// # Errors
    /// Returns `VocabularyError::Empty` or `VocabularyError::ShapeMismatch`.
    pub fn validate(&self) -> Result<(), VocabularyError> {
        if self.symptoms.is_empty() {
            return Err(VocabularyError::Empty("symptom"));
        }
        if self.diseases.is_empty() {
            return Err(VocabularyError::Empty("disease"));
        }

        if let Some(shape) = self.model {
            if shape.input_dim != self.symptoms.len() {
                return Err(VocabularyError::ShapeMismatch {
                    kind: "symptom",
                    expected: shape.input_dim,
                    actual: self.symptoms.len(),
                });
            }
            if shape.output_dim != self.diseases.len() {
                return Err(VocabularyError::ShapeMismatch {
                    kind: "disease",
                    expected: shape.output_dim,
                    actual: self.diseases.len(),
                });
            }
        }

        for (kind, vocabulary) in [("symptom", &self.symptoms), ("disease", &self.diseases)] {
            let duplicates = vocabulary.duplicates();
            if !duplicates.is_empty() {
                tracing::warn!(
                    "Vocabulary {} has {} duplicated {} name(s); each position is encoded independently",
                    self.version,
                    duplicates.len(),
                    kind
                );
            }
        }

        Ok(())
    }

    /// Parse and validate a vocabulary document.
    ///
    /// # Errors
    /// Returns `VocabularyError::Parse` for invalid JSON, or any validation error.
    pub fn from_json(content: &str) -> Result<Self, VocabularyError> {
        let set: Self =
            serde_json::from_str(content).map_err(|e| VocabularyError::Parse(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    /// Load and validate a vocabulary document from disk.
    ///
    /// # Errors
    /// Returns `VocabularyError::Io` if the file cannot be read, or any parse/validation error.
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VocabularyError::Io(format!("{}: {e}", path.display())))?;
        let set = Self::from_json(&content)?;

        tracing::info!(
            "Loaded vocabulary {} from {:?} ({} symptoms, {} diseases)",
            set.version,
            path,
            set.symptoms.len(),
            set.diseases.len()
        );

        Ok(set)
    }
}
