//! Diagnosis resolution.
//!
//! Maps the classifier's probability vector back onto the disease vocabulary.

use serde::{Deserialize, Serialize};

use super::vocabulary::Vocabulary;

/// Classifier output aligned index-for-index with the disease vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityVector(Vec<f64>);

impl ProbabilityVector {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the largest entry; the first one wins on ties.
    #[must_use]
    pub fn argmax(&self) -> Option<usize> {
        let (first, rest) = self.0.split_first()?;
        let mut best_index = 0;
        let mut best = *first;
        for (i, &value) in rest.iter().enumerate() {
            if value > best {
                best = value;
                best_index = i + 1;
            }
        }
        Some(best_index)
    }
}

impl From<Vec<f64>> for ProbabilityVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Top disease class and its raw score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub diagnosis: String,
    /// Passed through from the classifier without renormalization or clamping.
    pub confidence: f64,
}

/// One entry of the full distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDisease {
    pub disease: String,
    pub probability: f64,
}

/// Top result plus the whole distribution in vocabulary order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDiagnosis {
    #[serde(flatten)]
    pub top: DiagnosisResult,
    pub distribution: Vec<RankedDisease>,
}

impl RankedDiagnosis {
    /// Distribution sorted by descending probability.
    ///
    /// The sort is stable, so equal probabilities keep vocabulary order.
    #[must_use]
    pub fn by_probability(&self) -> Vec<RankedDisease> {
        let mut sorted = self.distribution.clone();
        sorted.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        sorted
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("probability vector has {probabilities} entries but the disease vocabulary has {classes}")]
    VocabularyMismatch { probabilities: usize, classes: usize },

    #[error("disease vocabulary is empty")]
    EmptyVocabulary,

    #[error("probability at index {index} is not a finite number")]
    NonFinite { index: usize },
}

/// Pick the most probable disease.
///
/// # Errors
/// Returns `ResolveError::VocabularyMismatch` when the lengths differ, rather
/// than truncating or padding. Non-finite entries are rejected.
pub fn resolve(
    probabilities: &ProbabilityVector,
    classes: &Vocabulary,
) -> Result<DiagnosisResult, ResolveError> {
    check_alignment(probabilities, classes)?;

    let index = probabilities
        .argmax()
        .ok_or(ResolveError::EmptyVocabulary)?;
    let diagnosis = classes
        .get(index)
        .ok_or(ResolveError::VocabularyMismatch {
            probabilities: probabilities.len(),
            classes: classes.len(),
        })?
        .to_string();

    Ok(DiagnosisResult {
        diagnosis,
        confidence: probabilities.as_slice()[index],
    })
}

/// Like [`resolve`], but also returns every `{disease, probability}` pair.
///
/// # Errors
/// Same as [`resolve`].
pub fn resolve_ranked(
    probabilities: &ProbabilityVector,
    classes: &Vocabulary,
) -> Result<RankedDiagnosis, ResolveError> {
    let top = resolve(probabilities, classes)?;
    let distribution = classes
        .iter()
        .zip(probabilities.as_slice())
        .map(|(disease, &probability)| RankedDisease {
            disease: disease.to_string(),
            probability,
        })
        .collect();

    Ok(RankedDiagnosis { top, distribution })
}

fn check_alignment(
    probabilities: &ProbabilityVector,
    classes: &Vocabulary,
) -> Result<(), ResolveError> {
    if classes.is_empty() {
        return Err(ResolveError::EmptyVocabulary);
    }
    if probabilities.len() != classes.len() {
        return Err(ResolveError::VocabularyMismatch {
            probabilities: probabilities.len(),
            classes: classes.len(),
        });
    }
    if let Some(index) = probabilities.as_slice().iter().position(|p| !p.is_finite()) {
        return Err(ResolveError::NonFinite { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs(values: &[f64]) -> ProbabilityVector {
        ProbabilityVector::new(values.to_vec())
    }

    fn classes() -> Vocabulary {
        Vocabulary::new(["A", "B", "C"])
    }

    #[test]
    fn test_resolve_picks_max() {
        let result = resolve(&probs(&[0.2, 0.5, 0.3]), &classes()).expect("Should resolve");
        assert_eq!(result.diagnosis, "B");
        assert!((result.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_tie_takes_first() {
        let result = resolve(&probs(&[0.4, 0.4, 0.2]), &classes()).expect("Should resolve");
        assert_eq!(result.diagnosis, "A");
        assert!((result.confidence - 0.4).abs() < f64::EPSILON);

        let result = resolve(&probs(&[0.1, 0.45, 0.45]), &classes()).expect("Should resolve");
        assert_eq!(result.diagnosis, "B");
    }

    #[test]
    fn test_resolve_length_mismatch() {
        let err = resolve(&probs(&[0.5, 0.5]), &classes()).expect_err("Should fail");
        assert_eq!(
            err,
            ResolveError::VocabularyMismatch {
                probabilities: 2,
                classes: 3,
            }
        );

        let err = resolve(&probs(&[0.1, 0.2, 0.3, 0.4]), &classes()).expect_err("Should fail");
        assert!(matches!(err, ResolveError::VocabularyMismatch { probabilities: 4, .. }));
    }

    #[test]
    fn test_resolve_passes_confidence_through() {
        // Scores outside [0, 1] and not summing to 1 are surfaced unchanged.
        let result = resolve(&probs(&[1.7, -0.3, 0.9]), &classes()).expect("Should resolve");
        assert_eq!(result.diagnosis, "A");
        assert!((result.confidence - 1.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_rejects_non_finite() {
        let err = resolve(&probs(&[0.1, f64::NAN, 0.3]), &classes()).expect_err("Should fail");
        assert_eq!(err, ResolveError::NonFinite { index: 1 });
    }

    #[test]
    fn test_resolve_empty_vocabulary() {
        let err = resolve(&probs(&[]), &Vocabulary::default()).expect_err("Should fail");
        assert_eq!(err, ResolveError::EmptyVocabulary);
    }

    #[test]
    fn test_resolve_ranked_keeps_vocabulary_order() {
        let ranked =
            resolve_ranked(&probs(&[0.2, 0.5, 0.3]), &classes()).expect("Should resolve");
        assert_eq!(ranked.top.diagnosis, "B");

        let diseases: Vec<&str> = ranked.distribution.iter().map(|d| d.disease.as_str()).collect();
        assert_eq!(diseases, ["A", "B", "C"]);

        let sorted: Vec<String> = ranked.by_probability().into_iter().map(|d| d.disease).collect();
        assert_eq!(sorted, ["B", "C", "A"]);
    }

    #[test]
    fn test_by_probability_is_stable_on_ties() {
        let ranked =
            resolve_ranked(&probs(&[0.3, 0.4, 0.3]), &classes()).expect("Should resolve");
        let sorted: Vec<String> = ranked.by_probability().into_iter().map(|d| d.disease).collect();
        assert_eq!(sorted, ["B", "A", "C"]);
    }

    #[test]
    fn test_ranked_serialization_flattens_top() {
        let ranked = resolve_ranked(&probs(&[0.9, 0.05, 0.05]), &classes())
            .expect("Should resolve");
        let json = serde_json::to_value(&ranked).expect("Should serialize");
        assert_eq!(json["diagnosis"], "A");
        assert_eq!(json["distribution"][2]["disease"], "C");
    }

    #[test]
    fn test_argmax_single_entry() {
        assert_eq!(ProbabilityVector::new(vec![0.0]).argmax(), Some(0));
        assert_eq!(ProbabilityVector::new(vec![]).argmax(), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// First index holding the maximum.
        fn first_max(values: &[f64]) -> usize {
            let mut best = 0;
            for (i, &v) in values.iter().enumerate() {
                if v > values[best] {
                    best = i;
                }
            }
            best
        }

        fn numbered(len: usize) -> Vocabulary {
            Vocabulary::new((0..len).map(|i| format!("class-{i}")))
        }

        // A small pool of values makes ties common.
        fn probabilities() -> impl Strategy<Value = Vec<f64>> {
            prop_oneof![
                prop::collection::vec(prop::sample::select(vec![0.0, 0.1, 0.25, 0.5, 0.9]), 1..24),
                prop::collection::vec(0.0f64..1.0, 1..24),
            ]
        }

        proptest! {
            #[test]
            fn prop_resolve_matches_linear_scan(values in probabilities()) {
                let classes = numbered(values.len());
                let result = resolve(&ProbabilityVector::new(values.clone()), &classes)
                    .expect("Should resolve");

                let expected = first_max(&values);
                prop_assert_eq!(result.diagnosis, format!("class-{expected}"));
                prop_assert_eq!(result.confidence.to_bits(), values[expected].to_bits());
            }

            #[test]
            fn prop_length_mismatch_always_rejected(values in probabilities(), extra in 1usize..4) {
                let classes = numbered(values.len() + extra);
                let is_mismatch = matches!(
                    resolve(&ProbabilityVector::new(values), &classes),
                    Err(ResolveError::VocabularyMismatch { .. })
                );
                prop_assert!(is_mismatch);
            }
        }
    }
}
