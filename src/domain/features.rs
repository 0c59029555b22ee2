//! Feature encoding: symptom names to a positional 0/1 vector.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::vocabulary::Vocabulary;

/// Presence vector aligned index-for-index with the symptom vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
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

    /// Number of positions set to 1.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|&&v| v == 1).count()
    }
}

/// Encode submitted symptom names against the vocabulary.
///
/// Matching is exact and case-sensitive. Names outside the vocabulary are
/// ignored, repeated names have no extra effect, and the input order is
/// irrelevant. The result always has `vocabulary.len()` entries.
pub fn encode<S: AsRef<str>>(symptoms: &[S], vocabulary: &Vocabulary) -> FeatureVector {
    let present: HashSet<&str> = symptoms.iter().map(AsRef::as_ref).collect();
    FeatureVector(
        vocabulary
            .iter()
            .map(|name| u8::from(present.contains(name)))
            .collect(),
    )
}

/// Submitted names that the vocabulary does not know, deduplicated, in input order.
pub fn unknown_symptoms<'a, S: AsRef<str>>(
    symptoms: &'a [S],
    vocabulary: &Vocabulary,
) -> Vec<&'a str> {
    let known: HashSet<&str> = vocabulary.iter().collect();
    let mut seen = HashSet::new();
    symptoms
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !known.contains(name) && seen.insert(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["gatal", "ruam kulit", "bersin"])
    }

    #[test]
    fn test_encode_single_symptom() {
        let vector = encode(&["bersin"], &vocab());
        assert_eq!(vector.as_slice(), &[0, 0, 1]);
    }

    #[test]
    fn test_encode_empty_is_all_zero() {
        let none: [&str; 0] = [];
        let vector = encode(&none, &vocab());
        assert_eq!(vector.as_slice(), &[0, 0, 0]);
        assert_eq!(vector.active_count(), 0);
    }

    #[test]
    fn test_encode_ignores_unknown_and_duplicates() {
        let vector = encode(&["gatal", "demam", "gatal", "gatal"], &vocab());
        assert_eq!(vector.as_slice(), &[1, 0, 0]);
    }

    #[test]
    fn test_encode_is_case_sensitive() {
        let vector = encode(&["Bersin", "GATAL", " ruam kulit"], &vocab());
        assert_eq!(vector.as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_encode_duplicate_vocabulary_positions() {
        let vocabulary = Vocabulary::new(["demam", "batuk", "demam"]);
        let vector = encode(&["demam"], &vocabulary);
        assert_eq!(vector.as_slice(), &[1, 0, 1]);
    }

    #[test]
    fn test_encode_serializes_as_numbers() {
        let vector = encode(&["ruam kulit"], &vocab());
        let json = serde_json::to_string(&vector).expect("Should serialize");
        assert_eq!(json, "[0,1,0]");
    }

    #[test]
    fn test_unknown_symptoms() {
        let unknown = unknown_symptoms(&["demam", "bersin", "demam", "Gatal"], &vocab());
        assert_eq!(unknown, vec!["demam", "Gatal"]);
    }

    const POOL: [&str; 6] = ["gatal", "ruam kulit", "bersin", "demam", "batuk", "Bersin"];

    fn symptom_list() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop_oneof![
                prop::sample::select(POOL.to_vec()).prop_map(str::to_string),
                "[a-z ]{0,12}",
            ],
            0..16,
        )
    }

    proptest! {
        #[test]
        fn prop_length_matches_vocabulary(symptoms in symptom_list()) {
            prop_assert_eq!(encode(&symptoms, &vocab()).len(), vocab().len());
        }

        #[test]
        fn prop_values_are_binary(symptoms in symptom_list()) {
            let vector = encode(&symptoms, &vocab());
            prop_assert!(vector.as_slice().iter().all(|&v| v <= 1));
        }

        #[test]
        fn prop_order_independent(
            (original, shuffled) in symptom_list()
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            prop_assert_eq!(encode(&original, &vocab()), encode(&shuffled, &vocab()));
        }

        #[test]
        fn prop_position_set_iff_submitted(symptoms in symptom_list()) {
            let vocabulary = vocab();
            let vector = encode(&symptoms, &vocabulary);
            for (i, name) in vocabulary.iter().enumerate() {
                let submitted = symptoms.iter().any(|s| s == name);
                prop_assert_eq!(vector.as_slice()[i] == 1, submitted);
            }
        }
    }
}
