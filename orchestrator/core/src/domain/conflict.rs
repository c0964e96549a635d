// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Classification conflict resolution.
//!
//! When several agents label the same data differently, the most restrictive
//! label wins unless one candidate is clearly more confident than the rest.

use std::collections::BTreeSet;

use crate::domain::classification::{Classification, ClassificationError};

pub const DEFAULT_GAP_THRESHOLD: f64 = 0.60;

/// Most restrictive of `candidates`. Any unknown label fails the whole call.
pub fn resolve_classification<S: AsRef<str>>(
    candidates: &[S],
) -> Result<Classification, ClassificationError> {
    let mut resolved: Option<Classification> = None;
    for candidate in candidates {
        let parsed: Classification = candidate.as_ref().parse()?;
        resolved = Some(match resolved {
            Some(current) => current.max(parsed),
            None => parsed,
        });
    }
    resolved.ok_or(ClassificationError::NoCandidates)
}

/// Confidence-weighted resolution.
///
/// If the most confident candidate beats the runner-up by more than
/// `gap_threshold` it wins outright; otherwise the most restrictive label
/// among all candidates is returned.
pub fn resolve_classification_candidates<S: AsRef<str>>(
    candidates: &[(S, f64)],
    gap_threshold: f64,
) -> Result<Classification, ClassificationError> {
    if candidates.is_empty() {
        return Err(ClassificationError::NoCandidates);
    }

    let mut parsed = candidates
        .iter()
        .map(|(label, confidence)| {
            let confidence = if confidence.is_nan() { 0.0 } else { *confidence };
            label
                .as_ref()
                .parse::<Classification>()
                .map(|c| (c, confidence))
        })
        .collect::<Result<Vec<_>, _>>()?;

    parsed.sort_by(|a, b| b.1.total_cmp(&a.1));

    if let [top, runner_up, ..] = parsed.as_slice() {
        if top.1 - runner_up.1 > gap_threshold {
            return Ok(top.0);
        }
    } else if let [only] = parsed.as_slice() {
        return Ok(only.0);
    }

    parsed
        .iter()
        .map(|(c, _)| *c)
        .max()
        .ok_or(ClassificationError::NoCandidates)
}

/// True iff more than one distinct normalized label is present.
pub fn detect_classification_conflict<S: AsRef<str>>(candidates: &[S]) -> bool {
    let distinct: BTreeSet<String> = candidates
        .iter()
        .map(|c| c.as_ref().trim().to_ascii_lowercase())
        .collect();
    distinct.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_most_restrictive_wins() {
        assert_eq!(
            resolve_classification(&["public", "confidential"]).unwrap(),
            Classification::Confidential
        );
        assert_eq!(
            resolve_classification(&["confidential", "public"]).unwrap(),
            Classification::Confidential
        );
        assert_eq!(
            resolve_classification(&["internal", "Restricted ", "public"]).unwrap(),
            Classification::Restricted
        );
    }

    #[test]
    fn test_unknown_label_fails_closed() {
        assert!(matches!(
            resolve_classification(&["public", "top-secret"]),
            Err(ClassificationError::Unknown(_))
        ));
        let empty: [&str; 0] = [];
        assert_eq!(
            resolve_classification(&empty),
            Err(ClassificationError::NoCandidates)
        );
    }

    #[test]
    fn test_confident_candidate_wins_outright() {
        let candidates = [("public", 0.95), ("restricted", 0.2)];
        assert_eq!(
            resolve_classification_candidates(&candidates, DEFAULT_GAP_THRESHOLD).unwrap(),
            Classification::Public
        );
    }

    #[test]
    fn test_small_gap_falls_back_to_restrictive() {
        let candidates = [("public", 0.9), ("restricted", 0.5)];
        assert_eq!(
            resolve_classification_candidates(&candidates, DEFAULT_GAP_THRESHOLD).unwrap(),
            Classification::Restricted
        );
        // gap exactly at the threshold is not enough
        let candidates = [("public", 0.75), ("internal", 0.25)];
        assert_eq!(
            resolve_classification_candidates(&candidates, 0.5).unwrap(),
            Classification::Internal
        );
    }

    #[test]
    fn test_candidates_empty_or_unknown() {
        let empty: [(&str, f64); 0] = [];
        assert_eq!(
            resolve_classification_candidates(&empty, DEFAULT_GAP_THRESHOLD),
            Err(ClassificationError::NoCandidates)
        );
        assert!(resolve_classification_candidates(&[("secret", 1.0)], 0.6).is_err());
    }

    #[test]
    fn test_conflict_detection() {
        assert!(!detect_classification_conflict(&["Public", " public"]));
        assert!(detect_classification_conflict(&["public", "internal"]));
        let empty: [&str; 0] = [];
        assert!(!detect_classification_conflict(&empty));
    }

    proptest! {
        #[test]
        fn prop_resolution_invariant_under_reordering(
            labels in prop::collection::vec(0usize..4, 1..8),
            seed in any::<u64>(),
        ) {
            let names: Vec<&str> = labels.iter().map(|i| Classification::ALL[*i].as_str()).collect();
            let expected = resolve_classification(&names).unwrap();

            // deterministic rotation driven by the seed
            let mut reordered = labels.clone();
            let len = reordered.len();
            reordered.rotate_left((seed as usize) % len);
            reordered.reverse();
            let shuffled: Vec<&str> = reordered.iter().map(|i| Classification::ALL[*i].as_str()).collect();
            prop_assert_eq!(resolve_classification(&shuffled).unwrap(), expected);
        }
    }
}
