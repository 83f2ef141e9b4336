//! Cross-pass deduplication.
//!
//! Passes overlap; the verification pass in particular re-reads
//! text other passes already covered. Obligations are deduplicated by a
//! hash of (normalized condition reference, first 100 characters of the
//! description, case- and whitespace-folded). When two obligations hash
//! identically the one with higher confidence survives and the other is
//! discarded whole; fields are never merged.

use sha2::{Digest, Sha256};

use crate::types::ExtractedObligation;

const DESCRIPTION_PREFIX_CHARS: usize = 100;

/// Dedup hash for one obligation.
pub fn dedupe_key(obligation: &ExtractedObligation) -> [u8; 32] {
    let reference = fold(obligation.condition_reference.as_deref().unwrap_or(""));
    let prefix: String = fold(&obligation.description)
        .chars()
        .take(DESCRIPTION_PREFIX_CHARS)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hasher.update([0u8]); // field separator
    hasher.update(prefix.as_bytes());
    hasher.finalize().into()
}

/// Lowercase and collapse whitespace runs to single spaces.
fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deduplicate, keeping the higher-confidence obligation per key.
///
/// Order is preserved for survivors: an obligation keeps the position of
/// the first occurrence of its key.
pub fn dedupe_obligations(obligations: Vec<ExtractedObligation>) -> Vec<ExtractedObligation> {
    let mut order: Vec<[u8; 32]> = Vec::new();
    let mut best: std::collections::HashMap<[u8; 32], ExtractedObligation> =
        std::collections::HashMap::new();

    for obligation in obligations {
        let key = dedupe_key(&obligation);
        match best.get(&key) {
            None => {
                order.push(key);
                best.insert(key, obligation);
            }
            Some(existing) if obligation.confidence > existing.confidence => {
                best.insert(key, obligation);
            }
            Some(_) => {}
        }
    }

    order
        .into_iter()
        .filter_map(|key| best.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObligationCategory, PassKind, Provenance};

    fn obligation(reference: &str, description: &str, confidence: f32) -> ExtractedObligation {
        let mut ob = ExtractedObligation::new(
            ObligationCategory::Monitoring,
            description,
            confidence,
            Provenance::Pass {
                kind: PassKind::NumberedConditions,
            },
        );
        if !reference.is_empty() {
            ob = ob.with_reference(reference);
        }
        ob
    }

    #[test]
    fn test_duplicates_folded_case_and_whitespace() {
        let a = obligation("3.1.2", "Monitor  effluent pH Weekly", 0.8);
        let b = obligation("3.1.2", "monitor effluent ph weekly", 0.6);
        assert_eq!(dedupe_key(&a), dedupe_key(&b));

        let kept = dedupe_obligations(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.8);
    }

    #[test]
    fn test_higher_confidence_wins_regardless_of_order() {
        let low = obligation("1.1", "Keep records", 0.5);
        let high = obligation("1.1", "Keep records", 0.9);

        let kept = dedupe_obligations(vec![low.clone(), high.clone()]);
        assert_eq!(kept[0].confidence, 0.9);

        let kept = dedupe_obligations(vec![high, low]);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_different_references_distinct() {
        let a = obligation("1.1", "Keep records", 0.8);
        let b = obligation("1.2", "Keep records", 0.8);
        assert_ne!(dedupe_key(&a), dedupe_key(&b));
        assert_eq!(dedupe_obligations(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_description_beyond_prefix_ignored() {
        let long_a = format!("{} tail one", "x".repeat(120));
        let long_b = format!("{} tail two", "x".repeat(120));
        let a = obligation("", &long_a, 0.8);
        let b = obligation("", &long_b, 0.7);
        // First 100 chars identical, so these are duplicates.
        assert_eq!(dedupe_key(&a), dedupe_key(&b));
    }

    #[test]
    fn test_survivor_keeps_first_position() {
        let first = obligation("1.1", "First obligation", 0.9);
        let second = obligation("2.2", "Second obligation", 0.4);
        let second_again = obligation("2.2", "Second obligation", 0.95);

        let kept = dedupe_obligations(vec![first, second, second_again]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].condition_reference.as_deref(), Some("1.1"));
        assert_eq!(kept[1].confidence, 0.95);
    }

    #[test]
    fn test_no_two_survivors_share_a_key() {
        let input = vec![
            obligation("1.1", "A", 0.5),
            obligation("1.1", "A", 0.6),
            obligation("1.1", "B", 0.7),
            obligation("", "A", 0.8),
        ];
        let kept = dedupe_obligations(input);
        let mut keys: Vec<_> = kept.iter().map(dedupe_key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), kept.len());
    }
}
