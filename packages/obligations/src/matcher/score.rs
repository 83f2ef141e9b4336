//! Pattern scoring against document segments.
//!
//! Score bands: a primary regex hit lands in [0.85, 1.0] by match
//! coverage, a variant hit in [0.75, 0.90]. Each triggered negative
//! pattern subtracts 0.15 regardless of which regex matched: a
//! disqualifier disqualifies. When the regex score alone is promising but
//! not conclusive ([0.70, 0.90)), fractional keyword overlap mapped into
//! [0.5, 0.85] is blended in at 0.6·regex + 0.4·semantic.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::types::{MatchKind, RulePattern};

const PRIMARY_FLOOR: f32 = 0.85;
const VARIANT_FLOOR: f32 = 0.75;
const BAND_WIDTH: f32 = 0.15;
const NEGATIVE_PENALTY: f32 = 0.15;
const SEMANTIC_FLOOR: f32 = 0.5;
const SEMANTIC_WIDTH: f32 = 0.35;
const BLEND_LOWER: f32 = 0.70;
const BLEND_UPPER: f32 = 0.90;

/// A pattern with its regexes compiled once.
///
/// Compilation is case-insensitive: permit wording varies between
/// "The operator shall" and "the operator SHALL".
pub struct CompiledPattern {
    pub pattern: RulePattern,
    primary: Regex,
    variants: Vec<Regex>,
    negatives: Vec<Regex>,
}

impl CompiledPattern {
    /// Compile a pattern's regexes. An invalid primary is an error; an
    /// invalid variant or negative is logged and dropped so one bad entry
    /// doesn't disable the rest of the pattern.
    pub fn compile(pattern: RulePattern) -> Result<Self, regex::Error> {
        let primary = build(&pattern.primary_regex)?;

        let variants = pattern
            .variant_regexes
            .iter()
            .filter_map(|source| match build(source) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern_id = %pattern.id, source, error = %e, "invalid variant regex, dropped");
                    None
                }
            })
            .collect();

        let negatives = pattern
            .negative_patterns
            .iter()
            .filter_map(|source| match build(source) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern_id = %pattern.id, source, error = %e, "invalid negative regex, dropped");
                    None
                }
            })
            .collect();

        Ok(Self {
            pattern,
            primary,
            variants,
            negatives,
        })
    }
}

fn build(source: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(source).case_insensitive(true).build()
}

/// A segment's score for one pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentScore {
    pub score: f32,
    pub kind: MatchKind,
    pub matched_text: String,
}

/// Score one segment against one compiled pattern.
///
/// Returns `None` when neither the primary nor any variant matches.
/// The caller applies the return threshold; this function reports every
/// scored match so near-misses are visible to diagnostics.
pub fn score_segment(compiled: &CompiledPattern, segment: &str) -> Option<SegmentScore> {
    let segment_chars = segment.chars().count().max(1);

    let (mut score, mut kind, matched_text) =
        if let Some(found) = compiled.primary.find(segment) {
            let coverage = coverage_of(found.as_str(), segment_chars);
            (
                PRIMARY_FLOOR + BAND_WIDTH * coverage,
                MatchKind::Primary,
                found.as_str().to_string(),
            )
        } else {
            let best = compiled
                .variants
                .iter()
                .filter_map(|variant| variant.find(segment))
                .max_by_key(|found| found.as_str().len())?;
            let coverage = coverage_of(best.as_str(), segment_chars);
            (
                VARIANT_FLOOR + BAND_WIDTH * coverage,
                MatchKind::Variant,
                best.as_str().to_string(),
            )
        };

    let negative_hits = compiled
        .negatives
        .iter()
        .filter(|negative| negative.is_match(segment))
        .count();
    score -= NEGATIVE_PENALTY * negative_hits as f32;

    if (BLEND_LOWER..BLEND_UPPER).contains(&score) && !compiled.pattern.keywords.is_empty() {
        let semantic = SEMANTIC_FLOOR + SEMANTIC_WIDTH * keyword_overlap(&compiled.pattern.keywords, segment);
        score = 0.6 * score + 0.4 * semantic;
        kind = MatchKind::Combined;
    }

    Some(SegmentScore {
        score: score.clamp(0.0, 1.0),
        kind,
        matched_text,
    })
}

fn coverage_of(matched: &str, segment_chars: usize) -> f32 {
    (matched.chars().count() as f32 / segment_chars as f32).clamp(0.0, 1.0)
}

/// Fraction of the pattern's keywords present in the segment.
fn keyword_overlap(keywords: &[String], segment: &str) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let folded = segment.to_lowercase();
    let present = keywords
        .iter()
        .filter(|k| folded.contains(&k.to_lowercase()))
        .count();
    present as f32 / keywords.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObligationCategory, ObligationTemplate};

    fn compile(pattern: RulePattern) -> CompiledPattern {
        CompiledPattern::compile(pattern).unwrap()
    }

    fn monitoring_pattern() -> RulePattern {
        RulePattern::new(
            r"shall\s+monitor\s+.{0,40}\s+(?:weekly|daily|monthly)",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        )
    }

    #[test]
    fn test_primary_score_in_band() {
        let compiled = compile(monitoring_pattern());
        let score =
            score_segment(&compiled, "The operator shall monitor effluent pH weekly").unwrap();

        assert_eq!(score.kind, MatchKind::Primary);
        assert!(score.score >= 0.85 && score.score <= 1.0, "got {}", score.score);
    }

    #[test]
    fn test_full_coverage_scores_one() {
        let pattern = RulePattern::new(
            r".*",
            ObligationTemplate::new(ObligationCategory::Operational),
        );
        let score = score_segment(&compile(pattern), "entire segment matched").unwrap();
        assert!((score.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_pattern_subtracts() {
        let pattern = monitoring_pattern().with_negatives([r"unless\s+otherwise\s+agreed"]);
        let compiled = compile(pattern);

        let clean = score_segment(
            &compiled,
            "The operator shall monitor effluent pH weekly",
        )
        .unwrap();
        let disqualified = score_segment(
            &compiled,
            "The operator shall monitor effluent pH weekly unless otherwise agreed in writing",
        )
        .unwrap();

        assert!(disqualified.score < clean.score);
        assert!(clean.score - disqualified.score >= NEGATIVE_PENALTY - 0.05);
    }

    #[test]
    fn test_variant_band_lower_than_primary() {
        let pattern = RulePattern::new(
            r"this primary will never match anything here",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        )
        .with_variants([r"monitor\s+\w+"]);
        let compiled = compile(pattern);

        let score = score_segment(&compiled, "Please monitor emissions as agreed").unwrap();
        assert_eq!(score.kind, MatchKind::Variant);
        assert!(score.score >= 0.75 && score.score < 0.90, "got {}", score.score);
    }

    #[test]
    fn test_semantic_blend_in_uncertain_band() {
        // Short variant match on a long segment lands in [0.70, 0.90);
        // keywords then pull the blended score up.
        let segment = "The operator must keep monitoring records of effluent discharge \
                       and report the sampling results to the agency every quarter";
        let base = RulePattern::new(
            r"primary never matches this text at all",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        )
        .with_variants([r"monitoring\s+records"]);

        let without = score_segment(&compile(base.clone()), segment).unwrap();
        assert_eq!(without.kind, MatchKind::Variant);
        assert!(without.score < 0.90);

        let with_keywords =
            score_segment(&compile(base.with_keywords(["monitoring", "sampling", "discharge"])), segment)
                .unwrap();
        assert_eq!(with_keywords.kind, MatchKind::Combined);
        // All three keywords present: semantic = 0.85.
        let expected = 0.6 * without.score + 0.4 * 0.85;
        assert!((with_keywords.score - expected).abs() < 1e-4);
    }

    #[test]
    fn test_no_blend_above_band() {
        let segment = "shall monitor pH weekly";
        let pattern = RulePattern::new(r"shall\s+monitor\s+pH\s+weekly", ObligationTemplate::new(ObligationCategory::Monitoring))
            .with_keywords(["unrelated", "keywords"]);
        let score = score_segment(&compile(pattern), segment).unwrap();
        // Primary at full coverage stays primary; keywords don't dilute it.
        assert_eq!(score.kind, MatchKind::Primary);
        assert!(score.score >= 0.95);
    }

    #[test]
    fn test_no_match_returns_none() {
        let compiled = compile(monitoring_pattern());
        assert!(score_segment(&compiled, "Invoice total: forty pounds").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let compiled = compile(monitoring_pattern());
        assert!(score_segment(&compiled, "THE OPERATOR SHALL MONITOR PH DAILY").is_some());
    }

    #[test]
    fn test_invalid_variant_dropped_not_fatal() {
        let pattern = monitoring_pattern().with_variants(["(unclosed"]);
        let compiled = CompiledPattern::compile(pattern).unwrap();
        assert!(compiled.variants.is_empty());
    }

    #[test]
    fn test_invalid_primary_is_error() {
        let pattern = RulePattern::new(
            "(unclosed",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        );
        assert!(CompiledPattern::compile(pattern).is_err());
    }

    #[test]
    fn test_keyword_overlap_fraction() {
        let keywords = vec!["monitor".to_string(), "report".to_string(), "sample".to_string()];
        assert_eq!(keyword_overlap(&keywords, "monitor and report"), 2.0 / 3.0);
        assert_eq!(keyword_overlap(&keywords, "nothing relevant"), 0.0);
    }
}
