//! The matcher: applicable patterns scored over document segments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::score::{score_segment, CompiledPattern};
use super::segment::segment_document;
use crate::error::Result;
use crate::stores::PatternStore;
use crate::types::{ExtractionConfig, ExtractionContext, PatternMatch};

/// Scores document segments against the shared pattern library.
///
/// Zero network cost: everything here is regex and keyword arithmetic.
/// Only matches at or above the configured threshold (default 0.90) are
/// returned; that threshold is the boundary between free and paid
/// extraction.
pub struct Matcher {
    store: Arc<dyn PatternStore>,
    /// Compiled regexes, keyed by (pattern id, version) so a re-versioned
    /// pattern recompiles
    cache: RwLock<HashMap<(Uuid, String), Arc<CompiledPattern>>>,
    threshold: f32,
    segment_chars: usize,
}

impl Matcher {
    /// Create a matcher with default thresholds.
    pub fn new(store: Arc<dyn PatternStore>) -> Self {
        let config = ExtractionConfig::default();
        Self::with_config(store, &config)
    }

    /// Create a matcher configured from the pipeline config.
    pub fn with_config(store: Arc<dyn PatternStore>, config: &ExtractionConfig) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            threshold: config.match_threshold,
            segment_chars: config.segment_chars,
        }
    }

    /// Find all matches in the document, sorted by score descending.
    ///
    /// Patterns are filtered by applicability before any segment is
    /// scored; an invalid stored regex is logged and skipped, never fatal
    /// to the batch.
    pub async fn find_matches(
        &self,
        text: &str,
        ctx: &ExtractionContext,
    ) -> Result<Vec<PatternMatch>> {
        let patterns = self.store.list_active().await?;
        let applicable: Vec<_> = patterns
            .into_iter()
            .filter(|p| p.applicability.matches(ctx))
            .collect();

        if applicable.is_empty() {
            return Ok(Vec::new());
        }

        let segments = segment_document(text, self.segment_chars);
        let mut matches = Vec::new();

        for pattern in applicable {
            let Some(compiled) = self.compiled(pattern) else {
                continue;
            };
            for segment in &segments {
                if let Some(scored) = score_segment(&compiled, &segment.text) {
                    if scored.score >= self.threshold {
                        matches.push(PatternMatch::instantiate(
                            &compiled.pattern,
                            scored.score,
                            scored.kind,
                            &scored.matched_text,
                            segment.index,
                            &segment.text,
                        ));
                    }
                }
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            segments = segments.len(),
            matches = matches.len(),
            "pattern matching complete"
        );
        Ok(matches)
    }

    /// Fetch or compile a pattern, caching by (id, version).
    fn compiled(&self, pattern: crate::types::RulePattern) -> Option<Arc<CompiledPattern>> {
        let key = (pattern.id, pattern.version.clone());
        if let Some(hit) = self.cache.read().unwrap().get(&key) {
            return Some(hit.clone());
        }

        match CompiledPattern::compile(pattern) {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                self.cache.write().unwrap().insert(key, compiled.clone());
                Some(compiled)
            }
            Err(e) => {
                warn!(pattern_id = %key.0, error = %e, "invalid pattern regex, skipped");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryPatternStore;
    use crate::types::{
        Applicability, ObligationCategory, ObligationTemplate, RulePattern,
    };

    fn monitoring_pattern() -> RulePattern {
        RulePattern::new(
            r"shall\s+monitor\s+[\w\s]{0,40}(?:weekly|daily|monthly)",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        )
    }

    fn matcher_with(patterns: Vec<RulePattern>) -> Matcher {
        Matcher::new(Arc::new(MemoryPatternStore::with_patterns(patterns)))
    }

    /// Segment cap small enough that each sentence scores on its own;
    /// coverage over a merged multi-sentence chunk would dilute below
    /// the threshold by design.
    fn sentence_matcher(patterns: Vec<RulePattern>) -> Matcher {
        let config = ExtractionConfig {
            segment_chars: 60,
            ..Default::default()
        };
        Matcher::with_config(
            Arc::new(MemoryPatternStore::with_patterns(patterns)),
            &config,
        )
    }

    #[tokio::test]
    async fn test_all_returned_matches_clear_threshold() {
        let matcher = sentence_matcher(vec![monitoring_pattern()]);
        let ctx = ExtractionContext::default();
        let text = "The operator shall monitor effluent pH weekly. \
                    Payment terms are thirty days. \
                    Dust shall be assessed from time to time.";

        let matches = matcher.find_matches(text, &ctx).await.unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.score >= 0.90));
    }

    #[tokio::test]
    async fn test_sorted_by_score_descending() {
        let strong = monitoring_pattern();
        let weak = RulePattern::new(
            r"records\s+shall\s+be\s+kept[\w\s]{0,60}",
            ObligationTemplate::new(ObligationCategory::RecordKeeping),
        );
        let matcher = sentence_matcher(vec![weak, strong]);
        let ctx = ExtractionContext::default();
        let text = "The operator shall monitor emissions daily. \
                    Records shall be kept for six years at the site office.";

        let matches = matcher.find_matches(text, &ctx).await.unwrap();
        assert!(matches.len() >= 2);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_applicability_filters_patterns() {
        let pattern = monitoring_pattern()
            .with_applicability(Applicability::for_modules(["waste"]));
        let matcher = matcher_with(vec![pattern]);
        let text = "The operator shall monitor effluent pH weekly.";

        let wrong_module = ExtractionContext::new(["water_discharge"]);
        assert!(matcher
            .find_matches(text, &wrong_module)
            .await
            .unwrap()
            .is_empty());

        let right_module = ExtractionContext::new(["waste"]);
        assert!(!matcher
            .find_matches(text, &right_module)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pattern_skipped_not_fatal() {
        let broken = RulePattern::new(
            "(unclosed",
            ObligationTemplate::new(ObligationCategory::Operational),
        );
        let matcher = matcher_with(vec![broken, monitoring_pattern()]);
        let ctx = ExtractionContext::default();

        let matches = matcher
            .find_matches("The operator shall monitor pH weekly.", &ctx)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn test_below_threshold_not_returned() {
        // Variant-only match tops out below 0.90 without keywords.
        let pattern = RulePattern::new(
            r"primary regex matches nothing in this text",
            ObligationTemplate::new(ObligationCategory::Monitoring),
        )
        .with_variants([r"monitor"]);
        let matcher = matcher_with(vec![pattern]);
        let ctx = ExtractionContext::default();

        let matches = matcher
            .find_matches("Please monitor the situation as it develops over time.", &ctx)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
