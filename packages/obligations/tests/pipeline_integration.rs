//! End-to-end pipeline tests against the scripted completion mock.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use obligations::testing::{
    CollectingCosts, CollectingProgress, FailingProgress, MockCompletion, MockReply,
};
use obligations::{
    AnonymizerRules, CandidateStore, Extractor, ExtractionConfig, ExtractionContext,
    MemoryCandidateStore, MemoryPatternStore, MultiPassExtractor, NoopSink, ObligationCategory,
    ObligationTemplate, PassKind, PatternCandidate, PatternStore, PromotionCriteria, Promoter,
    Provenance, RetryPolicy, RulePattern,
};

fn monitoring_pattern() -> RulePattern {
    RulePattern::new(
        r"The operator shall monitor .*weekly at outfall W1",
        ObligationTemplate::new(ObligationCategory::Monitoring),
    )
}

/// A small permit: one sentence matches the stored pattern at high
/// coverage, the rest is background.
const PATTERNED_PERMIT: &str = "\
This permit authorises the operation of a treatment facility.\n\
The operator shall monitor effluent pH weekly at outfall W1.\n\
General site management conditions follow in later sections.\n";

fn config() -> ExtractionConfig {
    // Sentence-sized segments so a matched sentence scores on its own.
    ExtractionConfig {
        segment_chars: 80,
        ..Default::default()
    }
}

fn pass_payload(items: serde_json::Value, coverage: f64) -> serde_json::Value {
    json!({ "obligations": items, "coverage": coverage })
}

// =============================================================================
// Scenario A: pattern hit short-circuits the model
// =============================================================================

#[tokio::test]
async fn pattern_match_skips_model_entirely() {
    let mock = Arc::new(MockCompletion::new());
    let patterns = Arc::new(MemoryPatternStore::with_patterns([monitoring_pattern()]));
    let extractor = Extractor::new(mock.clone(), patterns).with_config(config());

    let result = extractor
        .extract(PATTERNED_PERMIT, &ExtractionContext::new(["installations"]))
        .await
        .unwrap();

    assert!(!result.used_model);
    assert!(result.token_usage.is_none());
    assert!(!result.rule_matches.is_empty());
    assert!(result.rule_matches.iter().all(|m| m.score >= 0.90));
    assert_eq!(result.obligations.len(), 1);
    assert_eq!(result.obligations[0].category, ObligationCategory::Monitoring);
    // The pattern's score plus the fixed boost, capped at 1.0.
    assert!(result.obligations[0].confidence >= 0.95);
    assert!(matches!(
        result.obligations[0].provenance,
        Provenance::Pattern { .. }
    ));

    // The completion service was never touched.
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn confirmation_updates_pattern_counters() {
    let mock = Arc::new(MockCompletion::new());
    let patterns = Arc::new(MemoryPatternStore::with_patterns([monitoring_pattern()]));
    let extractor = Extractor::new(mock, patterns.clone()).with_config(config());

    let result = extractor
        .extract(PATTERNED_PERMIT, &ExtractionContext::default())
        .await
        .unwrap();
    extractor.record_confirmation(&result, true).await.unwrap();

    let pattern_id = result.rule_matches[0].pattern_id;
    let stored = patterns.get(pattern_id).await.unwrap().unwrap();
    assert_eq!(stored.performance.usage_count, 1);
    assert_eq!(stored.performance.success_rate, 1.0);
}

// =============================================================================
// Scenario B: truncated response recovered mid-array
// =============================================================================

#[tokio::test]
async fn truncated_pass_yields_complete_items_only() {
    // Five obligations, cut off inside the fourth.
    let truncated = r#"{"obligations": [
        {"condition_reference": "1.1", "description": "Monitor pH daily", "category": "monitoring"},
        {"condition_reference": "1.2", "description": "Report results quarterly", "category": "reporting"},
        {"condition_reference": "1.3", "description": "Keep records for six years", "category": "record_keeping"},
        {"condition_reference": "1.4", "description": "Maint"#;

    let mock = Arc::new(
        MockCompletion::new()
            .with_pass_reply(
                PassKind::NumberedConditions,
                MockReply::Truncated(truncated.to_string()),
            )
            .with_default(MockReply::Content(
                pass_payload(json!([]), 0.9).to_string(),
            )),
    );

    let extractor = MultiPassExtractor::new(mock, ExtractionConfig::default());
    let outcome = extractor
        .run(
            "A permit document with numbered conditions.",
            &ExtractionContext::default(),
            &RetryPolicy::default(),
            &NoopSink,
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.obligations.len(), 3);
    let numbered = outcome
        .passes
        .iter()
        .find(|p| p.kind == PassKind::NumberedConditions)
        .unwrap();
    assert!(!numbered.failed);
    assert_eq!(numbered.obligations.len(), 3);
    // Recovered items never report full certainty.
    assert!(numbered.obligations.iter().all(|o| o.confidence < 1.0));
}

// =============================================================================
// Scenario C: one pass fails, the document survives
// =============================================================================

#[tokio::test]
async fn single_pass_timeout_does_not_fail_document() {
    let mock = Arc::new(
        MockCompletion::new()
            .with_pass_obligations(
                PassKind::NumberedConditions,
                pass_payload(
                    json!([{"condition_reference": "1.1", "description": "Monitor pH daily", "category": "monitoring"}]),
                    0.0,
                ),
            )
            .with_pass_reply(PassKind::TableRows, MockReply::Timeout)
            .with_pass_obligations(
                PassKind::ImprovementConditions,
                pass_payload(
                    json!([{"condition_reference": "IC1", "description": "Install abatement plant", "category": "improvement"}]),
                    0.0,
                ),
            )
            .with_pass_obligations(
                PassKind::EmissionLimits,
                pass_payload(
                    json!([{"condition_reference": "ELV1", "description": "NOx shall not exceed 190 mg/m3", "category": "emission_limit"}]),
                    0.0,
                ),
            )
            .with_pass_obligations(PassKind::Verification, pass_payload(json!([]), 0.9)),
    );

    let extractor = MultiPassExtractor::new(mock, ExtractionConfig::default());
    let outcome = extractor
        .run(
            "Document text.",
            &ExtractionContext::default(),
            &RetryPolicy::default(),
            &NoopSink,
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.obligations.len(), 3);

    let tables = outcome
        .passes
        .iter()
        .find(|p| p.kind == PassKind::TableRows)
        .unwrap();
    assert!(tables.failed);
    assert!(tables.obligations.is_empty());

    assert!((outcome.coverage - 0.9).abs() < 1e-6);
    assert!(!outcome.total_failure());
}

#[tokio::test]
async fn failed_verification_defaults_coverage() {
    let mock = Arc::new(
        MockCompletion::new()
            .with_pass_reply(PassKind::Verification, MockReply::Timeout)
            .with_default(MockReply::Content(
                pass_payload(
                    json!([{"description": "Keep records", "category": "record_keeping"}]),
                    0.0,
                )
                .to_string(),
            )),
    );

    let extractor = MultiPassExtractor::new(mock, ExtractionConfig::default());
    let outcome = extractor
        .run(
            "Document text.",
            &ExtractionContext::default(),
            &RetryPolicy::default(),
            &NoopSink,
            None,
        )
        .await
        .unwrap();

    assert!((outcome.coverage - 0.85).abs() < 1e-6);
}

// =============================================================================
// Orchestrator fallback and failure surface
// =============================================================================

#[tokio::test]
async fn no_pattern_match_falls_back_to_model() {
    let mock = Arc::new(
        MockCompletion::new().with_default(MockReply::Content(
            pass_payload(
                json!([{"condition_reference": "2.1", "description": "Notify the regulator of any breach", "category": "notification"}]),
                0.8,
            )
            .to_string(),
        )),
    );
    let patterns = Arc::new(MemoryPatternStore::new());
    let costs = Arc::new(CollectingCosts::new());
    let extractor = Extractor::new(mock.clone(), patterns)
        .with_config(config())
        .with_costs(costs.clone());

    let result = extractor
        .extract(
            "No stored pattern matches this document at all.",
            &ExtractionContext::default().with_permit_reference("EPR/XX9999YY"),
        )
        .await
        .unwrap();

    assert!(result.used_model);
    assert!(result.rule_matches.is_empty());
    assert!(!result.obligations.is_empty());
    assert_eq!(result.coverage, Some(0.8));

    // Five passes ran and their spend was accumulated and recorded.
    assert_eq!(mock.calls().len(), 5);
    let usage = result.token_usage.unwrap();
    assert_eq!(usage.input_tokens, 5000);
    let records = costs.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].document_ref.as_deref(), Some("EPR/XX9999YY"));
    assert_eq!(records[0].usage, usage);
}

#[tokio::test]
async fn total_failure_surfaces_typed_error() {
    let mock = Arc::new(MockCompletion::new().with_default(MockReply::Timeout));
    let patterns = Arc::new(MemoryPatternStore::new());
    let extractor = Extractor::new(mock, patterns).with_config(config());

    let result = extractor
        .extract("Nothing matches and the service is down.", &ExtractionContext::default())
        .await;

    assert!(matches!(
        result,
        Err(obligations::ExtractionError::AllStrategiesFailed { .. })
    ));
}

#[tokio::test]
async fn failing_progress_sink_never_fails_extraction() {
    let mock = Arc::new(MockCompletion::new());
    let patterns = Arc::new(MemoryPatternStore::with_patterns([monitoring_pattern()]));
    let extractor = Extractor::new(mock, patterns)
        .with_config(config())
        .with_progress(Arc::new(FailingProgress));

    let result = extractor
        .extract(PATTERNED_PERMIT, &ExtractionContext::default())
        .await
        .unwrap();
    assert!(!result.used_model);
}

#[tokio::test]
async fn progress_reports_stages() {
    let mock = Arc::new(
        MockCompletion::new().with_default(MockReply::Content(
            pass_payload(json!([{"description": "Keep records", "category": "record_keeping"}]), 0.8)
                .to_string(),
        )),
    );
    let patterns = Arc::new(MemoryPatternStore::new());
    let progress = Arc::new(CollectingProgress::new());
    let extractor = Extractor::new(mock, patterns)
        .with_config(config())
        .with_progress(progress.clone());

    extractor
        .extract("Unmatched document.", &ExtractionContext::default())
        .await
        .unwrap();

    let stages = progress.stages();
    assert!(stages.contains(&"pattern_match".to_string()));
    assert!(stages.contains(&"multi_pass_complete".to_string()));
}

#[tokio::test]
async fn cancellation_between_passes() {
    let mock = Arc::new(MockCompletion::new().with_default(MockReply::Content(
        pass_payload(json!([{"description": "X", "category": "operational"}]), 0.8).to_string(),
    )));
    let patterns = Arc::new(MemoryPatternStore::new());
    let extractor = Extractor::new(mock, patterns).with_config(config());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = extractor
        .extract_with_cancel("Unmatched document.", &ExtractionContext::default(), cancel)
        .await;
    assert!(matches!(result, Err(obligations::ExtractionError::Cancelled)));
}

// =============================================================================
// Scenario D: promotion eligibility names the shortfall
// =============================================================================

#[tokio::test]
async fn promotion_shortfall_names_usage_count() {
    let patterns = Arc::new(MemoryPatternStore::new());
    let candidates = Arc::new(MemoryCandidateStore::new());

    let mut candidate = PatternCandidate::new(
        ObligationCategory::Monitoring,
        r"operator\s+shall\s+monitor",
        vec![],
        3,
        0.95,
    );
    for _ in 0..9 {
        candidate.performance.record(true); // 9 uses, success rate 1.0
    }
    let id = candidate.id;
    candidates.insert(candidate).await.unwrap();

    let promoter = Promoter::new(patterns, candidates)
        .with_criteria(PromotionCriteria::default())
        .with_rules(AnonymizerRules::uk_defaults());

    let verdict = promoter.check(id).await.unwrap();
    assert!(!verdict.eligible);
    let reason = verdict.reason.unwrap();
    assert!(reason.contains("usage_count"), "reason: {}", reason);
}
