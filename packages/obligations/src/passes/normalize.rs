//! Normalization of recovered model output into obligation records.
//!
//! The recovery parser yields loose JSON values; this module maps them
//! into [`ExtractedObligation`]s leniently: a missing category falls
//! back to the pass's natural category, unknown frequencies become None,
//! confidence is clamped. An item without a usable description is
//! dropped, not an error.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{
    Deadline, ExtractedObligation, Frequency, ObligationCategory, PassKind, Provenance,
};

/// The per-item shape passes ask the model for. Also used to derive the
/// strict response schema sent in structured-output mode.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RawObligation {
    pub condition_reference: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub frequency: Option<String>,
    pub deadline: Option<String>,
    pub subjective: Option<bool>,
    pub confidence: Option<f32>,
    pub source_quote: Option<String>,
}

/// The whole-response shape passes ask the model for.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PassResponse {
    pub obligations: Vec<RawObligation>,
    pub coverage: Option<f32>,
}

/// Category a pass's items default to when the model omits one.
fn default_category(kind: PassKind) -> ObligationCategory {
    match kind {
        PassKind::EmissionLimits => ObligationCategory::EmissionLimit,
        PassKind::ImprovementConditions => ObligationCategory::Improvement,
        _ => ObligationCategory::Operational,
    }
}

/// Map one recovered item into an obligation.
///
/// Returns None when the item has no description; there is nothing to
/// comply with. `base_confidence` is the recovery parser's hint; the
/// item's own confidence, when present, is averaged with it so a
/// truncation-recovered item never reports full certainty.
pub fn normalize_item(value: &Value, kind: PassKind, base_confidence: f32) -> Option<ExtractedObligation> {
    let raw: RawObligation = serde_json::from_value(value.clone()).ok()?;

    let description = raw.description?.trim().to_string();
    if description.is_empty() {
        return None;
    }

    let category = raw
        .category
        .as_deref()
        .and_then(ObligationCategory::from_loose)
        .unwrap_or_else(|| default_category(kind));

    let confidence = match raw.confidence {
        Some(own) => (own.clamp(0.0, 1.0) + base_confidence) / 2.0,
        None => base_confidence,
    };

    let mut obligation = ExtractedObligation::new(
        category,
        description,
        confidence,
        Provenance::Pass { kind },
    );

    if let Some(reference) = raw.condition_reference.filter(|r| !r.trim().is_empty()) {
        obligation = obligation.with_reference(reference.trim());
    }
    if let Some(frequency) = raw.frequency.as_deref().and_then(Frequency::from_loose) {
        obligation = obligation.with_frequency(frequency);
    }
    if let Some(deadline) = raw.deadline.as_deref().and_then(Deadline::parse) {
        obligation = obligation.with_deadline(deadline);
    }
    if raw.subjective.unwrap_or(false) {
        obligation = obligation.subjective();
    }
    if let Some(quote) = raw.source_quote.filter(|q| !q.trim().is_empty()) {
        obligation = obligation.with_quote(quote);
    }

    Some(obligation)
}

/// Normalize every recovered item for a pass.
pub fn normalize_items(
    items: &[Value],
    kind: PassKind,
    base_confidence: f32,
) -> Vec<ExtractedObligation> {
    items
        .iter()
        .filter_map(|item| normalize_item(item, kind, base_confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_item_normalizes() {
        let value = json!({
            "condition_reference": "3.1.2",
            "description": "Monitor effluent pH at outfall W1",
            "category": "monitoring",
            "frequency": "weekly",
            "deadline": "2026-06-30",
            "subjective": false,
            "confidence": 0.9,
            "source_quote": "pH shall be monitored weekly at W1"
        });

        let ob = normalize_item(&value, PassKind::NumberedConditions, 1.0).unwrap();
        assert_eq!(ob.category, ObligationCategory::Monitoring);
        assert_eq!(ob.condition_reference.as_deref(), Some("3.1.2"));
        assert_eq!(ob.frequency, Some(Frequency::Weekly));
        assert!(matches!(ob.deadline, Some(Deadline::Absolute(_))));
        assert_eq!(ob.confidence, (0.9 + 1.0) / 2.0);
        assert!(matches!(
            ob.provenance,
            Provenance::Pass { kind: PassKind::NumberedConditions }
        ));
    }

    #[test]
    fn test_missing_description_dropped() {
        assert!(normalize_item(&json!({"category": "monitoring"}), PassKind::TableRows, 1.0).is_none());
        assert!(normalize_item(&json!({"description": "   "}), PassKind::TableRows, 1.0).is_none());
        assert!(normalize_item(&json!("not an object"), PassKind::TableRows, 1.0).is_none());
    }

    #[test]
    fn test_pass_category_fallback() {
        let value = json!({"description": "NOx shall not exceed 190 mg/m3"});
        let ob = normalize_item(&value, PassKind::EmissionLimits, 1.0).unwrap();
        assert_eq!(ob.category, ObligationCategory::EmissionLimit);

        let ob = normalize_item(&value, PassKind::ImprovementConditions, 1.0).unwrap();
        assert_eq!(ob.category, ObligationCategory::Improvement);
    }

    #[test]
    fn test_unknown_enum_values_tolerated() {
        let value = json!({
            "description": "Do the thing",
            "category": "mystery",
            "frequency": "fortnightly"
        });
        let ob = normalize_item(&value, PassKind::NumberedConditions, 0.75).unwrap();
        assert_eq!(ob.category, ObligationCategory::Operational);
        assert_eq!(ob.frequency, None);
        assert_eq!(ob.confidence, 0.75);
    }

    #[test]
    fn test_relative_deadline_kept_verbatim() {
        let value = json!({
            "description": "Submit a noise survey",
            "deadline": "within 6 months of commissioning"
        });
        let ob = normalize_item(&value, PassKind::ImprovementConditions, 1.0).unwrap();
        assert_eq!(
            ob.deadline,
            Some(Deadline::Relative("within 6 months of commissioning".into()))
        );
    }

    #[test]
    fn test_recovered_items_never_fully_certain() {
        let value = json!({"description": "Keep records", "confidence": 1.0});
        let ob = normalize_item(&value, PassKind::NumberedConditions, 0.75).unwrap();
        assert!(ob.confidence < 1.0);
    }

    #[test]
    fn test_normalize_items_filters() {
        let items = vec![
            json!({"description": "Keep records for 6 years"}),
            json!({"category": "no description here"}),
            json!({"description": "Notify the agency of any breach"}),
        ];
        let obligations = normalize_items(&items, PassKind::NumberedConditions, 1.0);
        assert_eq!(obligations.len(), 2);
    }
}
