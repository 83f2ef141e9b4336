//! The extracted obligation - the unit of output from every strategy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::PassKind;

/// Category of a compliance obligation (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationCategory {
    /// Periodic or continuous monitoring of a parameter
    Monitoring,
    /// Submitting returns or reports to the regulator
    Reporting,
    /// Keeping records available for inspection
    RecordKeeping,
    /// Numeric limit on an emission or discharge
    EmissionLimit,
    /// Time-bound improvement programme condition
    Improvement,
    /// Maintenance of plant or equipment
    Maintenance,
    /// Notifying the regulator of events or changes
    Notification,
    /// Staff training and competence requirements
    Training,
    /// General operational restriction or requirement
    Operational,
}

impl ObligationCategory {
    /// Lenient mapping from model output or stored pattern text.
    pub fn from_loose(s: &str) -> Option<Self> {
        let folded = s.trim().to_lowercase().replace([' ', '-'], "_");
        match folded.as_str() {
            "monitoring" | "monitor" => Some(Self::Monitoring),
            "reporting" | "report" => Some(Self::Reporting),
            "record_keeping" | "records" | "recordkeeping" => Some(Self::RecordKeeping),
            "emission_limit" | "emission_limits" | "elv" => Some(Self::EmissionLimit),
            "improvement" | "improvement_condition" => Some(Self::Improvement),
            "maintenance" => Some(Self::Maintenance),
            "notification" | "notify" => Some(Self::Notification),
            "training" => Some(Self::Training),
            "operational" | "operation" | "general" => Some(Self::Operational),
            _ => None,
        }
    }
}

/// How often an obligation recurs (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Continuous,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
    /// A single deadline, then done
    Once,
    /// Triggered by an event rather than the calendar
    AsRequired,
}

impl Frequency {
    /// Lenient mapping from model output.
    pub fn from_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "continuous" | "continuously" => Some(Self::Continuous),
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            "quarterly" | "quarter" => Some(Self::Quarterly),
            "annually" | "annual" | "yearly" | "year" => Some(Self::Annually),
            "once" | "one-off" | "one_off" => Some(Self::Once),
            "as_required" | "as required" | "on occurrence" | "event" => Some(Self::AsRequired),
            _ => None,
        }
    }
}

/// A deadline: either an absolute date or the document's relative wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Deadline {
    /// Fixed calendar date
    Absolute(NaiveDate),
    /// Wording like "within 6 months of commissioning"
    Relative(String),
}

impl Deadline {
    /// Parse a deadline string: ISO or UK date formats become absolute,
    /// everything else is kept verbatim as relative wording.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d %B %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(Self::Absolute(date));
            }
        }
        Some(Self::Relative(trimmed.to_string()))
    }
}

/// Which strategy produced an obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// A multi-pass extraction pass
    Pass { kind: PassKind },
    /// A rule pattern from the shared library
    Pattern { pattern_id: Uuid },
}

/// A single extracted compliance obligation.
///
/// Created by exactly one strategy and never merged in place:
/// deduplication replaces a lower-confidence duplicate wholesale rather
/// than editing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedObligation {
    /// Obligation category
    pub category: ObligationCategory,

    /// Recurrence, when the document states one
    pub frequency: Option<Frequency>,

    /// Deadline, when the document states one
    pub deadline: Option<Deadline>,

    /// Whether compliance is a matter of judgement (e.g. "to the
    /// satisfaction of the regulator") rather than a measurable fact
    pub subjective: bool,

    /// Confidence in [0, 1]
    pub confidence: f32,

    /// Free-text description of the obligation
    pub description: String,

    /// Condition reference as it appears in the document (e.g. "3.1.2")
    pub condition_reference: Option<String>,

    /// Which pass/pattern produced this
    pub provenance: Provenance,

    /// Verbatim quote from the source, for later verification
    pub source_quote: Option<String>,

    /// Location hint (page/section) for the quote
    pub location_ref: Option<String>,
}

impl ExtractedObligation {
    /// Create an obligation with the required fields; optional fields via
    /// the `with_*` builders.
    pub fn new(
        category: ObligationCategory,
        description: impl Into<String>,
        confidence: f32,
        provenance: Provenance,
    ) -> Self {
        Self {
            category,
            frequency: None,
            deadline: None,
            subjective: false,
            confidence: confidence.clamp(0.0, 1.0),
            description: description.into(),
            condition_reference: None,
            provenance,
            source_quote: None,
            location_ref: None,
        }
    }

    /// Set the condition reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.condition_reference = Some(reference.into());
        self
    }

    /// Set the frequency.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Set the deadline.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Mark the obligation as subjective.
    pub fn subjective(mut self) -> Self {
        self.subjective = true;
        self
    }

    /// Attach a verbatim source quote.
    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.source_quote = Some(quote.into());
        self
    }

    /// Attach a location reference.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_ref = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_loose() {
        assert_eq!(
            ObligationCategory::from_loose("Emission Limit"),
            Some(ObligationCategory::EmissionLimit)
        );
        assert_eq!(
            ObligationCategory::from_loose("record-keeping"),
            Some(ObligationCategory::RecordKeeping)
        );
        assert_eq!(ObligationCategory::from_loose("gibberish"), None);
    }

    #[test]
    fn test_frequency_from_loose() {
        assert_eq!(Frequency::from_loose("Annual"), Some(Frequency::Annually));
        assert_eq!(Frequency::from_loose("one-off"), Some(Frequency::Once));
        assert_eq!(Frequency::from_loose("fortnightly"), None);
    }

    #[test]
    fn test_deadline_parse() {
        assert_eq!(
            Deadline::parse("2026-03-31"),
            Some(Deadline::Absolute(
                NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
            ))
        );
        assert_eq!(
            Deadline::parse("31/03/2026"),
            Some(Deadline::Absolute(
                NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
            ))
        );
        assert_eq!(
            Deadline::parse("within 6 months of commissioning"),
            Some(Deadline::Relative(
                "within 6 months of commissioning".to_string()
            ))
        );
        assert_eq!(Deadline::parse("  "), None);
    }

    #[test]
    fn test_confidence_clamped() {
        let ob = ExtractedObligation::new(
            ObligationCategory::Monitoring,
            "Monitor pH weekly",
            1.4,
            Provenance::Pass {
                kind: PassKind::NumberedConditions,
            },
        );
        assert_eq!(ob.confidence, 1.0);
    }
}
