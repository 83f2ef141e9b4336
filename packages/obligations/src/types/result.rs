//! Pass and pipeline result types.

use serde::{Deserialize, Serialize};

use super::obligation::ExtractedObligation;
use super::pattern::PatternMatch;

/// The five extraction passes, in execution order.
///
/// Passes 1-4 run concurrently; `Verification` runs after they complete
/// and re-scans the document for obligations the others missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Numbered permit conditions (3.1.2 style)
    NumberedConditions,
    /// Obligations embedded in tables
    TableRows,
    /// Improvement programme conditions
    ImprovementConditions,
    /// Emission limit values
    EmissionLimits,
    /// Final sweep for anything the other passes missed
    Verification,
}

impl PassKind {
    /// The four concurrent passes, in order.
    pub const CONCURRENT: [PassKind; 4] = [
        PassKind::NumberedConditions,
        PassKind::TableRows,
        PassKind::ImprovementConditions,
        PassKind::EmissionLimits,
    ];

    /// Short label for logging and provenance display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NumberedConditions => "numbered_conditions",
            Self::TableRows => "table_rows",
            Self::ImprovementConditions => "improvement_conditions",
            Self::EmissionLimits => "emission_limits",
            Self::Verification => "verification",
        }
    }
}

/// Token usage accumulated across completion calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Add another call's usage into this accumulator.
    pub fn add(&mut self, usage: &completion_client::Usage) {
        self.input_tokens += usage.input_tokens as u64;
        self.output_tokens += usage.output_tokens as u64;
    }

    /// Total tokens consumed.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Whether any usage was recorded.
    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Output of one extraction pass. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassResult {
    /// Which pass produced this
    pub kind: PassKind,

    /// Obligations extracted by this pass
    pub obligations: Vec<ExtractedObligation>,

    /// Pass-level confidence in [0, 1]
    pub confidence: f32,

    /// Wall-clock time spent
    pub elapsed_ms: u64,

    /// Tokens consumed by this pass, when the call succeeded
    pub usage: Option<TokenUsage>,

    /// Whether the pass failed outright (timeout, transport, no output)
    pub failed: bool,
}

impl PassResult {
    /// An empty result for a pass that failed. The document continues
    /// with the remaining passes.
    pub fn empty(kind: PassKind, elapsed_ms: u64) -> Self {
        Self {
            kind,
            obligations: Vec::new(),
            confidence: 0.0,
            elapsed_ms,
            usage: None,
            failed: true,
        }
    }
}

/// Result of a whole-document extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Deduplicated obligations from whichever strategy ran
    pub obligations: Vec<ExtractedObligation>,

    /// Whether the model-based path was used (false = pattern match only)
    pub used_model: bool,

    /// Rule matches found, whether or not they short-circuited extraction
    pub rule_matches: Vec<PatternMatch>,

    /// Total wall-clock time
    pub timing_ms: u64,

    /// Token usage, when the model path ran
    pub token_usage: Option<TokenUsage>,

    /// Verification pass's estimate of the fraction of true obligations
    /// captured (model path only)
    pub coverage: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.add(&completion_client::Usage {
            input_tokens: 100,
            output_tokens: 20,
        });
        usage.add(&completion_client::Usage {
            input_tokens: 50,
            output_tokens: 10,
        });
        assert_eq!(usage.input_tokens, 150);
        assert_eq!(usage.output_tokens, 30);
        assert_eq!(usage.total(), 180);
        assert!(!usage.is_zero());
    }

    #[test]
    fn test_empty_pass_result() {
        let result = PassResult::empty(PassKind::TableRows, 1200);
        assert!(result.failed);
        assert!(result.obligations.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.elapsed_ms, 1200);
    }

    #[test]
    fn test_concurrent_passes_exclude_verification() {
        assert_eq!(PassKind::CONCURRENT.len(), 4);
        assert!(!PassKind::CONCURRENT.contains(&PassKind::Verification));
    }
}
