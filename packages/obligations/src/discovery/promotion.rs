//! Candidate promotion into the shared pattern library.
//!
//! Eligibility rejections are structured verdicts, not errors: a
//! reviewer dashboard shows the reason, nothing throws. Promotion itself
//! is one-way: an APPROVED candidate can never be promoted again.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::anonymize::AnonymizerRules;
use crate::error::{PromotionError, PromotionResult};
use crate::stores::{CandidateStore, PatternStore};
use crate::types::{
    CandidateStatus, ObligationTemplate, PatternCandidate, RulePattern,
};

/// Thresholds a candidate must meet before promotion.
#[derive(Debug, Clone)]
pub struct PromotionCriteria {
    /// Minimum shadow-trial uses
    pub min_usage_count: u64,

    /// Minimum trial success rate
    pub min_success_rate: f64,

    /// Minimum match rate against the mining cluster
    pub min_match_rate: f64,

    /// Whether identifying terms must be absent (after anonymization)
    pub require_anonymization: bool,
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            min_usage_count: 10,
            min_success_rate: 0.92,
            min_match_rate: 0.90,
            require_anonymization: true,
        }
    }
}

/// Structured eligibility verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<String>,
}

impl Eligibility {
    fn ok() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check whether a candidate may be promoted.
///
/// Checks run in order and the first shortfall names itself: usage count,
/// success rate, match rate, then (when the criteria require it)
/// identifying terms still present in the candidate's free text.
pub fn check_promotion_eligibility(
    candidate: &PatternCandidate,
    criteria: &PromotionCriteria,
    rules: &AnonymizerRules,
) -> Eligibility {
    let perf = &candidate.performance;

    if perf.usage_count < criteria.min_usage_count {
        return Eligibility::fail(format!(
            "usage_count {} below required {}",
            perf.usage_count, criteria.min_usage_count
        ));
    }
    if perf.success_rate < criteria.min_success_rate {
        return Eligibility::fail(format!(
            "success_rate {:.2} below required {:.2}",
            perf.success_rate, criteria.min_success_rate
        ));
    }
    if candidate.match_rate < criteria.min_match_rate {
        return Eligibility::fail(format!(
            "match_rate {:.2} below required {:.2}",
            candidate.match_rate, criteria.min_match_rate
        ));
    }
    if criteria.require_anonymization {
        if let Some(rule) = rules.first_hit(&candidate.regex) {
            return Eligibility::fail(format!("identifying term present: {}", rule));
        }
    }

    Eligibility::ok()
}

/// Promotes eligible candidates into the shared library.
pub struct Promoter {
    patterns: Arc<dyn PatternStore>,
    candidates: Arc<dyn CandidateStore>,
    criteria: PromotionCriteria,
    rules: AnonymizerRules,
}

impl Promoter {
    /// Create a promoter with default criteria and UK anonymization rules.
    pub fn new(patterns: Arc<dyn PatternStore>, candidates: Arc<dyn CandidateStore>) -> Self {
        Self {
            patterns,
            candidates,
            criteria: PromotionCriteria::default(),
            rules: AnonymizerRules::uk_defaults(),
        }
    }

    /// Set the promotion criteria.
    pub fn with_criteria(mut self, criteria: PromotionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Replace the anonymization rule set (locale-specific deployments).
    pub fn with_rules(mut self, rules: AnonymizerRules) -> Self {
        self.rules = rules;
        self
    }

    /// Eligibility of a stored candidate, as a structured verdict.
    pub async fn check(&self, candidate_id: Uuid) -> PromotionResult<Eligibility> {
        let candidate = self.load(candidate_id).await?;
        Ok(check_promotion_eligibility(
            &candidate,
            &self.criteria,
            &self.rules,
        ))
    }

    /// Promote a candidate into a shared pattern.
    ///
    /// Anonymizes the candidate's free text, re-validates eligibility on
    /// the anonymized copy, inserts a fresh pattern with zeroed counters,
    /// and marks the candidate APPROVED with a link to the new pattern.
    /// Idempotent in the error sense: promoting an APPROVED candidate
    /// fails with [`PromotionError::AlreadyPromoted`] rather than
    /// creating a duplicate.
    pub async fn promote(&self, candidate_id: Uuid) -> PromotionResult<RulePattern> {
        let candidate = self.load(candidate_id).await?;

        if candidate.status == CandidateStatus::Approved {
            return Err(PromotionError::AlreadyPromoted { candidate_id });
        }

        // Anonymize first: identifying terms are replaced, not grounds
        // for rejection, as long as the rule set can express them.
        let mut anonymized = candidate.clone();
        anonymized.regex = self.rules.apply(&candidate.regex);

        let verdict = check_promotion_eligibility(&anonymized, &self.criteria, &self.rules);
        if !verdict.eligible {
            return Err(PromotionError::NotEligible {
                reason: verdict.reason.unwrap_or_else(|| "not eligible".to_string()),
            });
        }

        // The anonymized source must still compile; placeholder tokens
        // contain regex metacharacters ([ and ]) only when a rule fired,
        // so escape them for the stored pattern.
        let source = escape_placeholders(&anonymized.regex);
        let pattern = RulePattern::new(source, ObligationTemplate::new(candidate.category));
        regex::Regex::new(&pattern.primary_regex)?;

        self.patterns
            .insert(pattern.clone())
            .await
            .map_err(storage)?;
        self.candidates
            .mark_approved(candidate_id, pattern.id)
            .await
            .map_err(storage)?;

        info!(candidate_id = %candidate_id, pattern_id = %pattern.id, "candidate promoted");
        Ok(pattern)
    }

    async fn load(&self, candidate_id: Uuid) -> PromotionResult<PatternCandidate> {
        self.candidates
            .get(candidate_id)
            .await
            .map_err(storage)?
            .ok_or(PromotionError::CandidateNotFound { candidate_id })
    }
}

fn storage(e: crate::error::ExtractionError) -> PromotionError {
    PromotionError::Storage(Box::new(e))
}

/// Escape the square brackets of placeholder tokens so the stored regex
/// matches them literally.
fn escape_placeholders(source: &str) -> String {
    source.replace('[', r"\[").replace(']', r"\]")
}
