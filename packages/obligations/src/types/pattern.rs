//! Rule patterns, matches, and promotion candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::ExtractionContext;
use super::obligation::{
    Deadline, ExtractedObligation, Frequency, ObligationCategory, Provenance,
};

/// Fixed confidence boost applied when a pattern match becomes an
/// obligation: the pattern has a track record the raw score ignores.
pub const MATCH_CONFIDENCE_BOOST: f32 = 0.15;

/// The obligation shape a pattern instantiates when it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObligationTemplate {
    /// Category assigned to the extracted obligation
    pub category: ObligationCategory,

    /// Frequency, when the pattern implies one
    pub frequency: Option<Frequency>,

    /// Deadline rule, e.g. "within 14 days" (kept as relative wording)
    pub deadline_rule: Option<String>,

    /// Whether obligations from this pattern are subjective
    pub subjective: bool,

    /// Evidence types a compliance officer would collect
    #[serde(default)]
    pub evidence_types: Vec<String>,
}

impl ObligationTemplate {
    /// Create a template for a category.
    pub fn new(category: ObligationCategory) -> Self {
        Self {
            category,
            frequency: None,
            deadline_rule: None,
            subjective: false,
            evidence_types: Vec::new(),
        }
    }

    /// Set the frequency.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Set the deadline rule.
    pub fn with_deadline_rule(mut self, rule: impl Into<String>) -> Self {
        self.deadline_rule = Some(rule.into());
        self
    }

    /// Mark obligations from this template subjective.
    pub fn subjective(mut self) -> Self {
        self.subjective = true;
        self
    }

    /// Add evidence type hints.
    pub fn with_evidence_types(
        mut self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.evidence_types = types.into_iter().map(|t| t.into()).collect();
        self
    }
}

/// Which documents a pattern applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Applicability {
    /// Compliance module types this pattern serves (empty = all)
    #[serde(default)]
    pub module_types: Vec<String>,

    /// Restrict to one regulator (None = any)
    pub regulator: Option<String>,

    /// Restrict to one document type (None = any)
    pub document_type: Option<String>,
}

impl Applicability {
    /// A pattern applicable to everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to module types.
    pub fn for_modules(modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            module_types: modules.into_iter().map(|m| m.into()).collect(),
            ..Default::default()
        }
    }

    /// Restrict to a regulator.
    pub fn with_regulator(mut self, regulator: impl Into<String>) -> Self {
        self.regulator = Some(regulator.into());
        self
    }

    /// Restrict to a document type.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Whether this pattern applies in the given extraction context.
    pub fn matches(&self, ctx: &ExtractionContext) -> bool {
        if !self.module_types.is_empty()
            && !ctx
                .module_types
                .iter()
                .any(|m| self.module_types.contains(m))
        {
            return false;
        }
        if let (Some(want), Some(have)) = (&self.regulator, &ctx.regulator) {
            if !want.eq_ignore_ascii_case(have) {
                return false;
            }
        }
        if let (Some(want), Some(have)) = (&self.document_type, &ctx.document_type) {
            if !want.eq_ignore_ascii_case(have) {
                return false;
            }
        }
        true
    }
}

/// Usage statistics for a pattern or candidate.
///
/// Invariant: `success_rate == success_count / usage_count` and both
/// counters are monotonically non-decreasing. Callers must mutate this
/// only through [`PatternPerformance::record`], inside a store's atomic
/// update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternPerformance {
    pub usage_count: u64,
    pub success_count: u64,
    pub success_rate: f64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl PatternPerformance {
    /// Record one use, recomputing the success rate.
    pub fn record(&mut self, success: bool) {
        self.usage_count += 1;
        if success {
            self.success_count += 1;
        }
        self.success_rate = self.success_count as f64 / self.usage_count as f64;
        self.last_used_at = Some(Utc::now());
    }
}

/// A reusable extraction rule: regex matchers plus the obligation template
/// they instantiate, scoped by applicability and tracked by performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePattern {
    /// Stable identity
    pub id: Uuid,

    /// Semantic version of the pattern definition
    pub version: String,

    /// Lower priority is tried first
    pub priority: u32,

    /// Primary matcher
    pub primary_regex: String,

    /// Cheaper variants tried when the primary misses
    #[serde(default)]
    pub variant_regexes: Vec<String>,

    /// Keywords for the semantic overlap score
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Disqualifiers: each hit reduces the score
    #[serde(default)]
    pub negative_patterns: Vec<String>,

    /// Obligation shape produced on match
    pub template: ObligationTemplate,

    /// Which documents this pattern applies to
    #[serde(default)]
    pub applicability: Applicability,

    /// Usage statistics
    #[serde(default)]
    pub performance: PatternPerformance,

    /// Inactive patterns are skipped by the matcher
    pub active: bool,
}

impl RulePattern {
    /// Create an active pattern with a fresh id and zeroed counters.
    pub fn new(primary_regex: impl Into<String>, template: ObligationTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: "1.0.0".to_string(),
            priority: 100,
            primary_regex: primary_regex.into(),
            variant_regexes: Vec::new(),
            keywords: Vec::new(),
            negative_patterns: Vec::new(),
            template,
            applicability: Applicability::any(),
            performance: PatternPerformance::default(),
            active: true,
        }
    }

    /// Set the priority (lower = tried first).
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Add variant regexes.
    pub fn with_variants(mut self, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.variant_regexes = variants.into_iter().map(|v| v.into()).collect();
        self
    }

    /// Add semantic keywords.
    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Add negative patterns.
    pub fn with_negatives(mut self, negatives: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.negative_patterns = negatives.into_iter().map(|n| n.into()).collect();
        self
    }

    /// Set the applicability filter.
    pub fn with_applicability(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }
}

/// How a pattern matched a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Primary regex alone cleared the threshold
    Primary,
    /// A variant regex alone cleared the threshold
    Variant,
    /// Regex score blended with semantic keyword overlap
    Combined,
}

/// One (pattern, segment) match above the score threshold.
///
/// Invariant: the matcher only returns matches with `score >= 0.90`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Pattern that matched
    pub pattern_id: Uuid,

    /// Score in [0, 1], already >= the matcher threshold
    pub score: f32,

    /// How the score was reached
    pub kind: MatchKind,

    /// The matched text
    pub matched_text: String,

    /// Index of the segment within the document
    pub segment_index: usize,

    /// Template instantiated with the matched text
    pub obligation: ExtractedObligation,
}

impl PatternMatch {
    /// Instantiate a match from a pattern's template.
    ///
    /// The obligation's confidence is the match score plus the fixed
    /// [`MATCH_CONFIDENCE_BOOST`], capped at 1.0.
    pub fn instantiate(
        pattern: &RulePattern,
        score: f32,
        kind: MatchKind,
        matched_text: &str,
        segment_index: usize,
        segment_text: &str,
    ) -> Self {
        let template = &pattern.template;
        let mut obligation = ExtractedObligation::new(
            template.category,
            segment_text.trim(),
            (score + MATCH_CONFIDENCE_BOOST).min(1.0),
            Provenance::Pattern {
                pattern_id: pattern.id,
            },
        )
        .with_quote(matched_text);

        if let Some(frequency) = template.frequency {
            obligation = obligation.with_frequency(frequency);
        }
        if let Some(rule) = &template.deadline_rule {
            obligation = obligation.with_deadline(Deadline::Relative(rule.clone()));
        }
        if template.subjective {
            obligation = obligation.subjective();
        }

        Self {
            pattern_id: pattern.id,
            score,
            kind,
            matched_text: matched_text.to_string(),
            segment_index,
            obligation,
        }
    }
}

/// Lifecycle state of a pattern candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Mined but not yet trusted
    PendingReview,
    /// Promoted into the shared library; terminal
    Approved,
}

/// A mined, not-yet-trusted pattern awaiting promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCandidate {
    /// Stable identity
    pub id: Uuid,

    /// Current lifecycle state
    pub status: CandidateStatus,

    /// Category of the obligations it was mined from
    pub category: ObligationCategory,

    /// The mined (escaped) regex
    pub regex: String,

    /// Extractions the candidate was derived from
    pub source_extraction_ids: Vec<Uuid>,

    /// Number of confirmed obligations in the mining cluster
    pub sample_count: usize,

    /// Fraction of the cluster's source texts the regex matches
    pub match_rate: f64,

    /// Trial usage statistics accumulated while pending
    #[serde(default)]
    pub performance: PatternPerformance,

    /// When the candidate was mined
    pub created_at: DateTime<Utc>,

    /// Set on approval: the shared pattern this candidate became
    pub promoted_pattern_id: Option<Uuid>,
}

impl PatternCandidate {
    /// Create a pending candidate.
    pub fn new(
        category: ObligationCategory,
        regex: impl Into<String>,
        source_extraction_ids: Vec<Uuid>,
        sample_count: usize,
        match_rate: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: CandidateStatus::PendingReview,
            category,
            regex: regex.into(),
            source_extraction_ids,
            sample_count,
            match_rate,
            performance: PatternPerformance::default(),
            created_at: Utc::now(),
            promoted_pattern_id: None,
        }
    }
}
