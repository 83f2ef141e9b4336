//! Domain data types.

pub mod config;
pub mod obligation;
pub mod pattern;
pub mod result;

pub use config::{ExtractionConfig, ExtractionContext};
pub use obligation::{
    Deadline, ExtractedObligation, Frequency, ObligationCategory, Provenance,
};
pub use pattern::{
    Applicability, CandidateStatus, MatchKind, ObligationTemplate, PatternCandidate,
    PatternMatch, PatternPerformance, RulePattern, MATCH_CONFIDENCE_BOOST,
};
pub use result::{ExtractionResult, PassKind, PassResult, TokenUsage};
