//! Compliance Obligation Extraction Library
//!
//! Extracts structured compliance obligations from regulatory documents
//! (permits, consents, registrations) at minimum cost by layering three
//! strategies of increasing expense:
//!
//! 1. **Pattern matching**: a shared library of rule patterns scored
//!    against document segments. Zero network cost; a confident match
//!    short-circuits everything else.
//! 2. **Multi-pass model extraction**: specialized completion-service
//!    passes (numbered conditions, tables, improvement conditions,
//!    emission limits, verification) over targeted document slices, with
//!    recovery parsing for truncated output and cross-pass dedup.
//! 3. **Discovery & promotion**: confirmed extractions are mined into
//!    candidate patterns; proven candidates are anonymized and promoted
//!    into the shared library, feeding strategy 1.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use obligations::{
//!     CredentialPool, Extractor, ExtractionContext, MemoryPatternStore, ResilientClient,
//! };
//! use completion_client::CompletionClient;
//!
//! let pool = Arc::new(CredentialPool::from_secrets(
//!     std::env::var("COMPLETION_API_KEY").ok(),
//!     fallback_keys,
//! )?);
//! let completion = Arc::new(ResilientClient::new(CompletionClient::new(), pool));
//! let patterns = Arc::new(MemoryPatternStore::new());
//!
//! let extractor = Extractor::new(completion, patterns);
//! let result = extractor
//!     .extract(&document_text, &ExtractionContext::new(["installations"]))
//!     .await?;
//!
//! if !result.used_model {
//!     // served entirely from the pattern library, no tokens spent
//! }
//! ```
//!
//! # Modules
//!
//! - [`invoke`] - Credential pool and resilient completion invocation
//! - [`recovery`] - Malformed-output recovery parser
//! - [`matcher`] - Rule-pattern matching over document segments
//! - [`passes`] - Multi-pass model extraction
//! - [`discovery`] - Pattern mining, anonymization, promotion
//! - [`orchestrator`] - Top-level extraction entry point
//! - [`stores`] - Pattern/candidate storage seams + in-memory stores
//! - [`progress`] - Best-effort progress and cost sinks
//! - [`testing`] - Mock completion service and sink fixtures

pub mod discovery;
pub mod error;
pub mod invoke;
pub mod matcher;
pub mod orchestrator;
pub mod passes;
pub mod progress;
pub mod recovery;
pub mod stores;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use error::{ExtractionError, PromotionError, PromotionResult, Result};
pub use types::{
    Applicability, CandidateStatus, Deadline, ExtractedObligation, ExtractionConfig,
    ExtractionContext, ExtractionResult, Frequency, MatchKind, ObligationCategory,
    ObligationTemplate, PassKind, PassResult, PatternCandidate, PatternMatch,
    PatternPerformance, Provenance, RulePattern, TokenUsage, MATCH_CONFIDENCE_BOOST,
};

// Invocation layer
pub use invoke::{
    AlwaysValid, CompletionService, CompletionTransport, Credential, CredentialPool,
    CredentialProbe, ResilientClient, RetryPolicy, SecretString, ServiceProbe, TimeoutClass,
};

// Recovery parser
pub use recovery::{recover, Recovered};

// Matcher
pub use matcher::{segment_document, Matcher, Segment};

// Multi-pass extractor
pub use passes::{dedupe_obligations, MultiPassExtractor, ModelExtraction};

// Discovery & promotion
pub use discovery::{
    check_promotion_eligibility, AnonymizerRule, AnonymizerRules, ConfirmedExtraction,
    Eligibility, MinerConfig, PatternMiner, PromotionCriteria, Promoter,
};

// Orchestrator
pub use orchestrator::Extractor;

// Sinks
pub use progress::{CostRecord, CostSink, NoopSink, ProgressSink, ProgressUpdate};

// Stores
pub use stores::{CandidateStore, MemoryCandidateStore, MemoryPatternStore, PatternStore};
