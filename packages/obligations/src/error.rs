//! Typed errors for the obligation extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Malformed model output is
//! never an error here (the recovery parser converts it into partial
//! results), and a single failed extraction pass is logged, not raised.

use thiserror::Error;

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Completion service call failed after all attempts
    #[error("completion service error: {0}")]
    Completion(#[from] completion_client::CompletionError),

    /// No primary credential supplied at startup
    #[error("no primary credential configured")]
    NoPrimaryCredential,

    /// Rotation requested but no valid fallback credential exists
    #[error("no valid fallback credential available")]
    NoValidFallback,

    /// Every strategy failed: no pattern match and no pass produced output
    #[error("extraction failed: {detail}")]
    AllStrategiesFailed { detail: String },

    /// Operation was cancelled between passes
    #[error("extraction cancelled")]
    Cancelled,

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the pattern promotion workflow.
///
/// Eligibility rejections are NOT errors; `check_promotion_eligibility`
/// returns a structured verdict. These are the genuinely exceptional cases.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Candidate was already promoted; promotion is one-way
    #[error("candidate {candidate_id} already promoted")]
    AlreadyPromoted { candidate_id: uuid::Uuid },

    /// Candidate failed the eligibility re-check at promotion time
    #[error("candidate not eligible: {reason}")]
    NotEligible { reason: String },

    /// Candidate does not exist in the store
    #[error("candidate not found: {candidate_id}")]
    CandidateNotFound { candidate_id: uuid::Uuid },

    /// Candidate regex failed to compile
    #[error("candidate regex invalid: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for promotion operations.
pub type PromotionResult<T> = std::result::Result<T, PromotionError>;
