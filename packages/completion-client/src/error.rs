//! Error types for the completion client.

use thiserror::Error;

/// Result type for completion client operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Completion service errors.
///
/// Variants are classified for the retry layer above this client:
/// [`CompletionError::is_retryable`] marks transport-level failures worth
/// another attempt, while credential and request errors abort immediately.
/// Rate limiting is its own case because the caller may recover by
/// switching to a fallback credential.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Configuration error (missing credential, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, DNS, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Credential rejected by the service (401/403)
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Credential is valid but its quota is exhausted
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Too many requests; the service asked us to back off (429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request itself was malformed (400)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Other non-2xx response from the service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl CompletionError {
    /// Whether another attempt with the same credential may succeed.
    ///
    /// Server-side (5xx) errors count as retryable; everything the caller
    /// sent wrong, or that a retry cannot fix, does not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether switching to a different credential may succeed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
