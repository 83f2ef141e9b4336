//! Retry policy and size-adaptive timeouts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::ExtractionContext;

const MB: u64 = 1024 * 1024;

/// Per-attempt timeout class, chosen from document size.
///
/// Larger documents mean longer prompts and slower completions; the
/// deadline scales so a big permit isn't abandoned mid-generation while a
/// small consent doesn't hang for minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutClass {
    /// ≤20 pages and ≤5 MB
    Small,
    /// 20-49 pages or 5-10 MB
    Medium,
    /// ≥50 pages and ≥10 MB
    Large,
}

impl TimeoutClass {
    /// Classify a document. Missing metadata counts as zero, so an
    /// unsized document gets the small (strictest) deadline.
    pub fn classify(page_count: Option<u32>, file_size_bytes: Option<u64>) -> Self {
        let pages = page_count.unwrap_or(0);
        let bytes = file_size_bytes.unwrap_or(0);

        if pages >= 50 && bytes >= 10 * MB {
            Self::Large
        } else if pages > 20 || bytes > 5 * MB {
            Self::Medium
        } else {
            Self::Small
        }
    }

    /// Deadline for one completion attempt.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Small => Duration::from_secs(30),
            Self::Medium => Duration::from_secs(120),
            Self::Large => Duration::from_secs(300),
        }
    }
}

/// Retry policy for one document's completion calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempt ceiling, initial call included. Never unbounded.
    pub total_attempts: u32,

    /// First backoff delay; doubles per retry (2s, 4s, 8s, ...)
    pub base_delay_ms: u64,

    /// Per-attempt deadline class
    pub timeout_class: TimeoutClass,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total_attempts: 3,
            base_delay_ms: 2000,
            timeout_class: TimeoutClass::Small,
        }
    }
}

impl RetryPolicy {
    /// Policy sized to a document's metadata.
    pub fn for_document(ctx: &ExtractionContext) -> Self {
        Self {
            timeout_class: TimeoutClass::classify(ctx.page_count, ctx.file_size_bytes),
            ..Default::default()
        }
    }

    /// Set the attempt ceiling (minimum 1).
    pub fn with_total_attempts(mut self, attempts: u32) -> Self {
        self.total_attempts = attempts.max(1);
        self
    }

    /// Per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout_class.timeout()
    }

    /// Backoff before the attempt following `completed_attempts`.
    pub fn delay_after(&self, completed_attempts: u32) -> Duration {
        let factor = 1u64 << (completed_attempts.saturating_sub(1)).min(6);
        Duration::from_millis(self.base_delay_ms * factor)
    }
}
