//! Best-effort progress and cost sinks.
//!
//! Both sinks are fire-and-forget: the pipeline reports through
//! [`report_progress`]/[`report_cost`], which swallow and debug-log any
//! sink error. A failing or slow sink must never fail or block an
//! extraction, so implementations must not perform unbounded blocking work
//! in `report`.

use crate::types::TokenUsage;

/// A sink error. Sinks may return anything; the pipeline only logs it.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// One progress update for a document.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Document or permit reference the update belongs to
    pub document_ref: Option<String>,

    /// Pipeline stage label (e.g. "pattern_match", "numbered_conditions")
    pub stage: String,

    /// Completion estimate in [0, 100]
    pub percent: f32,
}

impl ProgressUpdate {
    /// Create an update.
    pub fn new(document_ref: Option<String>, stage: impl Into<String>, percent: f32) -> Self {
        Self {
            document_ref,
            stage: stage.into(),
            percent: percent.clamp(0.0, 100.0),
        }
    }
}

/// One cost-ledger record for a document.
#[derive(Debug, Clone)]
pub struct CostRecord {
    /// Document or permit reference the spend belongs to
    pub document_ref: Option<String>,

    /// Model that consumed the tokens
    pub model: String,

    /// Tokens consumed across all passes
    pub usage: TokenUsage,
}

/// Best-effort status updates keyed by document.
pub trait ProgressSink: Send + Sync {
    /// Record a progress update. Errors are ignored by the pipeline.
    fn report(&self, update: ProgressUpdate) -> Result<(), SinkError>;
}

/// Best-effort token-usage/cost records.
pub trait CostSink: Send + Sync {
    /// Record a cost entry. Errors are ignored by the pipeline.
    fn record(&self, record: CostRecord) -> Result<(), SinkError>;
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _update: ProgressUpdate) -> Result<(), SinkError> {
        Ok(())
    }
}

impl CostSink for NoopSink {
    fn record(&self, _record: CostRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Report progress, swallowing sink failures.
pub(crate) fn report_progress(sink: &dyn ProgressSink, update: ProgressUpdate) {
    if let Err(e) = sink.report(update) {
        tracing::debug!(error = %e, "progress sink failed; continuing");
    }
}

/// Record cost, swallowing sink failures.
pub(crate) fn report_cost(sink: &dyn CostSink, record: CostRecord) {
    if let Err(e) = sink.record(record) {
        tracing::debug!(error = %e, "cost sink failed; continuing");
    }
}
