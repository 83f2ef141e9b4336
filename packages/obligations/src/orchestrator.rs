//! The extraction orchestrator: free path first, paid path on fallback.
//!
//! One call per document. The pattern matcher runs first; a top match at
//! or above the threshold returns immediately with `used_model = false`
//! and no token spend. Otherwise the multi-pass extractor runs against
//! the completion service. Only total failure (no usable match and every
//! pass failed) surfaces an error.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ExtractionError, Result};
use crate::invoke::{CompletionService, RetryPolicy};
use crate::matcher::Matcher;
use crate::passes::{dedupe_obligations, MultiPassExtractor};
use crate::progress::{
    report_cost, report_progress, CostRecord, CostSink, NoopSink, ProgressSink, ProgressUpdate,
};
use crate::stores::PatternStore;
use crate::types::{ExtractionConfig, ExtractionContext, ExtractionResult};

/// Top-level entry point for document extraction.
pub struct Extractor<C: CompletionService> {
    completion: Arc<C>,
    patterns: Arc<dyn PatternStore>,
    matcher: Matcher,
    config: ExtractionConfig,
    progress: Arc<dyn ProgressSink>,
    costs: Arc<dyn CostSink>,
}

impl<C: CompletionService> Extractor<C> {
    /// Create an extractor with default config and no-op sinks.
    pub fn new(completion: Arc<C>, patterns: Arc<dyn PatternStore>) -> Self {
        let config = ExtractionConfig::default();
        Self {
            matcher: Matcher::with_config(patterns.clone(), &config),
            completion,
            patterns,
            config,
            progress: Arc::new(NoopSink),
            costs: Arc::new(NoopSink),
        }
    }

    /// Replace the pipeline configuration.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.matcher = Matcher::with_config(self.patterns.clone(), &config);
        self.config = config;
        self
    }

    /// Attach a progress sink (best-effort; failures are swallowed).
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Attach a cost-ledger sink (best-effort; failures are swallowed).
    pub fn with_costs(mut self, costs: Arc<dyn CostSink>) -> Self {
        self.costs = costs;
        self
    }

    /// Extract obligations from one document.
    pub async fn extract(
        &self,
        document_text: &str,
        ctx: &ExtractionContext,
    ) -> Result<ExtractionResult> {
        self.extract_inner(document_text, ctx, None).await
    }

    /// Extract with a cancellation token.
    ///
    /// Cancellation takes effect between passes, never mid-call: an
    /// in-flight completion request runs to its own timeout.
    pub async fn extract_with_cancel(
        &self,
        document_text: &str,
        ctx: &ExtractionContext,
        cancel: CancellationToken,
    ) -> Result<ExtractionResult> {
        self.extract_inner(document_text, ctx, Some(&cancel)).await
    }

    async fn extract_inner(
        &self,
        document_text: &str,
        ctx: &ExtractionContext,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExtractionResult> {
        let started = Instant::now();
        let document_ref = ctx.permit_reference.clone();

        report_progress(
            &*self.progress,
            ProgressUpdate::new(document_ref.clone(), "pattern_match", 5.0),
        );

        let rule_matches = self.matcher.find_matches(document_text, ctx).await?;
        let top_score = rule_matches.first().map(|m| m.score).unwrap_or(0.0);

        if top_score >= self.config.match_threshold {
            let obligations = dedupe_obligations(
                rule_matches.iter().map(|m| m.obligation.clone()).collect(),
            );
            info!(
                matches = rule_matches.len(),
                top_score, "pattern match sufficient; skipping model"
            );
            report_progress(
                &*self.progress,
                ProgressUpdate::new(document_ref, "complete", 100.0),
            );
            return Ok(ExtractionResult {
                obligations,
                used_model: false,
                rule_matches,
                timing_ms: started.elapsed().as_millis() as u64,
                token_usage: None,
                coverage: None,
            });
        }

        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ExtractionError::Cancelled);
        }

        let policy = RetryPolicy::for_document(ctx);
        let extractor = MultiPassExtractor::new(self.completion.clone(), self.config.clone());
        let model = extractor
            .run(document_text, ctx, &policy, &*self.progress, cancel)
            .await?;

        if model.total_failure() {
            return Err(ExtractionError::AllStrategiesFailed {
                detail: "no pattern match reached the threshold and every extraction pass failed"
                    .to_string(),
            });
        }

        report_cost(
            &*self.costs,
            CostRecord {
                document_ref,
                model: self.config.model.clone(),
                usage: model.usage,
            },
        );

        Ok(ExtractionResult {
            obligations: model.obligations,
            used_model: true,
            rule_matches,
            timing_ms: started.elapsed().as_millis() as u64,
            token_usage: Some(model.usage),
            coverage: Some(model.coverage),
        })
    }

    /// Feed back a reviewer's verdict on a pattern-matched extraction.
    ///
    /// Each matched pattern's counters are updated atomically; the
    /// success rate this maintains feeds the promotion criteria.
    pub async fn record_confirmation(
        &self,
        result: &ExtractionResult,
        confirmed_without_edits: bool,
    ) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for matched in &result.rule_matches {
            if seen.insert(matched.pattern_id) {
                self.patterns
                    .record_usage(matched.pattern_id, confirmed_without_edits)
                    .await?;
            }
        }
        Ok(())
    }
}
