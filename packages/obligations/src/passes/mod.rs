//! The multi-pass extractor: specialized model passes over one document.
//!
//! Four passes (numbered conditions, table rows, improvement conditions,
//! emission limit values) run concurrently against the completion
//! service, each over its own document slice. A fifth verification pass
//! runs after they complete, re-scanning for anything they missed and
//! estimating coverage. A failed pass contributes an empty result and a
//! logged error; it never aborts the others.

pub mod dedupe;
pub mod normalize;
pub mod prompts;
pub mod sections;

pub use dedupe::{dedupe_key, dedupe_obligations};
pub use normalize::{normalize_item, normalize_items, PassResponse, RawObligation};
pub use prompts::{user_prompt, OBLIGATIONS_FIELD, SYSTEM_PROMPT};
pub use sections::{locate_section, truncate_chars, SectionSlice};

use std::sync::Arc;
use std::time::Instant;

use completion_client::{CompletionRequest, Message, StructuredOutput};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ExtractionError, Result};
use crate::invoke::{CompletionService, RetryPolicy};
use crate::progress::{report_progress, ProgressSink, ProgressUpdate};
use crate::recovery::recover;
use crate::types::{
    ExtractedObligation, ExtractionConfig, ExtractionContext, PassKind, PassResult, TokenUsage,
};

/// Result of the model-based path over one document.
#[derive(Debug, Clone)]
pub struct ModelExtraction {
    /// Deduplicated obligations across all five passes
    pub obligations: Vec<ExtractedObligation>,

    /// Per-pass results, concurrent passes first, verification last
    pub passes: Vec<PassResult>,

    /// Verification pass's coverage estimate
    pub coverage: f32,

    /// Token usage summed across all passes
    pub usage: TokenUsage,
}

impl ModelExtraction {
    /// Whether every pass failed and the document produced nothing at all.
    pub fn total_failure(&self) -> bool {
        self.passes.iter().all(|p| p.failed)
    }
}

/// One pass's outcome before merging.
struct PassOutcome {
    result: PassResult,
    coverage: Option<f32>,
}

/// Orchestrates the five extraction passes for one document.
pub struct MultiPassExtractor<C: CompletionService> {
    completion: Arc<C>,
    config: ExtractionConfig,
}

impl<C: CompletionService> MultiPassExtractor<C> {
    /// Create an extractor.
    pub fn new(completion: Arc<C>, config: ExtractionConfig) -> Self {
        Self { completion, config }
    }

    /// Run all passes over a document.
    ///
    /// Cancellation is honored between passes only: a set token stops the
    /// pipeline after the concurrent stage; in-flight completion calls
    /// run to their own timeout.
    pub async fn run(
        &self,
        document: &str,
        ctx: &ExtractionContext,
        policy: &RetryPolicy,
        progress: &dyn ProgressSink,
        cancel: Option<&CancellationToken>,
    ) -> Result<ModelExtraction> {
        let document_ref = ctx.permit_reference.clone();
        report_progress(
            progress,
            ProgressUpdate::new(document_ref.clone(), "multi_pass_start", 0.0),
        );

        // Bounded concurrent outbound calls for this document.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_passes));

        let concurrent = PassKind::CONCURRENT.map(|kind| {
            let semaphore = semaphore.clone();
            let document_ref = document_ref.clone();
            async move {
                // Semaphore is never closed while we hold it.
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let outcome = self.run_pass(kind, document, &[], policy).await;
                report_progress(
                    progress,
                    ProgressUpdate::new(document_ref, kind.label(), 20.0),
                );
                outcome
            }
        });

        let mut passes: Vec<PassResult> = join_all(concurrent)
            .await
            .into_iter()
            .map(|outcome| outcome.result)
            .collect();

        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ExtractionError::Cancelled);
        }

        // Verification sees what the other passes found so it only hunts
        // for what they missed.
        let found_references: Vec<String> = passes
            .iter()
            .flat_map(|p| &p.obligations)
            .map(|o| {
                let reference = o.condition_reference.as_deref().unwrap_or("-");
                let summary = truncate_chars(&o.description, 80);
                format!("{} {}", reference, summary)
            })
            .collect();

        let verification = self
            .run_pass(PassKind::Verification, document, &found_references, policy)
            .await;
        let coverage = if verification.result.failed {
            self.config.default_coverage
        } else {
            verification
                .coverage
                .unwrap_or(self.config.default_coverage)
                .clamp(0.0, 1.0)
        };
        passes.push(verification.result);

        let mut usage = TokenUsage::default();
        for pass in &passes {
            if let Some(pass_usage) = pass.usage {
                usage.input_tokens += pass_usage.input_tokens;
                usage.output_tokens += pass_usage.output_tokens;
            }
        }

        let obligations = dedupe_obligations(
            passes
                .iter()
                .flat_map(|p| p.obligations.iter().cloned())
                .collect(),
        );

        report_progress(
            progress,
            ProgressUpdate::new(document_ref, "multi_pass_complete", 100.0),
        );
        info!(
            obligations = obligations.len(),
            coverage,
            total_tokens = usage.total(),
            "multi-pass extraction complete"
        );

        Ok(ModelExtraction {
            obligations,
            passes,
            coverage,
            usage,
        })
    }

    /// Run one pass. Never returns an error: a failed completion call or
    /// unrecoverable output degrades to an empty, failed [`PassResult`].
    async fn run_pass(
        &self,
        kind: PassKind,
        document: &str,
        found_references: &[String],
        policy: &RetryPolicy,
    ) -> PassOutcome {
        let start = Instant::now();
        let section = locate_section(
            document,
            kind,
            self.config.numbered_section_chars,
            self.config.section_window_chars,
        );

        let request = CompletionRequest::new(&self.config.model)
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(user_prompt(kind, &section.text, found_references)))
            .temperature(self.config.temperature)
            .max_output_tokens(self.config.max_output_tokens)
            .structured_output("pass_response", PassResponse::strict_schema());

        let response = match self.completion.complete(request, policy).await {
            Ok(response) => response,
            Err(e) => {
                warn!(pass = kind.label(), error = %e, "pass failed");
                return PassOutcome {
                    result: PassResult::empty(kind, start.elapsed().as_millis() as u64),
                    coverage: None,
                };
            }
        };

        if response.is_truncated() {
            warn!(pass = kind.label(), "response truncated at token ceiling; recovering");
        }

        let recovered = recover(&response.content, OBLIGATIONS_FIELD);
        let obligations = normalize_items(&recovered.items, kind, recovered.confidence_hint);

        // Coverage only survives an untruncated response; a recovered
        // array loses the trailing scalar fields.
        let coverage = serde_json::from_str::<serde_json::Value>(&response.content)
            .ok()
            .and_then(|v| v.get("coverage")?.as_f64())
            .map(|c| c as f32);

        let mut usage = TokenUsage::default();
        if let Some(call_usage) = response.usage {
            usage.add(&call_usage);
        }

        PassOutcome {
            result: PassResult {
                kind,
                obligations,
                confidence: recovered.confidence_hint,
                elapsed_ms: start.elapsed().as_millis() as u64,
                usage: Some(usage),
                failed: recovered.failed,
            },
            coverage,
        }
    }
}
