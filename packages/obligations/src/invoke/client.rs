//! Resilient completion invocation: retry, backoff, credential failover.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use completion_client::{CompletionClient, CompletionRequest, CompletionResponse};

use super::credentials::CredentialPool;
use super::policy::RetryPolicy;
use crate::error::{ExtractionError, Result};

/// The completion seam the extraction pipeline talks through.
///
/// The production implementation is [`ResilientClient`]; tests use the
/// scripted mock in `testing`.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one logical completion, with whatever retries the policy allows.
    async fn complete(
        &self,
        request: CompletionRequest,
        policy: &RetryPolicy,
    ) -> Result<CompletionResponse>;
}

/// One wire-level attempt. Implemented by [`CompletionClient`]; the
/// resilient layer is generic over it so its retry behavior is testable
/// without a network.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn attempt(
        &self,
        api_key: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> completion_client::Result<CompletionResponse>;
}

#[async_trait]
impl CompletionTransport for CompletionClient {
    async fn attempt(
        &self,
        api_key: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> completion_client::Result<CompletionResponse> {
        self.complete(api_key, request, timeout).await
    }
}

/// Wraps a transport with retry/backoff and credential failover against a
/// shared [`CredentialPool`].
///
/// Retryable failures (timeout, transient network, 5xx) back off per the
/// policy schedule. A rate-limit failure earns exactly one credential
/// rotation and an immediate retry with the new credential; every other
/// non-retryable failure aborts at once. When attempts run out the last
/// error is surfaced; never a silent empty result.
pub struct ResilientClient<T: CompletionTransport = CompletionClient> {
    transport: T,
    pool: Arc<CredentialPool>,
}

impl<T: CompletionTransport> ResilientClient<T> {
    /// Create a resilient client over a pool.
    pub fn new(transport: T, pool: Arc<CredentialPool>) -> Self {
        Self { transport, pool }
    }

    /// The underlying credential pool.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }
}

#[async_trait]
impl<T: CompletionTransport> CompletionService for ResilientClient<T> {
    async fn complete(
        &self,
        request: CompletionRequest,
        policy: &RetryPolicy,
    ) -> Result<CompletionResponse> {
        let timeout = policy.timeout();
        let mut rotated = false;
        let mut attempt: u32 = 0;
        let mut last_err: Option<ExtractionError> = None;

        while attempt < policy.total_attempts {
            attempt += 1;
            let credential = self.pool.current();

            match self
                .transport
                .attempt(credential.secret(), &request, timeout)
                .await
            {
                Ok(response) => {
                    debug!(
                        model = %request.model,
                        attempt,
                        truncated = response.is_truncated(),
                        "completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, "retryable completion failure");
                    let exhausted = attempt >= policy.total_attempts;
                    last_err = Some(e.into());
                    if !exhausted {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
                Err(e) if e.is_rate_limited() && !rotated => {
                    warn!(attempt, "rate limited; rotating credential");
                    rotated = true;
                    self.pool.rotate().await?;
                    // The rotation retry replaces the failed attempt
                    // rather than consuming a fresh one.
                    attempt -= 1;
                    last_err = Some(e.into());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "non-retryable completion failure");
                    return Err(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ExtractionError::AllStrategiesFailed {
            detail: "completion attempts exhausted".to_string(),
        }))
    }
}
