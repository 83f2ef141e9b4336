//! Pure chat-completion REST API client
//!
//! A minimal client for OpenAI-compatible completion services with no
//! domain logic and no retry policy. Credentials are supplied per call so
//! a pool above this layer can rotate them; deadlines are supplied per
//! call so the caller can size them to the work.
//!
//! # Example
//!
//! ```rust,ignore
//! use completion_client::{CompletionClient, CompletionRequest, Message};
//! use std::time::Duration;
//!
//! let client = CompletionClient::new();
//!
//! let response = client
//!     .complete(
//!         "sk-...",
//!         &CompletionRequest::new("gpt-4o")
//!             .message(Message::user("Hello!"))
//!             .json_output(),
//!         Duration::from_secs(30),
//!     )
//!     .await?;
//!
//! if response.is_truncated() {
//!     // finish_reason == "length"; content ends mid-stream
//! }
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{CompletionError, Result};
pub use schema::StructuredOutput;
pub use types::{
    CompletionRequest, CompletionResponse, FinishReason, JsonSchemaFormat, Message,
    ResponseFormat, Usage,
};

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion service client.
///
/// Holds only the HTTP connection pool and endpoint; the API key arrives
/// with each call.
#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    base_url: String,
}

impl Default for CompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionClient {
    /// Create a client against the default endpoint.
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one completion request with the given credential and deadline.
    ///
    /// Performs exactly one attempt. HTTP statuses are mapped onto the
    /// error taxonomy ([`CompletionError`]) so the retry layer above can
    /// classify without inspecting response bodies.
    pub async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(timeout)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(timeout)
                } else {
                    warn!(error = %e, "completion request failed");
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "completion API error");
            return Err(classify_status(status, body));
        }

        let raw: types::CompletionResponseRaw = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Parse("response contained no choices".into()))?;

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from)
            .unwrap_or(FinishReason::Stop);

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            finish_reason = ?finish_reason,
            "completion"
        );

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: raw.usage,
            finish_reason,
        })
    }

    /// Probe whether a credential is accepted by the service.
    ///
    /// Cheap out-of-band check against the model listing endpoint: returns
    /// `Ok(false)` for a rejected credential, and an error only when the
    /// service could not be reached at all.
    pub async fn check_credential(&self, api_key: &str, timeout: Duration) -> Result<bool> {
        let response = self
            .http_client
            .get(format!("{}/models", self.base_url))
            .timeout(timeout)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(timeout)
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_status(status, body))
            }
        }
    }
}

/// Map a non-2xx status onto the error taxonomy.
fn classify_status(status: StatusCode, body: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::InvalidCredential(body)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            // The service reports hard quota caps on the same status.
            if body.contains("quota") || body.contains("insufficient_quota") {
                CompletionError::QuotaExhausted(body)
            } else {
                CompletionError::RateLimited(body)
            }
        }
        StatusCode::BAD_REQUEST => CompletionError::InvalidRequest(body),
        _ => CompletionError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}
