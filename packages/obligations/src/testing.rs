//! Testing utilities including mock implementations.
//!
//! Useful for testing applications built on this library without a real
//! completion service. The mock scripts replies by marker substring and
//! records every call for assertions.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

use completion_client::{
    CompletionError, CompletionRequest, CompletionResponse, FinishReason, Usage,
};

use crate::error::Result;
use crate::invoke::{CompletionService, RetryPolicy};
use crate::progress::{CostRecord, CostSink, ProgressSink, ProgressUpdate, SinkError};
use crate::types::PassKind;

/// A scripted reply for the mock completion service.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful response with the given content
    Content(String),

    /// Successful response flagged as truncated (`finish_reason: length`)
    Truncated(String),

    /// Attempt times out
    Timeout,

    /// Attempt is rate limited
    RateLimited,

    /// Credential rejected
    InvalidCredential,
}

/// Record of one call made to the mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Model requested
    pub model: String,

    /// Marker that matched, if any
    pub marker: Option<String>,
}

/// A scripted completion service.
///
/// Replies are keyed by a marker substring searched for in the request's
/// messages (pass prompts contain distinctive phrases; see
/// [`pass_marker`]). Markers are tried in registration order. A queue
/// with more than one entry pops per call; the final entry sticks, so a
/// single scripted reply answers repeated calls.
#[derive(Default)]
pub struct MockCompletion {
    /// Marker -> reply queue, in registration order
    scripts: RwLock<IndexMap<String, VecDeque<MockReply>>>,
    default_reply: RwLock<Option<MockReply>>,
    calls: RwLock<Vec<MockCall>>,
}

/// Distinctive substring of each pass's user prompt, for scripting the
/// mock per pass.
pub fn pass_marker(kind: PassKind) -> &'static str {
    match kind {
        PassKind::NumberedConditions => "numbered condition",
        PassKind::TableRows => "embedded in tables",
        PassKind::ImprovementConditions => "improvement conditions",
        PassKind::EmissionLimits => "emission limit values",
        PassKind::Verification => "MISSED",
    }
}

impl MockCompletion {
    /// Create a mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a reply for requests whose messages contain `marker`.
    pub fn with_reply(self, marker: impl Into<String>, reply: MockReply) -> Self {
        self.scripts
            .write()
            .unwrap()
            .entry(marker.into())
            .or_default()
            .push_back(reply);
        self
    }

    /// Script a reply for one extraction pass.
    pub fn with_pass_reply(self, kind: PassKind, reply: MockReply) -> Self {
        self.with_reply(pass_marker(kind), reply)
    }

    /// Script an obligations payload for one pass.
    pub fn with_pass_obligations(self, kind: PassKind, payload: serde_json::Value) -> Self {
        self.with_pass_reply(kind, MockReply::Content(payload.to_string()))
    }

    /// Reply used when no marker matches.
    pub fn with_default(self, reply: MockReply) -> Self {
        *self.default_reply.write().unwrap() = Some(reply);
        self
    }

    /// All calls made to this mock.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls that matched a marker.
    pub fn calls_for(&self, marker: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.marker.as_deref() == Some(marker))
            .count()
    }

    fn next_reply(&self, request: &CompletionRequest) -> (Option<String>, Option<MockReply>) {
        let mut scripts = self.scripts.write().unwrap();
        for (marker, queue) in scripts.iter_mut() {
            let hit = request
                .messages
                .iter()
                .any(|message| message.content.contains(marker.as_str()));
            if !hit {
                continue;
            }
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            return (Some(marker.clone()), reply);
        }
        (None, self.default_reply.read().unwrap().clone())
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        request: CompletionRequest,
        _policy: &RetryPolicy,
    ) -> Result<CompletionResponse> {
        let (marker, reply) = self.next_reply(&request);
        self.calls.write().unwrap().push(MockCall {
            model: request.model.clone(),
            marker,
        });

        match reply {
            Some(MockReply::Content(content)) => Ok(CompletionResponse {
                content,
                usage: Some(Usage {
                    input_tokens: 1000,
                    output_tokens: 200,
                }),
                finish_reason: FinishReason::Stop,
            }),
            Some(MockReply::Truncated(content)) => Ok(CompletionResponse {
                content,
                usage: Some(Usage {
                    input_tokens: 1000,
                    output_tokens: 4096,
                }),
                finish_reason: FinishReason::Length,
            }),
            Some(MockReply::Timeout) => {
                Err(CompletionError::Timeout(Duration::from_secs(30)).into())
            }
            Some(MockReply::RateLimited) => {
                Err(CompletionError::RateLimited("429".to_string()).into())
            }
            Some(MockReply::InvalidCredential) => {
                Err(CompletionError::InvalidCredential("401".to_string()).into())
            }
            None => Ok(CompletionResponse {
                content: r#"{"obligations": [], "coverage": 0.0}"#.to_string(),
                usage: Some(Usage {
                    input_tokens: 1000,
                    output_tokens: 10,
                }),
                finish_reason: FinishReason::Stop,
            }),
        }
    }
}

/// Progress sink that records every update.
#[derive(Default)]
pub struct CollectingProgress {
    updates: RwLock<Vec<ProgressUpdate>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.read().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.updates
            .read()
            .unwrap()
            .iter()
            .map(|u| u.stage.clone())
            .collect()
    }
}

impl ProgressSink for CollectingProgress {
    fn report(&self, update: ProgressUpdate) -> std::result::Result<(), SinkError> {
        self.updates.write().unwrap().push(update);
        Ok(())
    }
}

/// Progress sink that always fails. The pipeline must not care.
pub struct FailingProgress;

impl ProgressSink for FailingProgress {
    fn report(&self, _update: ProgressUpdate) -> std::result::Result<(), SinkError> {
        Err("progress backend is down".into())
    }
}

/// Cost sink that records every entry.
#[derive(Default)]
pub struct CollectingCosts {
    records: RwLock<Vec<CostRecord>>,
}

impl CollectingCosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CostRecord> {
        self.records.read().unwrap().clone()
    }
}

impl CostSink for CollectingCosts {
    fn record(&self, record: CostRecord) -> std::result::Result<(), SinkError> {
        self.records.write().unwrap().push(record);
        Ok(())
    }
}
