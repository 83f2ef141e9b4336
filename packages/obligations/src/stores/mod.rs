//! Storage seams for patterns and candidates.
//!
//! Persistence is a downstream collaborator; the pipeline only needs
//! these two focused traits. Both stores are shared across concurrent
//! document pipelines, so counter updates are specified as atomic
//! read-modify-write operations: a store must apply the whole increment
//! under one update, never read-then-separately-write.

pub mod memory;

pub use memory::{MemoryCandidateStore, MemoryPatternStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{PatternCandidate, RulePattern};

/// Store for the shared rule-pattern library.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// All active patterns, for the matcher.
    async fn list_active(&self) -> Result<Vec<RulePattern>>;

    /// Get a pattern by id.
    async fn get(&self, id: Uuid) -> Result<Option<RulePattern>>;

    /// Insert a new pattern.
    async fn insert(&self, pattern: RulePattern) -> Result<()>;

    /// Record one use of a pattern, atomically updating its counters
    /// and success rate.
    async fn record_usage(&self, id: Uuid, success: bool) -> Result<()>;

    /// Activate or deactivate a pattern.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<()>;
}

/// Store for not-yet-trusted pattern candidates.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Get a candidate by id.
    async fn get(&self, id: Uuid) -> Result<Option<PatternCandidate>>;

    /// Insert a mined candidate.
    async fn insert(&self, candidate: PatternCandidate) -> Result<()>;

    /// Candidates awaiting review.
    async fn list_pending(&self) -> Result<Vec<PatternCandidate>>;

    /// Record one shadow-trial use of a pending candidate, atomically.
    async fn record_trial(&self, id: Uuid, success: bool) -> Result<()>;

    /// Mark a candidate approved and link the pattern it became.
    async fn mark_approved(&self, id: Uuid, pattern_id: Uuid) -> Result<()>;
}
