//! In-memory store implementations for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{CandidateStore, PatternStore};
use crate::error::Result;
use crate::types::{CandidateStatus, PatternCandidate, RulePattern};

/// In-memory pattern library.
///
/// Counter updates happen inside a single write lock, satisfying the
/// atomic read-modify-write contract. Not suitable for production as
/// data is lost on restart.
#[derive(Default)]
pub struct MemoryPatternStore {
    patterns: RwLock<HashMap<Uuid, RulePattern>>,
}

impl MemoryPatternStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with patterns.
    pub fn with_patterns(patterns: impl IntoIterator<Item = RulePattern>) -> Self {
        let store = Self::new();
        {
            let mut map = store.patterns.write().unwrap();
            for pattern in patterns {
                map.insert(pattern.id, pattern);
            }
        }
        store
    }

    /// Number of stored patterns.
    pub fn len(&self) -> usize {
        self.patterns.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn list_active(&self) -> Result<Vec<RulePattern>> {
        let mut active: Vec<RulePattern> = self
            .patterns
            .read()
            .unwrap()
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        active.sort_by_key(|p| p.priority);
        Ok(active)
    }

    async fn get(&self, id: Uuid) -> Result<Option<RulePattern>> {
        Ok(self.patterns.read().unwrap().get(&id).cloned())
    }

    async fn insert(&self, pattern: RulePattern) -> Result<()> {
        self.patterns.write().unwrap().insert(pattern.id, pattern);
        Ok(())
    }

    async fn record_usage(&self, id: Uuid, success: bool) -> Result<()> {
        let mut patterns = self.patterns.write().unwrap();
        if let Some(pattern) = patterns.get_mut(&id) {
            pattern.performance.record(success);
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        let mut patterns = self.patterns.write().unwrap();
        if let Some(pattern) = patterns.get_mut(&id) {
            pattern.active = active;
        }
        Ok(())
    }
}

/// In-memory candidate store.
#[derive(Default)]
pub struct MemoryCandidateStore {
    candidates: RwLock<HashMap<Uuid, PatternCandidate>>,
}

impl MemoryCandidateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored candidates.
    pub fn len(&self) -> usize {
        self.candidates.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CandidateStore for MemoryCandidateStore {
    async fn get(&self, id: Uuid) -> Result<Option<PatternCandidate>> {
        Ok(self.candidates.read().unwrap().get(&id).cloned())
    }

    async fn insert(&self, candidate: PatternCandidate) -> Result<()> {
        self.candidates
            .write()
            .unwrap()
            .insert(candidate.id, candidate);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PatternCandidate>> {
        Ok(self
            .candidates
            .read()
            .unwrap()
            .values()
            .filter(|c| c.status == CandidateStatus::PendingReview)
            .cloned()
            .collect())
    }

    async fn record_trial(&self, id: Uuid, success: bool) -> Result<()> {
        let mut candidates = self.candidates.write().unwrap();
        if let Some(candidate) = candidates.get_mut(&id) {
            candidate.performance.record(success);
        }
        Ok(())
    }

    async fn mark_approved(&self, id: Uuid, pattern_id: Uuid) -> Result<()> {
        let mut candidates = self.candidates.write().unwrap();
        if let Some(candidate) = candidates.get_mut(&id) {
            candidate.status = CandidateStatus::Approved;
            candidate.promoted_pattern_id = Some(pattern_id);
        }
        Ok(())
    }
}
