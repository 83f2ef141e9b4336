//! Pattern mining: confirmed extractions become candidate patterns.
//!
//! Runs offline, after a human confirms an extraction without edits.
//! Obligations confirmed that way and produced by the model path are
//! grouped into clusters of similar text; each cluster's longest common
//! word phrase, escaped into a regex, becomes a candidate if it matches
//! nearly all of its sources.

use regex::RegexBuilder;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::stores::CandidateStore;
use crate::types::{ExtractedObligation, ObligationCategory, PatternCandidate};

/// One human-confirmed extraction, as reported by the caller.
#[derive(Debug, Clone)]
pub struct ConfirmedExtraction {
    /// Identifier of the stored extraction
    pub extraction_id: Uuid,

    /// Whether the model path produced it (pattern-path extractions
    /// teach us nothing new)
    pub used_model: bool,

    /// Whether the reviewer edited anything before confirming
    pub edited: bool,

    /// The confirmed obligations
    pub obligations: Vec<ExtractedObligation>,
}

/// Mining thresholds.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Minimum similar obligations to form a cluster
    pub min_cluster_size: usize,

    /// Texts cluster when their lengths are within this fraction
    pub max_length_spread: f64,

    /// Candidate accepted only when its regex matches this fraction of
    /// the cluster's source texts
    pub min_match_rate: f64,

    /// Shortest common phrase worth turning into a pattern, in words
    pub min_phrase_words: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            max_length_spread: 0.3,
            min_match_rate: 0.9,
            min_phrase_words: 3,
        }
    }
}

/// Mines confirmed extractions into pending candidates.
pub struct PatternMiner {
    store: Arc<dyn CandidateStore>,
    config: MinerConfig,
}

impl PatternMiner {
    /// Create a miner with default thresholds.
    pub fn new(store: Arc<dyn CandidateStore>) -> Self {
        Self {
            store,
            config: MinerConfig::default(),
        }
    }

    /// Create a miner with custom thresholds.
    pub fn with_config(store: Arc<dyn CandidateStore>, config: MinerConfig) -> Self {
        Self { store, config }
    }

    /// Mine candidates from a batch of confirmed extractions and store
    /// each as PENDING_REVIEW.
    pub async fn mine(&self, confirmed: &[ConfirmedExtraction]) -> Result<Vec<PatternCandidate>> {
        // Only unedited, model-path confirmations carry signal.
        let mut by_category: HashMap<ObligationCategory, Vec<(Uuid, &ExtractedObligation)>> =
            HashMap::new();
        for extraction in confirmed.iter().filter(|e| e.used_model && !e.edited) {
            for obligation in &extraction.obligations {
                by_category
                    .entry(obligation.category)
                    .or_default()
                    .push((extraction.extraction_id, obligation));
            }
        }

        let mut candidates = Vec::new();
        for (category, group) in by_category {
            for cluster in cluster_by_length(&group, self.config.max_length_spread) {
                if cluster.len() < self.config.min_cluster_size {
                    continue;
                }
                if let Some(candidate) = self.candidate_from_cluster(category, &cluster) {
                    self.store.insert(candidate.clone()).await?;
                    candidates.push(candidate);
                }
            }
        }

        info!(candidates = candidates.len(), "pattern mining complete");
        Ok(candidates)
    }

    /// Turn one cluster into a candidate, if a common phrase exists and
    /// its regex holds up against the sources.
    fn candidate_from_cluster(
        &self,
        category: ObligationCategory,
        cluster: &[(Uuid, &ExtractedObligation)],
    ) -> Option<PatternCandidate> {
        let texts: Vec<&str> = cluster.iter().map(|(_, o)| o.description.as_str()).collect();

        let phrase = longest_common_phrase(&texts, self.config.min_phrase_words)?;
        let source = phrase
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");

        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .ok()?;
        let matched = texts.iter().filter(|t| regex.is_match(t)).count();
        let match_rate = matched as f64 / texts.len() as f64;

        if match_rate < self.config.min_match_rate {
            debug!(%match_rate, phrase, "cluster regex below match-rate threshold");
            return None;
        }

        let mut source_ids: Vec<Uuid> = cluster.iter().map(|(id, _)| *id).collect();
        source_ids.sort();
        source_ids.dedup();

        Some(PatternCandidate::new(
            category,
            source,
            source_ids,
            cluster.len(),
            match_rate,
        ))
    }
}

/// Greedy length clustering: texts sorted by length, a cluster grows while
/// the longest member stays within `spread` of the shortest.
fn cluster_by_length<'a>(
    group: &[(Uuid, &'a ExtractedObligation)],
    spread: f64,
) -> Vec<Vec<(Uuid, &'a ExtractedObligation)>> {
    let mut sorted: Vec<(Uuid, &ExtractedObligation)> = group.to_vec();
    sorted.sort_by_key(|(_, o)| o.description.chars().count());

    let mut clusters: Vec<Vec<(Uuid, &ExtractedObligation)>> = Vec::new();
    for entry in sorted {
        let len = entry.1.description.chars().count();
        match clusters.last_mut() {
            Some(cluster) => {
                let base = cluster[0].1.description.chars().count();
                if len as f64 <= base as f64 * (1.0 + spread) {
                    cluster.push(entry);
                } else {
                    clusters.push(vec![entry]);
                }
            }
            None => clusters.push(vec![entry]),
        }
    }
    clusters
}

/// Longest word sequence (case-folded) present in every text.
fn longest_common_phrase(texts: &[&str], min_words: usize) -> Option<String> {
    let shortest = texts.iter().min_by_key(|t| t.len())?;
    let words: Vec<&str> = shortest.split_whitespace().collect();
    let folded: Vec<String> = texts.iter().map(|t| fold_words(t)).collect();

    for window in (min_words..=words.len()).rev() {
        for start in 0..=words.len() - window {
            let phrase = words[start..start + window].join(" ");
            let needle = fold_words(&phrase);
            if folded.iter().all(|t| t.contains(&needle)) {
                return Some(phrase);
            }
        }
    }
    None
}

fn fold_words(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
