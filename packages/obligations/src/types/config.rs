//! Configuration types for the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Caller-supplied context for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionContext {
    /// Compliance module types the document belongs to
    #[serde(default)]
    pub module_types: Vec<String>,

    /// Issuing regulator, when known
    pub regulator: Option<String>,

    /// Document type (permit, consent, registration), when known
    pub document_type: Option<String>,

    /// Page count, for timeout classification
    pub page_count: Option<u32>,

    /// File size in bytes, for timeout classification
    pub file_size_bytes: Option<u64>,

    /// Permit reference, for progress/cost reporting
    pub permit_reference: Option<String>,
}

impl ExtractionContext {
    /// Create a context for the given module types.
    pub fn new(module_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            module_types: module_types.into_iter().map(|m| m.into()).collect(),
            ..Default::default()
        }
    }

    /// Set the regulator.
    pub fn with_regulator(mut self, regulator: impl Into<String>) -> Self {
        self.regulator = Some(regulator.into());
        self
    }

    /// Set the document type.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Set the document size, used to pick per-attempt timeouts.
    pub fn with_size(mut self, page_count: u32, file_size_bytes: u64) -> Self {
        self.page_count = Some(page_count);
        self.file_size_bytes = Some(file_size_bytes);
        self
    }

    /// Set the permit reference.
    pub fn with_permit_reference(mut self, reference: impl Into<String>) -> Self {
        self.permit_reference = Some(reference.into());
        self
    }
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Model identifier for all passes
    pub model: String,

    /// Sampling temperature (0.0 for deterministic extraction)
    pub temperature: f32,

    /// Output token ceiling per pass
    pub max_output_tokens: u32,

    /// Score below which the matcher result is ignored and the model
    /// path runs. This is the boundary between free and paid extraction.
    pub match_threshold: f32,

    /// Segment size cap for the pattern matcher, in characters
    pub segment_chars: usize,

    /// Characters of document head given to the numbered-conditions pass
    pub numbered_section_chars: usize,

    /// Characters of a located section given to the targeted passes
    pub section_window_chars: usize,

    /// Concurrent outbound completion calls per document
    pub max_concurrent_passes: usize,

    /// Coverage reported when the verification pass itself fails
    pub default_coverage: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_output_tokens: 4096,
            match_threshold: 0.90,
            segment_chars: 1000,
            numbered_section_chars: 24_000,
            section_window_chars: 16_000,
            max_concurrent_passes: 4,
            default_coverage: 0.85,
        }
    }
}

impl ExtractionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the match threshold.
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Set the output token ceiling.
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    /// Set the concurrent pass limit.
    pub fn with_max_concurrent_passes(mut self, max: usize) -> Self {
        self.max_concurrent_passes = max.max(1);
        self
    }
}
