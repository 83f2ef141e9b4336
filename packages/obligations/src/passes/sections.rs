//! Section targeting: each pass sees only the part of the document it
//! needs, to control cost and model context size.
//!
//! Targeted passes locate their section with an ordered list of named
//! regex strategies, tried in sequence; the first hit wins. When nothing
//! hits, the pass falls back to the document head so a permit with an
//! unusual layout still gets scanned.

use regex::RegexBuilder;
use tracing::debug;

use crate::types::PassKind;

/// A named way of finding a section. Strategies are ordered: the most
/// specific heading comes first, generic vocabulary last.
struct SectionStrategy {
    name: &'static str,
    pattern: &'static str,
}

const TABLE_STRATEGIES: &[SectionStrategy] = &[
    SectionStrategy {
        name: "schedule_heading",
        pattern: r"(?im)^\s*schedule\s+\d+",
    },
    SectionStrategy {
        name: "table_heading",
        pattern: r"(?im)^\s*table\s+[A-Za-z]?\d+",
    },
    SectionStrategy {
        name: "pipe_table",
        pattern: r"(?m)^\s*\|.+\|\s*$",
    },
];

const IMPROVEMENT_STRATEGIES: &[SectionStrategy] = &[
    SectionStrategy {
        name: "improvement_programme_heading",
        pattern: r"(?i)improvement\s+programme",
    },
    SectionStrategy {
        name: "improvement_conditions_heading",
        pattern: r"(?i)improvement\s+conditions?",
    },
    SectionStrategy {
        name: "improvement_reference",
        pattern: r"\bI[CP]\d+\b",
    },
];

const EMISSION_LIMIT_STRATEGIES: &[SectionStrategy] = &[
    SectionStrategy {
        name: "elv_heading",
        pattern: r"(?i)emission\s+limit\s+values?",
    },
    SectionStrategy {
        name: "elv_abbreviation",
        pattern: r"\bELVs?\b",
    },
    SectionStrategy {
        name: "concentration_units",
        pattern: r"(?i)\b(?:mg|µg|ug|ng)/(?:m3|m³|l|Nm3|Nm³)\b",
    },
];

/// The document slice a pass will see, and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSlice {
    pub text: String,
    /// Strategy name, or "document_head" for the fallback
    pub strategy: &'static str,
}

/// Slice the document for a pass.
///
/// Numbered-condition and verification passes read the document head
/// (`head_chars`); the targeted passes search their strategies and take a
/// window of `window_chars` from the first hit.
pub fn locate_section(
    text: &str,
    kind: PassKind,
    head_chars: usize,
    window_chars: usize,
) -> SectionSlice {
    let strategies: &[SectionStrategy] = match kind {
        PassKind::NumberedConditions | PassKind::Verification => {
            return SectionSlice {
                text: truncate_chars(text, head_chars).to_string(),
                strategy: "document_head",
            };
        }
        PassKind::TableRows => TABLE_STRATEGIES,
        PassKind::ImprovementConditions => IMPROVEMENT_STRATEGIES,
        PassKind::EmissionLimits => EMISSION_LIMIT_STRATEGIES,
    };

    for strategy in strategies {
        // Strategy patterns are compile-time constants; a failure here is
        // a programming error, so skip rather than unwrap.
        let Ok(regex) = RegexBuilder::new(strategy.pattern).build() else {
            continue;
        };
        if let Some(found) = regex.find(text) {
            debug!(pass = kind.label(), strategy = strategy.name, "section located");
            return SectionSlice {
                text: truncate_chars(&text[found.start()..], window_chars).to_string(),
                strategy: strategy.name,
            };
        }
    }

    debug!(pass = kind.label(), "no section strategy hit; using document head");
    SectionSlice {
        text: truncate_chars(text, window_chars).to_string(),
        strategy: "document_head",
    }
}

/// Truncate to at most `max_chars` characters, on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMIT: &str = "\
Introductory text about the installation and its activities.

1.1 The operator shall comply with all conditions.

Improvement programme
IC1 Install continuous NOx monitoring by 31 December 2026.

Emission limit values
| Parameter | Limit | Unit |
| NOx | 190 | mg/m3 |

Schedule 1
Table S1.2 Monitoring requirements
";

    #[test]
    fn test_numbered_conditions_takes_head() {
        let slice = locate_section(PERMIT, PassKind::NumberedConditions, 50, 1000);
        assert_eq!(slice.strategy, "document_head");
        assert_eq!(slice.text.chars().count(), 50);
        assert!(slice.text.starts_with("Introductory"));
    }

    #[test]
    fn test_improvement_section_located_by_heading() {
        let slice = locate_section(PERMIT, PassKind::ImprovementConditions, 100, 1000);
        assert_eq!(slice.strategy, "improvement_programme_heading");
        assert!(slice.text.starts_with("Improvement programme"));
        assert!(slice.text.contains("IC1"));
    }

    #[test]
    fn test_elv_section_located_by_heading() {
        let slice = locate_section(PERMIT, PassKind::EmissionLimits, 100, 1000);
        assert_eq!(slice.strategy, "elv_heading");
        assert!(slice.text.contains("NOx"));
    }

    #[test]
    fn test_table_strategies_ordered() {
        // "Schedule 1" appears after the pipe table in the document, but
        // the schedule strategy outranks pipe detection.
        let slice = locate_section(PERMIT, PassKind::TableRows, 100, 1000);
        assert_eq!(slice.strategy, "schedule_heading");
        assert!(slice.text.starts_with("Schedule 1"));
    }

    #[test]
    fn test_fallback_strategy_by_units() {
        let text = "Releases of particulates shall not exceed 10 mg/m3 at point A1.";
        let slice = locate_section(text, PassKind::EmissionLimits, 100, 1000);
        assert_eq!(slice.strategy, "concentration_units");
    }

    #[test]
    fn test_no_hit_falls_back_to_head() {
        let text = "Plain prose with no tables or limits anywhere.";
        let slice = locate_section(text, PassKind::TableRows, 100, 20);
        assert_eq!(slice.strategy, "document_head");
        assert_eq!(slice.text.chars().count(), 20);
    }

    #[test]
    fn test_window_caps_section() {
        let slice = locate_section(PERMIT, PassKind::ImprovementConditions, 100, 30);
        assert_eq!(slice.text.chars().count(), 30);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("naïve café", 5), "naïve");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
