//! Prompts for the extraction passes.
//!
//! Each pass targets one obligation subtype. All passes share the same
//! output contract: a JSON object with an "obligations" array, so every
//! response can be fed through the same recovery parser.

use crate::types::PassKind;

/// Name of the array field every pass returns.
pub const OBLIGATIONS_FIELD: &str = "obligations";

/// Shared system prompt: the output contract.
pub const SYSTEM_PROMPT: &str = r#"You extract compliance obligations from regulatory documents (environmental permits, consents, registrations).

Output JSON only:
{
    "obligations": [
        {
            "condition_reference": "reference as printed, e.g. 3.1.2, or null",
            "description": "what the operator must do, in one or two sentences",
            "category": "monitoring | reporting | record_keeping | emission_limit | improvement | maintenance | notification | training | operational",
            "frequency": "continuous | daily | weekly | monthly | quarterly | annually | once | as_required | null",
            "deadline": "date or relative wording, or null",
            "subjective": true if compliance is a matter of judgement,
            "confidence": 0.0 to 1.0,
            "source_quote": "short verbatim quote supporting the obligation"
        }
    ],
    "coverage": 0.0 to 1.0
}

Rules:
1. Extract only obligations that bind the operator; ignore background text
2. Quote the source verbatim in source_quote
3. Never invent conditions that are not in the document"#;

const NUMBERED_CONDITIONS_PROMPT: &str = r#"Extract every numbered condition that places an obligation on the operator.

Focus on the numbered/lettered condition structure (1.1, 2.3.4, Condition 7). Use the printed number as condition_reference.

Document:
{document}"#;

const TABLE_ROWS_PROMPT: &str = r#"Extract obligations embedded in tables (monitoring schedules, reporting timetables, limit tables).

Each row that obliges the operator to do something is one obligation. Use the row's parameter or reference column as condition_reference.

Document section:
{document}"#;

const IMPROVEMENT_CONDITIONS_PROMPT: &str = r#"Extract improvement conditions: time-bound obligations to change, install, assess or submit something by a deadline.

These usually live in an improvement programme table or schedule with reference codes (IC1, IP2). Capture the deadline exactly as written.

Document section:
{document}"#;

const EMISSION_LIMITS_PROMPT: &str = r#"Extract emission limit values: numeric limits on emissions or discharges (concentration, mass, rate), with their parameter, value, unit and monitoring point.

Each limited parameter is one obligation with category "emission_limit". Put the limit itself in the description.

Document section:
{document}"#;

const VERIFICATION_PROMPT: &str = r#"Re-scan the document for obligations MISSED by earlier extraction.

Already extracted (do not repeat these):
{found_references}

Return only obligations absent from that list, and set "coverage" to your estimate of the fraction of the document's true obligations now captured (including the ones above).

Document:
{document}"#;

/// Render the user prompt for a pass.
pub fn user_prompt(kind: PassKind, document: &str, found_references: &[String]) -> String {
    let template = match kind {
        PassKind::NumberedConditions => NUMBERED_CONDITIONS_PROMPT,
        PassKind::TableRows => TABLE_ROWS_PROMPT,
        PassKind::ImprovementConditions => IMPROVEMENT_CONDITIONS_PROMPT,
        PassKind::EmissionLimits => EMISSION_LIMITS_PROMPT,
        PassKind::Verification => VERIFICATION_PROMPT,
    };

    let rendered = template.replace("{document}", document);
    if kind == PassKind::Verification {
        let listing = if found_references.is_empty() {
            "(nothing extracted yet)".to_string()
        } else {
            found_references
                .iter()
                .map(|r| format!("- {}", r))
                .collect::<Vec<_>>()
                .join("\n")
        };
        rendered.replace("{found_references}", &listing)
    } else {
        rendered
    }
}
