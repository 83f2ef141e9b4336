//! Malformed-output recovery parser.
//!
//! Completion services truncate at the token ceiling and occasionally wrap
//! JSON in prose or code fences. This module reconstructs as many
//! well-formed array elements as possible from such output. It is the
//! single point where brittle upstream output is made safe: every
//! extraction pass funnels its raw response through [`recover`].
//!
//! The function is pure and total: it never panics and never returns an
//! error. The worst case for any input is an empty item list with the
//! `failed` flag set.

use serde_json::Value;

/// Confidence hint when the direct parse succeeded.
pub const HINT_DIRECT: f32 = 1.0;
/// Confidence hint when items were recovered by scanning.
pub const HINT_RECOVERED: f32 = 0.75;
/// Confidence hint when nothing could be recovered.
pub const HINT_FAILED: f32 = 0.0;

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    /// Every array element that parsed, in document order
    pub items: Vec<Value>,

    /// False when the direct parse succeeded; true whenever the
    /// character-scanning path was engaged
    pub recovered: bool,

    /// True when no element could be reconstructed at all
    pub failed: bool,

    /// Rough reliability of `items` for downstream confidence figures
    pub confidence_hint: f32,
}

impl Recovered {
    fn direct(items: Vec<Value>) -> Self {
        Self {
            items,
            recovered: false,
            failed: false,
            confidence_hint: HINT_DIRECT,
        }
    }

    fn scanned(items: Vec<Value>) -> Self {
        let failed = items.is_empty();
        Self {
            items,
            recovered: true,
            failed,
            confidence_hint: if failed { HINT_FAILED } else { HINT_RECOVERED },
        }
    }
}

/// Extract the elements of the named array field from raw model output.
///
/// Strategy: strip code fences, then try a direct parse (a bare array, or
/// an object carrying `array_field` as an array). On failure, locate the
/// array (after the named field if present, else the first `[`) and
/// scan character-by-character, tracking brace depth and string/escape
/// state, keeping every complete object that parses in isolation.
pub fn recover(raw: &str, array_field: &str) -> Recovered {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        match value {
            Value::Array(items) => return Recovered::direct(items),
            Value::Object(mut map) => {
                if let Some(Value::Array(items)) = map.remove(array_field) {
                    return Recovered::direct(items);
                }
                // Valid JSON, wrong shape: fall through to the scanner,
                // which may still find an array under another key.
            }
            _ => {}
        }
    }

    let Some(start) = locate_array(text, array_field) else {
        return Recovered::scanned(Vec::new());
    };

    Recovered::scanned(scan_objects(&text[start..]))
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim().trim_end_matches("```").trim()
}

/// Byte offset just past the `[` of the target array.
///
/// Prefers the array that follows `"array_field":`; falls back to the
/// first `[` anywhere so a bare truncated array is still recoverable.
fn locate_array(text: &str, array_field: &str) -> Option<usize> {
    let needle = format!("\"{}\"", array_field);
    if let Some(field_pos) = text.find(&needle) {
        let after = &text[field_pos + needle.len()..];
        if let Some(bracket) = after.find('[') {
            return Some(field_pos + needle.len() + bracket + 1);
        }
    }
    text.find('[').map(|idx| idx + 1)
}

/// Collect every complete top-level object inside an array body.
///
/// Tracks string and escape state so braces inside quoted text don't
/// count, and brace depth so nested objects stay part of their parent.
/// Each balanced `{...}` slice is parsed in isolation; slices that fail
/// (the model emitted something malformed mid-array) are skipped rather
/// than aborting the scan.
fn scan_objects(body: &str) -> Vec<Value> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start: Option<usize> = None;

    for (idx, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    object_start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(start) = object_start.take() {
                        if let Ok(value) = serde_json::from_str::<Value>(&body[start..=idx]) {
                            items.push(value);
                        }
                    }
                }
            }
            ']' if depth == 0 => break, // array closed; ignore trailing text
            _ => {}
        }
    }

    items
}
