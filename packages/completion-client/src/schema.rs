//! Schema generation for structured outputs.
//!
//! Uses `schemars` to derive a JSON schema from a Rust type, then reshapes
//! it for the completion service's strict mode, which requires
//! `additionalProperties: false` on every object, every property listed in
//! `required`, and fully inlined definitions (no `$ref`).

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Types usable as a strict structured-output target.
///
/// Blanket-implemented for anything that is `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a strict-mode schema for this type.
    fn strict_schema() -> serde_json::Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value
            .as_object()
            .and_then(|m| m.get("definitions"))
            .cloned();
        tighten(&mut value, definitions.as_ref());

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }
        value
    }

    /// Schema name reported to the service.
    fn schema_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Recursively inline `$ref`s and enforce strict-object constraints.
fn tighten(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(path)) = map.get("$ref").cloned() {
                if let Some(def) = path
                    .strip_prefix("#/definitions/")
                    .and_then(|name| definitions?.get(name))
                {
                    *value = def.clone();
                    tighten(value, definitions);
                    return;
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                // Strict mode wants every property required, nullable or not.
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(keys));
                }
            }

            for v in map.values_mut() {
                tighten(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                tighten(item, definitions);
            }
        }
        _ => {}
    }
}
