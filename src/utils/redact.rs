use serde_json::Value as JsonValue;

use crate::error::AppResult;

const REDACTED: &str = "[REDACTED]";

/// Mask free-text roster fields before a payload is written to the debug log.
///
/// Player names and notes are replaced; raw entry values (stringified JSON)
/// are reduced to their length.
pub fn redact_sensitive_data(data: &JsonValue) -> AppResult<JsonValue> {
    Ok(redact_value(data))
}

fn redact_value(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let mut redacted = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let next = match field_policy(key) {
                    FieldPolicy::Mask => mask_text(val),
                    FieldPolicy::Summarize => summarize_text(val),
                    FieldPolicy::Recurse => redact_value(val),
                };
                redacted.insert(key.clone(), next);
            }
            JsonValue::Object(redacted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_value).collect()),
        _ => value.clone(),
    }
}

enum FieldPolicy {
    Mask,
    Summarize,
    Recurse,
}

fn field_policy(field_name: &str) -> FieldPolicy {
    match field_name.to_lowercase().as_str() {
        "name" | "note" | "notes" | "comment" => FieldPolicy::Mask,
        "value" => FieldPolicy::Summarize,
        _ => FieldPolicy::Recurse,
    }
}

fn mask_text(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(text) if !text.is_empty() => JsonValue::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}

fn summarize_text(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(text) => JsonValue::String(format!("<{} bytes>", text.len())),
        other => redact_value(other),
    }
}
