//! Structural validity of analysis output.

use serde_json::Value;

/// True iff `candidate` parses as a JSON object.
///
/// Arrays, scalars and anything that fails to parse are invalid.
pub fn is_valid(candidate: &str) -> bool {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(_)) => true,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "Analysis output is JSON but not an object");
            false
        }
        Err(e) => {
            tracing::debug!(error = %e, candidate = %truncate(candidate, 200), "Analysis output is not valid JSON");
            false
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
