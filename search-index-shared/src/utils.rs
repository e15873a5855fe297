//! Utility functions for search documents.

use serde_json::{Map, Value};

/// Escape quotes, apostrophes, forward slashes and backslashes in every key and
/// string value of a document, recursing into nested objects and arrays.
///
/// Numbers, booleans and nulls are left untouched.
///
/// # Example
///
/// ```
/// use search_index_shared::utils::sanitize;
/// use serde_json::json;
///
/// let doc = json!({ "run": "apos -> ' fslash -> /" });
/// let clean = sanitize(doc.as_object().unwrap());
/// assert_eq!(clean["run"], json!("apos -> \\' fslash -> \\/"));
/// ```
pub fn sanitize(document: &Map<String, Value>) -> Map<String, Value> {
    document
        .iter()
        .map(|(key, value)| (escape_chars(key), sanitize_value(value)))
        .collect()
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::String(s) => Value::String(escape_chars(s)),
        other => other.clone(),
    }
}

/// Prefix every `\`, `/`, `"` and `'` with a backslash.
pub fn escape_chars(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '/' | '"' | '\'') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
