// gov-broker/src/sanitize.rs
// ============================================================================
// Module: Parameter Summarization and Response Scrubbing
// Description: Turns raw call parameters into a sanitized human-readable
//              summary (types/lengths only) and redacts forbidden keys from
//              executor response payloads before they are persisted.
// Purpose: Guarantee §4.3's "raw parameter values are NEVER stored" and
//          §4.5's response-data scrubbing share one posture without raw
//          values ever reaching an `ExtCall` row.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! [`summarize_params`] never echoes a parameter value back, only its shape
//! (key, JSON type, and length where that's meaningful). [`scrub_response`]
//! reuses the same forbidden-key pattern `gov-events::scrub` applies to bus
//! payloads (§9 Design Note 3: "the broker reuses the exact same regex set
//! as the event bus scrubber... rather than defining a second list"); it is
//! a separate small regex here rather than a `gov-events` dependency, since
//! `gov-broker` has no other reason to depend on the events crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// ============================================================================
// SECTION: Forbidden Key Pattern
// ============================================================================

/// Same forbidden-key pattern as `gov_events::scrub::FORBIDDEN_KEY_PATTERN`.
pub const FORBIDDEN_KEY_PATTERN: &str =
    r"(?i)^(.*secret.*|.*token.*|.*password.*|.*_key|ssh_identity_file)$";

static FORBIDDEN_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a crate constant, compiled once at startup")]
    Regex::new(FORBIDDEN_KEY_PATTERN).unwrap()
});

// ============================================================================
// SECTION: Parameter Summary
// ============================================================================

/// Builds a sanitized human-readable summary of `params`: for an object,
/// lists each key with its JSON type and, for strings/arrays, its length —
/// never the value itself. Non-object roots are summarized as a single
/// typed entry.
#[must_use]
pub fn summarize_params(params: &Value) -> String {
    match params {
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let mut out = String::from("{");
            for (index, (key, value)) in map.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{key}: {}", describe_shape(value));
            }
            out.push('}');
            out
        }
        other => describe_shape(other),
    }
}

/// Describes the JSON type and size of `value`, never its content.
fn describe_shape(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(text) => format!("string(len {})", text.chars().count()),
        Value::Array(items) => format!("array(len {})", items.len()),
        Value::Object(map) => format!("object({} keys)", map.len()),
    }
}

// ============================================================================
// SECTION: Response Scrubbing
// ============================================================================

/// Recursively redacts any object key matching [`FORBIDDEN_KEY_PATTERN`] in
/// `response`, replacing its value with `"[redacted]"`. Arrays are scrubbed
/// element-wise; scalars pass through unchanged.
#[must_use]
pub fn scrub_response(response: &Value) -> Value {
    match response {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if FORBIDDEN_KEY_REGEX.is_match(key) {
                    out.insert(key.clone(), Value::String("[redacted]".to_string()));
                } else {
                    out.insert(key.clone(), scrub_response(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(scrub_response).collect()),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_never_contains_raw_string_values() {
        let params = serde_json::json!({"repo": "my-private-repo-name", "count": 3});
        let summary = summarize_params(&params);
        assert!(!summary.contains("my-private-repo-name"));
        assert!(summary.contains("repo: string(len 21)"));
        assert!(summary.contains("count: number"));
    }

    #[test]
    fn empty_object_summarizes_to_empty_braces() {
        assert_eq!(summarize_params(&serde_json::json!({})), "{}");
    }

    #[test]
    fn scrub_response_redacts_nested_forbidden_keys() {
        let response = serde_json::json!({"ok": true, "data": {"apiToken": "xyz", "id": 1}});
        let scrubbed = scrub_response(&response);
        assert_eq!(scrubbed["data"]["apiToken"], "[redacted]");
        assert_eq!(scrubbed["data"]["id"], 1);
        assert_eq!(scrubbed["ok"], true);
    }
}
