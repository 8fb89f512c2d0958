// gov-events/src/scrub.rs
// ============================================================================
// Module: Event Payload Scrubbing
// Description: Deep redaction of forbidden keys before a payload reaches a
//              subscriber or an alert body.
// Purpose: Guarantee that raw secrets, tokens, passwords, and similar values
//          never leave the process via an event or alert, regardless of
//          which command produced the payload.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! [`scrub_value`] walks a [`serde_json::Value`] recursively and replaces the
//! value of any object key matching [`FORBIDDEN_KEY_PATTERN`] with the
//! literal string `"[redacted]"`. The same pattern is shared with
//! `gov-broker`'s sanitized-response scrubbing so a key considered secret in
//! one place is secret everywhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

// ============================================================================
// SECTION: Forbidden Key Pattern
// ============================================================================

/// Regex matching object keys whose values must never be emitted verbatim.
/// Case-insensitive; matches `secret`, `token`, `password` anywhere in the
/// key, or a trailing `_key`, or the literal key `ssh_identity_file`.
pub const FORBIDDEN_KEY_PATTERN: &str =
    r"(?i)^(.*secret.*|.*token.*|.*password.*|.*_key|ssh_identity_file)$";

static FORBIDDEN_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "pattern is a crate constant, compiled once at startup")]
    Regex::new(FORBIDDEN_KEY_PATTERN).unwrap()
});

/// The literal replacement written in place of a redacted value.
pub const REDACTED_PLACEHOLDER: &str = "[redacted]";

// ============================================================================
// SECTION: Scrubbing
// ============================================================================

/// Returns true when `key` matches [`FORBIDDEN_KEY_PATTERN`].
#[must_use]
pub fn is_forbidden_key(key: &str) -> bool {
    FORBIDDEN_KEY_REGEX.is_match(key)
}

/// Recursively scrubs `value`, replacing the value of any forbidden object
/// key with [`REDACTED_PLACEHOLDER`]. Arrays are scrubbed element-wise;
/// scalars pass through unchanged.
#[must_use]
pub fn scrub_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if is_forbidden_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED_PLACEHOLDER.to_string()));
                } else {
                    out.insert(key.clone(), scrub_value(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(scrub_value).collect()),
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
    fn redacts_known_forbidden_keys_case_insensitively() {
        let value = serde_json::json!({
            "apiSecret": "s3cr3t",
            "AUTH_TOKEN": "abc",
            "password": "hunter2",
            "ssh_identity_file": "/root/.ssh/id_ed25519",
            "providerKey": "k",
            "safe": "visible",
        });
        let scrubbed = scrub_value(&value);
        assert_eq!(scrubbed["apiSecret"], "[redacted]");
        assert_eq!(scrubbed["AUTH_TOKEN"], "[redacted]");
        assert_eq!(scrubbed["password"], "[redacted]");
        assert_eq!(scrubbed["ssh_identity_file"], "[redacted]");
        assert_eq!(scrubbed["providerKey"], "[redacted]");
        assert_eq!(scrubbed["safe"], "visible");
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let value = serde_json::json!({
            "outer": {
                "nested": {"clientSecret": "x"},
                "list": [{"token": "y"}, {"fine": "z"}],
            }
        });
        let scrubbed = scrub_value(&value);
        assert_eq!(scrubbed["outer"]["nested"]["clientSecret"], "[redacted]");
        assert_eq!(scrubbed["outer"]["list"][0]["token"], "[redacted]");
        assert_eq!(scrubbed["outer"]["list"][1]["fine"], "z");
    }

    #[test]
    fn leaves_non_matching_keys_untouched() {
        let value = serde_json::json!({"workerId": "w-1", "status": "online"});
        assert_eq!(scrub_value(&value), value);
    }
}
