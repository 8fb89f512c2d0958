// gov-core/src/metadata.rs
// ============================================================================
// Module: Task Metadata
// Description: Tagged structure for the task `metadata` JSON blob.
// Purpose: Model the recognized metadata keys as named fields while
//          preserving any unrecognized keys byte-for-byte on round trip.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! `Task.metadata` is a JSON blob (§3) with a handful of recognized keys.
//! Rather than threading a raw `serde_json::Value` through the engine and
//! policy kernel, this module models it as [`TaskMetadata`]: named optional
//! fields for the recognized keys, plus an `extra` map that captures
//! anything else so round-tripping through this type never loses data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum serialized size of a task's metadata blob, in bytes.
pub const MAX_METADATA_BYTES: usize = 8192;
/// Maximum number of DoD checklist entries.
pub const MAX_DOD_ITEMS: usize = 50;
/// Minimum trimmed length of a DoD item's text.
pub const MIN_DOD_TEXT_LEN: usize = 4;
/// Maximum trimmed length of a DoD item's text.
pub const MAX_DOD_TEXT_LEN: usize = 200;
/// Maximum length of an evidence link.
pub const MAX_EVIDENCE_LINK_LEN: usize = 2000;
/// Maximum length of an evidence note.
pub const MAX_EVIDENCE_NOTE_LEN: usize = 1000;
/// Maximum number of entries in one bulk evidence call.
pub const MAX_EVIDENCE_BULK_ITEMS: usize = 20;

// ============================================================================
// SECTION: DoD Items
// ============================================================================

/// One Definition-of-Done checklist entry with server-assigned identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DodItem {
    /// Stable identifier, matches `^dod-[a-z0-9]+$`.
    pub id: String,
    /// Item text, 4..200 chars after trimming.
    pub text: String,
    /// Completion state.
    pub done: bool,
}

/// One evidence entry appended to a task (append-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// URL or reference link, ≤ 2000 chars.
    pub link: String,
    /// Optional free-text note, ≤ 1000 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Timestamp the entry was added.
    #[serde(rename = "addedAt")]
    pub added_at: String,
}

// ============================================================================
// SECTION: Task Metadata
// ============================================================================

/// Structured view of the task `metadata` JSON blob.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Policy kernel version string, always present after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
    /// Plain-text mirror of the checklist, kept in sync with `dod_status`.
    #[serde(rename = "dodChecklist", skip_serializing_if = "Vec::is_empty", default)]
    pub dod_checklist: Vec<String>,
    /// Structured checklist state.
    #[serde(rename = "dodStatus", skip_serializing_if = "Vec::is_empty", default)]
    pub dod_status: Vec<DodItem>,
    /// Append-only evidence log.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub evidence: Vec<EvidenceEntry>,
    /// Whether documentation has been updated for this task.
    #[serde(rename = "docsUpdated", skip_serializing_if = "Option::is_none")]
    pub docs_updated: Option<bool>,
    /// Unrecognized keys, preserved byte-for-byte across round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskMetadata {
    /// Returns true when every DoD checklist item is marked done, and the
    /// checklist itself is non-empty. An empty checklist is considered
    /// incomplete for the purposes of `DOD_INCOMPLETE` (entering `DONE`
    /// with `dod_required` but no checklist is a separate, earlier failure).
    #[must_use]
    pub fn dod_all_done(&self) -> bool {
        !self.dod_status.is_empty() && self.dod_status.iter().all(|item| item.done)
    }

    /// Serializes this metadata to canonical JSON and returns its byte
    /// length, for enforcing [`MAX_METADATA_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (should not happen for a
    /// well-formed [`TaskMetadata`]).
    pub fn serialized_len(&self) -> Result<usize, serde_json::Error> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_round_trip_through_extra() {
        let raw = serde_json::json!({
            "policy_version": "gov-policy-v1",
            "somethingCustom": {"nested": true},
        });
        let metadata: TaskMetadata = serde_json::from_value(raw.clone()).expect("deserialize");
        assert_eq!(metadata.extra.get("somethingCustom"), raw.get("somethingCustom"));
        let rendered = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(rendered.get("somethingCustom"), raw.get("somethingCustom"));
    }

    #[test]
    fn dod_all_done_requires_nonempty_checklist() {
        let mut metadata = TaskMetadata::default();
        assert!(!metadata.dod_all_done());
        metadata.dod_status.push(DodItem {
            id: "dod-abc123".to_string(),
            text: "write tests".to_string(),
            done: true,
        });
        assert!(metadata.dod_all_done());
        metadata.dod_status.push(DodItem {
            id: "dod-def456".to_string(),
            text: "ship it".to_string(),
            done: false,
        });
        assert!(!metadata.dod_all_done());
    }
}
