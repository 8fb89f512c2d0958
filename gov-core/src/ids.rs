// gov-core/src/ids.rs
// ============================================================================
// Module: Governance Identifiers
// Description: Generators for task, DoD item, and topic identifiers.
// Purpose: Provide collision-resistant, lowercase ASCII identifiers with a
//          stable string form that embeds a high-resolution wall-clock
//          component where ordering by creation time is useful.
// Dependencies: rand, crate::time
// ============================================================================

//! ## Overview
//! Task identifiers embed a UTC timestamp plus a short random suffix so they
//! sort roughly by creation time and are human-legible in logs. Collisions
//! under concurrent creation are possible in principle (two creates in the
//! same second drawing the same suffix); callers must retry on a primary-key
//! uniqueness violation from the store, per the design notes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::time::compact_timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of the random suffix appended to a task identifier.
const TASK_SUFFIX_LEN: usize = 6;
/// Length of the random suffix appended to a DoD item identifier.
const DOD_SUFFIX_LEN: usize = 8;
/// Length of the random suffix appended to a topic identifier.
const TOPIC_SUFFIX_LEN: usize = 10;

/// Maximum retries the engine should attempt when a generated task id
/// collides with an existing row (detected via primary-key uniqueness).
pub const MAX_ID_GENERATION_ATTEMPTS: u8 = 5;

// ============================================================================
// SECTION: Generators
// ============================================================================

/// Generates a lowercase alphanumeric random suffix of the given length.
fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(len)
        .collect()
}

/// Generates a fresh task identifier of the form
/// `gov-<YYYYMMDD>T<HHMMSS>Z-<6 lowercase alnum>`.
#[must_use]
pub fn new_task_id() -> String {
    format!("gov-{}-{}", compact_timestamp(), random_suffix(TASK_SUFFIX_LEN))
}

/// Generates a fresh DoD checklist item identifier matching `^dod-[a-z0-9]+$`.
#[must_use]
pub fn new_dod_id() -> String {
    format!("dod-{}", random_suffix(DOD_SUFFIX_LEN))
}

/// Returns true when `id` matches the DoD item identifier pattern
/// `^dod-[a-z0-9]+$`.
#[must_use]
pub fn is_valid_dod_id(id: &str) -> bool {
    id.strip_prefix("dod-")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

/// Generates a fresh topic identifier of the form `topic-<random>`.
#[must_use]
pub fn new_topic_id() -> String {
    format!("topic-{}", random_suffix(TOPIC_SUFFIX_LEN))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_matches_expected_shape() {
        let id = new_task_id();
        assert!(id.starts_with("gov-"));
        let rest = &id[4..];
        assert_eq!(rest.len(), "YYYYMMDDTHHMMSSZ".len() + 1 + TASK_SUFFIX_LEN);
        let (ts, suffix) = rest.split_once('-').expect("dash separator");
        assert_eq!(ts.len(), 16);
        assert_eq!(suffix.len(), TASK_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn dod_id_round_trips_through_validator() {
        let id = new_dod_id();
        assert!(is_valid_dod_id(&id));
        assert!(!is_valid_dod_id("DOD-abc123"));
        assert!(!is_valid_dod_id("dod-"));
        assert!(!is_valid_dod_id("client-supplied-123"));
        assert!(is_valid_dod_id("dod-abc123"));
    }

    #[test]
    fn two_task_ids_are_not_equal() {
        assert_ne!(new_task_id(), new_task_id());
    }
}
