// gov-events/src/time.rs
// ============================================================================
// Module: Event Time Utilities
// Description: UTC ISO-8601 millisecond timestamps for published events.
// Purpose: Keep this crate's timestamp format identical to gov-core's
//          without taking a dependency on gov-core itself (the event bus is
//          a leaf crate other crates build alert transports against).
// Dependencies: time
// ============================================================================

//! ## Overview
//! Mirrors `gov_core::time`'s format exactly (`2026-07-27T18:30:01.123Z`) so
//! event timestamps and governance-record timestamps are directly
//! comparable as strings.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Returns the current UTC wall-clock time as a millisecond-precision
/// ISO-8601 string.
#[must_use]
pub fn now_iso8601_ms() -> String {
    let now = OffsetDateTime::now_utc();
    let truncated = now
        .replace_nanosecond((now.nanosecond() / 1_000_000) * 1_000_000)
        .unwrap_or(now);
    truncated
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_millisecond_precision_and_z_suffix() {
        let ts = now_iso8601_ms();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }
}
