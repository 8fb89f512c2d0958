// gov-core/src/time.rs
// ============================================================================
// Module: Governance Time Utilities
// Description: UTC ISO-8601 millisecond timestamps for governance records.
// Purpose: Provide one canonical wall-clock string format for the whole crate.
// Dependencies: time
// ============================================================================

//! ## Overview
//! All timestamps in the governance core are UTC ISO-8601 strings with
//! millisecond precision (`2026-07-27T18:30:01.123Z`). This module is the
//! single place that formats and parses them so every other module treats
//! timestamps as opaque, comparable strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Returns the current UTC wall-clock time as a millisecond-precision
/// ISO-8601 string.
#[must_use]
pub fn now_iso8601_ms() -> String {
    format_iso8601_ms(OffsetDateTime::now_utc())
}

/// Formats an [`OffsetDateTime`] as a millisecond-precision ISO-8601 string.
///
/// # Panics
///
/// Never panics: `Rfc3339` formatting of a valid `OffsetDateTime` cannot
/// fail, and a failure here would be a logic error we want surfaced loudly
/// in tests rather than swallowed.
#[must_use]
pub fn format_iso8601_ms(at: OffsetDateTime) -> String {
    let truncated = at.replace_nanosecond((at.nanosecond() / 1_000_000) * 1_000_000)
        .unwrap_or(at);
    truncated
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000Z"))
}

/// Parses a millisecond-precision ISO-8601 string back into an
/// [`OffsetDateTime`].
///
/// # Errors
///
/// Returns an error if `value` is not a valid RFC 3339 timestamp.
pub fn parse_iso8601(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339)
}

/// Returns a dense numeric timestamp component (`YYYYMMDDTHHMMSSZ`) suitable
/// for embedding in generated identifiers.
#[must_use]
pub fn compact_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso8601_ms_has_millisecond_precision_and_z_suffix() {
        let ts = now_iso8601_ms();
        assert!(ts.ends_with('Z'), "expected Z suffix, got {ts}");
        assert!(ts.contains('.'), "expected fractional seconds, got {ts}");
        assert!(parse_iso8601(&ts).is_ok());
    }

    #[test]
    fn compact_timestamp_is_sixteen_chars_with_t_and_z() {
        let ts = compact_timestamp();
        assert_eq!(ts.len(), 16, "unexpected length for {ts}");
        assert_eq!(&ts[8..9], "T");
        assert!(ts.ends_with('Z'));
    }
}
