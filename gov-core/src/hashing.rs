// gov-core/src/hashing.rs
// ============================================================================
// Module: Governance Hashing Utilities
// Description: Short digests for activity reasons and HMAC-of-params hashing.
// Purpose: Provide deterministic, fixed-length digests without leaking raw
//          input material into audit trails.
// Dependencies: sha2, hmac
// ============================================================================

//! ## Overview
//! Two hashing needs recur across the governance core: a short, stable
//! digest used to compress DoD checklist text into an activity `reason`
//! string, and an HMAC-SHA256 over canonicalized external-call parameters so
//! the ext-access broker never stores raw parameter values (§4.3/§4.5).

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length, in hex characters, of the short digest used in activity reasons.
const SHORT_HASH_HEX_LEN: usize = 10;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Short Digest
// ============================================================================

/// Computes a fixed-length hex digest of `text`, truncated to
/// [`SHORT_HASH_HEX_LEN`] characters. Used to summarize DoD checklist
/// content in an `h:<short-hash>` activity reason without repeating the
/// full checklist text in the audit log.
#[must_use]
pub fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex = hex_encode(&digest);
    hex[..SHORT_HASH_HEX_LEN.min(hex.len())].to_string()
}

// ============================================================================
// SECTION: HMAC-of-Params
// ============================================================================

/// Computes an HMAC-SHA256 over canonicalized JSON bytes, returning a hex
/// string. The caller is responsible for canonicalizing `canonical_json`
/// (stable key order, no insignificant whitespace) before calling this.
///
/// # Errors
///
/// Returns an error if `secret` is empty; `Hmac::new_from_slice` otherwise
/// accepts any key length.
pub fn hmac_hex(secret: &[u8], canonical_json: &[u8]) -> Result<String, HashingError> {
    if secret.is_empty() {
        return Err(HashingError::EmptyKey);
    }
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_err| HashingError::InvalidKeyLength)?;
    mac.update(canonical_json);
    Ok(hex_encode(&mac.finalize().into_bytes()))
}

/// Errors produced while computing an HMAC digest.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashingError {
    /// The supplied HMAC key was empty.
    #[error("hmac key must not be empty")]
    EmptyKey,
    /// The supplied HMAC key could not be used to construct a MAC.
    #[error("hmac key is invalid")]
    InvalidKeyLength,
}

/// Renders a byte slice as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // `write!` to a `String` cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_deterministic_and_fixed_length() {
        let a = short_hash("buy milk,write tests");
        let b = short_hash("buy milk,write tests");
        assert_eq!(a, b);
        assert_eq!(a.len(), SHORT_HASH_HEX_LEN);
    }

    #[test]
    fn short_hash_differs_for_different_input() {
        assert_ne!(short_hash("a"), short_hash("b"));
    }

    #[test]
    fn hmac_hex_rejects_empty_key() {
        assert_eq!(hmac_hex(b"", b"{}"), Err(HashingError::EmptyKey));
    }

    #[test]
    fn hmac_hex_is_deterministic_for_same_key_and_input() {
        let first = hmac_hex(b"secret", br#"{"a":1}"#).expect("hmac");
        let second = hmac_hex(b"secret", br#"{"a":1}"#).expect("hmac");
        assert_eq!(first, second);
    }

    #[test]
    fn hmac_hex_differs_for_different_keys() {
        let first = hmac_hex(b"secret-one", br#"{"a":1}"#).expect("hmac");
        let second = hmac_hex(b"secret-two", br#"{"a":1}"#).expect("hmac");
        assert_ne!(first, second);
    }
}
